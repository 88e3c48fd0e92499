//! Calendar transport capability.
//!
//! The engine never talks HTTP itself. It consumes this trait, which a
//! provider crate implements against a real calendar service (and an
//! in-memory double implements for tests).
//!
//! Listing is page-addressed: callers pass the `next_page_token` of the
//! previous page until the service stops returning one. [`for_each_event`]
//! and [`for_each_instance`] wrap that loop.

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::date_range::DateRange;
use crate::event::{Event, EventTime};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Filters applied to an event listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    /// RFC3339 lower bound on event end
    pub time_min: Option<String>,
    /// RFC3339 upper bound on event start
    pub time_max: Option<String>,
    /// Only events modified at or after this watermark
    pub updated_min: Option<String>,
    pub show_deleted: bool,
    /// Expand recurring series into their instances
    pub single_events: bool,
    /// Only events carrying this UID
    pub ical_uid: Option<String>,
}

impl ListFilter {
    /// Expanded listing within a date range (full reconciliation).
    pub fn within(range: &DateRange) -> Self {
        ListFilter {
            time_min: range.from.map(|t| t.to_rfc3339()),
            time_max: range.to.map(|t| t.to_rfc3339()),
            single_events: true,
            ..Default::default()
        }
    }

    /// Unexpanded listing of everything changed since `watermark` (incremental follow).
    pub fn changed_since(watermark: Option<&str>) -> Self {
        ListFilter {
            updated_min: watermark.map(String::from),
            show_deleted: true,
            single_events: false,
            ..Default::default()
        }
    }

    /// Every non-deleted event carrying `uid`, series unexpanded.
    pub fn by_uid(uid: &str) -> Self {
        ListFilter {
            ical_uid: Some(uid.to_string()),
            ..Default::default()
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub items: Vec<Event>,
    pub next_page_token: Option<String>,
    /// Service-issued modification watermark for this listing
    pub updated: Option<String>,
}

/// Operations the engine needs against a calendar's event collection,
/// addressed by the service's own event identifiers.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Fetch one page of events. `page_token` is `None` for the first page.
    async fn list_events(
        &self,
        calendar_id: &str,
        filter: &ListFilter,
        page_token: Option<&str>,
    ) -> Result<EventPage, TransportError>;

    /// Import an event keyed by its UID: creates it, or replaces the event
    /// already carrying that UID (or `event.id`, when set).
    async fn upsert_event(&self, calendar_id: &str, event: &Event) -> Result<Event, TransportError>;

    /// Replace the event addressed by `event_id`.
    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &Event,
    ) -> Result<Event, TransportError>;

    /// Delete an event. Deleting an already-deleted event succeeds.
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), TransportError>;

    /// Fetch one page of the instances of a series at `original_start`.
    async fn list_instances(
        &self,
        calendar_id: &str,
        series_event_id: &str,
        original_start: &EventTime,
        page_token: Option<&str>,
    ) -> Result<EventPage, TransportError>;
}

/// Drain a listing page by page, handing each event to `f`.
///
/// Returns the watermark reported by the last page.
pub async fn for_each_event<F>(
    transport: &dyn EventTransport,
    calendar_id: &str,
    filter: &ListFilter,
    mut f: F,
) -> Result<Option<String>, TransportError>
where
    F: FnMut(Event),
{
    let mut page_token: Option<String> = None;

    loop {
        let page = transport
            .list_events(calendar_id, filter, page_token.as_deref())
            .await?;

        page.items.into_iter().for_each(&mut f);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(page.updated),
        }
    }
}

/// Drain the instance listing of a series page by page.
pub async fn for_each_instance<F>(
    transport: &dyn EventTransport,
    calendar_id: &str,
    series_event_id: &str,
    original_start: &EventTime,
    mut f: F,
) -> Result<(), TransportError>
where
    F: FnMut(Event),
{
    let mut page_token: Option<String> = None;

    loop {
        let page = transport
            .list_instances(calendar_id, series_event_id, original_start, page_token.as_deref())
            .await?;

        page.items.into_iter().for_each(&mut f);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(()),
        }
    }
}
