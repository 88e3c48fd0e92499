//! In-memory transport for testing.
//!
//! Holds calendars as plain event lists, pages listings, honours import-by-UID
//! semantics, and lets tests inject failures and latency.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone};

use super::{EventPage, EventTransport, ListFilter, TransportError};
use crate::event::{Event, EventStatus, EventTime, Transparency};

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List { calendar: String, filter: ListFilter },
    Upsert { calendar: String, uid: String },
    Update { calendar: String, event_id: String },
    Delete { calendar: String, event_id: String },
    Instances { calendar: String, series_event_id: String },
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Upsert { .. } | Call::Update { .. } | Call::Delete { .. }
        )
    }
}

#[derive(Debug)]
struct MockTransportInner {
    calendars: HashMap<String, Vec<Event>>,
    page_size: usize,
    watermark: Option<String>,
    next_id: u64,
    calls: Vec<Call>,
    failing_keys: HashSet<String>,
    failing_calendars: HashSet<String>,
    write_delay: Option<Duration>,
    in_flight: usize,
    peak_in_flight: usize,
}

impl Default for MockTransportInner {
    fn default() -> Self {
        MockTransportInner {
            calendars: HashMap::new(),
            page_size: 2,
            watermark: None,
            next_id: 0,
            calls: Vec::new(),
            failing_keys: HashSet::new(),
            failing_calendars: HashSet::new(),
            write_delay: None,
            in_flight: 0,
            peak_in_flight: 0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an event into a calendar as-is.
    pub fn insert(&self, calendar: &str, event: Event) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calendars
            .entry(calendar.to_string())
            .or_default()
            .push(event);
    }

    /// Replace the whole contents of a calendar.
    pub fn set_calendar(&self, calendar: &str, events: Vec<Event>) {
        let mut inner = self.inner.lock().unwrap();
        inner.calendars.insert(calendar.to_string(), events);
    }

    pub fn events(&self, calendar: &str) -> Vec<Event> {
        let inner = self.inner.lock().unwrap();
        inner.calendars.get(calendar).cloned().unwrap_or_default()
    }

    pub fn set_page_size(&self, size: usize) {
        self.inner.lock().unwrap().page_size = size.max(1);
    }

    /// Watermark reported on the last page of every listing.
    pub fn set_watermark(&self, watermark: &str) {
        self.inner.lock().unwrap().watermark = Some(watermark.to_string());
    }

    /// Writes addressing this UID or event id fail with a 503.
    pub fn fail_writes_for(&self, key: &str) {
        self.inner.lock().unwrap().failing_keys.insert(key.to_string());
    }

    /// Listings of this calendar fail with a 500.
    pub fn fail_listing(&self, calendar: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_calendars
            .insert(calendar.to_string());
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().write_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn peak_in_flight(&self) -> usize {
        self.inner.lock().unwrap().peak_in_flight
    }

    /// Record a write and report whether it should fail.
    async fn begin_write(&self, call: Call, key: &str) -> Result<(), TransportError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(call);
            inner.in_flight += 1;
            inner.peak_in_flight = inner.peak_in_flight.max(inner.in_flight);
            inner.write_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.in_flight -= 1;
        if inner.failing_keys.contains(key) {
            return Err(TransportError::Status {
                status: 503,
                message: format!("backend unavailable for {key}"),
            });
        }
        Ok(())
    }

    fn page(&self, matching: Vec<Event>, page_token: Option<&str>) -> EventPage {
        let inner = self.inner.lock().unwrap();
        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + inner.page_size).min(matching.len());
        let items = matching[offset.min(end)..end].to_vec();

        if end < matching.len() {
            EventPage {
                items,
                next_page_token: Some(end.to_string()),
                updated: None,
            }
        } else {
            EventPage {
                items,
                next_page_token: None,
                updated: inner.watermark.clone(),
            }
        }
    }
}

#[async_trait]
impl EventTransport for MockTransport {
    async fn list_events(
        &self,
        calendar_id: &str,
        filter: &ListFilter,
        page_token: Option<&str>,
    ) -> Result<EventPage, TransportError> {
        let matching: Vec<Event> = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::List {
                calendar: calendar_id.to_string(),
                filter: filter.clone(),
            });

            if inner.failing_calendars.contains(calendar_id) {
                return Err(TransportError::Status {
                    status: 500,
                    message: format!("cannot list {calendar_id}"),
                });
            }

            inner
                .calendars
                .get(calendar_id)
                .map(|events| {
                    events
                        .iter()
                        .filter(|e| filter.show_deleted || !e.is_cancelled())
                        .filter(|e| filter.ical_uid.as_ref().is_none_or(|uid| &e.ical_uid == uid))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(self.page(matching, page_token))
    }

    async fn upsert_event(&self, calendar_id: &str, event: &Event) -> Result<Event, TransportError> {
        let call = Call::Upsert {
            calendar: calendar_id.to_string(),
            uid: event.ical_uid.clone(),
        };
        self.begin_write(call, &event.ical_uid).await?;

        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let fresh_id = format!("t{}", inner.next_id);
        let events = inner.calendars.entry(calendar_id.to_string()).or_default();

        let existing = events.iter_mut().find(|e| {
            (!event.id.is_empty() && e.id == event.id)
                || (e.ical_uid == event.ical_uid && e.recurring_event_id.is_none())
        });

        match existing {
            Some(slot) => {
                let id = slot.id.clone();
                *slot = Event {
                    id,
                    ..event.clone()
                };
                Ok(slot.clone())
            }
            None => {
                let stored = Event {
                    id: fresh_id,
                    ..event.clone()
                };
                events.push(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &Event,
    ) -> Result<Event, TransportError> {
        let call = Call::Update {
            calendar: calendar_id.to_string(),
            event_id: event_id.to_string(),
        };
        self.begin_write(call, event_id).await?;

        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .calendars
            .get_mut(calendar_id)
            .and_then(|events| events.iter_mut().find(|e| e.id == event_id))
            .ok_or_else(|| TransportError::Status {
                status: 404,
                message: format!("no event {event_id}"),
            })?;

        *slot = Event {
            id: event_id.to_string(),
            ..event.clone()
        };
        Ok(slot.clone())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), TransportError> {
        let call = Call::Delete {
            calendar: calendar_id.to_string(),
            event_id: event_id.to_string(),
        };
        self.begin_write(call, event_id).await?;

        let mut inner = self.inner.lock().unwrap();
        if let Some(events) = inner.calendars.get_mut(calendar_id) {
            events.retain(|e| e.id != event_id);
        }
        Ok(())
    }

    async fn list_instances(
        &self,
        calendar_id: &str,
        series_event_id: &str,
        original_start: &EventTime,
        page_token: Option<&str>,
    ) -> Result<EventPage, TransportError> {
        let matching: Vec<Event> = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Instances {
                calendar: calendar_id.to_string(),
                series_event_id: series_event_id.to_string(),
            });

            inner
                .calendars
                .get(calendar_id)
                .map(|events| {
                    events
                        .iter()
                        .filter(|e| e.recurring_event_id.as_deref() == Some(series_event_id))
                        .filter(|e| e.original_start.as_ref() == Some(original_start))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(self.page(matching, page_token))
    }
}

/// Timed event on 2024-01-01 at `hour`:00 UTC lasting one hour.
pub fn timed_event(id: &str, summary: &str, hour: u32) -> Event {
    Event {
        id: id.to_string(),
        ical_uid: format!("{id}@google.com"),
        summary: summary.to_string(),
        description: None,
        location: None,
        start: at(hour),
        end: at(hour + 1),
        status: EventStatus::Confirmed,
        transparency: Transparency::Opaque,
        recurrence: vec![],
        recurring_event_id: None,
        original_start: None,
    }
}

pub fn at(hour: u32) -> EventTime {
    let utc = FixedOffset::east_opt(0).unwrap();
    EventTime::DateTime(utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::for_each_event;

    #[tokio::test]
    async fn mock_pages_listings() {
        let transport = MockTransport::new();
        for i in 0..5 {
            transport.insert("cal", timed_event(&format!("e{i}"), "x", 9));
        }
        transport.set_watermark("w1");

        let mut seen = Vec::new();
        let watermark = for_each_event(&transport, "cal", &ListFilter::default(), |e| {
            seen.push(e.id)
        })
        .await
        .unwrap();

        assert_eq!(seen, vec!["e0", "e1", "e2", "e3", "e4"]);
        assert_eq!(watermark.as_deref(), Some("w1"));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn mock_upsert_replaces_by_uid() {
        let transport = MockTransport::new();
        let mut event = timed_event("", "first", 9);
        event.ical_uid = "uid-1".to_string();

        let created = transport.upsert_event("cal", &event).await.unwrap();
        event.summary = "second".to_string();
        let replaced = transport.upsert_event("cal", &event).await.unwrap();

        assert_eq!(created.id, replaced.id);
        assert_eq!(transport.events("cal").len(), 1);
        assert_eq!(transport.events("cal")[0].summary, "second");
    }

    #[tokio::test]
    async fn mock_delete_is_idempotent() {
        let transport = MockTransport::new();
        transport.insert("cal", timed_event("e1", "x", 9));

        transport.delete_event("cal", "e1").await.unwrap();
        transport.delete_event("cal", "e1").await.unwrap();
        assert!(transport.events("cal").is_empty());
    }
}
