//! Recurring-series exceptions and identity retraction on the target.

use crate::config::{FollowScope, effective_mask};
use crate::event::{Event, EventStatus, EventTime};
use crate::identity::SyncIdentity;
use crate::transport::{EventTransport, ListFilter, TransportError, for_each_event, for_each_instance};

/// A single overridden occurrence of a source series, to be replayed onto
/// the matching instance of the mirrored series.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionOverride {
    /// Source event id of the exception itself
    pub source_event_id: String,
    /// Identity of the mirrored series master
    pub parent: SyncIdentity,
    pub original_start: EventTime,
    pub start: EventTime,
    pub end: EventTime,
    pub status: EventStatus,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl ExceptionOverride {
    /// Build from a source exception. `None` when the event is not an
    /// instance override.
    pub fn from_source(event: &Event, scope: &FollowScope) -> Option<Self> {
        let parent_id = event.recurring_event_id.as_deref()?;
        let original_start = event.original_start.clone()?;

        let (summary, description, location) = match effective_mask(&scope.mask) {
            Some(mask) => (mask.to_string(), None, None),
            None => (
                event.summary.clone(),
                event.description.clone(),
                event.location.clone(),
            ),
        };

        Some(ExceptionOverride {
            source_event_id: event.id.clone(),
            parent: SyncIdentity::followed(parent_id, &scope.id),
            original_start,
            start: event.start.clone(),
            end: event.end.clone(),
            status: event.status,
            summary: format!("{}{summary}", scope.prefix),
            description,
            location,
        })
    }

    /// Overwrite the fields an exception may change on a target instance.
    ///
    /// A cancelled exception only cancels the instance. Its times may be
    /// placeholders when the service reports a deleted occurrence.
    pub fn apply_to(&self, instance: Event) -> Event {
        if self.status == EventStatus::Cancelled {
            return Event {
                status: EventStatus::Cancelled,
                ..instance
            };
        }

        Event {
            start: self.start.clone(),
            end: self.end.clone(),
            status: self.status,
            summary: self.summary.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            ..instance
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// This many target instances were rewritten
    Updated(usize),
    /// The series has not been mirrored yet
    ParentMissing,
}

/// Replay `exception` onto the mirrored series in `calendar_id`.
///
/// A missing series master is not an error: the exception is skipped and
/// picked up again once the master has been mirrored.
pub async fn propagate(
    transport: &dyn EventTransport,
    calendar_id: &str,
    exception: &ExceptionOverride,
) -> Result<Propagation, TransportError> {
    let mut master_id = None;
    for_each_event(
        transport,
        calendar_id,
        &ListFilter::by_uid(exception.parent.as_str()),
        |event| {
            if master_id.is_none() && event.recurring_event_id.is_none() {
                master_id = Some(event.id);
            }
        },
    )
    .await?;

    let Some(master_id) = master_id else {
        tracing::info!(
            parent = %exception.parent,
            exception = %exception.source_event_id,
            "series not mirrored yet, skipping exception"
        );
        return Ok(Propagation::ParentMissing);
    };

    let mut instances = Vec::new();
    for_each_instance(
        transport,
        calendar_id,
        &master_id,
        &exception.original_start,
        |instance| instances.push(instance),
    )
    .await?;

    if instances.is_empty() {
        tracing::warn!(
            parent = %exception.parent,
            original_start = %exception.original_start,
            "no mirrored instance at original start"
        );
    }

    let count = instances.len();
    for instance in instances {
        let event_id = instance.id.clone();
        let updated = exception.apply_to(instance);
        transport.update_event(calendar_id, &event_id, &updated).await?;
    }

    Ok(Propagation::Updated(count))
}

/// Delete every target event carrying `identity` as its UID.
pub async fn retract(
    transport: &dyn EventTransport,
    calendar_id: &str,
    identity: &SyncIdentity,
) -> Result<usize, TransportError> {
    let mut event_ids = Vec::new();
    for_each_event(
        transport,
        calendar_id,
        &ListFilter::by_uid(identity.as_str()),
        |event| event_ids.push(event.id),
    )
    .await?;

    for event_id in &event_ids {
        transport.delete_event(calendar_id, event_id).await?;
    }

    Ok(event_ids.len())
}
