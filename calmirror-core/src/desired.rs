//! Desired target state built from source calendars.

use std::collections::HashMap;

use crate::config::{MirrorScope, SourceSpec, effective_mask};
use crate::date_range::DateRange;
use crate::error::{MirrorError, MirrorResult};
use crate::event::{Event, EventStatus, EventTime, Transparency};
use crate::identity::SyncIdentity;
use crate::transport::{EventTransport, ListFilter, for_each_event};

/// What one target event should look like.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredEvent {
    pub identity: SyncIdentity,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub transparency: Transparency,
    pub recurrence: Vec<String>,
    /// The existing target event this replaces, once the diff has found one
    pub target_event_id: Option<String>,
}

impl DesiredEvent {
    /// Transform a source event: the mask (when set) replaces the title and
    /// hides description and location, then the prefix is prepended.
    pub fn from_source(
        source: &Event,
        identity: SyncIdentity,
        mask: Option<&str>,
        prefix: &str,
    ) -> Self {
        let (summary, description, location) = match mask {
            Some(mask) => (mask.to_string(), None, None),
            None => (
                source.summary.clone(),
                source.description.clone(),
                source.location.clone(),
            ),
        };

        DesiredEvent {
            identity,
            summary: format!("{prefix}{summary}"),
            description,
            location,
            start: source.start.clone(),
            end: source.end.clone(),
            transparency: source.transparency,
            recurrence: source.recurrence.clone(),
            target_event_id: None,
        }
    }

    /// Strict equality on the mirrored fields.
    pub fn matches(&self, target: &Event) -> bool {
        self.summary == target.summary
            && self.description == target.description
            && self.location == target.location
            && self.start == target.start
            && self.end == target.end
            && self.transparency == target.transparency
    }

    /// The event to write, carrying the identity as its UID.
    pub fn to_event(&self) -> Event {
        Event {
            id: self.target_event_id.clone().unwrap_or_default(),
            ical_uid: self.identity.as_str().to_string(),
            summary: self.summary.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            status: EventStatus::Confirmed,
            transparency: self.transparency,
            recurrence: self.recurrence.clone(),
            recurring_event_id: None,
            original_start: None,
        }
    }
}

/// Desired target contents of one mirror scope, keyed by identity.
#[derive(Debug, Default)]
pub struct DesiredState {
    scope_id: String,
    events: HashMap<SyncIdentity, DesiredEvent>,
}

impl DesiredState {
    pub fn new(scope_id: &str) -> Self {
        DesiredState {
            scope_id: scope_id.to_string(),
            events: HashMap::new(),
        }
    }

    /// List every source of `scope` and merge its syncable events.
    ///
    /// Any listing failure aborts the build.
    pub async fn build(
        transport: &dyn EventTransport,
        scope: &MirrorScope,
        range: &DateRange,
    ) -> MirrorResult<Self> {
        let mut state = DesiredState::new(&scope.id);
        let filter = ListFilter::within(range);
        let mask = effective_mask(&scope.mask);

        for source in &scope.source_calendars {
            tracing::info!(calendar = %source.id, scope = %scope.id, "listing source calendar");

            for_each_event(transport, &source.id, &filter, |event| {
                if scope.should_sync(&event) {
                    state.layer(&event, source, mask);
                }
            })
            .await
            .map_err(|e| MirrorError::listing(&source.id, e))?;
        }

        Ok(state)
    }

    /// Merge one source event.
    ///
    /// The first occurrence of an identity is transformed in full. Later
    /// occurrences (the same event seen through another source) only
    /// re-prefix the title; every other field keeps the first value.
    pub fn layer(&mut self, event: &Event, source: &SourceSpec, mask: Option<&str>) {
        let identity = SyncIdentity::mirrored(event, &self.scope_id);

        self.events
            .entry(identity)
            .and_modify(|existing| {
                existing.summary = format!("{}{}", source.prefix, existing.summary);
            })
            .or_insert_with_key(|identity| {
                DesiredEvent::from_source(event, identity.clone(), mask, &source.prefix)
            });
    }

    /// List every exclusion calendar of `scope` and drop matching identities.
    ///
    /// Returns how many desired events were removed.
    pub async fn apply_exclusions(
        &mut self,
        transport: &dyn EventTransport,
        scope: &MirrorScope,
        range: &DateRange,
    ) -> MirrorResult<usize> {
        let filter = ListFilter::within(range);
        let mut removed = 0;

        for calendar_id in &scope.exclude_calendar_ids {
            tracing::info!(calendar = %calendar_id, scope = %scope.id, "listing exclude calendar");

            for_each_event(transport, calendar_id, &filter, |event| {
                if self.exclude(&event) {
                    removed += 1;
                }
            })
            .await
            .map_err(|e| MirrorError::listing(calendar_id, e))?;
        }

        Ok(removed)
    }

    /// Drop the desired event sharing `event`'s identity, if any.
    pub fn exclude(&mut self, event: &Event) -> bool {
        let identity = SyncIdentity::mirrored(event, &self.scope_id);
        self.events.remove(&identity).is_some()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DesiredEvent> {
        self.events.values()
    }

    pub(crate) fn remove(&mut self, identity: &SyncIdentity) -> Option<DesiredEvent> {
        self.events.remove(identity)
    }

    pub(crate) fn get_mut(&mut self, identity: &SyncIdentity) -> Option<&mut DesiredEvent> {
        self.events.get_mut(identity)
    }

    pub(crate) fn into_events(self) -> impl Iterator<Item = DesiredEvent> {
        self.events.into_values()
    }
}
