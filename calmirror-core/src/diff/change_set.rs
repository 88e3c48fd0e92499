//! Change set computation between desired state and target listing.

use std::collections::HashSet;
use std::fmt;

use crate::apply::Change;
use crate::date_range::DateRange;
use crate::desired::{DesiredEvent, DesiredState};
use crate::diff::DiffKind;
use crate::error::{MirrorError, MirrorResult};
use crate::event::Event;
use crate::identity::SyncIdentity;
use crate::transport::{EventTransport, ListFilter, for_each_event};

/// A target event scheduled for deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRef {
    pub event_id: String,
    pub identity: SyncIdentity,
    pub summary: String,
}

/// Classified differences between desired state and a target calendar.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Creations (no `target_event_id`) and in-place updates (with one)
    pub upserts: Vec<DesiredEvent>,
    pub deletes: Vec<TargetRef>,
    pub unchanged: Vec<SyncIdentity>,
}

impl ChangeSet {
    /// List `target_calendar` and classify it against `desired`.
    ///
    /// A listing failure aborts the diff; no partial change set is produced.
    pub async fn against_target(
        transport: &dyn EventTransport,
        target_calendar: &str,
        desired: DesiredState,
        range: &DateRange,
    ) -> MirrorResult<Self> {
        tracing::info!(calendar = %target_calendar, "listing target calendar");

        let mut builder = DiffBuilder::new(desired);
        for_each_event(transport, target_calendar, &ListFilter::within(range), |event| {
            builder.observe(event)
        })
        .await
        .map_err(|e| MirrorError::listing(target_calendar, e))?;

        let changes = builder.finish();
        let (created, updated, deleted) = changes.counts();
        tracing::info!(
            created,
            updated,
            deleted,
            unchanged = changes.unchanged.len(),
            "computed target diff"
        );

        Ok(changes)
    }

    /// Classify an already-fetched target listing.
    pub fn compute(desired: DesiredState, target: impl IntoIterator<Item = Event>) -> Self {
        let mut builder = DiffBuilder::new(desired);
        target.into_iter().for_each(|event| builder.observe(event));
        builder.finish()
    }

    pub fn creates(&self) -> impl Iterator<Item = &DesiredEvent> {
        self.upserts.iter().filter(|d| d.target_event_id.is_none())
    }

    pub fn updates(&self) -> impl Iterator<Item = &DesiredEvent> {
        self.upserts.iter().filter(|d| d.target_event_id.is_some())
    }

    /// True when applying would issue no writes.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// (created, updated, deleted)
    pub fn counts(&self) -> (usize, usize, usize) {
        let updated = self.updates().count();
        (self.upserts.len() - updated, updated, self.deletes.len())
    }

    pub fn into_changes(self) -> Vec<Change> {
        let upserts = self.upserts.into_iter().map(Change::Upsert);
        let deletes = self.deletes.into_iter().map(|t| Change::Delete {
            event_id: t.event_id,
            identity: t.identity,
        });
        upserts.chain(deletes).collect()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for desired in &self.upserts {
            let kind = if desired.target_event_id.is_some() {
                DiffKind::Update
            } else {
                DiffKind::Create
            };
            writeln!(f, "{} {} ({})", kind, desired.summary, desired.start)?;
        }
        for target in &self.deletes {
            writeln!(f, "{} {}", DiffKind::Delete, target.summary)?;
        }
        write!(f, "{} unchanged", self.unchanged.len())
    }
}

/// Consumes target events one at a time, shrinking the desired state down
/// to what still has to be written.
struct DiffBuilder {
    desired: DesiredState,
    seen: HashSet<SyncIdentity>,
    deletes: Vec<TargetRef>,
    unchanged: Vec<SyncIdentity>,
}

impl DiffBuilder {
    fn new(desired: DesiredState) -> Self {
        DiffBuilder {
            desired,
            seen: HashSet::new(),
            deletes: Vec::new(),
            unchanged: Vec::new(),
        }
    }

    fn observe(&mut self, target: Event) {
        let identity = SyncIdentity::from_uid(target.ical_uid.clone());

        // Only the first copy of an identity is kept
        let first_copy = self.seen.insert(identity.clone());

        let Some(desired) = self.desired.get_mut(&identity).filter(|_| first_copy) else {
            self.deletes.push(TargetRef {
                event_id: target.id,
                identity,
                summary: target.summary,
            });
            return;
        };

        if desired.matches(&target) {
            self.desired.remove(&identity);
            self.unchanged.push(identity);
        } else {
            desired.target_event_id = Some(target.id);
        }
    }

    fn finish(self) -> ChangeSet {
        let mut upserts: Vec<_> = self.desired.into_events().collect();
        upserts.sort_by(|a, b| a.identity.cmp(&b.identity));

        ChangeSet {
            upserts,
            deletes: self.deletes,
            unchanged: self.unchanged,
        }
    }
}
