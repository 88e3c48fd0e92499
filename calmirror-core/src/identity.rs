//! Cross-run identity of mirrored events.
//!
//! A mirrored event is written to the target with its identity as UID, so a
//! later run can find the copy it made earlier without keeping any state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Deterministic correlation key between a source occurrence and its target copy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncIdentity(String);

impl SyncIdentity {
    /// Identity used by full reconciliation.
    ///
    /// Transparency is part of the key: an event that flips between busy and
    /// free is mirrored as a different occurrence (old copy deleted, new one
    /// created).
    pub fn mirrored(event: &Event, scope_id: &str) -> Self {
        SyncIdentity(format!(
            "{}-{}@{}",
            event.id,
            event.transparency.as_str(),
            scope_id
        ))
    }

    /// Identity used by incremental follow. Transparency is not part of the key.
    pub fn followed(event_id: &str, scope_id: &str) -> Self {
        SyncIdentity(format!("{event_id}@{scope_id}"))
    }

    /// Wrap a UID read back from a target event.
    pub fn from_uid(uid: impl Into<String>) -> Self {
        SyncIdentity(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime, Transparency};
    use chrono::NaiveDate;

    fn event(id: &str, transparency: Transparency) -> Event {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Event {
            id: id.to_string(),
            ical_uid: format!("{id}@google.com"),
            summary: "Lunch".to_string(),
            description: None,
            location: None,
            start: EventTime::Date(day),
            end: EventTime::Date(day.succ_opt().unwrap()),
            status: EventStatus::Confirmed,
            transparency,
            recurrence: vec![],
            recurring_event_id: None,
            original_start: None,
        }
    }

    #[test]
    fn test_mirrored_identity_is_stable() {
        let a = event("e1", Transparency::Opaque);
        let mut b = a.clone();
        b.summary = "Renamed".to_string();

        assert_eq!(SyncIdentity::mirrored(&a, "work"), SyncIdentity::mirrored(&b, "work"));
        assert_eq!(SyncIdentity::mirrored(&a, "work").as_str(), "e1-opaque@work");
    }

    #[test]
    fn test_mirrored_identity_forks_on_transparency() {
        let busy = event("e1", Transparency::Opaque);
        let free = event("e1", Transparency::Transparent);

        assert_ne!(
            SyncIdentity::mirrored(&busy, "work"),
            SyncIdentity::mirrored(&free, "work")
        );
    }

    #[test]
    fn test_identity_depends_on_scope() {
        let e = event("e1", Transparency::Opaque);
        assert_ne!(SyncIdentity::mirrored(&e, "work"), SyncIdentity::mirrored(&e, "home"));
        assert_ne!(SyncIdentity::followed("e1", "work"), SyncIdentity::followed("e1", "home"));
    }

    #[test]
    fn test_followed_identity_ignores_transparency() {
        let busy = event("e1", Transparency::Opaque);
        let free = event("e1", Transparency::Transparent);

        assert_eq!(
            SyncIdentity::followed(&busy.id, "home"),
            SyncIdentity::followed(&free.id, "home")
        );
        assert_eq!(SyncIdentity::followed("e1", "home").as_str(), "e1@home");
    }
}
