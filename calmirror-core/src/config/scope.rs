//! Per-scope sync configuration.

use serde::{Deserialize, Serialize};

use crate::event::{Event, Transparency};

/// One source calendar of a mirror scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub id: String,
    /// Prepended to every mirrored title
    #[serde(default)]
    pub prefix: String,
}

/// A full-reconciliation scope: sources (minus exclusions) mirrored into one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorScope {
    pub id: String,
    pub source_calendars: Vec<SourceSpec>,
    pub target_calendar_id: String,
    #[serde(default)]
    pub exclude_calendar_ids: Vec<String>,
    #[serde(default)]
    pub busy_only: bool,
    /// Replaces every title and hides description and location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

/// An incremental scope: one source followed into one target via a watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FollowScope {
    pub id: String,
    pub source_calendar_id: String,
    pub target_calendar_id: String,
    #[serde(default)]
    pub busy_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default)]
    pub prefix: String,
}

/// Whether an event passes the busy-only predicate.
pub(crate) fn is_visible(busy_only: bool, event: &Event) -> bool {
    !busy_only || event.transparency == Transparency::Opaque
}

impl MirrorScope {
    /// Busy-only filter plus cancellation check applied to source events.
    pub fn should_sync(&self, event: &Event) -> bool {
        !event.is_cancelled() && is_visible(self.busy_only, event)
    }
}

impl FollowScope {
    pub fn is_visible(&self, event: &Event) -> bool {
        is_visible(self.busy_only, event)
    }
}

/// Treat an empty mask the same as no mask.
pub(crate) fn effective_mask(mask: &Option<String>) -> Option<&str> {
    mask.as_deref().filter(|m| !m.is_empty())
}
