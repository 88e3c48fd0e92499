//! Reconciliation engine for calmirror.
//!
//! This crate holds everything that decides what a target calendar should
//! contain and gets it there:
//! - `mirror`: full reconciliation (desired state, exclusions, diff, apply)
//! - `follow`: incremental follow driven by a per-scope watermark
//! - `transport`: the capability a calendar provider implements
//! - `config` and `watermark`: configuration and the status file

pub mod apply;
pub mod config;
pub mod date_range;
pub mod desired;
pub mod diff;
pub mod error;
pub mod event;
pub mod follow;
pub mod identity;
pub mod mirror;
pub mod transport;
pub mod watermark;

pub use apply::{Applicator, ApplyError, ApplyReport, Change};
pub use config::{FollowScope, MirrorConfig, MirrorScope, SourceSpec};
pub use date_range::DateRange;
pub use desired::{DesiredEvent, DesiredState};
pub use diff::{ChangeSet, DiffKind};
pub use error::{MirrorError, MirrorResult};
pub use event::{Event, EventStatus, EventTime, Transparency};
pub use follow::{FollowOutcome, Follower};
pub use identity::SyncIdentity;
pub use mirror::{Mirror, MirrorOutcome};
pub use transport::{EventPage, EventTransport, ListFilter, TransportError};
pub use watermark::{FileWatermarkStore, WatermarkStore, Watermarks};
