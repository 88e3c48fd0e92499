//! Target diff: classify desired and existing events into changes.

mod change_set;
mod diff_kind;

pub use change_set::{ChangeSet, TargetRef};
pub use diff_kind::DiffKind;
