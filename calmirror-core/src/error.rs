//! Error types for calmirror.

use thiserror::Error;

use crate::apply::ApplyError;
use crate::transport::TransportError;

/// Errors that can occur while mirroring calendars.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("listing calendar {calendar:?}: {source}")]
    Listing {
        calendar: String,
        #[source]
        source: TransportError,
    },

    #[error("{}", describe_failures(.0))]
    Apply(Vec<ApplyError>),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Status file error: {0}")]
    Status(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    pub fn listing(calendar: &str, source: TransportError) -> Self {
        MirrorError::Listing {
            calendar: calendar.to_string(),
            source,
        }
    }
}

fn describe_failures(failures: &[ApplyError]) -> String {
    let mut out = format!("{} change(s) failed to apply", failures.len());
    for failure in failures {
        out.push_str("\n  ");
        out.push_str(&failure.to_string());
    }
    out
}

/// Result type alias for calmirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;
