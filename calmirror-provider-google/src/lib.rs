//! Google Calendar transport for calmirror.
//!
//! Talks to the Calendar v3 REST API with a caller-supplied OAuth access
//! token. Rate limits and transient server errors are retried here, so the
//! engine only ever sees final outcomes.

mod google;
mod google_event;
mod types;

pub use google::GoogleCalendar;
pub use google::api::DEFAULT_BASE_URL;
