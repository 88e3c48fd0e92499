use calmirror_core::{Event, EventStatus, EventTime, TransportError, Transparency};
use chrono::NaiveDate;

use crate::types::{GoogleEvent, GoogleEventTime};

pub trait FromGoogle {
    fn from_google(event: GoogleEvent) -> Result<Self, TransportError>
    where
        Self: Sized;
}

impl FromGoogle for Event {
    fn from_google(event: GoogleEvent) -> Result<Self, TransportError> {
        let status = match event.status.as_str() {
            "tentative" => EventStatus::Tentative,
            "cancelled" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        };

        let transparency = if event.transparency == "transparent" {
            Transparency::Transparent
        } else {
            Transparency::Opaque
        };

        let original_start = event
            .original_start_time
            .as_ref()
            .map(event_time_from_google)
            .transpose()?;

        // Deleted events come back from an incremental listing stripped of
        // their times.
        let (start, end) = match (&event.start, &event.end) {
            (Some(start), Some(end)) => (event_time_from_google(start)?, event_time_from_google(end)?),
            _ if status == EventStatus::Cancelled => {
                let placeholder = original_start
                    .clone()
                    .unwrap_or(EventTime::Date(NaiveDate::default()));
                (placeholder.clone(), placeholder)
            }
            _ => {
                return Err(TransportError::Decode(format!(
                    "event {} has no start or end time",
                    event.id
                )));
            }
        };

        Ok(Event {
            id: event.id,
            ical_uid: event.ical_uid,
            summary: event.summary,
            description: non_empty(event.description),
            location: non_empty(event.location),
            start,
            end,
            status,
            transparency,
            recurrence: event.recurrence,
            recurring_event_id: event.recurring_event_id.and_then(non_empty),
            original_start,
        })
    }
}

fn event_time_from_google(time: &GoogleEventTime) -> Result<EventTime, TransportError> {
    match (time.date_time, time.date, &time.time_zone) {
        (Some(datetime), _, Some(tzid)) => Ok(EventTime::DateTimeZoned {
            datetime,
            tzid: tzid.clone(),
        }),
        (Some(datetime), _, None) => Ok(EventTime::DateTime(datetime)),
        (None, Some(date), _) => Ok(EventTime::Date(date)),
        (None, None, _) => Err(TransportError::Decode(
            "event time has neither date nor dateTime".to_string(),
        )),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
