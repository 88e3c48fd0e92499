use calmirror_core::{Event, EventStatus, EventTime};

use crate::types::{GoogleEvent, GoogleEventTime};

pub trait ToGoogle {
    fn to_google(&self) -> GoogleEvent;
}

impl ToGoogle for Event {
    fn to_google(&self) -> GoogleEvent {
        let status = match self.status {
            EventStatus::Confirmed => "confirmed",
            EventStatus::Tentative => "tentative",
            EventStatus::Cancelled => "cancelled",
        };

        GoogleEvent {
            id: self.id.clone(),
            ical_uid: self.ical_uid.clone(),
            summary: self.summary.clone(),
            description: self.description.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            start: Some(event_time_to_google(&self.start)),
            end: Some(event_time_to_google(&self.end)),
            status: status.to_string(),
            transparency: self.transparency.as_str().to_string(),
            recurrence: self.recurrence.clone(),
            recurring_event_id: self.recurring_event_id.clone(),
            original_start_time: self.original_start.as_ref().map(event_time_to_google),
        }
    }
}

fn event_time_to_google(time: &EventTime) -> GoogleEventTime {
    match time {
        EventTime::Date(date) => GoogleEventTime {
            date: Some(*date),
            ..Default::default()
        },
        EventTime::DateTime(datetime) => GoogleEventTime {
            date_time: Some(*datetime),
            ..Default::default()
        },
        EventTime::DateTimeZoned { datetime, tzid } => GoogleEventTime {
            date_time: Some(*datetime),
            time_zone: Some(tzid.clone()),
            ..Default::default()
        },
    }
}
