//! `EventTransport` over the Google Calendar v3 API.

pub mod api;

use std::time::Duration;

use async_trait::async_trait;
use calmirror_core::{Event, EventPage, EventTime, EventTransport, ListFilter, TransportError};

use crate::google_event::{FromGoogle, ToGoogle};
use crate::types::{EventList, GoogleEvent};
use api::ApiClient;

const MAX_RESULTS: &str = "2500";

/// A Google Calendar account reached with a bearer access token.
#[derive(Debug, Clone)]
pub struct GoogleCalendar {
    api: ApiClient,
}

impl GoogleCalendar {
    pub fn new(access_token: &str) -> Self {
        GoogleCalendar {
            api: ApiClient::new(access_token),
        }
    }

    /// Point at another API root (a proxy, or a mock server in tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api = self.api.with_base_url(base_url);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.api = self.api.with_initial_backoff(backoff);
        self
    }
}

fn list_query(filter: &ListFilter, page_token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("maxResults", MAX_RESULTS.to_string())];

    if let Some(time_min) = &filter.time_min {
        query.push(("timeMin", time_min.clone()));
    }
    if let Some(time_max) = &filter.time_max {
        query.push(("timeMax", time_max.clone()));
    }
    if let Some(updated_min) = &filter.updated_min {
        query.push(("updatedMin", updated_min.clone()));
    }
    if filter.show_deleted {
        query.push(("showDeleted", "true".to_string()));
    }
    if filter.single_events {
        query.push(("singleEvents", "true".to_string()));
    }
    if let Some(uid) = &filter.ical_uid {
        query.push(("iCalUID", uid.clone()));
    }
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }

    query
}

fn into_page(list: EventList) -> Result<EventPage, TransportError> {
    let items = list
        .items
        .into_iter()
        .map(Event::from_google)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EventPage {
        items,
        next_page_token: list.next_page_token,
        updated: list.updated,
    })
}

#[async_trait]
impl EventTransport for GoogleCalendar {
    async fn list_events(
        &self,
        calendar_id: &str,
        filter: &ListFilter,
        page_token: Option<&str>,
    ) -> Result<EventPage, TransportError> {
        let url = self.api.url(&["calendars", calendar_id, "events"])?;
        let list: EventList = self.api.get(url, &list_query(filter, page_token)).await?;
        into_page(list)
    }

    async fn upsert_event(&self, calendar_id: &str, event: &Event) -> Result<Event, TransportError> {
        let body = event.to_google();

        // A known target id replaces that event; otherwise import keys on iCalUID.
        let saved: GoogleEvent = if event.id.is_empty() {
            let url = self.api.url(&["calendars", calendar_id, "events", "import"])?;
            self.api.post(url, &body).await?
        } else {
            let url = self.api.url(&["calendars", calendar_id, "events", &event.id])?;
            self.api.put(url, &body).await?
        };

        Event::from_google(saved)
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &Event,
    ) -> Result<Event, TransportError> {
        let url = self.api.url(&["calendars", calendar_id, "events", event_id])?;
        let saved: GoogleEvent = self.api.put(url, &event.to_google()).await?;
        Event::from_google(saved)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), TransportError> {
        let url = self.api.url(&["calendars", calendar_id, "events", event_id])?;

        match self.api.delete(url).await {
            Ok(()) => Ok(()),
            Err(TransportError::Status { status: 404 | 410, .. }) => {
                tracing::debug!(event = %event_id, "event already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn list_instances(
        &self,
        calendar_id: &str,
        series_event_id: &str,
        original_start: &EventTime,
        page_token: Option<&str>,
    ) -> Result<EventPage, TransportError> {
        let url = self
            .api
            .url(&["calendars", calendar_id, "events", series_event_id, "instances"])?;

        let mut query = vec![
            ("maxResults", MAX_RESULTS.to_string()),
            ("originalStart", original_start.to_query_value()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let list: EventList = self.api.get(url, &query).await?;
        into_page(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calmirror_core::{EventStatus, Transparency};
    use calmirror_core::transport::for_each_event;
    use chrono::NaiveDate;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> GoogleCalendar {
        GoogleCalendar::new("secret")
            .with_base_url(&server.url())
            .with_initial_backoff(Duration::from_millis(1))
    }

    fn all_day(uid: &str) -> Event {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Event {
            id: String::new(),
            ical_uid: uid.to_string(),
            summary: "[W] Lunch".to_string(),
            description: None,
            location: None,
            start: EventTime::Date(day),
            end: EventTime::Date(day.succ_opt().unwrap()),
            status: EventStatus::Confirmed,
            transparency: Transparency::Opaque,
            recurrence: vec![],
            recurring_event_id: None,
            original_start: None,
        }
    }

    const SAVED: &str = r#"{
        "id": "t1",
        "iCalUID": "e1-opaque@work",
        "summary": "[W] Lunch",
        "start": {"date": "2024-01-01"},
        "end": {"date": "2024-01-02"}
    }"#;

    #[tokio::test]
    async fn test_list_follows_pages_and_returns_watermark() {
        let mut server = Server::new_async().await;

        let first = server
            .mock("GET", "/calendars/src/events")
            .match_header("authorization", "Bearer secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                Matcher::UrlEncoded("maxResults".into(), "2500".into()),
            ]))
            .with_status(200)
            .with_body(format!(r#"{{"items": [{SAVED}], "nextPageToken": "p2"}}"#))
            .create_async()
            .await;

        let second = server
            .mock("GET", "/calendars/src/events")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_body(r#"{"items": [], "updated": "2024-03-01T10:00:00.000Z"}"#)
            .create_async()
            .await;

        let calendar = client(&server);
        let mut ids = Vec::new();
        let filter = ListFilter {
            single_events: true,
            ..Default::default()
        };
        let watermark = for_each_event(&calendar, "src", &filter, |e| ids.push(e.id))
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(ids, vec!["t1"]);
        assert_eq!(watermark.as_deref(), Some("2024-03-01T10:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_incremental_listing_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/src/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("updatedMin".into(), "2024-03-01T10:00:00Z".into()),
                Matcher::UrlEncoded("showDeleted".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "gone", "status": "cancelled"}]}"#)
            .create_async()
            .await;

        let page = client(&server)
            .list_events(
                "src",
                &ListFilter::changed_since(Some("2024-03-01T10:00:00Z")),
                None,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(page.items[0].is_cancelled());
    }

    #[tokio::test]
    async fn test_new_event_is_imported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/calendars/target/events/import")
            .match_body(Matcher::PartialJsonString(
                r#"{"iCalUID": "e1-opaque@work", "summary": "[W] Lunch"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(SAVED)
            .create_async()
            .await;

        let saved = client(&server)
            .upsert_event("target", &all_day("e1-opaque@work"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(saved.id, "t1");
    }

    #[tokio::test]
    async fn test_known_event_is_replaced_in_place() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/calendars/target/events/t1")
            .with_status(200)
            .with_body(SAVED)
            .create_async()
            .await;

        let event = Event {
            id: "t1".to_string(),
            ..all_day("e1-opaque@work")
        };
        client(&server).upsert_event("target", &event).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_of_gone_event_succeeds() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/calendars/target/events/t1")
            .with_status(410)
            .with_body(r#"{"error": {"code": 410, "message": "Resource has been deleted"}}"#)
            .create_async()
            .await;

        client(&server).delete_event("target", "t1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("DELETE", "/calendars/target/events/t1")
            .with_status(403)
            .with_body(r#"{"error": {"code": 403, "message": "Rate Limit Exceeded"}}"#)
            .expect(2)
            .create_async()
            .await;
        let accepted = server
            .mock("DELETE", "/calendars/target/events/t1")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        // mockito serves the first mock still missing hits, so the third
        // attempt reaches the 204
        client(&server).delete_event("target", "t1").await.unwrap();

        limited.assert_async().await;
        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn test_persistent_failure_reports_service_message() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/calendars/target/events/t1")
            .with_status(503)
            .with_body(r#"{"error": {"code": 503, "message": "Backend Error"}}"#)
            .expect(5)
            .create_async()
            .await;

        let err = client(&server)
            .update_event("target", "t1", &all_day("e1-opaque@work"))
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err {
            TransportError::Status { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Backend Error");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/calendars/target/events/t1")
            .with_status(400)
            .with_body("bad request")
            .expect(1)
            .create_async()
            .await;

        let err = client(&server)
            .update_event("target", "t1", &all_day("e1-opaque@work"))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, TransportError::Status { status: 400, ref message } if message == "bad request"));
    }

    #[tokio::test]
    async fn test_instances_query_original_start() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/target/events/t-master/instances")
            .match_query(Matcher::UrlEncoded("originalStart".into(), "2024-01-01".into()))
            .with_status(200)
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let page = client(&server)
            .list_instances("target", "t-master", &EventTime::Date(day), None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(page.items.is_empty());
    }
}
