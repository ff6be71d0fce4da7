//! Google Calendar v3 REST client implementing [`CalendarRemote`].
//!
//! Every non-2xx response becomes a [`RemoteError`] carrying the HTTP
//! status, so the retry layer can tell rate limits from hard failures.

use async_trait::async_trait;
use calplan_core::error::RemoteError;
use calplan_core::remote::{
    CalendarRemote, EventPage, InsertPayload, ListRequest, RemoteEventRecord,
};
use chrono::SecondsFormat;
use reqwest::{Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::convert::{FromGoogle, ToGoogle};
use crate::session::Session;
use crate::types::{ErrorEnvelope, EventsPage, GoogleEvent};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3/";

pub struct GoogleCalendarApi {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl GoogleCalendarApi {
    pub fn new(session: &Session) -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, session.access_token())
    }

    pub fn with_base_url(base_url: &str, access_token: impl Into<String>) -> anyhow::Result<Self> {
        Ok(GoogleCalendarApi {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            access_token: access_token.into(),
        })
    }

    /// `<base>/calendars/<calendar_id>/events[/<event_id>]`, each id
    /// percent-encoded as a path segment.
    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::transport("base URL cannot carry a path"))?;
            segments
                .pop_if_empty()
                .extend(["calendars", calendar_id, "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::transport(e.to_string())
}

/// Pass 2xx responses through; turn anything else into a status-bearing error.
async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::from_status(status.as_u16(), error_message(status, &body)))
}

/// `message (reason)` from Google's error envelope, else the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.errors.first() {
            Some(detail) if !detail.reason.is_empty() => {
                format!("{} ({})", envelope.error.message, detail.reason)
            }
            _ => envelope.error.message,
        },
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}

#[async_trait]
impl CalendarRemote for GoogleCalendarApi {
    async fn list_events(&self, request: &ListRequest) -> Result<EventPage, RemoteError> {
        let mut url = self.events_url(&request.calendar_id, None)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(
                    "timeMin",
                    &request.time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
                )
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime")
                .append_pair("maxResults", &request.max_results.to_string());
            if let Some(token) = &request.page_token {
                query.append_pair("pageToken", token);
            }
        }

        debug!(calendar = %request.calendar_id, page_token = ?request.page_token, "events.list");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport)?;

        let page: EventsPage = check(response).await?.json().await.map_err(transport)?;

        Ok(EventPage {
            items: page
                .items
                .into_iter()
                .map(RemoteEventRecord::from_google)
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &InsertPayload,
    ) -> Result<RemoteEventRecord, RemoteError> {
        let url = self.events_url(calendar_id, None)?;
        let body: GoogleEvent = payload.to_google();

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let created: GoogleEvent = check(response).await?.json().await.map_err(transport)?;
        Ok(RemoteEventRecord::from_google(created))
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), RemoteError> {
        let url = self.events_url(calendar_id, Some(event_id))?;

        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport)?;

        // Already deleted
        if response.status() == StatusCode::GONE {
            return Ok(());
        }

        check(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calplan_core::error::RetryKind;
    use calplan_core::remote::PayloadTime;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> GoogleCalendarApi {
        GoogleCalendarApi::with_base_url(&server.uri(), "test-token").unwrap()
    }

    fn list_request(page_token: Option<&str>) -> ListRequest {
        ListRequest {
            calendar_id: "cal_study".to_string(),
            time_min: Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(),
            page_token: page_token.map(str::to_string),
            max_results: 2500,
        }
    }

    #[tokio::test]
    async fn lists_a_page_with_the_expected_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/cal_study/events"))
            .and(header("Authorization", "Bearer test-token"))
            .and(query_param("timeMin", "2025-11-01T00:00:00Z"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("maxResults", "2500"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "calendar#events",
                "items": [
                    {"id": "e1", "summary": "A-1", "start": {"dateTime": "2025-11-10T09:00:00+01:00"}},
                    {"id": "e2", "start": {"date": "2025-11-15"}}
                ],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = api(&server).list_events(&list_request(None)).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].title(), "A-1");
        assert_eq!(page.items[1].display_start(), "2025-11-15");
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
    }

    #[tokio::test]
    async fn forwards_the_page_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/cal_study/events"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let page = api(&server)
            .list_events(&list_request(Some("page-2")))
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.next_page_token, None);
    }

    #[tokio::test]
    async fn rate_limit_is_retryable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "Rate Limit Exceeded",
                    "errors": [{"reason": "rateLimitExceeded"}]
                }
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .list_events(&list_request(None))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert_eq!(err.kind(), RetryKind::Retryable);
        assert_eq!(err.message(), "Rate Limit Exceeded (rateLimitExceeded)");
    }

    #[tokio::test]
    async fn inserts_the_converted_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(body_json(json!({
                "summary": "Cena",
                "start": {"dateTime": "2025-11-10T20:00:00+01:00", "timeZone": "Europe/Madrid"},
                "end": {"dateTime": "2025-11-10T21:00:00+01:00", "timeZone": "Europe/Madrid"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new-id",
                "summary": "Cena"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = InsertPayload {
            summary: "Cena".to_string(),
            description: None,
            location: None,
            start: PayloadTime::DateTime {
                date_time: "2025-11-10T20:00:00+01:00".to_string(),
                time_zone: "Europe/Madrid".to_string(),
            },
            end: PayloadTime::DateTime {
                date_time: "2025-11-10T21:00:00+01:00".to_string(),
                time_zone: "Europe/Madrid".to_string(),
            },
            recurrence: vec![],
        };

        let created = api(&server).insert_event("primary", &payload).await.unwrap();
        assert_eq!(created.id, "new-id");
    }

    #[tokio::test]
    async fn server_error_is_terminal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let payload = InsertPayload {
            summary: "x".to_string(),
            description: None,
            location: None,
            start: PayloadTime::Date(chrono::NaiveDate::from_ymd_opt(2025, 11, 15).unwrap()),
            end: PayloadTime::Date(chrono::NaiveDate::from_ymd_opt(2025, 11, 16).unwrap()),
            recurrence: vec![],
        };

        let err = api(&server).insert_event("primary", &payload).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.kind(), RetryKind::Terminal);
        assert_eq!(err.message(), "Internal Server Error");
    }

    #[tokio::test]
    async fn delete_treats_gone_as_success() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/calendars/cal_study/events/e1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/cal_study/events/e2"))
            .respond_with(ResponseTemplate::new(410))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/cal_study/events/e3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = api(&server);
        assert!(api.delete_event("cal_study", "e1").await.is_ok());
        assert!(api.delete_event("cal_study", "e2").await.is_ok());
        assert_eq!(
            api.delete_event("cal_study", "e3").await.unwrap_err().status(),
            Some(404)
        );
    }

    #[test]
    fn calendar_ids_are_path_segments() {
        let api = GoogleCalendarApi::with_base_url(DEFAULT_BASE_URL, "t").unwrap();
        let url = api
            .events_url("abc#def@group.calendar.google.com", Some("evt/1"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/abc%23def@group.calendar.google.com/events/evt%2F1"
        );
    }
}
