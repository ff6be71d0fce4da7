//! The remote calendar seam.
//!
//! Engines talk to the calendar service only through [`CalendarRemote`].
//! The Google implementation lives in `calplan-provider-google`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// One page request of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub calendar_id: String,
    /// Only events starting at or after this instant
    pub time_min: DateTime<Utc>,
    pub page_token: Option<String>,
    pub max_results: u32,
}

/// One page of a listing; `next_page_token` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    pub items: Vec<RemoteEventRecord>,
    pub next_page_token: Option<String>,
}

/// Start or end of a remote event as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl RemoteTime {
    pub fn display(&self) -> &str {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or("")
    }
}

/// A remote event. Only read for display and filtering, then deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEventRecord {
    pub id: String,
    pub summary: Option<String>,
    pub start: Option<RemoteTime>,
    pub end: Option<RemoteTime>,
}

impl RemoteEventRecord {
    /// Title used for prefix matching; missing titles match as "".
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }

    pub fn display_start(&self) -> &str {
        self.start.as_ref().map_or("", RemoteTime::display)
    }
}

/// Start/end of an insert, already expressed in the configured timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadTime {
    DateTime {
        /// RFC 3339 with the zone's offset
        date_time: String,
        /// IANA zone name
        time_zone: String,
    },
    Date(NaiveDate),
}

/// Body of a remote insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPayload {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: PayloadTime,
    pub end: PayloadTime,
    /// Full recurrence lines, e.g. `RRULE:FREQ=WEEKLY;COUNT=4`
    pub recurrence: Vec<String>,
}

/// Calls the engines make against a remote calendar service.
#[async_trait]
pub trait CalendarRemote: Send + Sync {
    async fn list_events(&self, request: &ListRequest) -> Result<EventPage, RemoteError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &InsertPayload,
    ) -> Result<RemoteEventRecord, RemoteError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), RemoteError>;
}
