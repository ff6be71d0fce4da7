//! In-memory [`CalendarRemote`] for engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::remote::{
    CalendarRemote, EventPage, InsertPayload, ListRequest, RemoteEventRecord, RemoteTime,
};

pub fn record(id: &str, title: &str) -> RemoteEventRecord {
    RemoteEventRecord {
        id: id.to_string(),
        summary: Some(title.to_string()),
        start: Some(RemoteTime {
            date_time: Some("2025-11-10T09:00:00+01:00".to_string()),
            date: None,
        }),
        end: None,
    }
}

/// Fails with `status`, either forever or a fixed number of times.
struct ScriptedFailure {
    status: u16,
    remaining: Option<u32>,
}

impl ScriptedFailure {
    fn trigger(&mut self) -> Option<u16> {
        match &mut self.remaining {
            None => Some(self.status),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(self.status)
            }
        }
    }
}

#[derive(Default)]
struct FakeState {
    pages: HashMap<String, Vec<Vec<RemoteEventRecord>>>,
    failing_pages: HashMap<(String, usize), u16>,
    list_failures: HashMap<String, ScriptedFailure>,
    insert_failures: HashMap<String, ScriptedFailure>,
    delete_failures: HashMap<String, ScriptedFailure>,

    list_requests: Vec<ListRequest>,
    inserts: Vec<(String, InsertPayload)>,
    insert_calls: usize,
    deletes: Vec<(String, String)>,
    delete_calls: usize,
}

/// Scripted remote. Pages are served per calendar with tokens of the form
/// `<calendar>-page-<n>`; failures are keyed by calendar, title or event id.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(self, calendar_id: &str, pages: Vec<Vec<RemoteEventRecord>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(calendar_id.to_string(), pages);
        self
    }

    /// Page `index` of `calendar_id` always fails with `status`.
    pub fn failing_list_page(self, calendar_id: &str, index: usize, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_pages
            .insert((calendar_id.to_string(), index), status);
        self
    }

    /// The first `times` list calls on `calendar_id` are rate limited.
    pub fn rate_limited_list(self, calendar_id: &str, times: u32) -> Self {
        self.state.lock().unwrap().list_failures.insert(
            calendar_id.to_string(),
            ScriptedFailure {
                status: 429,
                remaining: Some(times),
            },
        );
        self
    }

    pub fn failing_insert(self, title: &str, status: u16, times: Option<u32>) -> Self {
        self.state.lock().unwrap().insert_failures.insert(
            title.to_string(),
            ScriptedFailure {
                status,
                remaining: times,
            },
        );
        self
    }

    pub fn failing_delete(self, event_id: &str, status: u16, times: Option<u32>) -> Self {
        self.state.lock().unwrap().delete_failures.insert(
            event_id.to_string(),
            ScriptedFailure {
                status,
                remaining: times,
            },
        );
        self
    }

    pub fn list_requests(&self) -> Vec<ListRequest> {
        self.state.lock().unwrap().list_requests.clone()
    }

    /// Successful inserts as (calendar id, payload).
    pub fn inserts(&self) -> Vec<(String, InsertPayload)> {
        self.state.lock().unwrap().inserts.clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    /// Successful deletes as (calendar id, event id).
    pub fn deletes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }
}

fn page_index(token: Option<&str>) -> usize {
    token
        .and_then(|t| t.rsplit("-page-").next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl CalendarRemote for FakeRemote {
    async fn list_events(&self, request: &ListRequest) -> Result<EventPage, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.list_requests.push(request.clone());

        let calendar_id = request.calendar_id.clone();
        if let Some(status) = state
            .list_failures
            .get_mut(&calendar_id)
            .and_then(ScriptedFailure::trigger)
        {
            return Err(RemoteError::from_status(status, "scripted list failure"));
        }

        let index = page_index(request.page_token.as_deref());
        if let Some(status) = state.failing_pages.get(&(calendar_id.clone(), index)) {
            return Err(RemoteError::from_status(*status, "scripted page failure"));
        }

        let pages = state.pages.get(&calendar_id).cloned().unwrap_or_default();
        let items = pages.get(index).cloned().unwrap_or_default();
        let next_page_token =
            (index + 1 < pages.len()).then(|| format!("{}-page-{}", calendar_id, index + 1));

        Ok(EventPage {
            items,
            next_page_token,
        })
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &InsertPayload,
    ) -> Result<RemoteEventRecord, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;

        if let Some(status) = state
            .insert_failures
            .get_mut(&payload.summary)
            .and_then(ScriptedFailure::trigger)
        {
            return Err(RemoteError::from_status(status, "scripted insert failure"));
        }

        state
            .inserts
            .push((calendar_id.to_string(), payload.clone()));
        let id = format!("inserted-{}", state.inserts.len());
        Ok(RemoteEventRecord {
            id,
            summary: Some(payload.summary.clone()),
            ..Default::default()
        })
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;

        if let Some(status) = state
            .delete_failures
            .get_mut(event_id)
            .and_then(ScriptedFailure::trigger)
        {
            return Err(RemoteError::from_status(status, "scripted delete failure"));
        }

        state
            .deletes
            .push((calendar_id.to_string(), event_id.to_string()));
        Ok(())
    }
}
