//! Paginated listing of remote events since an instant.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::RemoteError;
use crate::remote::{CalendarRemote, ListRequest, RemoteEventRecord};
use crate::retry::RetryPolicy;

/// Largest page the calendar API hands out.
pub const MAX_PAGE_SIZE: u32 = 2500;

pub struct RemoteEventLister<'a, R: CalendarRemote + ?Sized> {
    remote: &'a R,
    retry: &'a RetryPolicy,
}

impl<'a, R: CalendarRemote + ?Sized> RemoteEventLister<'a, R> {
    pub fn new(remote: &'a R, retry: &'a RetryPolicy) -> Self {
        RemoteEventLister { remote, retry }
    }

    /// Lazily list the events of `calendar_id` starting at or after `since`,
    /// ordered by start time. Nothing is fetched until the first `next()`.
    pub fn list_since(&self, calendar_id: &str, since: DateTime<Utc>) -> EventPages<'a, R> {
        EventPages {
            remote: self.remote,
            retry: self.retry,
            calendar_id: calendar_id.to_string(),
            since,
            buffered: VecDeque::new(),
            next_page_token: None,
            exhausted: false,
            pages_fetched: 0,
        }
    }
}

/// Forward-only cursor over a listing. Not restartable; list again instead.
pub struct EventPages<'a, R: CalendarRemote + ?Sized> {
    remote: &'a R,
    retry: &'a RetryPolicy,
    calendar_id: String,
    since: DateTime<Utc>,
    buffered: VecDeque<RemoteEventRecord>,
    next_page_token: Option<String>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<R: CalendarRemote + ?Sized> EventPages<'_, R> {
    /// Next event, fetching the next page when the buffer runs dry.
    ///
    /// A page that still fails after retries fails the listing; results are
    /// never silently truncated.
    pub async fn next(&mut self) -> Result<Option<RemoteEventRecord>, RemoteError> {
        loop {
            if let Some(event) = self.buffered.pop_front() {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    /// Drain the remaining events.
    pub async fn collect_all(mut self) -> Result<Vec<RemoteEventRecord>, RemoteError> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await? {
            events.push(event);
        }
        Ok(events)
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    async fn fetch_page(&mut self) -> Result<(), RemoteError> {
        let request = ListRequest {
            calendar_id: self.calendar_id.clone(),
            time_min: self.since,
            page_token: self.next_page_token.take(),
            max_results: MAX_PAGE_SIZE,
        };

        let remote = self.remote;
        let request = &request;
        let page = self
            .retry
            .execute("list events", move || remote.list_events(request))
            .await?;

        self.pages_fetched += 1;
        debug!(
            calendar = %self.calendar_id,
            page = self.pages_fetched,
            items = page.items.len(),
            "fetched event page"
        );

        self.buffered.extend(page.items);
        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => self.next_page_token = Some(token),
            None => self.exhausted = true,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRemote, record};
    use chrono::TimeZone;

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn follows_continuation_tokens_until_exhausted() {
        let remote = FakeRemote::new().with_pages(
            "cal",
            vec![
                vec![record("1", "A-1"), record("2", "A-2")],
                vec![record("3", "B-1")],
                vec![],
                vec![record("4", "B-2")],
            ],
        );
        let retry = RetryPolicy::new();
        let lister = RemoteEventLister::new(&remote, &retry);

        let events = lister.list_since("cal", since()).collect_all().await.unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);

        let requests = remote.list_requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].page_token, None);
        assert_eq!(requests[1].page_token.as_deref(), Some("cal-page-1"));
        assert_eq!(requests[3].page_token.as_deref(), Some("cal-page-3"));
        assert!(requests.iter().all(|r| r.max_results == MAX_PAGE_SIZE));
        assert!(requests.iter().all(|r| r.time_min == since()));
    }

    #[tokio::test(start_paused = true)]
    async fn is_lazy() {
        let remote = FakeRemote::new().with_pages(
            "cal",
            vec![vec![record("1", "A-1")], vec![record("2", "A-2")]],
        );
        let retry = RetryPolicy::new();
        let lister = RemoteEventLister::new(&remote, &retry);

        let mut pages = lister.list_since("cal", since());
        assert_eq!(remote.list_requests().len(), 0);

        let first = pages.next().await.unwrap().unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(pages.pages_fetched(), 1);
        assert_eq!(remote.list_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_fails_the_listing() {
        let remote = FakeRemote::new()
            .with_pages("cal", vec![vec![record("1", "A-1")], vec![record("2", "A-2")]])
            .failing_list_page("cal", 1, 500);
        let retry = RetryPolicy::new();
        let lister = RemoteEventLister::new(&remote, &retry);

        let err = lister.list_since("cal", since()).collect_all().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_page_is_retried() {
        let remote = FakeRemote::new()
            .with_pages("cal", vec![vec![record("1", "A-1")]])
            .rate_limited_list("cal", 2);
        let retry = RetryPolicy::new();
        let lister = RemoteEventLister::new(&remote, &retry);

        let events = lister.list_since("cal", since()).collect_all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(remote.list_requests().len(), 3);
    }
}
