//! Bulk removal of remote events since an instant, optionally filtered by
//! title prefix.
//!
//! Each calendar goes LIST → PREVIEW (dry-run) or LIST → DELETE (live).
//! A calendar that cannot be listed is reported and skipped; a delete that
//! fails is counted and never aborts the run.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{CalPlanError, CalPlanResult, RemoteError};
use crate::lister::RemoteEventLister;
use crate::remote::{CalendarRemote, RemoteEventRecord};
use crate::retry::{Pacing, RetryPolicy};
use crate::routing::CalendarTable;

/// How many matching events a dry run shows per calendar.
pub const PREVIEW_LIMIT: usize = 10;

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a `--since` value.
///
/// A bare `YYYY-MM-DD` is UTC midnight. Timestamps with `Z` or an offset are
/// normalized to UTC; timestamps without either are read as UTC.
pub fn parse_since(raw: &str) -> CalPlanResult<DateTime<Utc>> {
    let value = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CalPlanError::InvalidSince(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFilter {
    pub since: DateTime<Utc>,
    /// Empty means every event matches
    pub title_prefixes: Vec<String>,
    pub dry_run: bool,
}

impl PurgeFilter {
    /// A dry-run filter matching everything since `since`.
    pub fn new(since: DateTime<Utc>) -> Self {
        PurgeFilter {
            since,
            title_prefixes: Vec::new(),
            dry_run: true,
        }
    }

    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.title_prefixes = prefixes;
        self
    }

    pub fn live(mut self) -> Self {
        self.dry_run = false;
        self
    }

    /// Case-sensitive prefix test on the title; a missing title is "".
    pub fn matches(&self, event: &RemoteEventRecord) -> bool {
        if self.title_prefixes.is_empty() {
            return true;
        }
        let title = event.title();
        self.title_prefixes
            .iter()
            .any(|prefix| title.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarOutcome {
    /// Dry run: matches were shown, nothing deleted
    Previewed,
    /// Live run finished (individual deletes may still have failed)
    Completed,
    /// Listing failed after retries; nothing was deleted
    ListFailed,
    /// Interrupted before finishing; see `skipped`
    Cancelled,
    /// Never reached because the run was cancelled earlier
    NotStarted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarPurgeReport {
    pub name: String,
    pub calendar_id: String,
    pub listed: usize,
    pub matched: usize,
    pub deleted: usize,
    pub errors: usize,
    /// Matches never attempted because the run was cancelled
    pub skipped: usize,
    pub outcome: CalendarOutcome,
    /// First matches, at most [`PREVIEW_LIMIT`]
    pub preview: Vec<RemoteEventRecord>,
}

impl CalendarPurgeReport {
    fn new(name: &str, calendar_id: &str) -> Self {
        CalendarPurgeReport {
            name: name.to_string(),
            calendar_id: calendar_id.to_string(),
            listed: 0,
            matched: 0,
            deleted: 0,
            errors: 0,
            skipped: 0,
            outcome: CalendarOutcome::Completed,
            preview: Vec::new(),
        }
    }

    /// Matches not shown in the preview.
    pub fn not_previewed(&self) -> usize {
        self.matched - self.preview.len()
    }

    fn cancelled(mut self) -> Self {
        self.outcome = CalendarOutcome::Cancelled;
        self.skipped = self.matched - self.deleted - self.errors;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurgeSummary {
    pub calendars: Vec<CalendarPurgeReport>,
    pub deleted: usize,
    pub errors: usize,
    pub skipped: usize,
}

impl PurgeSummary {
    fn push(&mut self, report: CalendarPurgeReport) {
        self.deleted += report.deleted;
        self.errors += report.errors;
        self.skipped += report.skipped;
        self.calendars.push(report);
    }

    pub fn was_cancelled(&self) -> bool {
        self.calendars.iter().any(|report| {
            matches!(
                report.outcome,
                CalendarOutcome::Cancelled | CalendarOutcome::NotStarted
            )
        })
    }

    pub fn not_started(&self) -> impl Iterator<Item = &CalendarPurgeReport> {
        self.calendars
            .iter()
            .filter(|report| report.outcome == CalendarOutcome::NotStarted)
    }
}

/// Progress callbacks. All methods default to no-ops.
pub trait PurgeObserver {
    fn on_calendar_start(&mut self, _name: &str, _calendar_id: &str) {}

    fn on_listed(&mut self, _report: &CalendarPurgeReport) {}

    fn on_list_failed(&mut self, _report: &CalendarPurgeReport, _error: &RemoteError) {}

    fn on_deleted(&mut self, _event: &RemoteEventRecord) {}

    fn on_delete_failed(&mut self, _event: &RemoteEventRecord, _error: &RemoteError) {}

    fn on_calendar_done(&mut self, _report: &CalendarPurgeReport) {}
}

impl PurgeObserver for () {}

pub struct PurgeEngine<'a, R: CalendarRemote + ?Sized> {
    remote: &'a R,
    retry: &'a RetryPolicy,
}

impl<'a, R: CalendarRemote + ?Sized> PurgeEngine<'a, R> {
    pub fn new(remote: &'a R, retry: &'a RetryPolicy) -> Self {
        PurgeEngine { remote, retry }
    }

    /// Purge every calendar of `calendars`, in table order. A calendar id
    /// shared by several entries is processed once, under its first name.
    pub async fn purge(
        &self,
        calendars: &CalendarTable,
        filter: &PurgeFilter,
        observer: &mut dyn PurgeObserver,
    ) -> PurgeSummary {
        let mut summary = PurgeSummary::default();
        let mut seen = HashSet::new();

        for (name, calendar_id) in calendars.iter() {
            if !seen.insert(calendar_id) {
                debug!(calendar = %calendar_id, entry = name, "calendar already purged");
                continue;
            }
            if self.retry.is_cancelled() {
                warn!("purge cancelled before calendar {}", name);
                let mut report = CalendarPurgeReport::new(name, calendar_id);
                report.outcome = CalendarOutcome::NotStarted;
                summary.push(report);
                continue;
            }
            observer.on_calendar_start(name, calendar_id);
            let report = self.purge_calendar(name, calendar_id, filter, observer).await;
            observer.on_calendar_done(&report);
            summary.push(report);
        }

        info!(
            calendars = summary.calendars.len(),
            deleted = summary.deleted,
            errors = summary.errors,
            skipped = summary.skipped,
            dry_run = filter.dry_run,
            "purge finished"
        );
        summary
    }

    async fn purge_calendar(
        &self,
        name: &str,
        calendar_id: &str,
        filter: &PurgeFilter,
        observer: &mut dyn PurgeObserver,
    ) -> CalendarPurgeReport {
        let mut report = CalendarPurgeReport::new(name, calendar_id);

        let lister = RemoteEventLister::new(self.remote, self.retry);
        let listed = match lister.list_since(calendar_id, filter.since).collect_all().await {
            Ok(events) => events,
            Err(error) if self.retry.is_cancelled() => {
                warn!(calendar = %calendar_id, "listing cancelled");
                observer.on_list_failed(&report, &error);
                return report.cancelled();
            }
            Err(error) => {
                warn!(calendar = %calendar_id, %error, "listing failed");
                report.errors = 1;
                report.outcome = CalendarOutcome::ListFailed;
                observer.on_list_failed(&report, &error);
                return report;
            }
        };

        report.listed = listed.len();
        let matching: Vec<RemoteEventRecord> =
            listed.into_iter().filter(|e| filter.matches(e)).collect();
        report.matched = matching.len();
        report.preview = matching.iter().take(PREVIEW_LIMIT).cloned().collect();
        observer.on_listed(&report);

        if filter.dry_run {
            report.outcome = CalendarOutcome::Previewed;
            return report;
        }

        for event in &matching {
            if self.retry.is_cancelled() {
                return report.cancelled();
            }

            let remote = self.remote;
            let event_id = event.id.as_str();
            let result = self
                .retry
                .execute("delete event", move || remote.delete_event(calendar_id, event_id))
                .await;

            match result {
                Ok(()) => {
                    report.deleted += 1;
                    observer.on_deleted(event);
                }
                // Already gone
                Err(error) if error.status() == Some(410) => {
                    report.deleted += 1;
                    observer.on_deleted(event);
                }
                // Interrupted mid-retry: left for the skipped count
                Err(_) if self.retry.is_cancelled() => return report.cancelled(),
                Err(error) => {
                    report.errors += 1;
                    observer.on_delete_failed(event, &error);
                }
            }

            if self.retry.pace(Pacing::Purge).await.is_err() {
                return report.cancelled();
            }
        }

        report
    }
}
