//! Pushes locally modeled events to the remote calendar, one insert each.

use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{EventError, RemoteError};
use crate::event::{CalendarEvent, EventTime};
use crate::remote::{CalendarRemote, InsertPayload, PayloadTime};
use crate::retry::{Pacing, RetryPolicy};
use crate::routing::{CalendarRoute, CalendarTable, RouteResolver};

/// What to do when an insert fails for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed insert.
    #[default]
    FailFast,
    /// Count the failure and move on to the next event.
    Continue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Rejected before any remote call (bad data)
    pub skipped: usize,
    /// Left over when the run stopped early (fail-fast or cancellation)
    pub not_attempted: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.not_attempted
    }
}

/// An import aborted on a failed insert. Carries what was done so far.
#[derive(Error, Debug)]
#[error("Import stopped at '{title}': {source}")]
pub struct ImportError {
    pub title: String,
    pub source: RemoteError,
    pub summary: ImportSummary,
}

/// Per-event progress callbacks. All methods default to no-ops.
pub trait ImportObserver {
    fn on_imported(&mut self, _event: &CalendarEvent, _route: &CalendarRoute) {}

    fn on_failed(&mut self, _event: &CalendarEvent, _route: &CalendarRoute, _error: &RemoteError) {
    }

    fn on_rejected(&mut self, _event: &CalendarEvent, _error: &EventError) {}
}

impl ImportObserver for () {}

pub struct ImportEngine<'a, R: CalendarRemote + ?Sized> {
    remote: &'a R,
    resolver: &'a dyn RouteResolver,
    retry: &'a RetryPolicy,
    timezone: Tz,
    failure_policy: FailurePolicy,
}

impl<'a, R: CalendarRemote + ?Sized> ImportEngine<'a, R> {
    pub fn new(
        remote: &'a R,
        resolver: &'a dyn RouteResolver,
        retry: &'a RetryPolicy,
        timezone: Tz,
    ) -> Self {
        ImportEngine {
            remote,
            resolver,
            retry,
            timezone,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Insert every event, in order, into its routed calendar.
    ///
    /// There is no deduplication: importing the same events twice creates
    /// them twice.
    pub async fn import_all(
        &self,
        events: &[CalendarEvent],
        table: &CalendarTable,
        observer: &mut dyn ImportObserver,
    ) -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary::default();

        for (position, event) in events.iter().enumerate() {
            let after_this = events.len() - position - 1;

            if let Err(error) = event.validate() {
                debug!(title = %event.title, %error, "rejected event");
                summary.skipped += 1;
                observer.on_rejected(event, &error);
                continue;
            }

            let route = self.resolver.resolve(&event.title, table);
            let payload = build_payload(event, self.timezone);

            let calendar_id = route.calendar_id.as_str();
            let remote = self.remote;
            let payload = &payload;
            let result = self
                .retry
                .execute("insert event", move || remote.insert_event(calendar_id, payload))
                .await;

            match result {
                Ok(_) => {
                    summary.succeeded += 1;
                    info!(calendar = %route.calendar_id, title = %event.title, "imported event");
                    observer.on_imported(event, &route);
                }
                // Interrupted, so this event was not inserted either
                Err(error) if self.retry.is_cancelled() => {
                    summary.not_attempted = after_this + 1;
                    return Err(ImportError {
                        title: event.title.clone(),
                        source: error,
                        summary,
                    });
                }
                Err(error) => {
                    summary.failed += 1;
                    observer.on_failed(event, &route, &error);
                    if self.failure_policy == FailurePolicy::FailFast {
                        summary.not_attempted = after_this;
                        return Err(ImportError {
                            title: event.title.clone(),
                            source: error,
                            summary,
                        });
                    }
                }
            }

            if let Err(error) = self.retry.pace(Pacing::Import).await {
                summary.not_attempted = after_this;
                return Err(ImportError {
                    title: event.title.clone(),
                    source: error,
                    summary,
                });
            }
        }

        Ok(summary)
    }
}

/// Insert body for `event`, with timed values expressed in `timezone`.
pub fn build_payload(event: &CalendarEvent, timezone: Tz) -> InsertPayload {
    InsertPayload {
        summary: event.title.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start: payload_time(&event.start, timezone),
        end: payload_time(&event.end, timezone),
        recurrence: event
            .recurrence_rule
            .as_deref()
            .map(recurrence_line)
            .into_iter()
            .collect(),
    }
}

fn payload_time(time: &EventTime, timezone: Tz) -> PayloadTime {
    match time {
        EventTime::DateTime(dt) => PayloadTime::DateTime {
            date_time: dt.with_timezone(&timezone).to_rfc3339(),
            time_zone: timezone.name().to_string(),
        },
        EventTime::Date(date) => PayloadTime::Date(*date),
    }
}

fn recurrence_line(rule: &str) -> String {
    let rule = rule.trim();
    if rule.to_uppercase().starts_with("RRULE:") {
        rule.to_string()
    } else {
        format!("RRULE:{}", rule)
    }
}
