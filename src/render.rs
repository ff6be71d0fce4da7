//! Terminal rendering for calplan commands.
//!
//! Engine progress arrives through the core's observer traits; the console
//! observers here turn it into colored lines as it happens.

use calplan_core::error::{EventError, RemoteError};
use calplan_core::event::CalendarEvent;
use calplan_core::import::{ImportObserver, ImportSummary};
use calplan_core::purge::{CalendarOutcome, CalendarPurgeReport, PurgeObserver, PurgeSummary};
use calplan_core::remote::RemoteEventRecord;
use calplan_core::routing::CalendarRoute;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["-", "\\", "|", "/"])
            .template("{msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

fn untitled(record: &RemoteEventRecord) -> &str {
    record.summary.as_deref().unwrap_or("(untitled)")
}

/// Prints one line per imported, failed or rejected event.
#[derive(Default)]
pub struct ConsoleImportObserver;

impl ImportObserver for ConsoleImportObserver {
    fn on_imported(&mut self, event: &CalendarEvent, route: &CalendarRoute) {
        println!(
            "   {} {} {}",
            "✔".green(),
            format!("[{}]", route.calendar_id).dimmed(),
            event.title
        );
    }

    fn on_failed(&mut self, event: &CalendarEvent, route: &CalendarRoute, error: &RemoteError) {
        println!(
            "   {} {} {}: {}",
            "✗".red(),
            format!("[{}]", route.calendar_id).dimmed(),
            event.title,
            error.to_string().red()
        );
    }

    fn on_rejected(&mut self, event: &CalendarEvent, error: &EventError) {
        println!(
            "   {} {} {}",
            "⚠".yellow(),
            event.title,
            format!("(skipped: {})", error).yellow()
        );
    }
}

pub fn render_import_summary(summary: &ImportSummary) -> String {
    let mut line = format!(
        "Imported: {} {}",
        summary.succeeded,
        pluralize("event", summary.succeeded)
    );
    if summary.failed > 0 {
        line.push_str(&format!(", {}", format!("{} failed", summary.failed).red()));
    }
    if summary.skipped > 0 {
        line.push_str(&format!(
            ", {}",
            format!("{} skipped", summary.skipped).yellow()
        ));
    }
    if summary.not_attempted > 0 {
        line.push_str(&format!(
            ", {}",
            format!("{} not attempted", summary.not_attempted).yellow()
        ));
    }
    line
}

/// Purge progress: a spinner while listing, then the preview or the
/// per-calendar result.
pub struct ConsolePurgeObserver {
    since: DateTime<Utc>,
    dry_run: bool,
    spinner: Option<ProgressBar>,
}

impl ConsolePurgeObserver {
    pub fn new(since: DateTime<Utc>, dry_run: bool) -> Self {
        ConsolePurgeObserver {
            since,
            dry_run,
            spinner: None,
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl PurgeObserver for ConsolePurgeObserver {
    fn on_calendar_start(&mut self, name: &str, calendar_id: &str) {
        println!("\n📚 {} {}", name.bold(), calendar_id.dimmed());
        self.spinner = Some(create_spinner("   Listing events".to_string()));
    }

    fn on_listed(&mut self, report: &CalendarPurgeReport) {
        self.stop_spinner();

        println!(
            "   Found {} {} since {}, {} matching.",
            report.listed,
            pluralize("event", report.listed),
            self.since.date_naive(),
            report.matched
        );
        for event in &report.preview {
            println!("   - {}  {}", event.display_start().dimmed(), untitled(event));
        }
        if report.not_previewed() > 0 {
            println!("   ... and {} more (not listed).", report.not_previewed());
        }

        if self.dry_run {
            println!("   {}", "🚫 Dry run: nothing deleted.".yellow());
        } else if report.matched > 0 {
            println!("   {}", "🚨 Deleting...".red());
        }
    }

    fn on_list_failed(&mut self, _report: &CalendarPurgeReport, error: &RemoteError) {
        self.stop_spinner();
        println!("   {} {}", "❌ Could not list events:".red(), error);
    }

    fn on_delete_failed(&mut self, event: &RemoteEventRecord, error: &RemoteError) {
        println!(
            "      {} {}: {}",
            "❌".red(),
            untitled(event),
            error.to_string().red()
        );
    }

    fn on_calendar_done(&mut self, report: &CalendarPurgeReport) {
        self.stop_spinner();
        match report.outcome {
            CalendarOutcome::Completed => println!(
                "   {} {} deleted, {} with errors.",
                "✅".green(),
                report.deleted,
                report.errors
            ),
            CalendarOutcome::Cancelled => println!(
                "   {} {} deleted, {} with errors, {} not attempted.",
                "⏹ Interrupted:".yellow(),
                report.deleted,
                report.errors,
                report.skipped
            ),
            _ => {}
        }
    }
}

pub fn render_purge_summary(summary: &PurgeSummary, dry_run: bool) -> String {
    let mut lines = vec![format!(
        "🏁 Total: {} deleted, {} {}.",
        summary.deleted,
        summary.errors,
        pluralize("error", summary.errors)
    )];
    if summary.was_cancelled() {
        lines.push(format!(
            "⏹ Interrupted: {} matching {} not attempted.",
            summary.skipped,
            pluralize("event", summary.skipped)
        ));
        let not_started: Vec<&str> = summary.not_started().map(|r| r.name.as_str()).collect();
        if !not_started.is_empty() {
            lines.push(format!("   Not started: {}", not_started.join(", ")));
        }
    }
    if dry_run {
        lines.push("👉 Run with --no-dry-run to delete for real.".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_summary_mentions_only_nonzero_problems() {
        let clean = ImportSummary {
            succeeded: 3,
            failed: 0,
            skipped: 0,
            not_attempted: 0,
        };
        assert_eq!(render_import_summary(&clean), "Imported: 3 events");

        let rough = ImportSummary {
            succeeded: 1,
            failed: 1,
            skipped: 2,
            not_attempted: 4,
        };
        let line = render_import_summary(&rough);
        assert!(line.starts_with("Imported: 1 event,"));
        assert!(line.contains("1 failed"));
        assert!(line.contains("2 skipped"));
        assert!(line.contains("4 not attempted"));
    }

    #[test]
    fn purge_summary_adds_hint_on_dry_run() {
        let summary = PurgeSummary {
            calendars: vec![],
            deleted: 0,
            errors: 1,
            skipped: 0,
        };
        let text = render_purge_summary(&summary, true);
        assert!(text.contains("0 deleted, 1 error."));
        assert!(text.contains("--no-dry-run"));
        assert!(!text.contains("Interrupted"));
        assert!(!render_purge_summary(&summary, false).contains("--no-dry-run"));
    }

    #[test]
    fn interrupted_purge_summary_lists_leftovers() {
        let calendar = |name: &str, outcome: CalendarOutcome, deleted: usize, skipped: usize| {
            CalendarPurgeReport {
                name: name.to_string(),
                calendar_id: format!("{}@group", name.to_lowercase()),
                listed: deleted + skipped,
                matched: deleted + skipped,
                deleted,
                errors: 0,
                skipped,
                outcome,
                preview: vec![],
            }
        };
        let summary = PurgeSummary {
            calendars: vec![
                calendar("ESTUDIOS", CalendarOutcome::Cancelled, 1, 2),
                calendar("TRABAJO", CalendarOutcome::NotStarted, 0, 0),
            ],
            deleted: 1,
            errors: 0,
            skipped: 2,
        };

        let text = render_purge_summary(&summary, false);
        assert!(text.contains("1 deleted, 0 errors."));
        assert!(text.contains("Interrupted: 2 matching events not attempted."));
        assert!(text.contains("Not started: TRABAJO"));
    }
}
