use anyhow::{Context as _, Result};
use calplan_core::codec::decode_ics;
use calplan_core::{FailurePolicy, ImportEngine};
use owo_colors::OwoColorize;

use super::{Context, read_input};
use crate::render::{ConsoleImportObserver, render_import_summary};

/// Insert every event of the ICS file into its routed Google calendar.
pub async fn run(ctx: &Context, continue_on_error: bool) -> Result<()> {
    let settings = &ctx.settings;
    let timezone = settings.timezone()?;
    let ics_path = ctx.ics_path()?;

    let events = decode_ics(&read_input(&ics_path)?, timezone)
        .with_context(|| format!("Failed to read events from {}", ics_path.display()))?;
    if events.is_empty() {
        println!("{}", "No events to import.".dimmed());
        return Ok(());
    }

    let api = ctx.calendar_api().await?;
    let retry = ctx.retry_policy();
    let resolver = settings.routing.strategy.resolver();
    let table = settings.calendar_table();

    let policy = if continue_on_error {
        FailurePolicy::Continue
    } else {
        FailurePolicy::FailFast
    };
    let engine =
        ImportEngine::new(&api, resolver.as_ref(), &retry, timezone).with_failure_policy(policy);

    println!(
        "📥 Importing {} events from {}",
        events.len(),
        ics_path.display().dimmed()
    );

    let mut observer = ConsoleImportObserver;
    match engine.import_all(&events, &table, &mut observer).await {
        Ok(summary) => {
            println!("\n{}", render_import_summary(&summary));
            Ok(())
        }
        Err(e) => {
            println!("\n{}", render_import_summary(&e.summary));
            Err(e.into())
        }
    }
}
