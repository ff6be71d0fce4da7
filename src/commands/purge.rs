use anyhow::Result;
use calplan_core::purge::{PurgeEngine, PurgeFilter, parse_since};
use calplan_core::CalPlanError;
use owo_colors::OwoColorize;

use super::Context;
use crate::render::{ConsolePurgeObserver, render_purge_summary};

pub async fn run(ctx: &Context, since: &str, prefixes: Vec<String>, dry_run: bool) -> Result<()> {
    let since = parse_since(since)?;
    let table = ctx.settings.calendar_table();
    if table.is_empty() {
        return Err(CalPlanError::Config(
            "No calendars configured. Add a [calendars] table to the settings file".to_string(),
        )
        .into());
    }

    let mut filter = PurgeFilter::new(since).with_prefixes(prefixes);
    if !dry_run {
        filter = filter.live();
    }

    let action = if dry_run {
        "Previewing deletion of"
    } else {
        "Deleting"
    };
    println!(
        "⏳ {} events since {} (UTC)",
        action,
        since.to_rfc3339().bold()
    );
    if !filter.title_prefixes.is_empty() {
        println!("   Title prefixes: {}", filter.title_prefixes.join(", "));
    }
    println!("   Calendars:");
    for (name, calendar_id) in table.iter() {
        println!("   - {} {}", name, calendar_id.dimmed());
    }

    let api = ctx.calendar_api().await?;
    let retry = ctx.retry_policy();
    let engine = PurgeEngine::new(&api, &retry);

    let mut observer = ConsolePurgeObserver::new(since, dry_run);
    let summary = engine.purge(&table, &filter, &mut observer).await;

    println!("\n{}", render_purge_summary(&summary, dry_run));
    if summary.was_cancelled() {
        anyhow::bail!(
            "Purge interrupted: {} matching {} left in place",
            summary.skipped,
            if summary.skipped == 1 { "event" } else { "events" }
        );
    }
    Ok(())
}
