use anyhow::{Context as _, Result};
use calplan_core::codec::{decode_schedule, encode_ics, extract_json};
use chrono::Utc;
use owo_colors::OwoColorize;

use super::{Context, read_input, write_output};

/// Turn the saved model reply into an ICS file.
pub fn run(ctx: &Context) -> Result<()> {
    let json_path = ctx.json_path()?;
    let ics_path = ctx.ics_path()?;

    let raw = read_input(&json_path)?;
    let value = extract_json(&raw)
        .with_context(|| format!("No usable JSON in {}", json_path.display()))?;
    let schedule = decode_schedule(value, ctx.settings.timezone()?)?;

    write_output(&ics_path, &encode_ics(&schedule, Utc::now()))?;
    println!(
        "{} {} {}",
        "✅ ICS generated:".green(),
        ics_path.display(),
        format!("({} events)", schedule.events.len()).dimmed()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn converts_a_chatty_reply_into_ics() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.toml");
        std::fs::write(
            &settings_path,
            "timezone = \"Europe/Madrid\"\n[schedule]\nweek_start = \"2025-11-10\"\nweek_end = \"2025-11-16\"\n",
        )
        .unwrap();
        let json_path = dir.path().join("reply.json");
        std::fs::write(
            &json_path,
            "Claro, aquí está:\n```json\n{\"events\": [{\"summary\": \"A-1 Estudio\", \"start\": \"2025-11-10T09:00:00\", \"end\": \"2025-11-10T10:30:00\"}]}\n```",
        )
        .unwrap();
        let ics_path = dir.path().join("out/plan.ics");

        let ctx = Context::load(
            &settings_path,
            PathBuf::from("prompt.txt"),
            Some(json_path),
            Some(ics_path.clone()),
            CancellationToken::new(),
        )
        .unwrap();

        run(&ctx).unwrap();

        let ics = std::fs::read_to_string(ics_path).unwrap();
        assert!(ics.contains("SUMMARY:A-1 Estudio"));
        assert!(ics.contains("DTSTART;TZID=Europe/Madrid:20251110T090000"));
    }
}
