//! Rendering of the plan-generation prompt.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::{CalPlanError, CalPlanResult};

pub const WEEK_START_PLACEHOLDER: &str = "{SEMANA_INICIO}";
pub const WEEK_END_PLACEHOLDER: &str = "{SEMANA_FINAL}";
pub const WORK_BLOCK_PLACEHOLDER: &str = "{BLOQUE_TRABAJO}";

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

/// `"9:00 - 17:00"` becomes `"9:00–17:00"`; a day off is spelled out.
fn normalize_shift(shift: &str) -> String {
    if shift.trim().eq_ignore_ascii_case("libranza") {
        return "Libranza (sin trabajo)".to_string();
    }
    shift.replace(' ', "").replace('-', "–")
}

/// One ` * <Weekday> <date>: <shift>` line per day, sorted by date.
pub fn work_block(work: &BTreeMap<String, String>) -> CalPlanResult<String> {
    let lines = work
        .iter()
        .map(|(date, shift)| {
            let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .map_err(|_| CalPlanError::InvalidDate(date.clone()))?;
            Ok(format!(
                " * {} {}: {}",
                weekday_name(day.weekday()),
                date.trim(),
                normalize_shift(shift)
            ))
        })
        .collect::<CalPlanResult<Vec<_>>>()?;

    Ok(lines.join("\n"))
}

/// Fill the week placeholders and the work block into `template`.
pub fn render_prompt(
    template: &str,
    week_start: &str,
    week_end: &str,
    work: &BTreeMap<String, String>,
) -> CalPlanResult<String> {
    Ok(template
        .replace(WEEK_START_PLACEHOLDER, week_start)
        .replace(WEEK_END_PLACEHOLDER, week_end)
        .replace(WORK_BLOCK_PLACEHOLDER, &work_block(work)?))
}
