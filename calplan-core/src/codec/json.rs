//! Decoding of the schedule JSON returned by the plan generator.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::localize;
use crate::error::{CalPlanError, CalPlanResult, EventError};
use crate::event::{CalendarEvent, EventTime};

pub const DEFAULT_PRODID: &str = "-//Plan//GenAI//ES";

/// Chatter the generator tends to put around the JSON.
const CHATTER: &[&str] = &["Claro,", "Aquí tienes"];

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?").expect("fence pattern should compile"));

static TRAILING_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}\s*$").expect("object pattern should compile"));

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn preview(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Pull the JSON object out of free-form generator output.
///
/// Strips a BOM, code fences and known chatter, collapses doubled braces,
/// then parses the block running from the first `{` to a `}` that ends the
/// text.
pub fn extract_json(raw: &str) -> CalPlanResult<Value> {
    let mut text = raw.trim().trim_start_matches('\u{feff}').to_string();
    if text.is_empty() {
        return Err(CalPlanError::ScheduleJson("generator output is empty".to_string()));
    }

    text = CODE_FENCE.replace_all(&text, "").into_owned();
    for chatter in CHATTER {
        text = text.replace(chatter, "");
    }
    text = text.replace("{{", "{").replace("}}", "}");

    let block = TRAILING_OBJECT.find(&text).ok_or_else(|| {
        CalPlanError::ScheduleJson(format!(
            "no JSON object found. First characters:\n{}",
            preview(&text, 300)
        ))
    })?;

    serde_json::from_str(block.as_str()).map_err(|e| {
        CalPlanError::ScheduleJson(format!(
            "invalid JSON: {}\nFragment:\n{}",
            e,
            preview(block.as_str(), 400)
        ))
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawCalendar {
    timezone: Option<String>,
    prodid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    summary: Option<String>,
    start: Option<String>,
    end: Option<String>,
    description: Option<String>,
    location: Option<String>,
    #[serde(default)]
    all_day: bool,
    rrule: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSchedule {
    #[serde(default)]
    calendar: RawCalendar,
    #[serde(default)]
    events: Vec<RawEvent>,
}

/// A decoded weekly schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub timezone: Tz,
    pub prodid: String,
    pub events: Vec<CalendarEvent>,
}

/// Decode the generator JSON into validated events.
///
/// Timed values are wall-clock times in the schedule's timezone
/// (`calendar.timezone`, else `fallback_tz`). Errors name the 1-based event.
pub fn decode_schedule(value: Value, fallback_tz: Tz) -> CalPlanResult<Schedule> {
    let raw: RawSchedule =
        serde_json::from_value(value).map_err(|e| CalPlanError::ScheduleJson(e.to_string()))?;

    let timezone = match raw.calendar.timezone.as_deref() {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| CalPlanError::UnknownTimezone(name.to_string()))?,
        None => fallback_tz,
    };
    let prodid = raw
        .calendar
        .prodid
        .unwrap_or_else(|| DEFAULT_PRODID.to_string());

    let events = raw
        .events
        .into_iter()
        .enumerate()
        .map(|(i, event)| decode_event(i + 1, event, timezone))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Schedule {
        timezone,
        prodid,
        events,
    })
}

fn decode_event(index: usize, raw: RawEvent, tz: Tz) -> Result<CalendarEvent, EventError> {
    let summary = raw.summary.ok_or(EventError::MissingField {
        index,
        field: "summary",
    })?;
    let start = raw.start.ok_or(EventError::MissingField {
        index,
        field: "start",
    })?;
    let end = raw.end.ok_or(EventError::MissingField { index, field: "end" })?;

    let (start, end) = if raw.all_day {
        (
            parse_day(index, "start", &start)?,
            parse_day(index, "end", &end)?,
        )
    } else {
        (
            parse_local(index, "start", &start, tz)?,
            parse_local(index, "end", &end, tz)?,
        )
    };

    let mut event = CalendarEvent::new(summary, start, end)?;
    if let Some(description) = raw.description.filter(|d| !d.is_empty()) {
        event = event.with_description(description);
    }
    if let Some(location) = raw.location.filter(|l| !l.is_empty()) {
        event = event.with_location(location);
    }
    if let Some(rule) = raw.rrule.filter(|r| !r.trim().is_empty()) {
        event = event.with_recurrence_rule(rule.trim());
    }
    Ok(event)
}

fn invalid(index: usize, field: &'static str, value: &str) -> EventError {
    EventError::InvalidTime {
        index,
        field,
        value: value.to_string(),
    }
}

/// All-day values may come as a date or a full timestamp; only the date counts.
fn parse_day(index: usize, field: &'static str, value: &str) -> Result<EventTime, EventError> {
    value
        .get(..10)
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .map(EventTime::Date)
        .ok_or_else(|| invalid(index, field, value))
}

fn parse_local(
    index: usize,
    field: &'static str,
    value: &str,
    tz: Tz,
) -> Result<EventTime, EventError> {
    let trimmed = value.trim();

    // An explicit offset wins over the schedule timezone
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(EventTime::DateTime(dt));
    }

    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .and_then(|naive| localize(naive, tz))
        .map(EventTime::DateTime)
        .ok_or_else(|| invalid(index, field, value))
}
