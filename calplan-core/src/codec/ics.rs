//! iCalendar encoding of a schedule, and decoding of the files it produces.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use icalendar::{
    Calendar, CalendarDateTime, Component, DatePerhapsTime, EventLike, Property, ValueType,
    parser::{read_calendar, unfold},
};
use tracing::warn;

use super::{Schedule, localize};
use crate::error::{CalPlanError, CalPlanResult};
use crate::event::{CalendarEvent, EventTime};

/// Render `schedule` as a VCALENDAR. `dtstamp` is written on every VEVENT.
pub fn encode_ics(schedule: &Schedule, dtstamp: DateTime<Utc>) -> String {
    let mut cal = Calendar::new();
    let dtstamp = dtstamp.format("%Y%m%dT%H%M%SZ").to_string();

    for (i, event) in schedule.events.iter().enumerate() {
        let mut ics_event = icalendar::Event::new();
        ics_event.uid(&format!("plan-{}@calplan", i + 1));
        ics_event.add_property("DTSTAMP", &dtstamp);
        ics_event.summary(&event.title);

        if let Some(ref desc) = event.description {
            ics_event.description(desc);
        }
        if let Some(ref loc) = event.location {
            ics_event.location(loc);
        }

        add_time_property(&mut ics_event, "DTSTART", &event.start, schedule.timezone);
        add_time_property(&mut ics_event, "DTEND", &event.end, schedule.timezone);

        if let Some(ref rule) = event.recurrence_rule {
            let rule = rule.trim_start_matches("RRULE:");
            ics_event.add_property("RRULE", rule);
        }

        cal.push(ics_event.done());
    }

    set_calendar_headers(&cal.done().to_string(), &schedule.prodid)
}

/// Swap the crate's PRODID for ours and mark the file as a publication.
fn set_calendar_headers(ics: &str, prodid: &str) -> String {
    let mut result = String::with_capacity(ics.len() + 32);

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str(&format!("PRODID:{}\r\nMETHOD:PUBLISH\r\n", prodid));
            continue;
        }
        if line.starts_with("METHOD:") {
            continue;
        }
        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn add_time_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime, tz: Tz) {
    match time {
        EventTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::DateTime(dt) => {
            let local = dt.with_timezone(&tz).naive_local();
            let mut prop = Property::new(name, local.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tz.name());
            ics_event.append_property(prop);
        }
    }
}

/// Read back the VEVENTs of an .ics file.
///
/// Floating times are read in `tz`; so are zoned times whose TZID is not a
/// known IANA name. Time ordering is not checked here: the import engine
/// rejects and counts such events itself.
pub fn decode_ics(text: &str, tz: Tz) -> CalPlanResult<Vec<CalendarEvent>> {
    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded).map_err(|e| CalPlanError::IcsParse(e.to_string()))?;

    calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .enumerate()
        .map(|(i, vevent)| {
            let index = i + 1;
            let title = vevent
                .find_prop("SUMMARY")
                .map(|p| unescape_text(&p.val.to_string()))
                .unwrap_or_else(|| "(sin título)".to_string());

            let time = |name: &str| -> CalPlanResult<EventTime> {
                vevent
                    .find_prop(name)
                    .and_then(|p| DatePerhapsTime::try_from(p).ok())
                    .and_then(|dpt| to_event_time(dpt, tz))
                    .ok_or_else(|| {
                        CalPlanError::IcsParse(format!(
                            "event #{} ('{}') has no valid {}",
                            index, title, name
                        ))
                    })
            };
            let start = time("DTSTART")?;
            let end = time("DTEND")?;

            Ok(CalendarEvent {
                description: vevent
                    .find_prop("DESCRIPTION")
                    .map(|p| unescape_text(&p.val.to_string())),
                location: vevent
                    .find_prop("LOCATION")
                    .map(|p| unescape_text(&p.val.to_string())),
                recurrence_rule: vevent.find_prop("RRULE").map(|p| p.val.to_string()),
                title,
                start,
                end,
            })
        })
        .collect()
}

fn to_event_time(dpt: DatePerhapsTime, tz: Tz) -> Option<EventTime> {
    match dpt {
        DatePerhapsTime::Date(d) => Some(EventTime::Date(d)),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => Some(EventTime::DateTime(dt.fixed_offset())),
            CalendarDateTime::Floating(naive) => localize(naive, tz).map(EventTime::DateTime),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let zone = tzid.parse::<Tz>().unwrap_or_else(|_| {
                    warn!(tzid = %tzid, fallback = %tz, "unknown TZID, using import timezone");
                    tz
                });
                localize(date_time, zone).map(EventTime::DateTime)
            }
        },
    }
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DEFAULT_PRODID;
    use chrono::{NaiveDate, TimeZone};

    fn madrid() -> Tz {
        "Europe/Madrid".parse().unwrap()
    }

    fn schedule() -> Schedule {
        let tz = madrid();
        let at = |h| {
            EventTime::DateTime(tz.with_ymd_and_hms(2025, 11, 10, h, 0, 0).unwrap().fixed_offset())
        };
        let day = |d| EventTime::Date(NaiveDate::from_ymd_opt(2025, 11, d).unwrap());

        Schedule {
            timezone: tz,
            prodid: DEFAULT_PRODID.to_string(),
            events: vec![
                CalendarEvent::new("📚 Estudio — Matemáticas", at(9), at(11))
                    .unwrap()
                    .with_description("Tema 3")
                    .with_recurrence_rule("FREQ=WEEKLY;COUNT=4"),
                CalendarEvent::new("Libranza", day(15), day(16)).unwrap(),
            ],
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn encodes_headers_and_events() {
        let ics = encode_ics(&schedule(), stamp());

        assert!(ics.contains("PRODID:-//Plan//GenAI//ES\r\nMETHOD:PUBLISH\r\n"));
        assert!(ics.contains("VERSION:2.0"));
        assert!(!ics.contains("ICALENDAR-RS"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert!(ics.contains("UID:plan-1@calplan"));
        assert!(ics.contains("UID:plan-2@calplan"));
        assert!(ics.contains("DTSTAMP:20251101T120000Z"));
        assert!(ics.contains("DTSTART;TZID=Europe/Madrid:20251110T090000"));
        assert!(ics.contains("DTEND;TZID=Europe/Madrid:20251110T110000"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20251115"));
        assert!(ics.contains("DTEND;VALUE=DATE:20251116"));
        assert!(ics.contains("RRULE:FREQ=WEEKLY;COUNT=4"));
    }

    #[test]
    fn decodes_what_it_encodes() {
        let original = schedule();
        let ics = encode_ics(&original, stamp());

        let decoded = decode_ics(&ics, chrono_tz::UTC).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].title, "📚 Estudio — Matemáticas");
        assert_eq!(decoded[0].start.to_utc(), original.events[0].start.to_utc());
        assert_eq!(decoded[0].description.as_deref(), Some("Tema 3"));
        assert_eq!(
            decoded[0].recurrence_rule.as_deref(),
            Some("FREQ=WEEKLY;COUNT=4")
        );
        assert_eq!(decoded[1].start, original.events[1].start);
        assert_eq!(decoded[1].end, original.events[1].end);
    }

    #[test]
    fn decodes_utc_and_floating_times() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:a\r\n\
SUMMARY:Trabajo\\, turno de mañana\r\n\
DTSTART:20251110T080000Z\r\n\
DTEND:20251110T140000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:b\r\n\
DTSTART:20251110T200000\r\n\
DTEND:20251110T210000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let events = decode_ics(ics, madrid()).unwrap();

        assert_eq!(events[0].title, "Trabajo, turno de mañana");
        assert_eq!(
            events[0].start.to_utc().unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 10, 8, 0, 0).unwrap()
        );
        assert_eq!(events[1].title, "(sin título)");
        // Floating 20:00 in Madrid is 19:00 UTC
        assert_eq!(
            events[1].start.to_utc().unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 10, 19, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_start_is_an_error() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:a\r\n\
SUMMARY:Sin hora\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let err = decode_ics(ics, madrid()).unwrap_err();
        assert!(err.to_string().contains("DTSTART"));
    }

    #[test]
    fn unescapes_text_values() {
        assert_eq!(unescape_text(r"a\, b\; c\nd\\e"), "a, b; c\nd\\e");
    }
}
