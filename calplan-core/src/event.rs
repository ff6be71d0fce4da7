//! Locally modeled calendar events.
//!
//! Events are built once from decoded schedule data (JSON or .ics) and are
//! never mutated afterwards. The import engine consumes each one exactly once.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Start or end of an event: a zoned timestamp or a whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<FixedOffset>),
    /// All-day value. As an end it is exclusive (iCalendar convention).
    Date(NaiveDate),
}

impl EventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// UTC instant for timed values; `None` for all-day dates.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            EventTime::DateTime(dt) => Some(dt.with_timezone(&Utc)),
            EventTime::Date(_) => None,
        }
    }
}

impl std::fmt::Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventTime::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A calendar event as produced by the schedule codec.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    /// RRULE value without the `RRULE:` prefix, e.g. `FREQ=WEEKLY;COUNT=4`
    pub recurrence_rule: Option<String>,
}

impl CalendarEvent {
    /// Build a validated event.
    pub fn new(
        title: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Result<Self, EventError> {
        let event = CalendarEvent {
            title: title.into(),
            description: None,
            location: None,
            start,
            end,
            recurrence_rule: None,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_recurrence_rule(mut self, rule: impl Into<String>) -> Self {
        self.recurrence_rule = Some(rule.into());
        self
    }

    /// Check the time invariants: both values of the same kind and end
    /// strictly after start.
    pub fn validate(&self) -> Result<(), EventError> {
        let ordered = match (&self.start, &self.end) {
            (EventTime::DateTime(start), EventTime::DateTime(end)) => end > start,
            (EventTime::Date(start), EventTime::Date(end)) => end > start,
            _ => {
                return Err(EventError::MixedTimeKinds {
                    title: self.title.clone(),
                });
            }
        };

        if !ordered {
            return Err(EventError::EndNotAfterStart {
                title: self.title.clone(),
            });
        }

        Ok(())
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

impl std::fmt::Display for CalendarEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> EventTime {
        let offset = FixedOffset::east_opt(3600).unwrap();
        EventTime::DateTime(offset.with_ymd_and_hms(2025, 11, 10, hour, 0, 0).unwrap())
    }

    fn day(d: u32) -> EventTime {
        EventTime::Date(NaiveDate::from_ymd_opt(2025, 11, d).unwrap())
    }

    #[test]
    fn timed_event_requires_end_after_start() {
        assert!(CalendarEvent::new("Estudio", at(9), at(11)).is_ok());

        let err = CalendarEvent::new("Estudio", at(11), at(11)).unwrap_err();
        assert_eq!(
            err,
            EventError::EndNotAfterStart {
                title: "Estudio".to_string()
            }
        );
        assert!(CalendarEvent::new("Estudio", at(11), at(9)).is_err());
    }

    #[test]
    fn all_day_end_is_exclusive() {
        assert!(CalendarEvent::new("Libranza", day(10), day(11)).is_ok());
        assert!(CalendarEvent::new("Libranza", day(10), day(10)).is_err());
    }

    #[test]
    fn mixing_date_and_datetime_is_rejected() {
        let err = CalendarEvent::new("Raro", day(10), at(9)).unwrap_err();
        assert!(matches!(err, EventError::MixedTimeKinds { .. }));
    }

    #[test]
    fn to_utc_normalizes_offset() {
        let utc = at(9).to_utc().unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 11, 10, 8, 0, 0).unwrap());
        assert_eq!(day(10).to_utc(), None);
    }
}
