//! Schedule codecs: generator JSON in, iCalendar out and back in.

mod ics;
mod json;

pub use ics::{decode_ics, encode_ics};
pub use json::{DEFAULT_PRODID, Schedule, decode_schedule, extract_json};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Wall-clock time in `tz`. Ambiguous times take the earlier instant;
/// times skipped by a DST jump have no value.
fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}
