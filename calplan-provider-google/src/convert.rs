//! Conversions between calplan's remote types and Google's wire types.

use calplan_core::remote::{InsertPayload, PayloadTime, RemoteEventRecord, RemoteTime};

use crate::types::{GoogleEvent, GoogleEventTime};

/// Convert from Google API types to calplan types
pub trait FromGoogle<T> {
    fn from_google(value: T) -> Self;
}

/// Convert to Google API types from calplan types
pub trait ToGoogle<T> {
    fn to_google(&self) -> T;
}

impl ToGoogle<GoogleEventTime> for PayloadTime {
    fn to_google(&self) -> GoogleEventTime {
        match self {
            PayloadTime::DateTime {
                date_time,
                time_zone,
            } => GoogleEventTime {
                date_time: Some(date_time.clone()),
                date: None,
                time_zone: Some(time_zone.clone()),
            },
            PayloadTime::Date(date) => GoogleEventTime {
                date_time: None,
                date: Some(date.format("%Y-%m-%d").to_string()),
                time_zone: None,
            },
        }
    }
}

impl ToGoogle<GoogleEvent> for InsertPayload {
    fn to_google(&self) -> GoogleEvent {
        GoogleEvent {
            id: String::new(), // Let Google assign the ID
            summary: Some(self.summary.clone()),
            description: self.description.clone(),
            location: self.location.clone(),
            start: Some(self.start.to_google()),
            end: Some(self.end.to_google()),
            recurrence: self.recurrence.clone(),
        }
    }
}

impl FromGoogle<GoogleEventTime> for RemoteTime {
    fn from_google(value: GoogleEventTime) -> Self {
        RemoteTime {
            date_time: value.date_time,
            date: value.date,
        }
    }
}

impl FromGoogle<GoogleEvent> for RemoteEventRecord {
    fn from_google(value: GoogleEvent) -> Self {
        RemoteEventRecord {
            id: value.id,
            summary: value.summary,
            start: value.start.map(RemoteTime::from_google),
            end: value.end.map(RemoteTime::from_google),
        }
    }
}
