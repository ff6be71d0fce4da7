//! Core of calplan: the schedule model, title-based calendar routing and the
//! engines that push events to, and purge events from, a remote calendar.
//!
//! - [`routing`] maps an event title to a destination calendar
//! - [`retry`] holds the backoff and pacing rules shared by both engines
//! - [`import`] and [`purge`] talk to the remote only through
//!   [`remote::CalendarRemote`]
//! - [`codec`] turns generator JSON into events and events into `.ics`

pub mod codec;
pub mod error;
pub mod event;
pub mod import;
pub mod lister;
pub mod prompt;
pub mod purge;
pub mod remote;
pub mod retry;
pub mod routing;
pub mod settings;

#[cfg(test)]
mod testing;

pub use error::{CalPlanError, CalPlanResult, EventError, RemoteError, RetryKind};
pub use event::{CalendarEvent, EventTime};
pub use import::{FailurePolicy, ImportEngine, ImportError, ImportObserver, ImportSummary};
pub use purge::{
    CalendarOutcome, CalendarPurgeReport, PurgeEngine, PurgeFilter, PurgeObserver, PurgeSummary,
    parse_since,
};
pub use remote::CalendarRemote;
pub use retry::RetryPolicy;
pub use routing::{CalendarRoute, CalendarTable, Category, RouteResolver, RoutingStrategy};
pub use settings::Settings;
