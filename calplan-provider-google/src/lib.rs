//! Google Calendar provider for calplan.
//!
//! [`GoogleCalendarApi`] implements the core's remote seam over the Calendar
//! v3 REST API; [`Session`] acquires the OAuth access token it runs with.

pub mod api;
pub mod app_config;
mod convert;
pub mod oauth;
pub mod session;
mod types;

pub use api::GoogleCalendarApi;
pub use session::Session;
