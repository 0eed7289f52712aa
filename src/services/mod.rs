pub mod auth;
pub mod enrich;
pub mod format;
pub mod google_calendar;
pub mod grouping;
pub mod init;
pub mod refresh;
pub mod schedule;
pub mod settings;
pub mod store;
