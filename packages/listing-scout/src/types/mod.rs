//! Domain types for sessions, listings, and reports.

pub mod listing;
pub mod report;
pub mod session;
