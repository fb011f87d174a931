//! logship: usage event log shipper.
//!
//! Events are recorded into a local append-only log, rotated into a queue of
//! pending files, and shipped to a statistics endpoint as JSON batches. Every
//! upload pass reports a coarse [`models::ResultCode`] and is recorded in the
//! [`journal`]. The [`collector`] module is a local sink for the same wire
//! format, used in development and tests.

pub mod collector;
pub mod journal;
pub mod models;
pub mod settings;
pub mod store;
pub mod upload;
