//! Incremental export of Garmin Connect data into a tree of JSON documents.

pub mod cache;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod sync;

#[cfg(test)]
mod test_utils;

pub use error::{SyncError, SyncResult};
