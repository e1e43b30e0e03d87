//! SQLite backend for the tutoring marketplace record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Because every call is serialised on
//! that thread, watcher registration and change delivery are ordered with
//! respect to writes.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
