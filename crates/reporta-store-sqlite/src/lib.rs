//! SQLite backend for the Reporta store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Multi-row writes run inside
//! `BEGIN IMMEDIATE` transactions so that checks and writes observe the same
//! state.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
