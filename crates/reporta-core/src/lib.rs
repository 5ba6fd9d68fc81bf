//! Core types and trait definitions for the Reporta program reporting engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the domain model, the pure decision logic (role resolution, number
//! validation, snapshot diffing, legacy submission normalisation) and the
//! [`store::ReportStore`] abstraction that storage backends implement.

pub mod access;
pub mod actor;
pub mod assignment;
pub mod diff;
pub mod directory;
pub mod error;
pub mod legacy;
pub mod number;
pub mod program;
pub mod sink;
pub mod snapshot;
pub mod store;
pub mod submission;

pub use error::{Error, Result};
