//! Error type for `reporta-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its closed set.
  #[error("unexpected {column} value: {value:?}")]
  Decode { column: &'static str, value: String },

  #[error("program not found: {0}")]
  ProgramNotFound(uuid::Uuid),

  #[error("submission not found: {0}")]
  SubmissionNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
