//! Error types for `reporta-core`.
//!
//! Every public operation resolves to one of these variants; backend errors
//! are wrapped into [`Error::Storage`] with a context string before they
//! reach callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The actor lacks the role required for the operation.
  #[error("permission denied: {0}")]
  PermissionDenied(String),

  /// Bad number format, missing required field, date-range violation or
  /// duplicate submission.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// The operation would break a structural invariant (e.g. remove the last
  /// owner of a program).
  #[error("invariant violation: {0}")]
  InvariantViolation(String),

  #[error("storage error while {context}: {source}")]
  Storage {
    context: String,
    #[source]
    source:  Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  /// Wrap a backend error with a short description of what was being done.
  pub fn storage<E>(context: impl Into<String>, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage { context: context.into(), source: Box::new(source) }
  }

  /// Stable machine-readable name of the error class.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::PermissionDenied(_) => "permission_denied",
      Self::Validation(_) => "validation_error",
      Self::NotFound(_) => "not_found",
      Self::InvariantViolation(_) => "invariant_violation",
      Self::Storage { .. } => "storage_error",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn storage_errors_keep_context_and_kind() {
    let source = std::io::Error::other("disk full");
    let err = Error::storage("rewriting submission", source);
    assert_eq!(err.kind(), "storage_error");
    assert_eq!(err.to_string(), "storage error while rewriting submission: disk full");
    assert_eq!(Error::Validation("x".into()).kind(), "validation_error");
    assert_eq!(Error::InvariantViolation("x".into()).kind(), "invariant_violation");
  }
}
