//! Periodic submissions and their targets.
//!
//! A submission moves `Draft → Draft` on every save and `Draft → Finalized`
//! on an explicit finalize. Finalized submissions are read-only until they
//! are explicitly reopened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  directory::{PeriodId, UserId},
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubmissionState {
  #[default]
  Draft,
  Finalized,
}

impl SubmissionState {
  pub fn is_draft(self) -> bool { matches!(self, Self::Draft) }
}

/// Free-text content of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFields {
  /// Narrative progress description.
  pub description: Option<String>,
  /// Overall rating / status label, e.g. `"on-track"`.
  pub rating:      Option<String>,
  pub remarks:     Option<String>,
}

impl SubmissionFields {
  /// Overwrite every field that is set in `patch`; leave the rest.
  pub fn merged(&self, patch: &SubmissionFields) -> SubmissionFields {
    SubmissionFields {
      description: patch.description.clone().or_else(|| self.description.clone()),
      rating:      patch.rating.clone().or_else(|| self.rating.clone()),
      remarks:     patch.remarks.clone().or_else(|| self.remarks.clone()),
    }
  }
}

/// A submission row. At most one non-deleted submission exists per
/// (program, period).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
  pub submission_id: Uuid,
  pub program_id:    Uuid,
  pub period_id:     PeriodId,
  pub state:         SubmissionState,
  pub fields:        SubmissionFields,
  /// Content blob written by older versions of the platform.
  pub content_json:  Option<String>,
  pub created_by:    UserId,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Submission {
  /// Reject writes to a finalized submission.
  pub fn ensure_editable(&self) -> Result<()> {
    if self.state.is_draft() {
      Ok(())
    } else {
      Err(Error::Validation(format!(
        "submission {} is finalized; reopen it before editing",
        self.submission_id
      )))
    }
  }
}

/// A normalised target row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
  pub target_id:     Uuid,
  pub submission_id: Uuid,
  /// Zero-based position within the submission.
  pub position:      u32,
  pub target_number: Option<String>,
  pub text:          String,
  pub status:        Option<String>,
}

/// Target input; the number is derived from the program number when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTarget {
  #[serde(default)]
  pub target_number: Option<String>,
  pub text:          String,
  #[serde(default)]
  pub status:        Option<String>,
}

impl NewTarget {
  pub fn text(text: impl Into<String>) -> Self {
    Self { text: text.into(), ..Self::default() }
  }
}

/// Input for a new draft submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubmission {
  pub period_id: PeriodId,
  #[serde(default)]
  pub fields:    SubmissionFields,
  #[serde(default)]
  pub targets:   Vec<NewTarget>,
}

/// A submission as stored, with whatever target rows exist for it. Callers
/// should go through [`crate::legacy::canonicalize`] before reading targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSubmission {
  pub submission: Submission,
  pub targets:    Vec<Target>,
}

/// Outcome of a uniqueness-checked submission insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionInsert {
  Created(StoredSubmission),
  /// A non-deleted submission already exists for (program, period).
  AlreadyExists,
}

/// Outcome of a draft-only submission rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionWrite {
  Rewritten(StoredSubmission),
  /// The submission was finalized; nothing was written.
  Finalized,
}

/// Replacement content for an existing submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRewrite {
  pub fields:  SubmissionFields,
  /// `Some` replaces the target list wholesale; `None` keeps it.
  pub targets: Option<Vec<NewTarget>>,
}

/// Input to the auto-save path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoSave {
  /// Only used when no submission exists yet.
  pub period_id: Option<PeriodId>,
  #[serde(default)]
  pub fields:    SubmissionFields,
  pub targets:   Option<Vec<NewTarget>>,
}

/// Input to a full rewrite of one period's submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionUpdate {
  #[serde(default)]
  pub fields:  SubmissionFields,
  #[serde(default)]
  pub targets: Vec<NewTarget>,
}
