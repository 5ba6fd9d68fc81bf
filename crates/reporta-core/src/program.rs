//! Programs, the unit of periodic reporting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  directory::{AgencyId, InitiativeId, UserId},
  submission::NewSubmission,
};

/// A program row. Owned by exactly one agency at creation; collaborators are
/// added through assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
  pub program_id:       Uuid,
  pub name:             String,
  pub description:      Option<String>,
  /// Hierarchical number such as `"INIT-1.2A"`.
  pub number:           Option<String>,
  pub owner_agency_id:  AgencyId,
  pub initiative_id:    Option<InitiativeId>,
  /// When set, agency editors need an explicit user assignment to edit.
  pub restrict_editors: bool,
  pub start_date:       Option<NaiveDate>,
  pub end_date:         Option<NaiveDate>,
  pub created_by:       UserId,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Input to [`crate::store::ReportStore::create_program`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProgram {
  pub name:             String,
  pub description:      Option<String>,
  pub number:           Option<String>,
  pub initiative_id:    Option<InitiativeId>,
  #[serde(default)]
  pub restrict_editors: bool,
  pub start_date:       Option<NaiveDate>,
  pub end_date:         Option<NaiveDate>,
  /// First draft submission, written in the same transaction as the program.
  pub initial_submission: Option<NewSubmission>,
}

/// Partial update of a program. `None` leaves a field untouched; the inner
/// `Option` of the double-option fields clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramPatch {
  pub name:             Option<String>,
  #[serde(default, with = "double_option")]
  pub description:      Option<Option<String>>,
  #[serde(default, with = "double_option")]
  pub number:           Option<Option<String>>,
  #[serde(default, with = "double_option")]
  pub initiative_id:    Option<Option<InitiativeId>>,
  pub restrict_editors: Option<bool>,
  #[serde(default, with = "double_option")]
  pub start_date:       Option<Option<NaiveDate>>,
  #[serde(default, with = "double_option")]
  pub end_date:         Option<Option<NaiveDate>>,
}

impl ProgramPatch {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.description.is_none()
      && self.number.is_none()
      && self.initiative_id.is_none()
      && self.restrict_editors.is_none()
      && self.start_date.is_none()
      && self.end_date.is_none()
  }

  /// Apply the patch to a copy of `program`.
  pub fn apply(&self, program: &Program) -> Program {
    let mut next = program.clone();
    if let Some(name) = &self.name {
      next.name = name.clone();
    }
    if let Some(description) = &self.description {
      next.description = description.clone();
    }
    if let Some(number) = &self.number {
      next.number = number.clone();
    }
    if let Some(initiative_id) = self.initiative_id {
      next.initiative_id = initiative_id;
    }
    if let Some(restrict) = self.restrict_editors {
      next.restrict_editors = restrict;
    }
    if let Some(start) = self.start_date {
      next.start_date = start;
    }
    if let Some(end) = self.end_date {
      next.end_date = end;
    }
    next
  }
}

/// Field-level checks shared by creation and update.
pub fn check_fields(
  name: &str,
  start_date: Option<NaiveDate>,
  end_date: Option<NaiveDate>,
) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::Validation("program name is required".into()));
  }
  if let (Some(start), Some(end)) = (start_date, end_date)
    && start > end
  {
    return Err(Error::Validation(format!(
      "start date {start} is after end date {end}"
    )));
  }
  Ok(())
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  pub fn serialize<T, S>(value: &Option<Option<T>>, ser: S) -> Result<S::Ok, S::Error>
  where
    T: Serialize,
    S: Serializer,
  {
    match value {
      Some(inner) => inner.serialize(ser),
      None => ser.serialize_none(),
    }
  }

  pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
  where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
  {
    Option::<T>::deserialize(de).map(Some)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_distinguishes_absent_from_null() {
    let patch: ProgramPatch =
      serde_json::from_str(r#"{"name":"Reforest","description":null}"#).unwrap();
    assert_eq!(patch.name.as_deref(), Some("Reforest"));
    assert_eq!(patch.description, Some(None));
    assert_eq!(patch.number, None);
  }

  #[test]
  fn date_range_must_be_ordered() {
    let jan = NaiveDate::from_ymd_opt(2026, 1, 1);
    let dec = NaiveDate::from_ymd_opt(2026, 12, 31);
    assert!(check_fields("P", jan, dec).is_ok());
    assert!(matches!(check_fields("P", dec, jan), Err(Error::Validation(_))));
    assert!(matches!(check_fields("  ", None, None), Err(Error::Validation(_))));
  }
}
