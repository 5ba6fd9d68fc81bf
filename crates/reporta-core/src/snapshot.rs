//! Ephemeral, denormalised program views used only for change tracking.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  directory::OutcomeId,
  legacy::{SubmissionView, TargetView},
  program::Program,
};

/// A program, its owning agency's name, its latest submission and its linked
/// outcomes, flattened for diffing. Never stored.
///
/// Dates are kept as text so snapshots captured by other systems can be
/// compared; the tracker normalises them before comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  pub program_id:             Option<Uuid>,
  #[serde(default)]
  pub name:                   String,
  pub number:                 Option<String>,
  pub description:            Option<String>,
  #[serde(default)]
  pub owner_agency:           String,
  pub start_date:             Option<String>,
  pub end_date:               Option<String>,
  pub rating:                 Option<String>,
  pub submission_description: Option<String>,
  pub remarks:                Option<String>,
  #[serde(default)]
  pub outcome_ids:            Vec<OutcomeId>,
  #[serde(default)]
  pub targets:                Vec<TargetView>,
}

impl Snapshot {
  pub fn capture(
    program: &Program,
    owner_agency: &str,
    latest: Option<&SubmissionView>,
    outcome_ids: Vec<OutcomeId>,
  ) -> Self {
    let fields = latest.map(|v| &v.submission.fields);
    Self {
      program_id: Some(program.program_id),
      name: program.name.clone(),
      number: program.number.clone(),
      description: program.description.clone(),
      owner_agency: owner_agency.to_owned(),
      start_date: program.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
      end_date: program.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
      rating: fields.and_then(|f| f.rating.clone()),
      submission_description: fields.and_then(|f| f.description.clone()),
      remarks: fields.and_then(|f| f.remarks.clone()),
      outcome_ids,
      targets: latest.map(|v| v.targets.clone()).unwrap_or_default(),
    }
  }
}
