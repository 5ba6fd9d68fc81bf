//! Program lifecycle, outcome links and snapshots.

use reporta_core::{
  Error, Result,
  access::Permission,
  actor::Actor,
  diff::{self, ChangeRecord},
  directory::{InitiativeId, OutcomeId},
  legacy::{self, SubmissionView},
  number,
  program::{self, NewProgram, Program, ProgramPatch},
  sink::ProgramCreated,
  snapshot::Snapshot,
  store::ReportStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{Engine, StorageContext as _, Tracked};

/// A newly created program and its first submission, if one was requested.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedProgram {
  pub program:    Program,
  pub submission: Option<SubmissionView>,
}

impl<S: ReportStore> Engine<S> {
  // ─── Creation and update ───────────────────────────────────────────────────

  /// Create a program owned by the actor's agency. The owner assignment and
  /// the optional first draft are written in the same transaction.
  pub async fn create_program(
    &self,
    actor: &Actor,
    input: NewProgram,
  ) -> Result<CreatedProgram> {
    let detail = format!("create program {:?} for agency {}", input.name, actor.agency_id);
    let result = self.create_program_inner(actor, input).await;
    self.record(actor, "create_program", detail, &result);
    result
  }

  async fn create_program_inner(
    &self,
    actor: &Actor,
    mut input: NewProgram,
  ) -> Result<CreatedProgram> {
    input.name = input.name.trim().to_owned();
    input.number = normalize_number(input.number);
    program::check_fields(&input.name, input.start_date, input.end_date)?;
    self
      .check_program_number(input.number.as_deref(), input.initiative_id)
      .await?;

    if let Some(first) = input.initial_submission.as_mut() {
      number::fill_target_numbers(input.number.as_deref(), &mut first.targets);
    }

    let (program, submission) = self
      .store
      .create_program(input, *actor)
      .await
      .storage("creating program")?;

    let event = ProgramCreated {
      program:    &program,
      actor,
      submission: submission.as_ref().map(|s| &s.submission),
    };
    if let Err(e) = self.notifier.notify_program_created(&event) {
      tracing::warn!(program = %program.program_id, error = %e, "program notification failed");
    }

    Ok(CreatedProgram { program, submission: submission.map(legacy::canonicalize) })
  }

  /// Apply a partial update. Changing `restrict_editors` requires ownership.
  pub async fn update_program(
    &self,
    actor: &Actor,
    program_id: Uuid,
    patch: ProgramPatch,
  ) -> Result<Tracked<Program>> {
    let detail = format!("update program {program_id}");
    let result = self.update_program_inner(actor, program_id, patch).await;
    self.record(actor, "update_program", with_changes(detail, &result), &result);
    result
  }

  async fn update_program_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    mut patch: ProgramPatch,
  ) -> Result<Tracked<Program>> {
    let (program, permission) = self
      .authorize(actor, program_id, Permission::can_edit, "edit")
      .await?;

    if patch
      .restrict_editors
      .is_some_and(|restrict| restrict != program.restrict_editors)
      && !permission.is_owner()
    {
      return Err(Error::PermissionDenied(format!(
        "only an owner may change editor restriction on program {program_id}"
      )));
    }

    if patch.is_empty() {
      return Ok(Tracked { value: program, changes: Vec::new() });
    }

    if let Some(name) = patch.name.as_mut() {
      *name = name.trim().to_owned();
    }
    if let Some(number) = patch.number.take() {
      patch.number = Some(normalize_number(number));
    }
    let next = patch.apply(&program);
    program::check_fields(&next.name, next.start_date, next.end_date)?;
    if patch.number.is_some() || patch.initiative_id.is_some() {
      self
        .check_program_number(next.number.as_deref(), next.initiative_id)
        .await?;
    }

    let before = self.capture(&program).await?;
    let updated = self
      .store
      .update_program(next)
      .await
      .storage("updating program")?;
    let after = self.capture(&updated).await?;

    Ok(Tracked { changes: diff::diff(&before, &after), value: updated })
  }

  /// Soft-delete a program. Administrators only.
  pub async fn delete_program(&self, actor: &Actor, program_id: Uuid) -> Result<()> {
    let detail = format!("delete program {program_id}");
    let result = self.delete_program_inner(actor, program_id).await;
    self.record(actor, "delete_program", detail, &result);
    result
  }

  async fn delete_program_inner(&self, actor: &Actor, program_id: Uuid) -> Result<()> {
    if !actor.is_admin {
      return Err(Error::PermissionDenied("only administrators may delete programs".into()));
    }
    let deleted = self
      .store
      .delete_program(program_id)
      .await
      .storage("deleting program")?;
    if !deleted {
      return Err(Error::NotFound(format!("program {program_id}")));
    }
    Ok(())
  }

  // ─── Outcomes ──────────────────────────────────────────────────────────────

  /// Replace the set of outcomes linked to a program.
  pub async fn link_outcomes(
    &self,
    actor: &Actor,
    program_id: Uuid,
    outcomes: Vec<OutcomeId>,
  ) -> Result<Tracked<Vec<OutcomeId>>> {
    let detail = format!("link {} outcome(s) to program {program_id}", outcomes.len());
    let result = self.link_outcomes_inner(actor, program_id, outcomes).await;
    self.record(actor, "link_outcomes", with_changes(detail, &result), &result);
    result
  }

  async fn link_outcomes_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    mut outcomes: Vec<OutcomeId>,
  ) -> Result<Tracked<Vec<OutcomeId>>> {
    let (program, _) = self
      .authorize(actor, program_id, Permission::can_edit, "edit")
      .await?;
    outcomes.sort_unstable();
    outcomes.dedup();

    let before = self.capture(&program).await?;
    self
      .store
      .set_program_outcomes(program_id, outcomes.clone())
      .await
      .storage("linking outcomes")?;
    let after = self.capture(&program).await?;

    Ok(Tracked { value: outcomes, changes: diff::diff(&before, &after) })
  }

  // ─── Snapshots ─────────────────────────────────────────────────────────────

  /// Current snapshot of a program, for callers that keep their own history.
  pub async fn snapshot(&self, actor: &Actor, program_id: Uuid) -> Result<Snapshot> {
    let (program, _) = self
      .authorize(actor, program_id, Permission::can_view, "view")
      .await?;
    self.capture(&program).await
  }

  /// Compare two snapshots.
  pub fn diff_snapshots(&self, before: &Snapshot, after: &Snapshot) -> Vec<ChangeRecord> {
    diff::diff(before, after)
  }

  /// Validate a program number against an initiative number.
  pub fn validate_number(&self, number: &str, initiative_number: Option<&str>) -> Result<()> {
    number::validate(number, initiative_number)
  }

  pub(crate) async fn capture(&self, program: &Program) -> Result<Snapshot> {
    let latest = self
      .store
      .latest_submission(program.program_id)
      .await
      .storage("reading latest submission")?
      .map(legacy::canonicalize);
    self.capture_with(program, latest.as_ref()).await
  }

  /// Snapshot of the program around a given submission.
  pub(crate) async fn capture_with(
    &self,
    program: &Program,
    submission: Option<&SubmissionView>,
  ) -> Result<Snapshot> {
    let owner_agency = self
      .store
      .get_agency(program.owner_agency_id)
      .await
      .storage("reading owner agency")?
      .map(|a| a.name)
      .unwrap_or_else(|| format!("Agency {}", program.owner_agency_id));
    let outcomes = self
      .store
      .program_outcomes(program.program_id)
      .await
      .storage("reading outcomes")?;

    Ok(Snapshot::capture(program, &owner_agency, submission, outcomes))
  }

  async fn check_program_number(
    &self,
    number: Option<&str>,
    initiative_id: Option<InitiativeId>,
  ) -> Result<()> {
    let initiative = match initiative_id {
      Some(id) => Some(
        self
          .store
          .get_initiative(id)
          .await
          .storage("reading initiative")?
          .ok_or_else(|| Error::NotFound(format!("initiative {id}")))?,
      ),
      None => None,
    };
    number::validate(
      number.unwrap_or_default(),
      initiative.as_ref().map(|i| i.number.as_str()),
    )
  }
}

/// Blank numbers are stored as absent.
fn normalize_number(number: Option<String>) -> Option<String> {
  number
    .map(|n| n.trim().to_owned())
    .filter(|n| !n.is_empty())
}

/// Append the change count of a tracked result to an audit detail.
pub(crate) fn with_changes<T>(detail: String, result: &Result<Tracked<T>>) -> String {
  match result {
    Ok(tracked) => format!("{detail} ({} change(s))", tracked.changes.len()),
    Err(_) => detail,
  }
}
