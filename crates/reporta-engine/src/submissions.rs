//! The draft → finalized submission lifecycle.

use reporta_core::{
  Error, Result,
  access::Permission,
  actor::Actor,
  diff,
  directory::PeriodId,
  legacy::{self, SubmissionView},
  number,
  program::Program,
  store::ReportStore,
  submission::{
    AutoSave, NewSubmission, NewTarget, StoredSubmission, SubmissionInsert, SubmissionRewrite,
    SubmissionUpdate, SubmissionWrite,
  },
};
use uuid::Uuid;

use crate::{Engine, StorageContext as _, Tracked, programs::with_changes};

impl<S: ReportStore> Engine<S> {
  // ─── Drafts ────────────────────────────────────────────────────────────────

  /// Create the draft submission of one period. Fails if the period already
  /// has a live submission.
  pub async fn create_draft(
    &self,
    actor: &Actor,
    program_id: Uuid,
    input: NewSubmission,
  ) -> Result<SubmissionView> {
    let detail = format!("create draft for program {program_id} period {}", input.period_id);
    let result = self.create_draft_inner(actor, program_id, input).await;
    self.record(actor, "create_draft", detail, &result);
    result
  }

  async fn create_draft_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    input: NewSubmission,
  ) -> Result<SubmissionView> {
    let (program, _) = self
      .authorize(actor, program_id, Permission::can_edit, "edit")
      .await?;
    self.insert_draft(&program, actor, input).await
  }

  async fn insert_draft(
    &self,
    program: &Program,
    actor: &Actor,
    mut input: NewSubmission,
  ) -> Result<SubmissionView> {
    number::fill_target_numbers(program.number.as_deref(), &mut input.targets);
    let period_id = input.period_id;
    let inserted = self
      .store
      .insert_submission(program.program_id, input, actor.user_id)
      .await
      .storage("inserting submission")?;

    match inserted {
      SubmissionInsert::Created(stored) => Ok(legacy::canonicalize(stored)),
      SubmissionInsert::AlreadyExists => Err(Error::Validation(format!(
        "submission already exists for program {} period {period_id}",
        program.program_id
      ))),
    }
  }

  /// Patch the program's most recent submission, whatever its period, or
  /// start one if the program has none yet.
  pub async fn auto_save(
    &self,
    actor: &Actor,
    program_id: Uuid,
    input: AutoSave,
  ) -> Result<Tracked<SubmissionView>> {
    let detail = format!("auto-save program {program_id}");
    let result = self.auto_save_inner(actor, program_id, input).await;
    self.record(actor, "auto_save", with_changes(detail, &result), &result);
    result
  }

  async fn auto_save_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    input: AutoSave,
  ) -> Result<Tracked<SubmissionView>> {
    let (program, _) = self
      .authorize(actor, program_id, Permission::can_edit, "edit")
      .await?;
    let before = self.capture(&program).await?;

    let latest = self
      .store
      .latest_submission(program_id)
      .await
      .storage("reading latest submission")?;

    let view = match latest {
      Some(stored) => {
        stored.submission.ensure_editable()?;
        let rewrite = SubmissionRewrite {
          fields:  stored.submission.fields.merged(&input.fields),
          targets: input
            .targets
            .map(|targets| numbered(&program, targets)),
        };
        self.rewrite(stored, rewrite).await?
      }
      None => {
        let period_id = match input.period_id {
          Some(id) => id,
          None => self.fallback_period().await?,
        };
        let draft = NewSubmission {
          period_id,
          fields: input.fields,
          targets: input.targets.unwrap_or_default(),
        };
        self.insert_draft(&program, actor, draft).await?
      }
    };

    let after = self.capture(&program).await?;
    Ok(Tracked { value: view, changes: diff::diff(&before, &after) })
  }

  /// Replace the content of one period's submission: fields are overwritten
  /// and the target list is deleted and reinserted.
  pub async fn update_submission(
    &self,
    actor: &Actor,
    program_id: Uuid,
    period_id: PeriodId,
    input: SubmissionUpdate,
  ) -> Result<Tracked<SubmissionView>> {
    let detail = format!("update submission of program {program_id} period {period_id}");
    let result = self
      .update_submission_inner(actor, program_id, period_id, input)
      .await;
    self.record(actor, "update_submission", with_changes(detail, &result), &result);
    result
  }

  async fn update_submission_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    period_id: PeriodId,
    input: SubmissionUpdate,
  ) -> Result<Tracked<SubmissionView>> {
    let (program, _) = self
      .authorize(actor, program_id, Permission::can_edit, "edit")
      .await?;
    let stored = self.current(program_id, period_id).await?;
    stored.submission.ensure_editable()?;

    // Both sides are captured around this period's submission, which need
    // not be the program's latest.
    let before = legacy::canonicalize(stored.clone());
    let before = self.capture_with(&program, Some(&before)).await?;
    let rewrite = SubmissionRewrite {
      fields:  input.fields,
      targets: Some(numbered(&program, input.targets)),
    };
    let view = self.rewrite(stored, rewrite).await?;
    let after = self.capture_with(&program, Some(&view)).await?;

    Ok(Tracked { value: view, changes: diff::diff(&before, &after) })
  }

  // ─── State transitions ─────────────────────────────────────────────────────

  /// Draft → Finalized. Finalizing twice is an error.
  pub async fn finalize(&self, actor: &Actor, submission_id: Uuid) -> Result<SubmissionView> {
    let detail = format!("finalize submission {submission_id}");
    let result = self.finalize_inner(actor, submission_id).await;
    self.record(actor, "finalize", detail, &result);
    result
  }

  async fn finalize_inner(&self, actor: &Actor, submission_id: Uuid) -> Result<SubmissionView> {
    let stored = self.submission(submission_id).await?;
    self
      .authorize(actor, stored.submission.program_id, Permission::can_edit, "edit")
      .await?;

    let finalized = self
      .store
      .finalize_submission(submission_id)
      .await
      .storage("finalizing submission")?;
    if !finalized {
      return Err(Error::Validation("submission already finalized".into()));
    }
    Ok(legacy::canonicalize(self.submission(submission_id).await?))
  }

  /// Finalized → Draft. Owners and administrators only.
  pub async fn reopen(&self, actor: &Actor, submission_id: Uuid) -> Result<SubmissionView> {
    let detail = format!("reopen submission {submission_id}");
    let result = self.reopen_inner(actor, submission_id).await;
    self.record(actor, "reopen", detail, &result);
    result
  }

  async fn reopen_inner(&self, actor: &Actor, submission_id: Uuid) -> Result<SubmissionView> {
    let stored = self.submission(submission_id).await?;
    self
      .authorize(actor, stored.submission.program_id, Permission::is_owner, "owner")
      .await?;

    let reopened = self
      .store
      .reopen_submission(submission_id)
      .await
      .storage("reopening submission")?;
    if !reopened {
      return Err(Error::Validation("submission is not finalized".into()));
    }
    Ok(legacy::canonicalize(self.submission(submission_id).await?))
  }

  // ─── Reads ─────────────────────────────────────────────────────────────────

  /// The canonical submission of one period.
  pub async fn read_submission(
    &self,
    actor: &Actor,
    program_id: Uuid,
    period_id: PeriodId,
  ) -> Result<SubmissionView> {
    self
      .authorize(actor, program_id, Permission::can_view, "view")
      .await?;
    Ok(legacy::canonicalize(self.current(program_id, period_id).await?))
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  async fn submission(&self, submission_id: Uuid) -> Result<StoredSubmission> {
    self
      .store
      .get_submission(submission_id)
      .await
      .storage("reading submission")?
      .ok_or_else(|| Error::NotFound(format!("submission {submission_id}")))
  }

  async fn current(&self, program_id: Uuid, period_id: PeriodId) -> Result<StoredSubmission> {
    self
      .store
      .current_submission(program_id, period_id)
      .await
      .storage("reading submission")?
      .ok_or_else(|| {
        Error::NotFound(format!("submission for program {program_id} period {period_id}"))
      })
  }

  async fn rewrite(
    &self,
    stored: StoredSubmission,
    rewrite: SubmissionRewrite,
  ) -> Result<SubmissionView> {
    let id = stored.submission.submission_id;
    let written = self
      .store
      .rewrite_submission(id, rewrite)
      .await
      .storage("rewriting submission")?;
    match written {
      SubmissionWrite::Rewritten(rewritten) => Ok(legacy::canonicalize(rewritten)),
      SubmissionWrite::Finalized => Err(Error::Validation(format!(
        "submission {id} was finalized before the edit was saved"
      ))),
    }
  }

  /// The open period, or the configured fallback when none is open.
  async fn fallback_period(&self) -> Result<PeriodId> {
    let open = self
      .store
      .open_period()
      .await
      .storage("reading open period")?;
    Ok(match open {
      Some(period) => period.period_id,
      None => {
        tracing::debug!(
          period = %self.config.fallback_period_id,
          "no open period, using configured fallback"
        );
        self.config.fallback_period_id
      }
    })
  }
}

fn numbered(program: &Program, mut targets: Vec<NewTarget>) -> Vec<NewTarget> {
  number::fill_target_numbers(program.number.as_deref(), &mut targets);
  targets
}
