//! The `ReportStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `reporta-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.
//! Every multi-row write is a single transaction on the backend side.

use std::future::Future;

use uuid::Uuid;

use crate::{
  actor::Actor,
  assignment::{
    AgencyAssignment, AgencyAssignmentEntry, AgencyRole, AgencyWrite, AssignmentState,
    UserAssignment, UserAssignmentEntry, UserRole,
  },
  directory::{
    Agency, AgencyId, Initiative, InitiativeId, OutcomeId, Period, PeriodId, User, UserId,
  },
  program::{NewProgram, Program},
  submission::{
    NewSubmission, StoredSubmission, SubmissionInsert, SubmissionRewrite, SubmissionWrite,
  },
};

/// Input to [`ReportStore::put_agency_assignment`].
#[derive(Debug, Clone)]
pub struct AgencyGrant {
  pub program_id:  Uuid,
  pub agency_id:   AgencyId,
  pub role:        AgencyRole,
  pub assigned_by: UserId,
  pub notes:       Option<String>,
}

/// Input to [`ReportStore::put_user_assignment`].
#[derive(Debug, Clone)]
pub struct UserGrant {
  pub program_id:  Uuid,
  pub user_id:     UserId,
  pub role:        UserRole,
  pub assigned_by: UserId,
}

/// Abstraction over a Reporta store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ReportStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reference directory ───────────────────────────────────────────────

  fn put_agency(
    &self,
    agency: Agency,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_agency(
    &self,
    id: AgencyId,
  ) -> impl Future<Output = Result<Option<Agency>, Self::Error>> + Send + '_;

  fn put_user(&self, user: User) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn put_period(
    &self,
    period: Period,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_period(
    &self,
    id: PeriodId,
  ) -> impl Future<Output = Result<Option<Period>, Self::Error>> + Send + '_;

  /// The single period whose status is `open`, if any. When several are
  /// open the lowest id wins.
  fn open_period(&self) -> impl Future<Output = Result<Option<Period>, Self::Error>> + Send + '_;

  fn put_initiative(
    &self,
    initiative: Initiative,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_initiative(
    &self,
    id: InitiativeId,
  ) -> impl Future<Output = Result<Option<Initiative>, Self::Error>> + Send + '_;

  // ── Programs ──────────────────────────────────────────────────────────

  /// Insert a program, an active `owner` assignment for `creator`'s agency
  /// and, when requested, the first draft submission, atomically.
  /// `initial_submission` targets must already be numbered.
  fn create_program(
    &self,
    input: NewProgram,
    creator: Actor,
  ) -> impl Future<Output = Result<(Program, Option<StoredSubmission>), Self::Error>> + Send + '_;

  /// Retrieve a non-deleted program. Returns `None` if absent or deleted.
  fn get_program(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Program>, Self::Error>> + Send + '_;

  /// Persist every mutable column of `program`.
  fn update_program(
    &self,
    program: Program,
  ) -> impl Future<Output = Result<Program, Self::Error>> + Send + '_;

  /// Soft-delete. Returns `false` if the program was absent or already
  /// deleted.
  fn delete_program(&self, id: Uuid) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn program_outcomes(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<OutcomeId>, Self::Error>> + Send + '_;

  /// Replace the linked outcome set.
  fn set_program_outcomes(
    &self,
    id: Uuid,
    outcomes: Vec<OutcomeId>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Agency assignments ────────────────────────────────────────────────

  /// The assignment row for (program, agency) in any state.
  fn agency_assignment(
    &self,
    program_id: Uuid,
    agency_id: AgencyId,
  ) -> impl Future<Output = Result<Option<AgencyAssignment>, Self::Error>> + Send + '_;

  /// Upsert and reactivate. Demoting the last active owner is refused with
  /// [`AgencyWrite::LastOwner`]; the owner count and the write happen under
  /// one write lock.
  fn put_agency_assignment(
    &self,
    grant: AgencyGrant,
  ) -> impl Future<Output = Result<AgencyWrite, Self::Error>> + Send + '_;

  /// Revoke the active assignment unless it is the last active owner.
  fn revoke_agency_assignment(
    &self,
    program_id: Uuid,
    agency_id: AgencyId,
  ) -> impl Future<Output = Result<AgencyWrite, Self::Error>> + Send + '_;

  /// Active assignments, owners first then by agency name.
  fn list_agency_assignments(
    &self,
    program_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AgencyAssignmentEntry>, Self::Error>> + Send + '_;

  fn count_agency_assignments(
    &self,
    program_id: Uuid,
    state: AssignmentState,
    role: Option<AgencyRole>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── User assignments ──────────────────────────────────────────────────

  fn user_assignment(
    &self,
    program_id: Uuid,
    user_id: UserId,
  ) -> impl Future<Output = Result<Option<UserAssignment>, Self::Error>> + Send + '_;

  /// Upsert and reactivate.
  fn put_user_assignment(
    &self,
    grant: UserGrant,
  ) -> impl Future<Output = Result<UserAssignment, Self::Error>> + Send + '_;

  /// Returns `false` if there was no active assignment to revoke.
  fn revoke_user_assignment(
    &self,
    program_id: Uuid,
    user_id: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Active assignments, editors first then by user name.
  fn list_user_assignments(
    &self,
    program_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UserAssignmentEntry>, Self::Error>> + Send + '_;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Insert a draft and its targets unless a non-deleted submission exists
  /// for (program, period); the check and the insert share a transaction.
  fn insert_submission(
    &self,
    program_id: Uuid,
    input: NewSubmission,
    created_by: UserId,
  ) -> impl Future<Output = Result<SubmissionInsert, Self::Error>> + Send + '_;

  fn get_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<StoredSubmission>, Self::Error>> + Send + '_;

  /// The non-deleted submission for (program, period).
  fn current_submission(
    &self,
    program_id: Uuid,
    period_id: PeriodId,
  ) -> impl Future<Output = Result<Option<StoredSubmission>, Self::Error>> + Send + '_;

  /// The most recently created non-deleted submission of any period.
  fn latest_submission(
    &self,
    program_id: Uuid,
  ) -> impl Future<Output = Result<Option<StoredSubmission>, Self::Error>> + Send + '_;

  /// Overwrite the free-text fields and, if given, delete and reinsert the
  /// target list, in one transaction. A new target list also drops any
  /// legacy `content_json` content. Only drafts are written; a finalized
  /// submission yields [`SubmissionWrite::Finalized`]. No version check
  /// between drafts: the last writer wins.
  fn rewrite_submission(
    &self,
    id: Uuid,
    rewrite: SubmissionRewrite,
  ) -> impl Future<Output = Result<SubmissionWrite, Self::Error>> + Send + '_;

  /// Draft → Finalized as a conditional write. Returns `false` if the
  /// submission was not a draft.
  fn finalize_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Finalized → Draft as a conditional write. Returns `false` if the
  /// submission was not finalized.
  fn reopen_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
