//! Agency and user assignment management.

use reporta_core::{
  Error, Result,
  access,
  actor::Actor,
  assignment::{
    AgencyAssignment, AgencyAssignmentEntry, AgencyRole, AgencyWrite, UserAssignment,
    UserAssignmentEntry, UserRole,
  },
  directory::{AgencyId, UserId},
  program::Program,
  store::{AgencyGrant, ReportStore, UserGrant},
};
use uuid::Uuid;

use crate::{Engine, StorageContext as _};

impl<S: ReportStore> Engine<S> {
  // ─── Agencies ──────────────────────────────────────────────────────────────

  /// Give an agency a role on a program, reactivating a revoked row.
  /// Re-assigning the current role changes nothing.
  pub async fn assign_agency(
    &self,
    actor: &Actor,
    program_id: Uuid,
    agency_id: AgencyId,
    role: AgencyRole,
    notes: Option<String>,
  ) -> Result<AgencyAssignment> {
    let detail = format!("assign agency {agency_id} as {role} on program {program_id}");
    let result = self
      .assign_agency_inner(actor, program_id, agency_id, role, notes)
      .await;
    self.record(actor, "assign_agency", detail, &result);
    result
  }

  async fn assign_agency_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    agency_id: AgencyId,
    role: AgencyRole,
    notes: Option<String>,
  ) -> Result<AgencyAssignment> {
    self.authorize_management(actor, program_id).await?;
    let grant = AgencyGrant {
      program_id,
      agency_id,
      role,
      assigned_by: actor.user_id,
      notes: notes.filter(|n| !n.trim().is_empty()),
    };
    let write = self
      .store
      .put_agency_assignment(grant)
      .await
      .storage("writing agency assignment")?;

    match write {
      AgencyWrite::Applied(a) => Ok(a),
      AgencyWrite::Unchanged(a) => {
        tracing::debug!(program = %program_id, agency = %agency_id, "assignment unchanged");
        Ok(a)
      }
      AgencyWrite::LastOwner => Err(last_owner(program_id, agency_id)),
      AgencyWrite::Missing => Err(Error::NotFound(format!(
        "assignment for agency {agency_id} on program {program_id}"
      ))),
    }
  }

  /// Revoke an agency's assignment. The last active owner cannot be removed.
  pub async fn remove_agency(
    &self,
    actor: &Actor,
    program_id: Uuid,
    agency_id: AgencyId,
  ) -> Result<AgencyAssignment> {
    let detail = format!("remove agency {agency_id} from program {program_id}");
    let result = self.remove_agency_inner(actor, program_id, agency_id).await;
    self.record(actor, "remove_agency", detail, &result);
    result
  }

  async fn remove_agency_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    agency_id: AgencyId,
  ) -> Result<AgencyAssignment> {
    self.authorize_management(actor, program_id).await?;
    let write = self
      .store
      .revoke_agency_assignment(program_id, agency_id)
      .await
      .storage("revoking agency assignment")?;

    match write {
      AgencyWrite::Applied(a) | AgencyWrite::Unchanged(a) => Ok(a),
      AgencyWrite::LastOwner => Err(last_owner(program_id, agency_id)),
      AgencyWrite::Missing => Err(Error::NotFound(format!(
        "active assignment for agency {agency_id} on program {program_id}"
      ))),
    }
  }

  /// Active agency assignments, owners first.
  pub async fn list_assigned_agencies(
    &self,
    actor: &Actor,
    program_id: Uuid,
  ) -> Result<Vec<AgencyAssignmentEntry>> {
    self.authorize_listing(actor, program_id).await?;
    self
      .store
      .list_agency_assignments(program_id)
      .await
      .storage("listing agency assignments")
  }

  // ─── Users ─────────────────────────────────────────────────────────────────

  /// Give a user a personal role on a program. The user's agency must
  /// already hold an active assignment.
  pub async fn assign_user(
    &self,
    actor: &Actor,
    program_id: Uuid,
    user_id: UserId,
    role: UserRole,
  ) -> Result<UserAssignment> {
    let detail = format!("assign user {user_id} as {role} on program {program_id}");
    let result = self.assign_user_inner(actor, program_id, user_id, role).await;
    self.record(actor, "assign_user", detail, &result);
    result
  }

  async fn assign_user_inner(
    &self,
    actor: &Actor,
    program_id: Uuid,
    user_id: UserId,
    role: UserRole,
  ) -> Result<UserAssignment> {
    let program = self.authorize_management(actor, program_id).await?;
    self.require_focal_agency_access(&program, actor).await?;

    let user = self
      .store
      .get_user(user_id)
      .await
      .storage("reading user")?
      .ok_or_else(|| Error::NotFound(format!("user {user_id}")))?;
    let agency_active = self
      .store
      .agency_assignment(program_id, user.agency_id)
      .await
      .storage("reading agency assignment")?
      .is_some_and(|a| a.state.is_active());
    if !agency_active {
      return Err(Error::Validation(format!(
        "user's agency lacks access: agency {} has no active assignment on program {program_id}",
        user.agency_id
      )));
    }

    self
      .store
      .put_user_assignment(UserGrant { program_id, user_id, role, assigned_by: actor.user_id })
      .await
      .storage("writing user assignment")
  }

  /// Revoke a user's personal assignment.
  pub async fn remove_user(&self, actor: &Actor, program_id: Uuid, user_id: UserId) -> Result<()> {
    let detail = format!("remove user {user_id} from program {program_id}");
    let result = self.remove_user_inner(actor, program_id, user_id).await;
    self.record(actor, "remove_user", detail, &result);
    result
  }

  async fn remove_user_inner(&self, actor: &Actor, program_id: Uuid, user_id: UserId) -> Result<()> {
    let program = self.authorize_management(actor, program_id).await?;
    self.require_focal_agency_access(&program, actor).await?;
    let revoked = self
      .store
      .revoke_user_assignment(program_id, user_id)
      .await
      .storage("revoking user assignment")?;
    if !revoked {
      return Err(Error::NotFound(format!(
        "active assignment for user {user_id} on program {program_id}"
      )));
    }
    Ok(())
  }

  /// Active user assignments, editors first.
  pub async fn list_assigned_users(
    &self,
    actor: &Actor,
    program_id: Uuid,
  ) -> Result<Vec<UserAssignmentEntry>> {
    self.authorize_listing(actor, program_id).await?;
    self
      .store
      .list_user_assignments(program_id)
      .await
      .storage("listing user assignments")
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  /// Focal users only act on user assignments of programs their own agency
  /// is assigned to.
  async fn require_focal_agency_access(&self, program: &Program, actor: &Actor) -> Result<()> {
    if !actor.is_focal || actor.is_admin {
      return Ok(());
    }
    if self.agency_role(program, actor).await?.is_none() {
      return Err(Error::PermissionDenied(format!(
        "focal user {} has no agency assignment on program {}",
        actor.user_id, program.program_id
      )));
    }
    Ok(())
  }

  /// Listings are open to viewers and to anyone who may manage assignments.
  async fn authorize_listing(&self, actor: &Actor, program_id: Uuid) -> Result<()> {
    let program = self.load_program(program_id).await?;
    let permission = self.permission(&program, actor).await?;
    if permission.can_view() || access::can_manage_assignments(actor, permission) {
      return Ok(());
    }
    Err(Error::PermissionDenied(format!(
      "user {} may not view program {program_id}",
      actor.user_id
    )))
  }
}

fn last_owner(program_id: Uuid, agency_id: AgencyId) -> Error {
  Error::InvariantViolation(format!(
    "agency {agency_id} is the last active owner of program {program_id}"
  ))
}
