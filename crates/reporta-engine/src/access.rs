//! Permission checks backed by live assignment state.

use reporta_core::{
  Error, Result,
  access::{self, Grants, Permission},
  actor::Actor,
  assignment::AgencyRole,
  program::Program,
  store::ReportStore,
};
use uuid::Uuid;

use crate::{Engine, StorageContext as _};

impl<S: ReportStore> Engine<S> {
  // ─── Exposed predicates ────────────────────────────────────────────────────

  /// Effective permission of `actor` on a program.
  pub async fn resolve_role(&self, actor: &Actor, program_id: Uuid) -> Result<Permission> {
    let program = self.load_program(program_id).await?;
    self.permission(&program, actor).await
  }

  pub async fn can_view(&self, actor: &Actor, program_id: Uuid) -> Result<bool> {
    Ok(self.resolve_role(actor, program_id).await?.can_view())
  }

  pub async fn can_edit(&self, actor: &Actor, program_id: Uuid) -> Result<bool> {
    Ok(self.resolve_role(actor, program_id).await?.can_edit())
  }

  pub async fn is_owner(&self, actor: &Actor, program_id: Uuid) -> Result<bool> {
    Ok(self.resolve_role(actor, program_id).await?.is_owner())
  }

  // ─── Internal helpers ──────────────────────────────────────────────────────

  pub(crate) async fn load_program(&self, program_id: Uuid) -> Result<Program> {
    self
      .store
      .get_program(program_id)
      .await
      .storage("loading program")?
      .ok_or_else(|| Error::NotFound(format!("program {program_id}")))
  }

  /// Active agency role of `actor`'s own agency on the program.
  pub(crate) async fn agency_role(
    &self,
    program: &Program,
    actor: &Actor,
  ) -> Result<Option<AgencyRole>> {
    Ok(
      self
        .store
        .agency_assignment(program.program_id, actor.agency_id)
        .await
        .storage("reading agency assignment")?
        .filter(|a| a.state.is_active())
        .map(|a| a.role),
    )
  }

  async fn grants(&self, program: &Program, actor: &Actor) -> Result<Grants> {
    let agency_role = self.agency_role(program, actor).await?;

    // The user layer only matters once the agency layer has granted something.
    let user_role = if program.restrict_editors && agency_role.is_some() {
      self
        .store
        .user_assignment(program.program_id, actor.user_id)
        .await
        .storage("reading user assignment")?
        .filter(|a| a.state.is_active())
        .map(|a| a.role)
    } else {
      None
    };

    Ok(Grants { agency_role, user_role })
  }

  pub(crate) async fn permission(&self, program: &Program, actor: &Actor) -> Result<Permission> {
    let grants = if actor.is_admin {
      Grants::default()
    } else {
      self.grants(program, actor).await?
    };
    let permission = access::resolve(program, actor, &grants);
    tracing::debug!(
      program = %program.program_id,
      actor = %actor.user_id,
      %permission,
      "resolved permission"
    );
    Ok(permission)
  }

  /// Load a program and require `check` to hold for the actor's permission.
  pub(crate) async fn authorize(
    &self,
    actor: &Actor,
    program_id: Uuid,
    check: fn(Permission) -> bool,
    needed: &str,
  ) -> Result<(Program, Permission)> {
    let program = self.load_program(program_id).await?;
    let permission = self.permission(&program, actor).await?;
    if !check(permission) {
      return Err(Error::PermissionDenied(format!(
        "user {} needs {needed} access to program {program_id}, has {permission}",
        actor.user_id
      )));
    }
    Ok((program, permission))
  }

  /// Load a program and require the actor to be allowed to manage its
  /// assignments.
  pub(crate) async fn authorize_management(
    &self,
    actor: &Actor,
    program_id: Uuid,
  ) -> Result<Program> {
    let program = self.load_program(program_id).await?;
    let permission = self.permission(&program, actor).await?;
    if !access::can_manage_assignments(actor, permission) {
      return Err(Error::PermissionDenied(format!(
        "user {} may not manage assignments on program {program_id}",
        actor.user_id
      )));
    }
    Ok(program)
  }
}
