//! Effective permission resolution.
//!
//! Two independent layers decide what an actor may do with a program: the
//! role their agency holds, and (when the program restricts editors) the
//! role they hold personally. Resolution is a pure function of the program,
//! the actor and the grants read for them; nothing is cached, so a revoked
//! assignment takes effect on the very next check.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{
  actor::Actor,
  assignment::{AgencyRole, UserRole},
  program::Program,
};

/// Effective permission of an actor on a program.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Permission {
  Owner,
  Editor,
  Viewer,
  None,
}

impl Permission {
  pub fn can_view(self) -> bool { !matches!(self, Self::None) }

  pub fn can_edit(self) -> bool { matches!(self, Self::Owner | Self::Editor) }

  pub fn is_owner(self) -> bool { matches!(self, Self::Owner) }
}

impl From<AgencyRole> for Permission {
  fn from(role: AgencyRole) -> Self {
    match role {
      AgencyRole::Owner => Self::Owner,
      AgencyRole::Editor => Self::Editor,
      AgencyRole::Viewer => Self::Viewer,
    }
  }
}

/// Active assignments relevant to one (program, actor) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grants {
  /// Active role of the actor's agency, if any.
  pub agency_role: Option<AgencyRole>,
  /// Active role of the actor personally, if any.
  pub user_role:   Option<UserRole>,
}

/// Resolve the effective permission. First match wins:
///
/// 1. administrators are owners of everything;
/// 2. focal users go through the same agency narrowing as everyone else once
///    their own agency holds an assignment, and get no elevation otherwise;
/// 3. without an active agency assignment there is no access;
/// 4. under `restrict_editors` the user layer narrows the agency role, and a
///    missing user grant leaves the user a viewer.
pub fn resolve(program: &Program, actor: &Actor, grants: &Grants) -> Permission {
  if actor.is_admin {
    return Permission::Owner;
  }

  // Focal users are gated by their own agency's assignment: with one they
  // pass through the same narrowing below, without one they fall through to
  // their literal identity, which has no access either.
  let Some(agency_role) = grants.agency_role else {
    return Permission::None;
  };

  if !program.restrict_editors {
    return agency_role.into();
  }

  match (agency_role, grants.user_role) {
    (AgencyRole::Viewer, _) => Permission::Viewer,
    (_, Some(UserRole::Editor)) => Permission::Editor,
    (_, Some(UserRole::Viewer)) | (_, None) => Permission::Viewer,
  }
}

/// Whether the actor may create, change or revoke assignments on a program.
pub fn can_manage_assignments(actor: &Actor, permission: Permission) -> bool {
  actor.is_admin || actor.is_focal || permission.is_owner()
}
