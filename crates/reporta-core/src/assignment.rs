//! Agency-level and user-level program assignments.
//!
//! Assignments are never deleted. Revocation moves them to
//! [`AssignmentState::Revoked`] so the audit trail survives, and every query
//! filters on the state centrally in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::directory::{AgencyId, UserId};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// Role an agency holds on a program.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgencyRole {
  Owner,
  Editor,
  Viewer,
}

impl AgencyRole {
  /// Presentation rank: owners first.
  pub fn rank(self) -> u8 {
    match self {
      Self::Owner => 0,
      Self::Editor => 1,
      Self::Viewer => 2,
    }
  }
}

/// Role a single user holds on a program. Never `owner`: user assignments
/// only narrow what the user's agency already has.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
  Editor,
  Viewer,
}

impl UserRole {
  pub fn rank(self) -> u8 {
    match self {
      Self::Editor => 1,
      Self::Viewer => 2,
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentState {
  Active,
  Revoked,
}

impl AssignmentState {
  pub fn is_active(self) -> bool { matches!(self, Self::Active) }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Composite-unique per (program, agency).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyAssignment {
  pub program_id:  Uuid,
  pub agency_id:   AgencyId,
  pub role:        AgencyRole,
  pub state:       AssignmentState,
  pub assigned_by: UserId,
  pub notes:       Option<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Composite-unique per (program, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAssignment {
  pub program_id:  Uuid,
  pub user_id:     UserId,
  pub role:        UserRole,
  pub state:       AssignmentState,
  pub assigned_by: UserId,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

// ─── Listing entries ─────────────────────────────────────────────────────────

/// An active agency assignment joined with the agency's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyAssignmentEntry {
  pub agency_name: String,
  #[serde(flatten)]
  pub assignment:  AgencyAssignment,
}

/// An active user assignment joined with the user's directory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAssignmentEntry {
  pub user_name:  String,
  pub agency_id:  AgencyId,
  #[serde(flatten)]
  pub assignment: UserAssignment,
}

/// Order agency entries by role rank (owner, editor, viewer) then by name.
pub fn sort_agency_entries(entries: &mut [AgencyAssignmentEntry]) {
  entries.sort_by(|a, b| {
    a.assignment
      .role
      .rank()
      .cmp(&b.assignment.role.rank())
      .then_with(|| a.agency_name.cmp(&b.agency_name))
  });
}

/// Order user entries by role rank (editor, viewer) then by name.
pub fn sort_user_entries(entries: &mut [UserAssignmentEntry]) {
  entries.sort_by(|a, b| {
    a.assignment
      .role
      .rank()
      .cmp(&b.assignment.role.rank())
      .then_with(|| a.user_name.cmp(&b.user_name))
  });
}

// ─── Write outcomes ──────────────────────────────────────────────────────────

/// Result of an owner-guarded agency assignment write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgencyWrite {
  /// The row was inserted, updated or revoked.
  Applied(AgencyAssignment),
  /// An identical active row already existed; nothing was written.
  Unchanged(AgencyAssignment),
  /// No active row existed for the agency.
  Missing,
  /// The write would leave the program without an active owner.
  LastOwner,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn roles_round_trip_through_strings() {
    assert_eq!(AgencyRole::Owner.as_ref(), "owner");
    assert_eq!(AgencyRole::from_str("viewer").unwrap(), AgencyRole::Viewer);
    assert!(UserRole::from_str("owner").is_err());
  }

  fn entry(name: &str, role: AgencyRole) -> AgencyAssignmentEntry {
    let now = Utc::now();
    AgencyAssignmentEntry {
      agency_name: name.into(),
      assignment:  AgencyAssignment {
        program_id: Uuid::nil(),
        agency_id: AgencyId(0),
        role,
        state: AssignmentState::Active,
        assigned_by: UserId(0),
        notes: None,
        created_at: now,
        updated_at: now,
      },
    }
  }

  #[test]
  fn agency_entries_sort_by_rank_then_name() {
    let mut entries = vec![
      entry("Zeta Works", AgencyRole::Viewer),
      entry("Beta Office", AgencyRole::Editor),
      entry("Alpha Dept", AgencyRole::Viewer),
      entry("Omega Board", AgencyRole::Owner),
    ];
    sort_agency_entries(&mut entries);
    let names: Vec<_> = entries.iter().map(|e| e.agency_name.as_str()).collect();
    assert_eq!(names, ["Omega Board", "Beta Office", "Alpha Dept", "Zeta Works"]);
  }
}
