//! Reference records owned by other parts of the platform.
//!
//! Agencies, users, reporting periods and initiatives are managed outside
//! this engine; the store keeps a copy so that listings can be ordered by
//! name and decisions can be made without calling back out.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

macro_rules! integer_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<i64> for $name {
      fn from(v: i64) -> Self { Self(v) }
    }
  };
}

integer_id!(
  /// A tenant organisation.
  AgencyId
);
integer_id!(UserId);
integer_id!(
  /// A reporting period (e.g. a quarter).
  PeriodId
);
integer_id!(InitiativeId);
integer_id!(
  /// An outcome indicator a program can be linked to.
  OutcomeId
);

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
  pub agency_id: AgencyId,
  pub name:      String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:   UserId,
  pub agency_id: AgencyId,
  pub username:  String,
  pub full_name: Option<String>,
}

impl User {
  /// Name used when ordering assignment listings.
  pub fn display_name(&self) -> &str {
    self.full_name.as_deref().unwrap_or(&self.username)
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PeriodStatus {
  Open,
  Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
  pub period_id: PeriodId,
  /// Human label such as `"Q1 2026"`.
  pub label:     String,
  pub status:    PeriodStatus,
}

/// A grouping of programs; its number prefixes the numbers of its programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiative {
  pub initiative_id: InitiativeId,
  pub number:        String,
  pub name:          String,
}
