//! The identity a request is made under.

use serde::{Deserialize, Serialize};

use crate::directory::{AgencyId, UserId};

/// Opaque identity supplied by the session layer. The engine never issues or
/// verifies these; it only reasons about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id:   UserId,
  pub agency_id: AgencyId,
  #[serde(default)]
  pub is_admin:  bool,
  /// Cross-agency focal user; broadened but not unconditional access.
  #[serde(default)]
  pub is_focal:  bool,
}

impl Actor {
  /// A regular agency user with no overrides.
  pub fn member(user_id: impl Into<UserId>, agency_id: impl Into<AgencyId>) -> Self {
    Self {
      user_id:   user_id.into(),
      agency_id: agency_id.into(),
      is_admin:  false,
      is_focal:  false,
    }
  }

  pub fn admin(mut self) -> Self {
    self.is_admin = true;
    self
  }

  pub fn focal(mut self) -> Self {
    self.is_focal = true;
    self
  }
}
