//! Engine configuration.

use reporta_core::directory::PeriodId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Period used by auto-save when a program has no submission yet, no
  /// period was given and no period is open.
  #[serde(default = "default_fallback_period")]
  pub fallback_period_id: PeriodId,
}

fn default_fallback_period() -> PeriodId { PeriodId(1) }

impl Default for EngineConfig {
  fn default() -> Self { Self { fallback_period_id: default_fallback_period() } }
}
