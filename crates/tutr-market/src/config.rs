//! Service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
  /// Upper bound on every individual store call, in milliseconds.
  pub op_timeout_ms:  u64,
  /// Also replicate sessions to the global `sessions` list.
  pub global_replica: bool,
}

impl Default for MarketConfig {
  fn default() -> Self {
    Self { op_timeout_ms: 10_000, global_replica: true }
  }
}

impl MarketConfig {
  pub fn op_timeout(&self) -> Duration { Duration::from_millis(self.op_timeout_ms) }
}
