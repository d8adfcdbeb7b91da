use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::user::UserId;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
  Start,
  Stop,
  Restart,
  Pause,
  Unpause,
  Kill,
  Remove,
  Update,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
  pub target_id: String,
  pub action: BulkAction,
  pub success: bool,
  #[serde(default)]
  pub error: Option<String>,
  pub duration_ms: u64,
  pub timestamp: i64,
  pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkJob {
  pub id: Uuid,
  pub user_id: UserId,
  pub action: BulkAction,
  pub target_ids: Vec<String>,
  /// Indexed identically to `target_ids` (testable property 6).
  pub results: Vec<ActionResult>,
  pub total: usize,
  pub success_count: usize,
  pub failure_count: usize,
  pub elapsed_ms: u64,
  pub started_at: i64,
}
