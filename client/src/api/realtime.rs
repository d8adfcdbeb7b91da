use serde::{Deserialize, Serialize};

use crate::entities::realtime::ConnectionStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConnectionStats {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConnectionStatsResponse {
  pub stats: ConnectionStats,
}
