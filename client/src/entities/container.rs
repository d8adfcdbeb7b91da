use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
  Created,
  Running,
  Paused,
  Restarting,
  Removing,
  Exited,
  Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerHealth {
  Healthy,
  Unhealthy,
  Starting,
  None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
  #[serde(default)]
  pub cpu_shares: Option<u64>,
  #[serde(default)]
  pub memory_bytes: Option<u64>,
}

/// A service-kept shadow of an externally-owned (runtime) container.
/// The runtime remains authoritative; this is a fast read-back record
/// refreshed by state-refresh reads (data model "Containers (shadow)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerShadow {
  /// The runtime's own id for this container.
  pub id: String,
  pub name: String,
  pub image: String,
  /// The server (catalog entry) this container was declared by, if any.
  #[serde(default)]
  pub declared_by_server: Option<String>,
  pub owner_user_id: UserId,
  pub state: ContainerState,
  pub health: ContainerHealth,
  #[serde(default)]
  pub last_start_ts: Option<i64>,
  #[serde(default)]
  pub last_exit_ts: Option<i64>,
  #[serde(default)]
  pub resource_limits: ResourceLimits,
  #[serde(default)]
  pub labels: BTreeMap<String, String>,
  /// Whether this service created the container (vs. one discovered
  /// on the runtime that predates it).
  pub is_managed: bool,
  pub updated_at: i64,
}
