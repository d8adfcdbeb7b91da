use serde::{Deserialize, Serialize};

use crate::entities::{bulk::BulkJob, container::ContainerShadow};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListServers {
  #[serde(default)]
  pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListServersResponse {
  pub servers: Vec<ContainerShadow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectServer {
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableServer {
  pub base_catalog_id: String,
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableServer {
  pub base_catalog_id: String,
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerActionRequest {
  pub target: String,
  pub action: crate::entities::bulk::BulkAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkActionRequest {
  pub action: crate::entities::bulk::BulkAction,
  pub targets: Vec<String>,
  #[serde(default)]
  pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkActionResponse {
  pub job: BulkJob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLogs {
  pub target: String,
  #[serde(default)]
  pub since: Option<i64>,
  #[serde(default)]
  pub tail: Option<usize>,
  #[serde(default)]
  pub follow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStats {
  pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecInContainer {
  pub target: String,
  pub argv: Vec<String>,
  #[serde(default)]
  pub timeout_ms: Option<u64>,
}
