use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::user::{Role, UserId};

/// The closed set of opaque command classes the executor knows how to
/// validate, rate-limit, and spawn (spec §4.1 "Command-class
/// whitelist"). Each variant names a slot in the descriptor registry
/// built in `wharf_core::executor::registry`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommandClass {
  ServerList,
  ServerInspect,
  ServerEnable,
  ServerDisable,
  CatalogShow,
  ConfigRead,
  ConfigWrite,
  ContainerCreate,
  ContainerAction,
  ContainerLogs,
  ContainerStats,
  ContainerExec,
  GatewayRun,
  GatewayStop,
  GatewayStatus,
  DockerInspect,
}

impl CommandClass {
  /// Minimum role required to admit a request of this class (spec
  /// §4.1 descriptor field "a").
  pub fn min_role(&self) -> Role {
    match self {
      CommandClass::ServerList
      | CommandClass::ServerInspect
      | CommandClass::CatalogShow
      | CommandClass::ConfigRead
      | CommandClass::ContainerLogs
      | CommandClass::ContainerStats
      | CommandClass::GatewayStatus
      | CommandClass::DockerInspect => Role::Viewer,
      CommandClass::ServerEnable
      | CommandClass::ServerDisable
      | CommandClass::ContainerAction
      | CommandClass::ContainerExec => Role::Member,
      CommandClass::ContainerCreate
      | CommandClass::ConfigWrite
      | CommandClass::GatewayRun
      | CommandClass::GatewayStop => Role::Admin,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
  pub request_id: Uuid,
  pub user_id: UserId,
  pub command: CommandClass,
  pub args: Vec<String>,
  #[serde(default)]
  pub input: Option<Vec<u8>>,
  #[serde(default)]
  pub env_overrides: BTreeMap<String, String>,
  /// Milliseconds. `None` uses the class default.
  #[serde(default)]
  pub timeout_ms: Option<u64>,
  #[serde(default)]
  pub stream_output: bool,
  #[serde(default)]
  pub json_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
  pub request_id: Uuid,
  pub exit_code: Option<i32>,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
  pub duration_ms: u64,
  /// `true` iff exit code 0 AND no timeout AND the validator admitted
  /// the request (data model invariant on `ExecutionResult`).
  pub success: bool,
  pub truncated: bool,
  #[serde(default)]
  pub structured_error: Option<String>,
}

/// The terminal states of one request's lifecycle (spec §4.1 state
/// machine). Every terminal state emits exactly one audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTerminal {
  Completed,
  TimedOut,
  Killed,
  Rejected,
  Fatal,
}
