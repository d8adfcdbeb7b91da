use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
  WebSocket,
  Sse,
}

impl ConnectionKind {
  pub fn can_read(&self) -> bool {
    matches!(self, ConnectionKind::WebSocket)
  }

  pub fn can_write_framed(&self) -> bool {
    matches!(self, ConnectionKind::WebSocket)
  }

  pub fn can_write_sse(&self) -> bool {
    matches!(self, ConnectionKind::Sse)
  }
}

/// Well-known channel prefixes (spec §4.4). The hub never interprets
/// channels beyond routing — these are convenience constructors for
/// callers, not a closed enum, since the hub's contract is "opaque
/// string namespace".
pub mod channel {
  pub const SERVERS: &str = "servers";
  pub const GATEWAY: &str = "gateway";
  pub const CATALOGS: &str = "catalogs";
  pub const CONFIG: &str = "config";
  pub const SYSTEM: &str = "system";
  pub const LOGS: &str = "logs";

  pub fn user(user_id: &str) -> String {
    format!("user:{user_id}")
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
  ServerEnabled,
  ServerDisabled,
  ServerStarted,
  ServerStopped,
  ServerRestarted,
  ServerError,
  ServerStatusUpdate,
  GatewayStarted,
  GatewayStopped,
  GatewayRestarted,
  GatewayError,
  GatewayHealthUpdate,
  CatalogSynced,
  CatalogImported,
  CatalogUpdated,
  CatalogError,
  ConfigUpdated,
  ConfigApplied,
  ConfigError,
  SystemAlert,
  SystemMaintenance,
  SystemLog,
  UserConnected,
  UserDisconnected,
  UserNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub id: Uuid,
  #[serde(rename = "type")]
  pub event_type: EventType,
  #[serde(default)]
  pub channel: Option<String>,
  #[serde(default)]
  pub user: Option<UserId>,
  pub data: serde_json::Value,
  #[serde(default)]
  pub metadata: Option<BTreeMap<String, String>>,
  pub timestamp: i64,
  /// Seconds. Consumers may use this to discard stale events; the hub
  /// itself never persists events (data model: "Ephemeral; not
  /// persisted by the core").
  #[serde(default)]
  pub ttl: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
  pub total: usize,
  pub websocket_count: usize,
  pub sse_count: usize,
  pub per_user: BTreeMap<UserId, usize>,
  pub per_channel: BTreeMap<String, usize>,
  pub events_processed: u64,
  pub errors: u64,
}

/// Inbound WebSocket message grammar (spec §4.4).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsInbound {
  Subscribe {
    channel: String,
    #[serde(default)]
    request_id: Option<String>,
  },
  Unsubscribe {
    channel: String,
    #[serde(default)]
    request_id: Option<String>,
  },
  Ping {
    #[serde(default)]
    request_id: Option<String>,
  },
  Command {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    request_id: Option<String>,
  },
}

/// Outbound WebSocket message grammar (spec §4.4).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutbound {
  Event {
    data: Event,
    timestamp: i64,
  },
  Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    timestamp: i64,
  },
  Pong {
    timestamp: i64,
  },
  Error {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    timestamp: i64,
  },
}
