use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::ClientFingerprint;
use super::user::{TenantId, UserId};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
  ExecutionAccepted,
  ExecutionRejected,
  ExecutionRateLimited,
  ExecutionCompleted,
  ExecutionTimedOut,
  ExecutionKilled,
  ExecutionFatal,
  BulkOperation,
  AuthSuccess,
  AuthFailure,
  CatalogMutated,
  HubReaperSweep,
  AuditQueueOverflow,
}

/// An actor is either a real user or the service itself (data model
/// `AuditRecord.actor`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
  User(UserId),
  System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
  pub id: Uuid,
  pub timestamp: i64,
  pub tenant_id: TenantId,
  pub actor: Actor,
  pub event_kind: AuditEventKind,
  pub resource_type: String,
  pub resource_id: String,
  pub severity: Severity,
  pub details: serde_json::Value,
  #[serde(default)]
  pub fingerprint: Option<ClientFingerprint>,
  #[serde(default)]
  pub request_id: Option<Uuid>,
}
