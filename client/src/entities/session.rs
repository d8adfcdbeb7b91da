use serde::{Deserialize, Serialize};

use super::user::{TenantId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFingerprint {
  pub ip: String,
  pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub id: String,
  pub user_id: UserId,
  pub tenant_id: TenantId,
  pub issued_at: i64,
  pub expires_at: i64,
  pub fingerprint: ClientFingerprint,
  /// Set on explicit logout/invalidation. A revoked session is
  /// rejected by lookup even if `expires_at` has not passed yet.
  pub revoked: bool,
}

impl Session {
  pub fn is_valid(&self, now_ms: i64) -> bool {
    !self.revoked && self.expires_at > now_ms
  }
}
