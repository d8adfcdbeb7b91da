//! Narrow session capability (spec §9: "the core holds a
//! `SessionManager` capability (issue, lookup, revoke) with a narrow
//! contract — no global singleton for the store"). Every call site
//! constructs one from the process-wide repository/jwt accessors in
//! [`crate::state`]; the struct itself holds no state beyond cheap
//! `Arc`/reference clones, so there is nothing to leak by not caching
//! it globally.

use std::sync::Arc;

use database::SessionRepository;
use uuid::Uuid;
use wharf_client::{
  entities::{session::{ClientFingerprint, Session}, user::User},
  error::{AppError, AppResult, ErrorKind},
  wharf_timestamp,
};

use super::jwt::JwtClient;
use crate::state;

pub struct SessionManager {
  sessions: Arc<dyn SessionRepository>,
  jwt: &'static JwtClient,
}

impl SessionManager {
  pub fn new() -> Self {
    Self {
      sessions: state::repositories().sessions.clone(),
      jwt: state::jwt_client(),
    }
  }

  pub async fn issue(
    &self,
    user: &User,
    fingerprint: ClientFingerprint,
  ) -> AppResult<(Session, String)> {
    let now = wharf_timestamp();
    let session = Session {
      id: Uuid::new_v4().to_string(),
      user_id: user.id.clone(),
      tenant_id: user.tenant_id.clone(),
      issued_at: now,
      expires_at: now + self.jwt.ttl_secs() as i64 * 1000,
      fingerprint,
      revoked: false,
    };
    self
      .sessions
      .insert(session.clone())
      .await
      .map_err(|e| AppError::new(ErrorKind::Internal, e))?;
    let jwt = self.jwt.encode(&session, user.roles.clone())?;
    Ok((session, jwt))
  }

  /// Verifies the JWT signature, then re-checks the session's
  /// liveness against the repository so a revoked session is rejected
  /// even if its JWT has not yet expired.
  pub async fn lookup(&self, jwt: &str) -> AppResult<Session> {
    let claims = self.jwt.decode(jwt)?;
    let session = self
      .sessions
      .get(&claims.sid)
      .await
      .map_err(|e| AppError::new(ErrorKind::Internal, e))?
      .ok_or_else(|| {
        AppError::new(
          ErrorKind::Unauthorized,
          anyhow::anyhow!("session not found"),
        )
      })?;
    if !session.is_valid(wharf_timestamp()) {
      return Err(AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("session revoked or expired"),
      ));
    }
    Ok(session)
  }

  pub async fn revoke(&self, session_id: &str) -> AppResult<()> {
    self
      .sessions
      .revoke(session_id)
      .await
      .map_err(|e| AppError::new(ErrorKind::Internal, e))
  }
}

impl Default for SessionManager {
  fn default() -> Self {
    Self::new()
  }
}
