//! Signs and verifies the JWTs that represent a [`Session`] externally
//! (spec §9 "Sessions & stateful auth": the session itself lives in
//! `SessionRepository`, the JWT is just a bearer token naming it).
//! Shape follows the teacher's `auth::jwt::JwtClient`.

use jsonwebtoken::{
  DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use wharf_client::{
  entities::{config::WharfConfig, session::Session, user::Role},
  error::{AppError, AppResult, ErrorKind, KindContext},
  wharf_timestamp,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
  /// Session id, not user id: looking a session up by id is how
  /// `SessionManager::lookup` checks for revocation.
  pub sid: String,
  pub sub: String,
  pub tenant_id: String,
  pub roles: Vec<Role>,
  pub iat: i64,
  pub exp: i64,
}

pub struct JwtClient {
  header: Header,
  validation: Validation,
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  issuer: String,
  audience: String,
  ttl_secs: u64,
}

impl JwtClient {
  pub fn new(config: &WharfConfig) -> anyhow::Result<Self> {
    let secret = &config.security.jwt_signing_key;
    if secret.is_empty() {
      anyhow::bail!(
        "security.jwt_signing_key must be set (source it via WHARF_JWT_SIGNING_KEY)"
      );
    }
    let mut header = Header::default();
    header.typ = Some("JWT".to_string());

    let mut validation = Validation::default();
    validation.set_issuer(&[&config.security.jwt_issuer]);
    validation.set_audience(&[&config.security.jwt_audience]);

    Ok(Self {
      header,
      validation,
      encoding_key: EncodingKey::from_secret(secret.as_bytes()),
      decoding_key: DecodingKey::from_secret(secret.as_bytes()),
      issuer: config.security.jwt_issuer.clone(),
      audience: config.security.jwt_audience.clone(),
      ttl_secs: config.security.access_ttl_secs,
    })
  }

  pub fn encode(
    &self,
    session: &Session,
    roles: Vec<Role>,
  ) -> AppResult<String> {
    let iat = wharf_timestamp() / 1000;
    let claims = JwtClaims {
      sid: session.id.clone(),
      sub: session.user_id.clone(),
      tenant_id: session.tenant_id.clone(),
      roles,
      iat,
      exp: session.expires_at / 1000,
    };
    encode(&self.header, &claims, &self.encoding_key)
      .kind(ErrorKind::Internal)
  }

  pub fn decode(&self, jwt: &str) -> AppResult<JwtClaims> {
    decode::<JwtClaims>(jwt, &self.decoding_key, &self.validation)
      .map(|data| data.claims)
      .map_err(|e| {
        AppError::new(ErrorKind::Unauthorized, anyhow::anyhow!(e))
      })
  }

  pub fn issuer(&self) -> &str {
    &self.issuer
  }

  pub fn audience(&self) -> &str {
    &self.audience
  }

  pub fn ttl_secs(&self) -> u64 {
    self.ttl_secs
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wharf_client::entities::session::ClientFingerprint;

  fn config() -> WharfConfig {
    let mut config = WharfConfig::default();
    config.security.jwt_signing_key = "test-signing-key".to_string();
    config
  }

  fn session() -> Session {
    Session {
      id: "sess-1".into(),
      user_id: "user-1".into(),
      tenant_id: "tenant-a".into(),
      issued_at: wharf_timestamp(),
      expires_at: wharf_timestamp() + 60_000,
      fingerprint: ClientFingerprint {
        ip: "127.0.0.1".into(),
        user_agent: "test".into(),
      },
      revoked: false,
    }
  }

  #[test]
  fn round_trips_claims() {
    let client = JwtClient::new(&config()).unwrap();
    let jwt = client.encode(&session(), vec![Role::Member]).unwrap();
    let claims = client.decode(&jwt).unwrap();
    assert_eq!(claims.sid, "sess-1");
    assert_eq!(claims.sub, "user-1");
    assert_eq!(claims.roles, vec![Role::Member]);
  }

  #[test]
  fn rejects_tampered_token() {
    let client = JwtClient::new(&config()).unwrap();
    let jwt = client.encode(&session(), vec![Role::Member]).unwrap();
    let mut tampered = jwt;
    tampered.push('x');
    assert!(client.decode(&tampered).is_err());
  }
}
