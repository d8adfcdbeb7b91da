//! Username/password auth (spec §9's X1 adapter, "Local auth" branch).
//! Grounded on the teacher's `auth::local::{sign_up_local_user,
//! login_local_user}`; passwords are bcrypt-hashed, never logged, and
//! never round-trip through `User` (see `password_hash`'s
//! `skip_serializing`).

use database::UserRepository;
use uuid::Uuid;
use validations::StringValidator;
use wharf_client::{
  entities::{session::ClientFingerprint, user::{Role, User}},
  error::{AppError, AppResult, ErrorKind, KindContext},
  wharf_timestamp,
};

use super::session::SessionManager;
use crate::state;

fn validate_email(email: &str) -> AppResult<()> {
  StringValidator::default()
    .min_length(3)
    .max_length(320)
    .validate(email)
    .map_err(|e| AppError::new(ErrorKind::ValidationError, e))
}

fn validate_password(password: &str) -> AppResult<()> {
  StringValidator::default()
    .min_length(8)
    .max_length(256)
    .skip_control_check()
    .validate(password)
    .map_err(|e| AppError::new(ErrorKind::ValidationError, e))
}

pub async fn signup_local(
  tenant_id: &str,
  email: &str,
  password: &str,
  display_name: &str,
) -> AppResult<User> {
  validate_email(email)?;
  validate_password(password)?;

  let users = &state::repositories().users;
  if users
    .get_by_email(tenant_id, email)
    .await
    .kind(ErrorKind::Internal)?
    .is_some()
  {
    return Err(AppError::new(
      ErrorKind::ValidationError,
      anyhow::anyhow!("email already registered"),
    ));
  }

  let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
    .kind(ErrorKind::Internal)?;

  let user = User {
    id: Uuid::new_v4().to_string(),
    email: email.to_string(),
    display_name: display_name.to_string(),
    tenant_id: tenant_id.to_string(),
    roles: vec![Role::Member],
    enabled: true,
    created_at: wharf_timestamp(),
    password_hash: Some(password_hash),
    api_keys: Vec::new(),
  };

  users.upsert(user.clone()).await.kind(ErrorKind::Internal)?;
  Ok(user)
}

pub async fn login_local(
  tenant_id: &str,
  email: &str,
  password: &str,
  fingerprint: ClientFingerprint,
) -> AppResult<(User, String, String)> {
  validate_email(email)?;

  let users = &state::repositories().users;
  let user = users
    .get_by_email(tenant_id, email)
    .await
    .kind(ErrorKind::Internal)?
    .ok_or_else(|| {
      AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("invalid credentials"),
      )
    })?;

  let Some(hash) = &user.password_hash else {
    return Err(AppError::new(
      ErrorKind::Unauthorized,
      anyhow::anyhow!(
        "user was created via identity-provider login, not local auth"
      ),
    ));
  };

  let verified = bcrypt::verify(password, hash)
    .map_err(|_| {
      AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("invalid credentials"),
      )
    })?;
  if !verified {
    return Err(AppError::new(
      ErrorKind::Unauthorized,
      anyhow::anyhow!("invalid credentials"),
    ));
  }
  if !user.enabled {
    return Err(AppError::new(
      ErrorKind::Unauthorized,
      anyhow::anyhow!("user is disabled"),
    ));
  }

  let (session, jwt) =
    SessionManager::new().issue(&user, fingerprint).await?;
  Ok((user, session.id, jwt))
}
