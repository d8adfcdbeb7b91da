//! Key + secret credential resolution (spec §9 X1 adapter, "API keys"
//! branch), for service-to-service and CLI callers that don't carry a
//! browser session. Grounded on the teacher's
//! `auth::{auth_api_key_get_user_id, auth_api_key_check_enabled}`: the
//! public `key` is looked up directly, the `secret` is bcrypt-verified
//! against the stored hash, never the other way around.

use wharf_client::{
  entities::user::User,
  error::{AppError, AppResult, ErrorKind},
};

use crate::state;

pub async fn resolve(key: &str, secret: &str) -> AppResult<User> {
  let user = state::repositories()
    .users
    .get_by_api_key(key)
    .await
    .map_err(|e| AppError::new(ErrorKind::Internal, e))?
    .ok_or_else(|| {
      AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("invalid credentials"),
      )
    })?;

  let credential = user
    .api_keys
    .iter()
    .find(|credential| credential.key == key)
    .ok_or_else(|| {
      AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("invalid credentials"),
      )
    })?;

  let verified = bcrypt::verify(secret, &credential.secret_hash)
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

  Ok(user)
}
