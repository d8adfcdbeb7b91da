//! HTTP surface for the auth action group (spec §6 "Auth: login_begin,
//! login_complete, logout, refresh"). Thin: every handler extracts a
//! request body (or nothing), derives a [`ClientFingerprint`] from the
//! connection, and delegates to `auth::{oidc,local,session}`.

use std::net::SocketAddr;

use axum::{Json, Router, extract::ConnectInfo, http::HeaderMap, routing::post};
use wharf_client::{
  api::auth::{
    LoginBegin, LoginBeginResponse, LoginComplete, LoginCompleteResponse,
    LoginLocal, Logout, LogoutResponse, Refresh, RefreshResponse,
    SignupLocal, SignupLocalResponse,
  },
  entities::session::ClientFingerprint,
  error::{AppError, AppResult, ErrorKind, KindContext},
};

use crate::{
  auth::{local, oidc, session::SessionManager},
  config::core_config,
  error::ApiError,
};

/// No `auth_request` layer here: every route on this router is the
/// thing that produces the credential `auth_request` would otherwise
/// require.
pub fn router() -> Router {
  Router::new()
    .route("/login/begin", post(login_begin))
    .route("/login/complete", post(login_complete))
    .route("/login/local", post(login_local))
    .route("/signup/local", post(signup_local))
    .route("/logout", post(logout))
    .route("/refresh", post(refresh))
}

fn fingerprint(headers: &HeaderMap, addr: SocketAddr) -> ClientFingerprint {
  let ip = headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .map(str::trim)
    .unwrap_or(&addr.ip().to_string())
    .to_string();
  let user_agent = headers
    .get("user-agent")
    .and_then(|v| v.to_str().ok())
    .unwrap_or("")
    .to_string();
  ClientFingerprint { ip, user_agent }
}

pub async fn login_begin(
  Json(_request): Json<LoginBegin>,
) -> Result<Json<LoginBeginResponse>, ApiError> {
  let auth_url = oidc::login_begin().await?;
  Ok(Json(LoginBeginResponse { auth_url }))
}

pub async fn login_complete(
  headers: HeaderMap,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Json(request): Json<LoginComplete>,
) -> Result<Json<LoginCompleteResponse>, ApiError> {
  let (_user, session_id, jwt) = oidc::login_complete(
    request.code,
    request.state,
    fingerprint(&headers, addr),
  )
  .await?;
  Ok(Json(LoginCompleteResponse { session_id, jwt }))
}

pub async fn login_local(
  headers: HeaderMap,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Json(request): Json<LoginLocal>,
) -> Result<Json<LoginCompleteResponse>, ApiError> {
  let tenant_id = &core_config().identity.tenant_id;
  let (_user, session_id, jwt) = local::login_local(
    tenant_id,
    &request.email,
    &request.password,
    fingerprint(&headers, addr),
  )
  .await?;
  Ok(Json(LoginCompleteResponse { session_id, jwt }))
}

pub async fn signup_local(
  Json(request): Json<SignupLocal>,
) -> Result<Json<SignupLocalResponse>, ApiError> {
  let tenant_id = &core_config().identity.tenant_id;
  let user = local::signup_local(
    tenant_id,
    &request.email,
    &request.password,
    &request.display_name,
  )
  .await?;
  Ok(Json(SignupLocalResponse { user }))
}

/// Revokes the session backing the caller's bearer JWT. Reads the
/// token straight off the `Authorization` header rather than an
/// extension populated by `auth_request`, since API-key callers carry
/// no session to revoke in the first place.
pub async fn logout(
  headers: HeaderMap,
  Json(_request): Json<Logout>,
) -> Result<Json<LogoutResponse>, ApiError> {
  let jwt = headers
    .get("authorization")
    .and_then(|v| v.to_str().ok())
    .map(|v| v.trim_start_matches("Bearer ").trim().to_string())
    .filter(|v| !v.is_empty())
    .ok_or_else(|| {
      AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("missing Authorization bearer token"),
      )
    })?;
  let manager = SessionManager::new();
  let session = manager.lookup(&jwt).await?;
  manager.revoke(&session.id).await?;
  Ok(Json(LogoutResponse {}))
}

/// Exchanges a still-valid JWT for a freshly-minted one without
/// re-authenticating (spec §9 "Sessions"). A true refresh-token grant
/// is out of scope for this spec's X1 adapter; this reissues against
/// the same session row, which is revoked exactly the same way.
pub async fn refresh(
  Json(request): Json<Refresh>,
) -> Result<Json<RefreshResponse>, ApiError> {
  let jwt = reissue(&request.refresh_token).await?;
  Ok(Json(RefreshResponse { jwt }))
}

async fn reissue(jwt: &str) -> AppResult<String> {
  let manager = SessionManager::new();
  let session = manager.lookup(jwt).await?;
  let user = crate::state::repositories()
    .users
    .get(&session.tenant_id, &session.user_id)
    .await
    .kind(ErrorKind::Internal)?
    .ok_or_else(|| {
      wharf_client::error::AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("user no longer exists"),
      )
    })?;
  let (_session, jwt) =
    manager.issue(&user, session.fingerprint.clone()).await?;
  Ok(jwt)
}
