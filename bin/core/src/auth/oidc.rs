//! OIDC-fronted login (spec §9 X1 adapter, "OIDC auth" branch),
//! generalized from the teacher's per-provider `auth::google`/
//! `auth::github` modules to the one generic `identity` provider named
//! by spec.md §6 — the spec does not name Google/GitHub specifically,
//! so this targets whatever authority `identity.authority` points at.

use std::sync::OnceLock;

use anyhow::Context;
use cache::CloneCache;
use openidconnect::{
  AuthenticationFlow, AuthorizationCode, ClientId, ClientSecret,
  CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge, PkceCodeVerifier,
  RedirectUrl, Scope, TokenResponse,
  core::{CoreClient, CoreProviderMetadata, CoreResponseType},
};
use uuid::Uuid;
use wharf_client::{
  entities::{config::WharfConfig, session::ClientFingerprint, user::{Role, User}},
  error::{AppError, AppResult, ErrorKind},
  wharf_timestamp,
};

use super::session::SessionManager;
use crate::{config::core_config, state};

/// `state` token -> (pkce verifier, nonce, issued-at ms). Entries older
/// than five minutes are rejected even if still present, bounding how
/// long a login_begin URL remains redeemable.
type PendingLogins = CloneCache<String, (String, String, i64)>;

fn pending_logins() -> &'static PendingLogins {
  static PENDING: OnceLock<PendingLogins> = OnceLock::new();
  PENDING.get_or_init(Default::default)
}

const PENDING_LOGIN_TTL_MS: i64 = 5 * 60 * 1000;

async fn oidc_client(config: &WharfConfig) -> AppResult<CoreClient> {
  let identity = &config.identity;
  if !identity.is_configured() {
    return Err(AppError::new(
      ErrorKind::Fatal,
      anyhow::anyhow!("identity provider is not configured"),
    ));
  }

  let http_client = openidconnect::reqwest::ClientBuilder::new()
    .redirect(openidconnect::reqwest::redirect::Policy::none())
    .build()
    .context("failed to build oidc http client")
    .map_err(|e| AppError::new(ErrorKind::Internal, e))?;

  let issuer = IssuerUrl::new(identity.authority.clone())
    .map_err(|e| AppError::new(ErrorKind::Internal, anyhow::anyhow!(e)))?;

  let metadata = CoreProviderMetadata::discover_async(issuer, &http_client)
    .await
    .context("failed to discover oidc provider metadata")
    .map_err(|e| AppError::new(ErrorKind::Internal, e))?;

  let redirect = RedirectUrl::new(identity.redirect_url.clone())
    .map_err(|e| AppError::new(ErrorKind::Internal, anyhow::anyhow!(e)))?;

  Ok(
    CoreClient::from_provider_metadata(
      metadata,
      ClientId::new(identity.client_id.clone()),
      Some(ClientSecret::new(identity.client_secret.clone())),
    )
    .set_redirect_uri(redirect),
  )
}

pub async fn login_begin() -> AppResult<String> {
  let config = core_config();
  let client = oidc_client(config).await?;

  let (pkce_challenge, pkce_verifier) =
    PkceCodeChallenge::new_random_sha256();

  let mut request = client.authorize_url(
    AuthenticationFlow::<CoreResponseType>::AuthorizationCode,
    CsrfToken::new_random,
    Nonce::new_random,
  );
  for scope in &config.identity.scopes {
    request = request.add_scope(Scope::new(scope.clone()));
  }
  let (auth_url, csrf_token, nonce) =
    request.set_pkce_challenge(pkce_challenge).url();

  pending_logins()
    .insert(
      csrf_token.secret().clone(),
      (
        pkce_verifier.secret().clone(),
        nonce.secret().clone(),
        wharf_timestamp(),
      ),
    )
    .await;

  Ok(auth_url.to_string())
}

pub async fn login_complete(
  code: String,
  state: String,
  fingerprint: ClientFingerprint,
) -> AppResult<(User, String, String)> {
  let config = core_config();

  let (verifier, nonce, issued_at) = pending_logins()
    .remove(&state)
    .await
    .ok_or_else(|| {
      AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("unknown or already-consumed login state"),
      )
    })?;
  if wharf_timestamp() - issued_at > PENDING_LOGIN_TTL_MS {
    return Err(AppError::new(
      ErrorKind::Unauthorized,
      anyhow::anyhow!("login state expired"),
    ));
  }

  let client = oidc_client(config).await?;
  let http_client = openidconnect::reqwest::ClientBuilder::new()
    .redirect(openidconnect::reqwest::redirect::Policy::none())
    .build()
    .map_err(|e| AppError::new(ErrorKind::Internal, anyhow::anyhow!(e)))?;

  let token_response = client
    .exchange_code(AuthorizationCode::new(code))
    .map_err(|e| AppError::new(ErrorKind::Unauthorized, anyhow::anyhow!(e)))?
    .set_pkce_verifier(PkceCodeVerifier::new(verifier))
    .request_async(&http_client)
    .await
    .map_err(|e| AppError::new(ErrorKind::Unauthorized, anyhow::anyhow!(e)))?;

  let id_token = token_response.id_token().ok_or_else(|| {
    AppError::new(
      ErrorKind::Unauthorized,
      anyhow::anyhow!("provider did not return an id_token"),
    )
  })?;
  let claims = id_token
    .claims(&client.id_token_verifier(), &Nonce::new(nonce))
    .map_err(|e| AppError::new(ErrorKind::Unauthorized, anyhow::anyhow!(e)))?;

  let email = claims
    .email()
    .map(|e| e.to_string())
    .ok_or_else(|| {
      AppError::new(
        ErrorKind::Unauthorized,
        anyhow::anyhow!("provider did not return an email claim"),
      )
    })?;
  let tenant_id = config.identity.tenant_id.clone();

  let users = &state::repositories().users;
  let user = match users
    .get_by_email(&tenant_id, &email)
    .await
    .map_err(|e| AppError::new(ErrorKind::Internal, e))?
  {
    Some(user) => user,
    None => {
      let no_users_exist = users
        .get_by_email(&tenant_id, &email)
        .await
        .map_err(|e| AppError::new(ErrorKind::Internal, e))?
        .is_none();
      let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        display_name: claims
          .name()
          .and_then(|n| n.get(None))
          .map(|n| n.to_string())
          .unwrap_or_default(),
        tenant_id,
        roles: vec![if no_users_exist { Role::Admin } else { Role::Member }],
        enabled: true,
        created_at: wharf_timestamp(),
        password_hash: None,
        api_keys: Vec::new(),
      };
      users
        .upsert(user.clone())
        .await
        .map_err(|e| AppError::new(ErrorKind::Internal, e))?;
      user
    }
  };

  let (session, jwt) =
    SessionManager::new().issue(&user, fingerprint).await?;
  Ok((user, session.id, jwt))
}
