//! HTTP surface for the gateway action group (spec §6 "Gateway
//! (underlying tool): start, stop, status"). All three are single
//! executor calls; `status` additionally decodes the CLI's JSON output
//! into a closed [`GatewayState`] rather than handing raw text back.

use uuid::Uuid;
use axum::{Extension, Json, Router, middleware, routing::post};
use wharf_client::{
  api::gateway::{
    GatewayStart, GatewayState, GatewayStatus, GatewayStatusResponse,
    GatewayStop,
  },
  entities::{
    execution::{CommandClass, ExecutionRequest},
    realtime::{Event, EventType, channel},
    user::User,
  },
  error::AppResult,
};

use crate::{auth::auth_request, error::ApiError, executor, state};

pub fn router() -> Router {
  Router::new()
    .route("/start", post(start))
    .route("/stop", post(stop))
    .route("/status", post(status))
    .layer(middleware::from_fn(auth_request))
}

async fn run(
  user: &User,
  command: CommandClass,
  json_output: bool,
) -> AppResult<wharf_client::entities::execution::ExecutionResult> {
  let request = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command,
    args: vec![],
    input: None,
    env_overrides: Default::default(),
    timeout_ms: None,
    stream_output: false,
    json_output,
  };
  executor::execute(user, request).await
}

fn broadcast(user: &User, event_type: EventType) {
  state::realtime_hub().spawn_broadcast_to_channel(
    channel::GATEWAY.to_string(),
    Event {
      id: Uuid::new_v4(),
      event_type,
      channel: Some(channel::GATEWAY.to_string()),
      user: Some(user.id.clone()),
      data: serde_json::json!({}),
      metadata: None,
      timestamp: wharf_client::wharf_timestamp(),
      ttl: None,
    },
  );
}

pub async fn start(
  Extension(user): Extension<User>,
  Json(_request): Json<GatewayStart>,
) -> Result<Json<()>, ApiError> {
  run(&user, CommandClass::GatewayRun, false).await?;
  broadcast(&user, EventType::GatewayStarted);
  Ok(Json(()))
}

pub async fn stop(
  Extension(user): Extension<User>,
  Json(_request): Json<GatewayStop>,
) -> Result<Json<()>, ApiError> {
  run(&user, CommandClass::GatewayStop, false).await?;
  broadcast(&user, EventType::GatewayStopped);
  Ok(Json(()))
}

pub async fn status(
  Extension(user): Extension<User>,
  Json(_request): Json<GatewayStatus>,
) -> Result<Json<GatewayStatusResponse>, ApiError> {
  let result = run(&user, CommandClass::GatewayStatus, true).await?;
  let state = parse_state(&result.stdout);
  Ok(Json(GatewayStatusResponse {
    state,
    detail: (!result.stderr.is_empty())
      .then(|| String::from_utf8_lossy(&result.stderr).into_owned()),
  }))
}

/// Decodes the gateway CLI's status JSON into the closed
/// [`GatewayState`] enum. Anything that doesn't parse as the expected
/// shape is reported as `Unknown` rather than surfaced as a hard
/// failure — the gateway being unreachable is itself a status, not an
/// executor error (the executor call already succeeded; this is
/// purely about interpreting its payload).
fn parse_state(stdout: &[u8]) -> GatewayState {
  #[derive(serde::Deserialize)]
  struct Raw {
    running: Option<bool>,
  }
  match serde_json::from_slice::<Raw>(stdout) {
    Ok(Raw { running: Some(true) }) => GatewayState::Running,
    Ok(Raw { running: Some(false) }) => GatewayState::Stopped,
    _ => GatewayState::Unknown,
  }
}
