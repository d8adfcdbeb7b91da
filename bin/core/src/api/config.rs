//! HTTP surface for the config action group (spec §6 "Config: read,
//! write"). Both delegate to the executor rather than reading/writing
//! `WharfConfig` directly: the underlying CLI tool owns its own
//! runtime configuration surface, which is a different document than
//! this service's own `WharfConfig` (spec §1 scopes the underlying
//! tool's config out of the core; this only dispatches to it).

use uuid::Uuid;
use axum::{Extension, Json, Router, middleware, routing::post};
use wharf_client::{
  api::config::{ReadConfig, ReadConfigResponse, WriteConfig, WriteConfigResponse},
  entities::{
    execution::{CommandClass, ExecutionRequest},
    realtime::{Event, EventType, channel},
    user::User,
  },
  error::{AppError, ErrorKind, KindContext},
};

use crate::{auth::auth_request, error::ApiError, executor, state};

pub fn router() -> Router {
  Router::new()
    .route("/read", post(read))
    .route("/write", post(write))
    .layer(middleware::from_fn(auth_request))
}

pub async fn read(
  Extension(user): Extension<User>,
  Json(_request): Json<ReadConfig>,
) -> Result<Json<ReadConfigResponse>, ApiError> {
  let execution = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command: CommandClass::ConfigRead,
    args: vec![],
    input: None,
    env_overrides: Default::default(),
    timeout_ms: None,
    stream_output: false,
    json_output: true,
  };
  let result = executor::execute(&user, execution).await?;
  let config = serde_json::from_slice(&result.stdout).kind(ErrorKind::ParseError)?;
  Ok(Json(ReadConfigResponse { config }))
}

pub async fn write(
  Extension(user): Extension<User>,
  Json(request): Json<WriteConfig>,
) -> Result<Json<WriteConfigResponse>, ApiError> {
  let patch_bytes = serde_json::to_vec(&request.patch)
    .map_err(|e| AppError::new(ErrorKind::ValidationError, e))?;
  let execution = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command: CommandClass::ConfigWrite,
    args: vec![],
    input: Some(patch_bytes),
    env_overrides: Default::default(),
    timeout_ms: None,
    stream_output: false,
    json_output: true,
  };
  let result = executor::execute(&user, execution).await?;
  let config = serde_json::from_slice(&result.stdout).kind(ErrorKind::ParseError)?;

  state::realtime_hub().spawn_broadcast_to_channel(
    channel::CONFIG.to_string(),
    Event {
      id: Uuid::new_v4(),
      event_type: EventType::ConfigUpdated,
      channel: Some(channel::CONFIG.to_string()),
      user: Some(user.id.clone()),
      data: serde_json::json!({}),
      metadata: None,
      timestamp: wharf_client::wharf_timestamp(),
      ttl: None,
    },
  );

  Ok(Json(WriteConfigResponse { config }))
}
