//! HTTP surface for the servers action group (spec §6 "Servers: list,
//! inspect, enable, disable, bulk_action" and §4.2's single-target
//! action/logs/stats/exec endpoints). `ListServers`/`InspectServer`
//! read [`ContainerShadow`] rows; `EnableServer`/`DisableServer` flip
//! an entry in the caller's catalog overlay; everything else is a
//! single executor call.

use uuid::Uuid;
use axum::{Extension, Json, Router, middleware, routing::post};
use wharf_client::{
  api::servers::{
    BulkActionRequest, BulkActionResponse, DisableServer, EnableServer,
    ExecInContainer, GetLogs, GetStats, InspectServer, ListServers,
    ListServersResponse, ServerActionRequest,
  },
  entities::{
    container::ContainerShadow,
    execution::{CommandClass, ExecutionRequest, ExecutionResult},
    realtime::{Event, EventType, channel},
    user::User,
  },
  error::{AppError, ErrorKind, KindContext},
};

use crate::{
  auth::{auth_request, permission::require_read_container},
  bulk, executor, state,
};

pub fn router() -> Router {
  Router::new()
    .route("/list", post(list_servers))
    .route("/inspect", post(inspect_server))
    .route("/enable", post(enable_server))
    .route("/disable", post(disable_server))
    .route("/action", post(server_action))
    .route("/bulk_action", post(bulk_action))
    .route("/logs", post(get_logs))
    .route("/stats", post(get_stats))
    .route("/exec", post(exec_in_container))
    .layer(middleware::from_fn(auth_request))
}

pub async fn list_servers(
  Extension(user): Extension<User>,
  Json(request): Json<ListServers>,
) -> Result<Json<ListServersResponse>, crate::error::ApiError> {
  let mut servers = state::repositories()
    .container_shadows
    .list_by_owner(&user.tenant_id, &user.id)
    .await
    .kind(ErrorKind::Internal)?;
  if let Some(filter) = &request.filter {
    servers.retain(|s| s.name.contains(filter.as_str()));
  }
  Ok(Json(ListServersResponse { servers }))
}

pub async fn inspect_server(
  Extension(user): Extension<User>,
  Json(request): Json<InspectServer>,
) -> Result<Json<ContainerShadow>, crate::error::ApiError> {
  let shadow = find_by_name(&user, &request.name).await?;
  require_read_container(&user, &shadow)?;
  Ok(Json(shadow))
}

async fn find_by_name(
  user: &User,
  name: &str,
) -> Result<ContainerShadow, crate::error::ApiError> {
  let servers = state::repositories()
    .container_shadows
    .list_by_owner(&user.tenant_id, &user.id)
    .await
    .kind(ErrorKind::Internal)?;
  servers
    .into_iter()
    .find(|s| s.name == name)
    .ok_or_else(|| {
      AppError::new(
        ErrorKind::NotFound,
        anyhow::anyhow!("server {name:?} not found"),
      )
      .into()
    })
}

pub async fn enable_server(
  Extension(user): Extension<User>,
  Json(request): Json<EnableServer>,
) -> Result<Json<()>, crate::error::ApiError> {
  crate::catalog::enable_server(
    &user,
    &request.base_catalog_id,
    &request.name,
  )
  .await?;
  run_server_toggle(&user, &request.name, CommandClass::ServerEnable)
    .await?;
  broadcast_server_event(&user, EventType::ServerEnabled, &request.name);
  Ok(Json(()))
}

pub async fn disable_server(
  Extension(user): Extension<User>,
  Json(request): Json<DisableServer>,
) -> Result<Json<()>, crate::error::ApiError> {
  crate::catalog::disable_server(
    &user,
    &request.base_catalog_id,
    &request.name,
  )
  .await?;
  run_server_toggle(&user, &request.name, CommandClass::ServerDisable)
    .await?;
  broadcast_server_event(&user, EventType::ServerDisabled, &request.name);
  Ok(Json(()))
}

async fn run_server_toggle(
  user: &User,
  name: &str,
  command: CommandClass,
) -> Result<ExecutionResult, crate::error::ApiError> {
  let request = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command,
    args: vec![name.to_string()],
    input: None,
    env_overrides: Default::default(),
    timeout_ms: None,
    stream_output: false,
    json_output: false,
  };
  Ok(executor::execute(user, request).await?)
}

fn broadcast_server_event(user: &User, event_type: EventType, name: &str) {
  state::realtime_hub().spawn_broadcast_to_channel(
    channel::SERVERS.to_string(),
    Event {
      id: Uuid::new_v4(),
      event_type,
      channel: Some(channel::SERVERS.to_string()),
      user: Some(user.id.clone()),
      data: serde_json::json!({ "name": name }),
      metadata: None,
      timestamp: wharf_client::wharf_timestamp(),
      ttl: None,
    },
  );
}

pub async fn server_action(
  Extension(user): Extension<User>,
  Json(request): Json<ServerActionRequest>,
) -> Result<Json<ExecutionResult>, crate::error::ApiError> {
  // Single-target action: spawns the underlying command exactly once,
  // the same class/argv mapping `bulk::run_one` uses for one target of
  // a fan-out, but returning the full `ExecutionResult` rather than a
  // reduced `ActionResult` since there is only one target here.
  let command = match request.action {
    wharf_client::entities::bulk::BulkAction::Update => {
      CommandClass::ContainerCreate
    }
    _ => CommandClass::ContainerAction,
  };
  let args = match request.action {
    wharf_client::entities::bulk::BulkAction::Update => {
      vec![request.target.clone()]
    }
    _ => vec![request.target.clone(), request.action.to_string()],
  };
  let execution = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command,
    args,
    input: None,
    env_overrides: Default::default(),
    timeout_ms: None,
    stream_output: false,
    json_output: false,
  };
  let result = executor::execute(&user, execution).await?;
  Ok(Json(result))
}

pub async fn bulk_action(
  Extension(user): Extension<User>,
  Json(request): Json<BulkActionRequest>,
) -> Result<Json<BulkActionResponse>, crate::error::ApiError> {
  let job = bulk::run(
    &user,
    request,
    tokio_util::sync::CancellationToken::new(),
  )
  .await?;
  Ok(Json(BulkActionResponse { job }))
}

pub async fn get_logs(
  Extension(user): Extension<User>,
  Json(request): Json<GetLogs>,
) -> Result<Json<ExecutionResult>, crate::error::ApiError> {
  let mut args = vec![request.target];
  if let Some(since) = request.since {
    args.push(format!("--since={since}"));
  }
  if let Some(tail) = request.tail {
    args.push(format!("--tail={tail}"));
  }
  if request.follow {
    args.push("--follow".to_string());
  }
  let execution = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command: CommandClass::ContainerLogs,
    args,
    input: None,
    env_overrides: Default::default(),
    timeout_ms: None,
    stream_output: false,
    json_output: false,
  };
  let result = executor::execute(&user, execution).await?;
  Ok(Json(result))
}

pub async fn get_stats(
  Extension(user): Extension<User>,
  Json(request): Json<GetStats>,
) -> Result<Json<serde_json::Value>, crate::error::ApiError> {
  let execution = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command: CommandClass::ContainerStats,
    args: vec![request.target],
    input: None,
    env_overrides: Default::default(),
    timeout_ms: None,
    stream_output: false,
    json_output: true,
  };
  let result = executor::execute(&user, execution).await?;
  let stats = serde_json::from_slice(&result.stdout).kind(ErrorKind::Internal)?;
  Ok(Json(stats))
}

pub async fn exec_in_container(
  Extension(user): Extension<User>,
  Json(request): Json<ExecInContainer>,
) -> Result<Json<ExecutionResult>, crate::error::ApiError> {
  let mut args = vec![request.target];
  args.extend(request.argv);
  let execution = ExecutionRequest {
    request_id: Uuid::new_v4(),
    user_id: user.id.clone(),
    command: CommandClass::ContainerExec,
    args,
    input: None,
    env_overrides: Default::default(),
    timeout_ms: request.timeout_ms,
    stream_output: false,
    json_output: false,
  };
  let result = executor::execute(&user, execution).await?;
  Ok(Json(result))
}
