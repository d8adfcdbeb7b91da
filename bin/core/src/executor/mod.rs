//! The command executor (spec §4.1): the single path by which any
//! request turns into an argv-only subprocess invocation of the
//! configured CLI binary. Every admission decision — role, argument
//! shape, rate limit, concurrency — happens here, in the fixed order
//! spec §4.1's state machine specifies, before `command::spawn_capped`
//! is ever called.

pub mod registry;
pub mod sink;

use std::{collections::BTreeMap, path::Path, time::Duration};

use uuid::Uuid;
use validations::validate_arg;
use wharf_client::{
  entities::{
    audit::{Actor, AuditEventKind, AuditRecord, Severity},
    execution::{CommandClass, ExecutionRequest, ExecutionResult, ExecutionTerminal},
    user::User,
  },
  error::{AppError, AppResult, ErrorKind},
  wharf_timestamp,
};

use crate::{auth::permission::require_role, config::core_config, state};
use registry::descriptor;
use sink::{NullSink, OutputSink};

/// Runs `request` to completion, collecting output rather than
/// streaming it. Equivalent to `execute_streaming` with a [`NullSink`].
pub async fn execute(
  user: &User,
  request: ExecutionRequest,
) -> AppResult<ExecutionResult> {
  execute_inner(user, request, &mut NullSink).await
}

/// Runs `request` to completion, forwarding output chunks to `sink` as
/// they arrive (spec §4.1 `execute_streaming`).
pub async fn execute_streaming(
  user: &User,
  request: ExecutionRequest,
  sink: &mut dyn OutputSink,
) -> AppResult<ExecutionResult> {
  execute_inner(user, request, sink).await
}

async fn execute_inner(
  user: &User,
  request: ExecutionRequest,
  sink: &mut dyn OutputSink,
) -> AppResult<ExecutionResult> {
  let descriptor = descriptor(request.command);

  // 1. Role check.
  if let Err(e) = require_role(user, request.command.min_role()) {
    audit(
      user,
      &request,
      AuditEventKind::ExecutionRejected,
      Severity::High,
      serde_json::json!({ "reason": "insufficient role" }),
    );
    return Err(e);
  }

  // 2. Argument shape.
  if let Err(e) = validate_args(&descriptor, &request.args) {
    audit(
      user,
      &request,
      AuditEventKind::ExecutionRejected,
      Severity::High,
      serde_json::json!({ "reason": e.to_string() }),
    );
    return Err(
      AppError::new(ErrorKind::ValidationError, e)
        .with_request_id(request.request_id),
    );
  }

  // 3. Classes whose output is only meaningful as structured data
  // refuse to run without `json_output` set, rather than silently
  // handing back text nobody asked for.
  if descriptor.requires_json && !request.json_output {
    audit(
      user,
      &request,
      AuditEventKind::ExecutionRejected,
      Severity::High,
      serde_json::json!({ "reason": "json_output required" }),
    );
    return Err(
      AppError::new(
        ErrorKind::ValidationError,
        anyhow::anyhow!(
          "{} requires json_output to be set",
          request.command
        ),
      )
      .with_request_id(request.request_id),
    );
  }

  // 4. Rate limit, per (user, class).
  match state::command_rate_limiter()
    .try_admit(&user.id, descriptor.rate_bucket)
    .await
  {
    rate_limit::BucketStatus::Admitted => {}
    rate_limit::BucketStatus::Limited { retry_after } => {
      audit(
        user,
        &request,
        AuditEventKind::ExecutionRateLimited,
        Severity::Medium,
        serde_json::json!({ "retry_after_ms": retry_after.as_millis() }),
      );
      return Err(
        AppError::new(
          ErrorKind::RateLimited,
          anyhow::anyhow!("rate limit exceeded for {}", request.command),
        )
        .with_request_id(request.request_id)
        .with_details(
          serde_json::json!({ "retry_after_ms": retry_after.as_millis() }),
        ),
      );
    }
  }

  audit(
    user,
    &request,
    AuditEventKind::ExecutionAccepted,
    Severity::Low,
    serde_json::json!({ "command": request.command.to_string() }),
  );

  let config = &core_config().executor;
  let mut argv: Vec<String> =
    descriptor.cli_args_prefix.iter().map(|s| s.to_string()).collect();
  argv.extend(request.args.iter().cloned());

  let env: Vec<(String, String)> =
    request.env_overrides.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
  let requested_secs =
    request.timeout_ms.map(|ms| ms.div_ceil(1000));
  let deadline = Duration::from_secs(config.clamp_timeout_secs(requested_secs));
  let kill_grace = Duration::from_secs(config.kill_grace_secs);
  let working_dir = Path::new(&config.working_dir);

  // 6. Concurrency ceiling: wait up to the request's own deadline for a
  // slot before giving up, rather than rejecting on an instantaneously
  // full semaphore (spec §4.1 "acquire-with-deadline").
  let permit = match tokio::time::timeout(
    deadline,
    state::executor_semaphore().acquire(),
  )
  .await
  {
    Ok(Ok(permit)) => permit,
    _ => {
      audit(
        user,
        &request,
        AuditEventKind::ExecutionRejected,
        Severity::Medium,
        serde_json::json!({ "reason": "executor at capacity" }),
      );
      return Err(
        AppError::new(
          ErrorKind::Overloaded,
          anyhow::anyhow!("executor is at its concurrency ceiling"),
        )
        .with_request_id(request.request_id),
      );
    }
  };

  let started_at = wharf_timestamp();

  let outcome = if request.stream_output {
    command::spawn_streaming(
      &config.binary_path,
      &argv,
      &env,
      working_dir,
      request.input.as_deref(),
      deadline,
      kill_grace,
      config.output_buffer_size,
      |chunk| sink.on_stdout(chunk),
      |chunk| sink.on_stderr(chunk),
    )
    .await
  } else {
    command::spawn_capped(
      &config.binary_path,
      &argv,
      &env,
      working_dir,
      request.input.as_deref(),
      deadline,
      kill_grace,
      config.output_buffer_size,
    )
    .await
  };

  drop(permit);

  let duration_ms = (wharf_timestamp() - started_at).max(0) as u64;

  if let Some(spawn_error) = &outcome.spawn_error {
    audit(
      user,
      &request,
      AuditEventKind::ExecutionFatal,
      Severity::Critical,
      serde_json::json!({ "error": spawn_error }),
    );
    return Err(
      AppError::new(
        ErrorKind::Fatal,
        anyhow::anyhow!("failed to spawn subprocess: {spawn_error}"),
      )
      .with_request_id(request.request_id),
    );
  }

  let (terminal, terminal_severity) = if outcome.killed {
    (ExecutionTerminal::Killed, Severity::Medium)
  } else if outcome.timed_out {
    (ExecutionTerminal::TimedOut, Severity::Medium)
  } else {
    (ExecutionTerminal::Completed, Severity::Low)
  };

  audit(
    user,
    &request,
    match terminal {
      ExecutionTerminal::TimedOut => AuditEventKind::ExecutionTimedOut,
      ExecutionTerminal::Killed => AuditEventKind::ExecutionKilled,
      _ => AuditEventKind::ExecutionCompleted,
    },
    terminal_severity,
    serde_json::json!({
      "exit_code": outcome.exit_code,
      "killed": outcome.killed,
      "truncated": outcome.truncated,
    }),
  );

  // Timeout (and its escalated kill) is its own error kind, distinct
  // from an ordinary non-zero exit. Partial output collected before
  // the deadline rides along in `details`.
  if outcome.timed_out {
    return Err(
      AppError::new(
        ErrorKind::Timeout,
        anyhow::anyhow!("command timed out after {:?}", deadline),
      )
      .with_request_id(request.request_id)
      .with_details(serde_json::json!({
        "stdout": String::from_utf8_lossy(&outcome.stdout),
        "stderr": String::from_utf8_lossy(&outcome.stderr),
        "exit_code": outcome.exit_code,
        "killed": outcome.killed,
        "truncated": outcome.truncated,
      })),
    );
  }

  let success = outcome.exit_code == Some(0);

  let structured_error = if request.json_output {
    serde_json::from_slice::<serde_json::Value>(&outcome.stdout)
      .err()
      .map(|e| e.to_string())
  } else {
    None
  };

  Ok(ExecutionResult {
    request_id: request.request_id,
    exit_code: outcome.exit_code,
    stdout: outcome.stdout,
    stderr: outcome.stderr,
    duration_ms,
    success,
    truncated: outcome.truncated,
    structured_error,
  })
}

fn validate_args(
  descriptor: &registry::ClassDescriptor,
  args: &[String],
) -> anyhow::Result<()> {
  if args.len() < descriptor.arg_rules.len() {
    anyhow::bail!(
      "expected at least {} argument(s), got {}",
      descriptor.arg_rules.len(),
      args.len()
    );
  }
  for (i, rule) in descriptor.arg_rules.iter().enumerate() {
    validate_arg(&format!("args[{i}]"), &args[i], rule)?;
  }
  let tail = &args[descriptor.arg_rules.len()..];
  match (&descriptor.variadic_tail_rule, tail.is_empty()) {
    (_, true) => Ok(()),
    (Some(rule), false) => {
      for (i, value) in tail.iter().enumerate() {
        validate_arg(
          &format!("args[{}]", descriptor.arg_rules.len() + i),
          value,
          rule,
        )?;
      }
      Ok(())
    }
    (None, false) => anyhow::bail!(
      "{} does not accept more than {} argument(s)",
      "command",
      descriptor.arg_rules.len()
    ),
  }
}

fn audit(
  user: &User,
  request: &ExecutionRequest,
  kind: AuditEventKind,
  severity: Severity,
  details: serde_json::Value,
) {
  state::audit_sink().record(AuditRecord {
    id: Uuid::new_v4(),
    timestamp: wharf_timestamp(),
    tenant_id: user.tenant_id.clone(),
    actor: Actor::User(user.id.clone()),
    event_kind: kind,
    resource_type: "command_execution".to_string(),
    resource_id: request.request_id.to_string(),
    severity,
    details,
    fingerprint: None,
    request_id: Some(request.request_id),
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validate_args_rejects_missing_required_argument() {
    let descriptor = descriptor(CommandClass::ServerInspect);
    assert!(validate_args(&descriptor, &[]).is_err());
  }

  #[test]
  fn validate_args_rejects_unexpected_trailing_argument() {
    let descriptor = descriptor(CommandClass::ServerEnable);
    let err =
      validate_args(&descriptor, &["my-server".to_string(), "extra".to_string()]);
    assert!(err.is_err());
  }

  #[test]
  fn validate_args_allows_variadic_tail_when_declared() {
    let descriptor = descriptor(CommandClass::ContainerExec);
    assert!(
      validate_args(
        &descriptor,
        &["abc123".to_string(), "ls".to_string(), "-la".to_string()]
      )
      .is_ok()
    );
  }
}
