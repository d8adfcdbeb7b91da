//! Bulk action orchestrator (spec §4.2): fans a single request out
//! over many targets with bounded concurrency, delegating each target
//! to the command executor so the same validation/rate-limit/audit
//! path it already enforces applies per target rather than being
//! re-implemented here.

use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wharf_client::{
  api::servers::BulkActionRequest,
  entities::{
    audit::{Actor, AuditEventKind, AuditRecord, Severity},
    bulk::{ActionResult, BulkAction, BulkJob},
    execution::{CommandClass, ExecutionRequest},
    user::User,
  },
  error::AppResult,
  wharf_timestamp,
};

use crate::{executor, state};

/// Used when the request doesn't specify a concurrency override.
const DEFAULT_CONCURRENCY: usize = 5;
/// Hard ceiling regardless of what a caller asks for, so one bulk
/// request cannot single-handedly exhaust the executor's own
/// concurrency ceiling.
const MAX_CONCURRENCY: usize = 32;

/// Runs `request.action` against every id in `request.targets`,
/// respecting `request.concurrency` (clamped to
/// `[1, MAX_CONCURRENCY]`), and returns the assembled [`BulkJob`] with
/// `results` indexed identically to `targets` (spec §4.2 testable
/// property 6). `cancel` is this job's cancellation context (spec
/// §4.2 "Cancellation"): targets not yet dispatched when it fires are
/// recorded as cancelled without ever reaching the executor; a target
/// already in flight is raced against cancellation and recorded as
/// cancelled if it fires first.
pub async fn run(
  user: &User,
  request: BulkActionRequest,
  cancel: CancellationToken,
) -> AppResult<BulkJob> {
  let job_id = Uuid::new_v4();
  let started_at = wharf_timestamp();
  let concurrency = request
    .concurrency
    .unwrap_or(DEFAULT_CONCURRENCY)
    .clamp(1, MAX_CONCURRENCY);

  let user = Arc::new(user.clone());
  let action = request.action;

  let mut indexed: Vec<(usize, ActionResult)> =
    stream::iter(request.targets.iter().cloned().enumerate())
      .map(|(index, target_id)| {
        let user = user.clone();
        let cancel = cancel.clone();
        async move {
          if cancel.is_cancelled() {
            return (index, cancelled_result(action, target_id));
          }
          (index, run_one(&user, action, target_id, cancel).await)
        }
      })
      .buffer_unordered(concurrency)
      .collect()
      .await;
  indexed.sort_by_key(|(index, _)| *index);
  let results: Vec<ActionResult> =
    indexed.into_iter().map(|(_, result)| result).collect();

  let total = results.len();
  let success_count = results.iter().filter(|r| r.success).count();
  let failure_count = total - success_count;
  let elapsed_ms = (wharf_timestamp() - started_at).max(0) as u64;

  state::audit_sink().record(AuditRecord {
    id: Uuid::new_v4(),
    timestamp: wharf_timestamp(),
    tenant_id: user.tenant_id.clone(),
    actor: Actor::User(user.id.clone()),
    event_kind: AuditEventKind::BulkOperation,
    resource_type: "bulk_action".to_string(),
    resource_id: job_id.to_string(),
    severity: Severity::Low,
    details: serde_json::json!({
      "action": action.to_string(),
      "total": total,
      "success_count": success_count,
      "failure_count": failure_count,
    }),
    fingerprint: None,
    request_id: None,
  });

  Ok(BulkJob {
    id: job_id,
    user_id: user.id.clone(),
    action,
    target_ids: request.targets,
    results,
    total,
    success_count,
    failure_count,
    elapsed_ms,
    started_at,
  })
}

/// Runs one target's action through the executor and reduces whatever
/// comes back (a successful run, a rejection, or an executor error)
/// into a single [`ActionResult`] — a bulk job never fails outright
/// because one target was rejected (spec §4.2 "Partial failure").
/// Raced against `cancel`: if it fires before the executor call
/// returns, the in-flight operation is recorded as cancelled instead
/// of waiting out its own result.
pub(crate) async fn run_one(
  user: &User,
  action: BulkAction,
  target_id: String,
  cancel: CancellationToken,
) -> ActionResult {
  let started_at = wharf_timestamp();
  let command = match action {
    BulkAction::Update => CommandClass::ContainerCreate,
    _ => CommandClass::ContainerAction,
  };
  let args = match action {
    BulkAction::Update => vec![target_id.clone()],
    _ => vec![target_id.clone(), action.to_string()],
  };

  let request = ExecutionRequest {
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

  let outcome = tokio::select! {
    biased;
    _ = cancel.cancelled() => {
      return cancelled_result_with_duration(
        action, target_id, (wharf_timestamp() - started_at).max(0) as u64,
      );
    }
    outcome = executor::execute(user, request) => outcome,
  };
  let duration_ms = (wharf_timestamp() - started_at).max(0) as u64;

  match outcome {
    Ok(result) => ActionResult {
      target_id,
      action,
      success: result.success,
      error: if result.success {
        None
      } else {
        Some(format!("exit code {:?}", result.exit_code))
      },
      duration_ms,
      timestamp: wharf_timestamp(),
      cancelled: false,
    },
    Err(e) => ActionResult {
      target_id,
      action,
      success: false,
      error: Some(e.message()),
      duration_ms,
      timestamp: wharf_timestamp(),
      cancelled: false,
    },
  }
}

/// Result for a target that never reached the executor because the
/// job's cancellation context had already fired (spec §4.2 "not yet
/// started indices are skipped and recorded as Cancelled results").
fn cancelled_result(action: BulkAction, target_id: String) -> ActionResult {
  cancelled_result_with_duration(action, target_id, 0)
}

fn cancelled_result_with_duration(
  action: BulkAction,
  target_id: String,
  duration_ms: u64,
) -> ActionResult {
  ActionResult {
    target_id,
    action,
    success: false,
    error: Some("cancelled".to_string()),
    duration_ms,
    timestamp: wharf_timestamp(),
    cancelled: true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn concurrency_is_clamped_to_the_ceiling() {
    let requested: Option<usize> = Some(9_999);
    let effective = requested.unwrap_or(DEFAULT_CONCURRENCY).clamp(1, MAX_CONCURRENCY);
    assert_eq!(effective, MAX_CONCURRENCY);
  }

  #[test]
  fn concurrency_defaults_when_unspecified() {
    let requested: Option<usize> = None;
    let effective = requested.unwrap_or(DEFAULT_CONCURRENCY).clamp(1, MAX_CONCURRENCY);
    assert_eq!(effective, DEFAULT_CONCURRENCY);
  }

  #[test]
  fn cancelled_result_is_marked_cancelled_and_unsuccessful() {
    let result =
      cancelled_result(BulkAction::Stop, "target-1".to_string());
    assert!(result.cancelled);
    assert!(!result.success);
    assert_eq!(result.target_id, "target-1");
  }
}
