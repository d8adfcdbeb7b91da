/// Outcome of one subprocess spawn. Never carries a "success" flag of
/// its own — the executor (spec §4.1) is the only place allowed to
/// decide success (exit 0 AND no timeout AND validator admitted).
#[derive(Debug, Clone, Default)]
pub struct SpawnOutcome {
  pub exit_code: Option<i32>,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
  /// `true` if either stream was truncated at the configured cap.
  pub truncated: bool,
  /// `true` if the process was signalled because the deadline elapsed
  /// (spec §4.1 "Timeout & cancellation").
  pub timed_out: bool,
  /// `true` if `timed_out` and the grace window also elapsed, i.e. the
  /// process needed a kill rather than responding to terminate.
  pub killed: bool,
  /// Set when the binary itself could not be started (missing,
  /// permission denied) — spec §4.1 "Fatal" path.
  pub spawn_error: Option<String>,
}

impl SpawnOutcome {
  pub fn spawn_failed(message: impl Into<String>) -> Self {
    Self {
      spawn_error: Some(message.into()),
      ..Default::default()
    }
  }
}

/// Appends `chunk` to `buf`, truncating at `cap` bytes and flipping
/// `truncated`. The executor's `output_buffer_size` bound (spec §4.1
/// ambient addition, `SPEC_FULL.md`) is enforced at this one site so
/// both the buffered and streaming spawn paths share behavior.
pub fn append_capped(
  buf: &mut Vec<u8>,
  chunk: &[u8],
  cap: usize,
  truncated: &mut bool,
) {
  if buf.len() >= cap {
    *truncated = true;
    return;
  }
  let remaining = cap - buf.len();
  if chunk.len() > remaining {
    buf.extend_from_slice(&chunk[..remaining]);
    *truncated = true;
  } else {
    buf.extend_from_slice(chunk);
  }
}
