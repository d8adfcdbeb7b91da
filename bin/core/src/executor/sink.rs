//! Streaming output destinations for long-running command classes
//! (`ContainerLogs`, `ContainerExec` with `stream_output` set). Mirrors
//! the teacher's separation between "run and collect" and "run and
//! forward chunks live" by making the forwarding side a trait the
//! executor calls into rather than hard-wiring a channel.

use tokio::sync::mpsc;

/// One chunk of streamed command output, tagged by which pipe it came
/// from so a websocket consumer can reproduce stdout/stderr framing.
#[derive(Debug, Clone)]
pub struct StreamChunk {
  pub stderr: bool,
  pub data: Vec<u8>,
}

/// Receives output chunks as a command runs. Implementations must not
/// block the calling task for long — `command::spawn_streaming` drives
/// this synchronously off the child's stdout/stderr pumps.
pub trait OutputSink: Send {
  fn on_stdout(&mut self, chunk: &[u8]);
  fn on_stderr(&mut self, chunk: &[u8]);
}

/// Discards everything. Used for non-streaming classes, where
/// `command::spawn_capped` already collects the full buffers itself.
pub struct NullSink;

impl OutputSink for NullSink {
  fn on_stdout(&mut self, _chunk: &[u8]) {}
  fn on_stderr(&mut self, _chunk: &[u8]) {}
}

/// Forwards chunks to an mpsc receiver, typically drained by a
/// websocket or SSE task. Send errors (receiver dropped) are swallowed
/// since the command keeps running to completion regardless of whether
/// anyone is still listening.
pub struct ChannelSink {
  tx: mpsc::Sender<StreamChunk>,
}

impl ChannelSink {
  pub fn new(tx: mpsc::Sender<StreamChunk>) -> Self {
    Self { tx }
  }
}

impl OutputSink for ChannelSink {
  fn on_stdout(&mut self, chunk: &[u8]) {
    let _ = self.tx.try_send(StreamChunk { stderr: false, data: chunk.to_vec() });
  }

  fn on_stderr(&mut self, chunk: &[u8]) {
    let _ = self.tx.try_send(StreamChunk { stderr: true, data: chunk.to_vec() });
  }
}
