//! The realtime connection hub (spec §4.4): tracks every live
//! WebSocket/SSE connection, its channel subscriptions, and fans
//! events out to them. Grounded on the teacher's
//! `tokio::sync::broadcast`-channel idiom for update fan-out
//! (`client/core/rs/src/ws/update.rs`), generalized from "one
//! broadcast channel for the whole client" to "one bounded mpsc per
//! connection plus a channel/user index", since the hub (unlike the
//! teacher's client) has to target individual connections and enforce
//! per-connection backpressure rather than just rebroadcast
//! everything to every reader.

pub mod sse;
pub mod ws;

use std::{
  collections::HashSet,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
  },
};

use dashmap::{DashMap, DashSet};
use futures_util::future::join_all;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wharf_client::{
  entities::{
    audit::{Actor, AuditEventKind, AuditRecord, Severity},
    config::RealtimeConfig,
    realtime::{ConnectionKind, ConnectionStats, Event},
    user::{User, UserId},
  },
  error::{AppError, AppResult, ErrorKind},
  wharf_timestamp,
};

use crate::state;

/// What actually travels down a connection's outbound channel. Kept
/// distinct from [`wharf_client::entities::realtime::WsOutbound`]
/// because a heartbeat ping is a raw WebSocket control frame, not a
/// JSON message in the application grammar — the transport layer
/// (`ws.rs`) is the only place that knows how to turn `Ping` into an
/// actual `Message::Ping`. SSE connections never see `Ping` (spec
/// §4.4: "SSE connections do not pong; liveness is inferred from
/// write success").
#[derive(Debug, Clone)]
pub enum OutboundSignal {
  Message(wharf_client::entities::realtime::WsOutbound),
  Ping,
}

struct Connection {
  user_id: UserId,
  kind: ConnectionKind,
  tx: mpsc::Sender<OutboundSignal>,
  channels: RwLock<HashSet<String>>,
  last_activity_ms: AtomicI64,
  active: AtomicBool,
  cancel: CancellationToken,
}

struct HubInner {
  config: RealtimeConfig,
  connections: DashMap<Uuid, Arc<Connection>>,
  channel_members: DashMap<String, DashSet<Uuid>>,
  user_connections: DashMap<UserId, DashSet<Uuid>>,
  events_processed: AtomicU64,
  errors: AtomicU64,
}

/// Handle returned to the transport layer on [`Hub::register`]: the
/// connection id to key every subsequent call on, the receiver half
/// to drain into the socket, and a cancellation token the reaper (or
/// a failed write) trips to tell the transport loop to stop.
pub struct RegisteredConnection {
  pub id: Uuid,
  pub rx: mpsc::Receiver<OutboundSignal>,
  pub cancel: CancellationToken,
}

/// Cheaply cloneable handle to the process-wide connection registry.
/// `state::realtime_hub()` hands out a `&'static Hub`; the `Arc` inner
/// is what lets the background heartbeat/reaper tasks spawned in
/// [`Hub::new`] outlive the constructor call itself.
#[derive(Clone)]
pub struct Hub(Arc<HubInner>);

impl Hub {
  pub fn new(config: &RealtimeConfig) -> Hub {
    let inner = Arc::new(HubInner {
      config: config.clone(),
      connections: DashMap::new(),
      channel_members: DashMap::new(),
      user_connections: DashMap::new(),
      events_processed: AtomicU64::new(0),
      errors: AtomicU64::new(0),
    });
    spawn_heartbeat(inner.clone());
    spawn_reaper(inner.clone());
    Hub(inner)
  }

  /// Admits a new connection for `user`, enforcing the global and
  /// per-user caps (spec §4.4 "Connection caps"). State machine:
  /// `opening -> active` happens here, synchronously, before the
  /// transport layer ever touches the socket.
  pub fn register(
    &self,
    user: &User,
    kind: ConnectionKind,
  ) -> AppResult<RegisteredConnection> {
    let inner = &self.0;
    if inner.connections.len() >= inner.config.max_connections {
      return Err(AppError::new(
        ErrorKind::ConnectionLimit,
        anyhow::anyhow!("global connection limit reached"),
      ));
    }
    let per_user = inner
      .user_connections
      .get(&user.id)
      .map(|ids| ids.len())
      .unwrap_or(0);
    if per_user >= inner.config.max_connections_per_user {
      return Err(AppError::new(
        ErrorKind::ConnectionLimit,
        anyhow::anyhow!("per-user connection limit reached"),
      ));
    }

    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(inner.config.buffer_size.max(1));
    let cancel = CancellationToken::new();
    let connection = Arc::new(Connection {
      user_id: user.id.clone(),
      kind,
      tx,
      channels: RwLock::new(HashSet::new()),
      last_activity_ms: AtomicI64::new(wharf_timestamp()),
      active: AtomicBool::new(true),
      cancel: cancel.clone(),
    });
    inner.connections.insert(id, connection);
    inner
      .user_connections
      .entry(user.id.clone())
      .or_default()
      .insert(id);

    Ok(RegisteredConnection { id, rx, cancel })
  }

  /// Tears a connection down: drops it from every index it appears in
  /// and trips its cancellation token so the transport loop (if still
  /// running) exits. Idempotent.
  pub async fn unregister(&self, connection_id: Uuid) {
    let inner = &self.0;
    let Some((_, connection)) = inner.connections.remove(&connection_id) else {
      return;
    };
    connection.cancel.cancel();
    if let Some(ids) = inner.user_connections.get(&connection.user_id) {
      ids.remove(&connection_id);
    }
    let channels = connection.channels.read().await.clone();
    for channel in channels {
      if let Some(members) = inner.channel_members.get(&channel) {
        members.remove(&connection_id);
      }
    }
  }

  pub async fn subscribe(
    &self,
    connection_id: Uuid,
    channel: String,
  ) -> AppResult<()> {
    let connection = self.connection(connection_id)?;
    connection.channels.write().await.insert(channel.clone());
    self
      .0
      .channel_members
      .entry(channel)
      .or_default()
      .insert(connection_id);
    Ok(())
  }

  pub async fn unsubscribe(
    &self,
    connection_id: Uuid,
    channel: &str,
  ) -> AppResult<()> {
    let connection = self.connection(connection_id)?;
    connection.channels.write().await.remove(channel);
    if let Some(members) = self.0.channel_members.get(channel) {
      members.remove(&connection_id);
    }
    Ok(())
  }

  pub async fn broadcast_to_user(&self, user_id: &str, event: Event) {
    let Some(ids) = self
      .0
      .user_connections
      .get(user_id)
      .map(|set| set.iter().map(|r| *r).collect::<Vec<_>>())
    else {
      return;
    };
    self.send_to_many(&ids, event).await;
  }

  /// Fire-and-forget variant of [`Hub::broadcast_to_channel`] for
  /// synchronous call sites (e.g. a handler that has already returned
  /// its HTTP response and just wants to notify subscribers). Spawns
  /// the async broadcast onto the runtime rather than blocking the
  /// caller on it.
  pub fn spawn_broadcast_to_channel(&self, channel: String, event: Event) {
    let hub = self.clone();
    tokio::spawn(async move { hub.broadcast_to_channel(&channel, event).await });
  }

  pub async fn broadcast_to_channel(&self, channel: &str, event: Event) {
    let Some(ids) = self
      .0
      .channel_members
      .get(channel)
      .map(|set| set.iter().map(|r| *r).collect::<Vec<_>>())
    else {
      return;
    };
    self.send_to_many(&ids, event).await;
  }

  pub async fn broadcast_to_all(&self, event: Event) {
    let ids: Vec<Uuid> =
      self.0.connections.iter().map(|entry| *entry.key()).collect();
    self.send_to_many(&ids, event).await;
  }

  /// Serializes the event into one [`OutboundSignal`] and fans it out
  /// to every connection concurrently, each with its own bounded-time
  /// send (spec §4.4 "broadcast never blocks on a slow consumer" /
  /// §8 scenario 6). Sends run side by side via `join_all` rather than
  /// a sequential loop, so a slow `C_slow` ahead of `C_fast` in
  /// iteration order can't delay `C_fast`'s delivery — a send that
  /// doesn't clear within `write_timeout_secs` marks only that
  /// connection inactive; the reaper removes it on its next sweep.
  async fn send_to_many(&self, ids: &[Uuid], event: Event) {
    let inner = &self.0;
    let message = OutboundSignal::Message(
      wharf_client::entities::realtime::WsOutbound::Event {
        data: event,
        timestamp: wharf_timestamp(),
      },
    );
    let deadline =
      std::time::Duration::from_secs(inner.config.write_timeout_secs.max(1));

    let sends = ids.iter().filter_map(|id| {
      let connection = inner.connections.get(id).map(|entry| entry.clone())?;
      let message = message.clone();
      Some(async move {
        match tokio::time::timeout(deadline, connection.tx.send(message)).await {
          Ok(Ok(())) => {
            connection
              .last_activity_ms
              .store(wharf_timestamp(), Ordering::Relaxed);
            true
          }
          _ => {
            connection.active.store(false, Ordering::Relaxed);
            false
          }
        }
      })
    });

    let results = join_all(sends).await;
    let failures = results.iter().filter(|ok| !**ok).count();
    if failures > 0 {
      inner.errors.fetch_add(failures as u64, Ordering::Relaxed);
    }
    inner.events_processed.fetch_add(1, Ordering::Relaxed);
  }

  pub fn stats(&self) -> ConnectionStats {
    let inner = &self.0;
    let mut stats = ConnectionStats {
      total: inner.connections.len(),
      events_processed: inner.events_processed.load(Ordering::Relaxed),
      errors: inner.errors.load(Ordering::Relaxed),
      ..Default::default()
    };
    for entry in inner.connections.iter() {
      match entry.value().kind {
        ConnectionKind::WebSocket => stats.websocket_count += 1,
        ConnectionKind::Sse => stats.sse_count += 1,
      }
    }
    for entry in inner.user_connections.iter() {
      stats.per_user.insert(entry.key().clone(), entry.value().len());
    }
    for entry in inner.channel_members.iter() {
      stats.per_channel.insert(entry.key().clone(), entry.value().len());
    }
    stats
  }

  /// Called by the transport layer on every inbound frame (text
  /// message, control-frame pong) to refresh liveness, and by `sse.rs`
  /// after every successful write.
  pub fn touch(&self, connection_id: Uuid) {
    if let Some(connection) = self.0.connections.get(&connection_id) {
      connection
        .last_activity_ms
        .store(wharf_timestamp(), Ordering::Relaxed);
      connection.active.store(true, Ordering::Relaxed);
    }
  }

  /// Sends a direct reply to one connection's own outbound channel —
  /// used for request/response pairs (`Response`, `Pong`, `Error`),
  /// never for event fan-out. Best-effort: a full buffer just drops
  /// the reply rather than blocking the reader loop that produced it.
  pub fn reply(
    &self,
    connection_id: Uuid,
    outbound: wharf_client::entities::realtime::WsOutbound,
  ) {
    if let Some(connection) = self.0.connections.get(&connection_id) {
      let _ = connection
        .tx
        .try_send(OutboundSignal::Message(outbound));
    }
  }

  /// Called by the transport layer when a write fails outright (spec
  /// §4.4: "A failed write marks the connection inactive").
  pub fn mark_inactive(&self, connection_id: Uuid) {
    if let Some(connection) = self.0.connections.get(&connection_id) {
      connection.active.store(false, Ordering::Relaxed);
    }
  }

  fn connection(&self, connection_id: Uuid) -> AppResult<Arc<Connection>> {
    self
      .0
      .connections
      .get(&connection_id)
      .map(|entry| entry.clone())
      .ok_or_else(|| {
        AppError::new(
          ErrorKind::NotFound,
          anyhow::anyhow!("connection not registered"),
        )
      })
  }
}

/// Every `ping_interval_secs`, sends a heartbeat signal to every
/// WebSocket connection (SSE connections are skipped — they have no
/// control-frame pong to wait for). The actual `Message::Ping` framing
/// happens in `ws.rs`; this task only decides *when*.
fn spawn_heartbeat(inner: Arc<HubInner>) {
  tokio::spawn(async move {
    let interval =
      std::time::Duration::from_secs(inner.config.ping_interval_secs.max(1));
    loop {
      tokio::time::sleep(interval).await;
      for entry in inner.connections.iter() {
        let connection = entry.value();
        if connection.kind != ConnectionKind::WebSocket {
          continue;
        }
        let _ = connection.tx.try_send(OutboundSignal::Ping);
      }
    }
  });
}

/// Every `cleanup_interval_secs`, removes connections that have gone
/// quiet for longer than `3 * pong_timeout_secs` or were flagged
/// inactive by a failed write (spec §4.4 "Reaper"). Emits one
/// `HubReaperSweep` audit record and one `info` log line per sweep —
/// never one per removed connection — so a sweep that clears a
/// thundering-herd disconnect doesn't itself flood the log.
fn spawn_reaper(inner: Arc<HubInner>) {
  tokio::spawn(async move {
    let interval =
      std::time::Duration::from_secs(inner.config.cleanup_interval_secs.max(1));
    let stale_after_ms =
      (inner.config.pong_timeout_secs.max(1) * 3 * 1000) as i64;
    loop {
      tokio::time::sleep(interval).await;
      let now = wharf_timestamp();
      let stale: Vec<Uuid> = inner
        .connections
        .iter()
        .filter(|entry| {
          let connection = entry.value();
          !connection.active.load(Ordering::Relaxed)
            || now - connection.last_activity_ms.load(Ordering::Relaxed)
              > stale_after_ms
        })
        .map(|entry| *entry.key())
        .collect();

      if stale.is_empty() {
        continue;
      }

      let hub = Hub(inner.clone());
      for id in &stale {
        hub.unregister(*id).await;
      }

      let stats = hub.stats();
      tracing::info!(
        removed = stale.len(),
        total = stats.total,
        websocket_count = stats.websocket_count,
        sse_count = stats.sse_count,
        "realtime hub reaper sweep"
      );
      state::audit_sink().record(AuditRecord {
        id: Uuid::new_v4(),
        timestamp: now,
        tenant_id: String::new(),
        actor: Actor::System,
        event_kind: AuditEventKind::HubReaperSweep,
        resource_type: "realtime_connection".to_string(),
        resource_id: "hub".to_string(),
        severity: Severity::Low,
        details: serde_json::json!({
          "removed": stale.len(),
          "remaining": stats.total,
        }),
        fingerprint: None,
        request_id: None,
      });
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use wharf_client::entities::user::Role;

  fn user(id: &str) -> User {
    User {
      id: id.to_string(),
      email: format!("{id}@example.com"),
      display_name: id.to_string(),
      tenant_id: "tenant-a".to_string(),
      roles: vec![Role::Member],
      enabled: true,
      created_at: 0,
      password_hash: None,
      api_keys: vec![],
    }
  }

  fn config_with_caps(max_connections: usize, per_user: usize) -> RealtimeConfig {
    RealtimeConfig {
      max_connections,
      max_connections_per_user: per_user,
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn register_rejects_past_the_per_user_cap() {
    let hub = Hub::new(&config_with_caps(1000, 1));
    let u = user("u1");
    let first = hub.register(&u, ConnectionKind::WebSocket);
    assert!(first.is_ok());
    let second = hub.register(&u, ConnectionKind::WebSocket);
    assert!(second.is_err());
    assert_eq!(second.unwrap_err().kind, ErrorKind::ConnectionLimit);
  }

  #[tokio::test]
  async fn register_rejects_past_the_global_cap() {
    let hub = Hub::new(&config_with_caps(1, 10));
    let a = hub.register(&user("u1"), ConnectionKind::WebSocket);
    assert!(a.is_ok());
    let b = hub.register(&user("u2"), ConnectionKind::WebSocket);
    assert!(b.is_err());
    assert_eq!(b.unwrap_err().kind, ErrorKind::ConnectionLimit);
  }

  #[tokio::test]
  async fn unregister_frees_the_per_user_slot() {
    let hub = Hub::new(&config_with_caps(1000, 1));
    let u = user("u1");
    let registered = hub.register(&u, ConnectionKind::WebSocket).unwrap();
    hub.unregister(registered.id).await;
    assert!(hub.register(&u, ConnectionKind::WebSocket).is_ok());
  }

  #[tokio::test]
  async fn subscribe_then_broadcast_to_channel_reaches_the_connection() {
    let hub = Hub::new(&RealtimeConfig::default());
    let u = user("u1");
    let mut registered = hub.register(&u, ConnectionKind::WebSocket).unwrap();
    hub.subscribe(registered.id, "servers".to_string()).await.unwrap();

    hub
      .broadcast_to_channel(
        "servers",
        Event {
          id: Uuid::new_v4(),
          event_type: wharf_client::entities::realtime::EventType::ServerStarted,
          channel: Some("servers".to_string()),
          user: None,
          data: serde_json::json!({}),
          metadata: None,
          timestamp: wharf_timestamp(),
          ttl: None,
        },
      )
      .await;

    let signal = registered.rx.recv().await;
    assert!(matches!(signal, Some(OutboundSignal::Message(_))));
  }

  #[tokio::test]
  async fn stats_count_connections_by_kind() {
    let hub = Hub::new(&RealtimeConfig::default());
    hub.register(&user("u1"), ConnectionKind::WebSocket).unwrap();
    hub.register(&user("u2"), ConnectionKind::Sse).unwrap();
    let stats = hub.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.websocket_count, 1);
    assert_eq!(stats.sse_count, 1);
  }
}
