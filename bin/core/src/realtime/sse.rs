//! Server-Sent Events transport for the hub (spec §4.4 SSE framing:
//! optional `id:`, optional `event:`, `data:` = JSON `Event`). Mounted
//! at `/sse` per SPEC_FULL.md's ambient addition to §4.4. Read-only
//! from the client's perspective — subscriptions are fixed at connect
//! time via the `channel` query parameter, since SSE has no inbound
//! frame to carry a `Subscribe` message.

use axum::{
  Extension, Router,
  extract::Query,
  middleware,
  response::{
    IntoResponse,
    sse::{Event as SseEvent, KeepAlive, Sse},
  },
  routing::get,
};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use wharf_client::entities::{realtime::ConnectionKind, user::User};

use super::OutboundSignal;
use crate::{auth::auth_request, state};

#[derive(Debug, Deserialize)]
pub struct SseQuery {
  #[serde(default)]
  pub channel: Option<String>,
}

pub fn router() -> Router {
  Router::new()
    .route("/", get(upgrade))
    .layer(middleware::from_fn(auth_request))
}

pub async fn upgrade(
  Extension(user): Extension<User>,
  Query(query): Query<SseQuery>,
) -> impl IntoResponse {
  let hub = state::realtime_hub();
  let registered = match hub.register(&user, ConnectionKind::Sse) {
    Ok(registered) => registered,
    Err(e) => return Err(crate::error::ApiError::from(e)),
  };
  let connection_id = registered.id;

  if let Some(channel) = query.channel {
    // Best-effort: a subscribe failure here just means the stream
    // opens with no channel membership, not a hard failure of the
    // connection itself.
    let _ = hub.subscribe(connection_id, channel).await;
  }

  let mut rx = registered.rx;
  let cancel = registered.cancel;

  let stream = stream::unfold((rx, cancel, connection_id, hub), |(mut rx, cancel, connection_id, hub)| async move {
    loop {
      tokio::select! {
        _ = cancel.cancelled() => return None,
        signal = rx.recv() => {
          let signal = signal?;
          match signal {
            // SSE has no control-frame ping; the hub's heartbeat tick
            // is simply not observable here (spec §4.4: "SSE
            // connections do not pong; liveness is inferred from
            // write success" — so every yielded item already counts
            // as a write).
            OutboundSignal::Ping => continue,
            OutboundSignal::Message(outbound) => {
              let event = match &outbound {
                wharf_client::entities::realtime::WsOutbound::Event { data, .. } => {
                  hub.touch(connection_id);
                  SseEvent::default()
                    .id(data.id.to_string())
                    .event(data.event_type.to_string())
                    .json_data(data)
                    .unwrap_or_else(|_| SseEvent::default().data("{}"))
                }
                other => SseEvent::default()
                  .json_data(other)
                  .unwrap_or_else(|_| SseEvent::default().data("{}")),
              };
              return Some((Ok::<_, std::convert::Infallible>(event), (rx, cancel, connection_id, hub)));
            }
          }
        }
      }
    }
  });

  Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub type SseStream = std::pin::Pin<
  Box<dyn Stream<Item = Result<SseEvent, std::convert::Infallible>> + Send>,
>;
