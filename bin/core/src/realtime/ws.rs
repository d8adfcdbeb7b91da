//! WebSocket transport for the hub: translates between axum's
//! `Message` frames and the hub's [`OutboundSignal`]/`WsInbound`
//! grammar (spec §4.4). Mounted at `/ws` per SPEC_FULL.md's ambient
//! addition to §4.4.

use axum::{
  Extension, Router,
  extract::ws::{Message, WebSocket, WebSocketUpgrade},
  middleware,
  response::IntoResponse,
  routing::get,
};
use futures_util::{SinkExt, StreamExt};
use wharf_client::{
  entities::{
    realtime::{ConnectionKind, WsInbound, WsOutbound},
    user::User,
  },
  wharf_timestamp,
};

use super::{Hub, OutboundSignal};
use crate::{auth::auth_request, state};

pub fn router() -> Router {
  Router::new()
    .route("/", get(upgrade))
    .layer(middleware::from_fn(auth_request))
}

pub async fn upgrade(
  ws: WebSocketUpgrade,
  Extension(user): Extension<User>,
) -> impl IntoResponse {
  ws.on_upgrade(move |socket| run(socket, user))
}

async fn run(socket: WebSocket, user: User) {
  let hub = state::realtime_hub();
  let registered = match hub.register(&user, ConnectionKind::WebSocket) {
    Ok(registered) => registered,
    Err(e) => {
      let (mut sender, _) = socket.split();
      let _ = sender
        .send(Message::text(
          serde_json::to_string(&e.envelope()).unwrap_or_default(),
        ))
        .await;
      let _ = sender.send(Message::Close(None)).await;
      return;
    }
  };
  let connection_id = registered.id;
  let mut rx = registered.rx;
  let cancel = registered.cancel;

  let (mut sender, mut receiver) = socket.split();

  let writer_cancel = cancel.clone();
  let mut writer = tokio::spawn(async move {
    loop {
      tokio::select! {
        _ = writer_cancel.cancelled() => break,
        signal = rx.recv() => {
          let Some(signal) = signal else { break };
          let frame = match signal {
            OutboundSignal::Ping => Message::Ping(Vec::new().into()),
            OutboundSignal::Message(outbound) => {
              match serde_json::to_string(&outbound) {
                Ok(json) => Message::text(json),
                Err(_) => continue,
              }
            }
          };
          if sender.send(frame).await.is_err() {
            break;
          }
        }
      }
    }
    let _ = sender.send(Message::Close(None)).await;
  });

  let reader_cancel = cancel.clone();
  let mut reader = tokio::spawn(async move {
    loop {
      tokio::select! {
        _ = reader_cancel.cancelled() => break,
        frame = receiver.next() => {
          let Some(Ok(frame)) = frame else { break };
          match frame {
            Message::Pong(_) | Message::Ping(_) | Message::Binary(_) => {
              hub.touch(connection_id);
            }
            Message::Text(text) => {
              hub.touch(connection_id);
              handle_inbound(hub, connection_id, &text).await;
            }
            Message::Close(_) => break,
          }
        }
      }
    }
  });

  tokio::select! {
    _ = &mut writer => { reader.abort(); }
    _ = &mut reader => { writer.abort(); }
  }

  hub.unregister(connection_id).await;
}

/// Handles one inbound application-level message, replying on that
/// same connection (never through a broadcast path — this is a direct
/// reply, not an event fan-out).
async fn handle_inbound(hub: &'static Hub, connection_id: uuid::Uuid, text: &str) {
  let outbound = match serde_json::from_str::<WsInbound>(text) {
    Err(e) => WsOutbound::Error {
      error: format!("malformed message: {e}"),
      request_id: None,
      timestamp: wharf_timestamp(),
    },
    Ok(WsInbound::Ping { request_id: _ }) => {
      WsOutbound::Pong { timestamp: wharf_timestamp() }
    }
    Ok(WsInbound::Subscribe { channel, request_id }) => {
      response_for(hub.subscribe(connection_id, channel).await, request_id)
    }
    Ok(WsInbound::Unsubscribe { channel, request_id }) => {
      response_for(hub.unsubscribe(connection_id, &channel).await, request_id)
    }
    Ok(WsInbound::Command { request_id, .. }) => WsOutbound::Error {
      error: "no commands are registered on this channel".to_string(),
      request_id,
      timestamp: wharf_timestamp(),
    },
  };

  hub.reply(connection_id, outbound);
}

fn response_for(
  result: wharf_client::error::AppResult<()>,
  request_id: Option<String>,
) -> WsOutbound {
  match result {
    Ok(()) => WsOutbound::Response {
      success: true,
      data: None,
      error: None,
      request_id,
      timestamp: wharf_timestamp(),
    },
    Err(e) => WsOutbound::Response {
      success: false,
      data: None,
      error: Some(e.message()),
      request_id,
      timestamp: wharf_timestamp(),
    },
  }
}
