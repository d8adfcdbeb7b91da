//! HTTP handlers for the inbound action surface (spec §6), one module
//! per action group. Each handler is a thin translation between an
//! axum extractor and a `crate::{catalog,executor,bulk,auth}` call;
//! [`app`] is the single place that nests every group's router under
//! its path prefix, following the teacher's `api::app()`.

use axum::{
  Router,
  http::{HeaderName, HeaderValue},
  routing::get,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::{config::cors_layer, realtime};

pub mod auth;
pub mod catalogs;
pub mod config;
pub mod gateway;
pub mod servers;

pub fn app() -> Router {
  Router::new()
    .route("/version", get(|| async { env!("CARGO_PKG_VERSION") }))
    .nest("/auth", auth::router())
    .nest("/catalogs", catalogs::router())
    .nest("/config", config::router())
    .nest("/gateway", gateway::router())
    .nest("/servers", servers::router())
    .nest("/ws", realtime::ws::router())
    .nest("/sse", realtime::sse::router())
    .layer(cors_layer())
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("x-content-type-options"),
      HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("x-frame-options"),
      HeaderValue::from_static("DENY"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("referrer-policy"),
      HeaderValue::from_static("strict-origin-when-cross-origin"),
    ))
}
