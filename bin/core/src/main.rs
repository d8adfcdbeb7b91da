//! Binary entrypoint: loads configuration, initializes every
//! process-wide singleton in `state`, assembles the HTTP router, and
//! serves it with `axum-server` (TLS-capable, matching the teacher's
//! `periphery::connection::server::run` pattern). The core's own
//! equivalent of that function was not retained in this pack, so the
//! wiring here is grounded directly on periphery's `run()`.

#[macro_use]
extern crate tracing;

mod api;
mod audit;
mod auth;
mod bulk;
mod catalog;
mod config;
mod error;
mod executor;
mod realtime;
mod state;

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;

use crate::config::core_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  config::init().context("failed to load configuration")?;

  let cfg = core_config();
  logger::init(&cfg.log).context("failed to initialize logger")?;

  info!("Wharf Core version: v{}", env!("CARGO_PKG_VERSION"));

  state::init_repositories()
    .await
    .context("failed to initialize repositories")?;

  // Touch every lazily-initialized singleton now so a misconfiguration
  // (e.g. an empty JWT signing key) crashes at startup rather than on
  // the first request that happens to need it.
  state::jwt_client();
  state::encrypted_store();
  state::auth_rate_limiter();
  state::command_rate_limiter();
  state::executor_semaphore();
  state::catalog_cache();
  state::audit_sink();

  // `Hub::new` spawns its own heartbeat/reaper tasks; touching the
  // accessor here just forces that to happen before the first
  // connection arrives rather than lazily on it.
  state::realtime_hub();

  let server = &cfg.server;
  let addr: SocketAddr = format!("{}:{}", server.host, server.port)
    .parse()
    .context("invalid server.host/server.port")?;

  let app = api::app()
    .into_make_service_with_connect_info::<SocketAddr>();

  let handle = axum_server::Handle::new();
  let shutdown_timeout = Duration::from_secs(server.shutdown_timeout_secs);
  tokio::spawn(wait_for_shutdown_signal(handle.clone(), shutdown_timeout));

  if server.tls_enabled {
    info!("Wharf Core starting on https://{addr}");
    let tls_config =
      RustlsConfig::from_pem_file(&server.tls_cert_file, &server.tls_key_file)
        .await
        .context("invalid server.tls_cert_file/server.tls_key_file")?;
    axum_server::bind_rustls(addr, tls_config)
      .handle(handle)
      .serve(app)
      .await
      .context("server crashed")?;
  } else {
    info!("Wharf Core starting on http://{addr}");
    axum_server::bind(addr)
      .handle(handle)
      .serve(app)
      .await
      .context("server crashed")?;
  }

  Ok(())
}

/// Waits for SIGTERM or Ctrl-C, then tells `axum-server` to stop
/// accepting new connections and give in-flight ones up to
/// `server.shutdown_timeout_secs` to finish (spec's "Non-goals" don't
/// exclude a plain graceful drain, and the teacher's periphery binary
/// drains its own terminals the same way on `SignalKind::terminate()`).
async fn wait_for_shutdown_signal(
  handle: axum_server::Handle,
  shutdown_timeout: Duration,
) {
  let ctrl_c = async {
    let _ = tokio::signal::ctrl_c().await;
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        error!("failed to install SIGTERM handler: {e:#}");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {}
    _ = terminate => {}
  }

  info!("shutdown signal received, draining connections (up to {shutdown_timeout:?})");
  handle.graceful_shutdown(Some(shutdown_timeout));
}
