//! Process-wide access to the effective [`WharfConfig`], loaded once at
//! startup and read through a `OnceLock` for the lifetime of the
//! process — the same shape as the teacher's `core_config()` accessor.

use std::sync::OnceLock;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use wharf_client::entities::config::WharfConfig;

static CONFIG: OnceLock<WharfConfig> = OnceLock::new();

/// Loads configuration and stores it for the process. Must be called
/// exactly once, before any call to [`core_config`]; `main` does this
/// before anything else runs.
pub fn init() -> anyhow::Result<()> {
  let loaded = config::load()?;
  CONFIG.set(loaded).map_err(|_| {
    anyhow::anyhow!("core_config initialized more than once")
  })
}

/// Returns the effective configuration. Panics with a clear message if
/// called before [`init`] — a programmer error, not a runtime
/// condition callers should handle.
pub fn core_config() -> &'static WharfConfig {
  CONFIG.get().unwrap_or_else(|| {
    tracing::error!("core_config accessed before initialization");
    std::process::exit(1);
  })
}

/// Builds the CORS layer from `security.cors_*` (spec §6). An empty
/// origin list falls back to allowing any origin, matching the
/// teacher's "unset means wide open for local/dev use" default.
pub fn cors_layer() -> CorsLayer {
  let security = &core_config().security;

  let layer = if security.cors_origins.is_empty() {
    CorsLayer::new().allow_origin(tower_http::cors::Any)
  } else {
    let origins: Vec<HeaderValue> = security
      .cors_origins
      .iter()
      .filter_map(|origin| {
        HeaderValue::from_str(origin)
          .inspect_err(|e| {
            tracing::warn!("invalid CORS origin {origin:?}: {e}")
          })
          .ok()
      })
      .collect();
    CorsLayer::new().allow_origin(origins)
  };

  let methods: Vec<Method> = security
    .cors_methods
    .iter()
    .filter_map(|m| m.parse().ok())
    .collect();
  let layer = if methods.is_empty() {
    layer.allow_methods(tower_http::cors::Any)
  } else {
    layer.allow_methods(methods)
  };

  let headers: Vec<HeaderName> = security
    .cors_headers
    .iter()
    .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
    .collect();
  let layer = if headers.is_empty() {
    layer.allow_headers(tower_http::cors::Any)
  } else {
    layer.allow_headers(headers)
  };

  layer.max_age(std::time::Duration::from_secs(security.cors_max_age_secs))
}
