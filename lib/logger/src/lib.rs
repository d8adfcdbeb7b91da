//! Initializes the global `tracing` subscriber once at startup from
//! [`LogConfig`] (spec `SPEC_FULL.md` §1 "Structured logging").
//!
//! The teacher additionally wires an OpenTelemetry OTLP exporter layer
//! here; `WharfConfig`'s `LogConfig` has no `otlp_endpoint` field (that
//! concern is out of scope for this spec's ambient stack — logging is
//! named, tracing export to a collector is not), so this crate stays
//! with the plain `tracing-subscriber` `fmt` layer in the three stdio
//! modes spec §6 names (`standard`, `json`, `none`).

use anyhow::Context;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
  Registry, layer::SubscriberExt, util::SubscriberInitExt,
};
use wharf_client::entities::config::{LogConfig, StdioLogMode};

pub fn init(config: &LogConfig) -> anyhow::Result<()> {
  let log_level = tracing::Level::from_str(&config.level)
    .unwrap_or(tracing::Level::INFO);

  let registry =
    Registry::default().with(LevelFilter::from_level(log_level));

  match (config.stdio, config.pretty) {
    (StdioLogMode::Standard, true) => registry
      .with(
        tracing_subscriber::fmt::layer()
          .pretty()
          .with_file(false)
          .with_line_number(false)
          .with_target(config.location)
          .with_ansi(config.ansi),
      )
      .try_init(),
    (StdioLogMode::Standard, false) => registry
      .with(
        tracing_subscriber::fmt::layer()
          .with_file(false)
          .with_line_number(false)
          .with_target(config.location)
          .with_ansi(config.ansi),
      )
      .try_init(),
    (StdioLogMode::Json, _) => {
      registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    }
    (StdioLogMode::None, _) => Ok(()),
  }
  .context("failed to init logger")
}
