// server/src/lib.rs

//! HTTP and WebSocket surface for the orderdesk engine.

pub mod config;
pub mod errors;
pub mod state;
pub mod web;

use crate::config::LogFormat;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt().with_env_filter(filter).with_span_events(FmtSpan::CLOSE);
  let result = match format {
    LogFormat::Json => builder.json().try_init(),
    LogFormat::Pretty => builder.try_init(),
  };
  if let Err(e) = result {
    eprintln!("tracing subscriber already installed: {}", e);
  }
}
