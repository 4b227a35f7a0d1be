#![cfg_attr(docsrs, doc(cfg(feature = "plugins")))]
//! Metrics plugin: installs a process-wide Prometheus recorder/exporter.
//!
//! This plugin wraps the `metrics` facade the rest of the crate records against
//! (counters, histograms) and, when the `metrics` feature is enabled, starts an
//! HTTP listener serving the Prometheus exposition format. It does not itself
//! define any counters — callers (e.g. `cache::stats`) record through the
//! global `metrics` recorder this plugin installs.
//!
//! Only one recorder may be installed process-wide; `setup` is idempotent and
//! safe to call from multiple plugin registrations.

use std::{
  net::SocketAddr,
  sync::atomic::{AtomicBool, Ordering},
};

use anyhow::Result;

use crate::router::Router;

use super::TakoPlugin;

/// Installs the Prometheus metrics exporter.
#[derive(Clone)]
pub struct MetricsPlugin {
  listen: SocketAddr,
  installed: std::sync::Arc<AtomicBool>,
}

impl MetricsPlugin {
  /// Creates a plugin that exposes `/metrics` on `listen`.
  pub fn new(listen: SocketAddr) -> Self {
    Self {
      listen,
      installed: std::sync::Arc::new(AtomicBool::new(false)),
    }
  }
}

impl Default for MetricsPlugin {
  fn default() -> Self {
    Self::new(([0, 0, 0, 0], 9091).into())
  }
}

impl TakoPlugin for MetricsPlugin {
  fn name(&self) -> &'static str {
    "MetricsPlugin"
  }

  #[cfg(feature = "metrics")]
  fn setup(&self, _router: &Router) -> Result<()> {
    if self.installed.swap(true, Ordering::SeqCst) {
      return Ok(());
    }

    metrics_exporter_prometheus::PrometheusBuilder::new()
      .with_http_listener(self.listen)
      .install()
      .map_err(|e| anyhow::anyhow!("failed to install prometheus exporter: {e}"))?;

    tracing::info!(addr = %self.listen, "metrics exporter installed");
    Ok(())
  }

  #[cfg(not(feature = "metrics"))]
  fn setup(&self, _router: &Router) -> Result<()> {
    Ok(())
  }
}
