//! Prometheus metrics for the category cache and hub registry.
//!
//! Counters and gauges are emitted through the `metrics` facade; nothing is
//! recorded until a recorder is installed. The application installs one with
//! [`MetricsRecorder::install`] and renders it on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use boxoffice_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = MetricsRecorder::install()?;
//! // ... run the client ...
//! println!("{}", recorder.render());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Category fetch attempts, labelled by `outcome` (`success` / `failure`).
pub const CATEGORY_FETCHES_TOTAL: &str = "boxoffice_category_fetches_total";

/// Hub connect attempts, labelled by `channel` and `outcome`
/// (`connected` / `already_connected` / `failed`).
pub const HUB_CONNECTS_TOTAL: &str = "boxoffice_hub_connects_total";

/// Automatic reconnect attempts made by hub transports.
pub use boxoffice_core::hub::HUB_RECONNECTS_TOTAL;

/// Channels currently holding a started connection.
pub const HUB_CONNECTED_CHANNELS: &str = "boxoffice_hub_connected_channels";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install the recorder
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    /// Install the global Prometheus recorder and register descriptions.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a global recorder is already set.
    pub fn install() -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        tracing::debug!("Metrics recorder installed");

        Ok(Self { handle })
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn register_metrics() {
    describe_counter!(
        CATEGORY_FETCHES_TOTAL,
        "Total number of category listing fetches"
    );
    describe_counter!(
        HUB_CONNECTS_TOTAL,
        "Total number of hub connect requests"
    );
    describe_counter!(
        HUB_RECONNECTS_TOTAL,
        "Total number of automatic hub reconnect attempts"
    );
    describe_gauge!(
        HUB_CONNECTED_CHANNELS,
        "Number of channels with a started hub connection"
    );
}
