//! # VNet Telemetry
//!
//! Observability for the virtual networking layer.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an env-filtered JSON or pretty formatter
//! - **Metrics**: Prometheus counters and gauges for ports, listeners and connections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vnet_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VNET_SERVICE_NAME` | `vnet` | Service name in logs |
//! | `VNET_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `VNET_JSON_LOGS` | `false` | JSON formatted output |
//! | `VNET_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, ACKS_FAILED, ACTIVE_CONNECTIONS, ACTIVE_LISTENERS,
    CONNECTIONS_CLOSED, CONNECTIONS_OPENED, INBOUND_ATTEMPTS, PACKETS_SENT, PORTS_BOUND,
    PORTS_REVOKED, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The tracing subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Prometheus registration or encoding failed
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Convenience macro for recording a gauge decrement.
#[macro_export]
macro_rules! metric_dec {
    ($metric:expr) => {
        $metric.dec()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).dec()
    };
}
