//! Prometheus metrics for the networking layer.
//!
//! All metrics follow the naming convention: `vnet_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., ports_bound_total)
//! - **Gauge**: Value that can go up or down (e.g., connections_active)

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PORT METRICS
    // =========================================================================

    /// Ports bound across all protocols
    pub static ref PORTS_BOUND: Counter = Counter::new(
        "vnet_ports_bound_total",
        "Total number of ports bound"
    ).expect("metric creation failed");

    /// Ports revoked across all protocols
    pub static ref PORTS_REVOKED: Counter = Counter::new(
        "vnet_ports_revoked_total",
        "Total number of ports revoked"
    ).expect("metric creation failed");

    /// Listeners currently registered
    pub static ref ACTIVE_LISTENERS: Gauge = Gauge::new(
        "vnet_listeners_active",
        "Number of listeners currently registered"
    ).expect("metric creation failed");

    // =========================================================================
    // CONNECTION METRICS
    // =========================================================================

    /// Connections opened, by establishment path
    pub static ref CONNECTIONS_OPENED: CounterVec = CounterVec::new(
        Opts::new("vnet_connections_opened_total", "Connection pairs opened"),
        &["path"]  // path: loopback/negotiated
    ).expect("metric creation failed");

    /// Connections closed
    pub static ref CONNECTIONS_CLOSED: Counter = Counter::new(
        "vnet_connections_closed_total",
        "Total number of connection pairs closed"
    ).expect("metric creation failed");

    /// Connections currently open
    pub static ref ACTIVE_CONNECTIONS: Gauge = Gauge::new(
        "vnet_connections_active",
        "Number of connection pairs currently open"
    ).expect("metric creation failed");

    /// Packets handed to a peer
    pub static ref PACKETS_SENT: Counter = Counter::new(
        "vnet_packets_sent_total",
        "Total number of packets sent"
    ).expect("metric creation failed");

    /// Acknowledgements that resolved to an error
    pub static ref ACKS_FAILED: Counter = Counter::new(
        "vnet_acks_failed_total",
        "Total number of failed acknowledgements"
    ).expect("metric creation failed");

    // =========================================================================
    // INBOUND METRICS
    // =========================================================================

    /// Inbound attempts consummated, by outcome
    pub static ref INBOUND_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("vnet_inbound_attempts_total", "Inbound attempts consummated"),
        &["outcome"]  // outcome: accepted/rejected
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Ports
        Box::new(PORTS_BOUND.clone()),
        Box::new(PORTS_REVOKED.clone()),
        Box::new(ACTIVE_LISTENERS.clone()),
        // Connections
        Box::new(CONNECTIONS_OPENED.clone()),
        Box::new(CONNECTIONS_CLOSED.clone()),
        Box::new(ACTIVE_CONNECTIONS.clone()),
        Box::new(PACKETS_SENT.clone()),
        Box::new(ACKS_FAILED.clone()),
        // Inbound
        Box::new(INBOUND_ATTEMPTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
