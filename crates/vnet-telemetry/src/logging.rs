//! Structured logging setup.
//!
//! Logs carry consistent fields so they can be filtered by protocol and port:
//! - `protocol`: protocol name the registry was created with
//! - `address`: local address of the port or connection
//! - `connection_id`: `pair/side` identifier of a connection endpoint

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global tracing subscriber.
///
/// JSON output is used for containers, pretty output for development.
/// Installing twice returns [`TelemetryError::LoggingInit`].
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    if !config.console_output {
        return tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()));
    }

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );

    Ok(())
}

/// Log a port-related event with standard fields.
#[macro_export]
macro_rules! log_port_event {
    ($level:ident, $protocol:expr, $msg:expr, $address:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            protocol = %$protocol,
            address = %$address,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a connection-related event with standard fields.
#[macro_export]
macro_rules! log_connection_event {
    ($level:ident, $protocol:expr, $msg:expr, $connection_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            protocol = %$protocol,
            connection_id = %$connection_id,
            $($($field)*,)?
            $msg
        )
    };
}
