//! # Domain Errors
//!
//! Error types for the networking layer.

use thiserror::Error;

use super::revoke::RevokeState;

/// Networking error types.
///
/// `Clone` so a single failure can be re-raised after a fallback and
/// fanned out to every pending acknowledgement.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// Operation on a port that is revoking or revoked.
    #[error("Port {0} is revoked")]
    PortRevoked(String),

    /// Second revoke of the same port.
    #[error("Port {0} is already revoked")]
    AlreadyRevoked(String),

    /// Illegal revocation state change.
    #[error("Invalid revoke transition: {from:?} -> {to:?}")]
    InvalidRevokeTransition {
        /// Current state
        from: RevokeState,
        /// Requested state
        to: RevokeState,
    },

    /// No listener is registered at the port's address.
    #[error("Not listening on {0}")]
    NotListening(String),

    /// The registered listener is not the one supplied.
    #[error("Listener at {0} does not match")]
    ListenerMismatch(String),

    /// Inbound resolution found no listener for any prefix.
    #[error("No listener for {0}")]
    NoListener(String),

    /// Inbound attempt was already accepted or closed.
    #[error("Inbound attempt {0} already consummated")]
    AlreadyConsummated(String),

    /// Connection is closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A capability does not implement an optional hook.
    #[error("Handler does not implement {0}")]
    HookNotImplemented(&'static str),

    /// Loopback connect to an address with no registered listener.
    #[error("Unknown listener {0}")]
    UnknownListener(String),

    /// Address cannot name anything.
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    /// Allocated port name fails the allowed pattern.
    #[error("Invalid port name: {0:?}")]
    InvalidPortName(String),

    /// Port record missing from the registry.
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Protocol registry was dropped.
    #[error("Protocol dropped")]
    ProtocolDropped,

    /// Failure raised by an external handler.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl NetworkError {
    /// True for the optional-hook absence signal.
    pub fn is_hook_not_implemented(&self) -> bool {
        matches!(self, NetworkError::HookNotImplemented(_))
    }
}

/// Result type for networking operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Treat a missing optional hook as its default value.
///
/// Only [`NetworkError::HookNotImplemented`] is absorbed; every other
/// failure is returned unchanged.
pub fn tolerate_missing<T: Default>(result: Result<T>) -> Result<T> {
    match result {
        Err(NetworkError::HookNotImplemented(_)) => Ok(T::default()),
        other => other,
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file {path}: {error}")]
    Io {
        /// Path of the file that failed to load
        path: String,
        /// Error message from the I/O operation
        error: String,
    },

    /// Config file is not valid TOML.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Config values are inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
