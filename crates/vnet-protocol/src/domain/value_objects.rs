//! # Value Objects
//!
//! Identifiers and small immutable values shared across the layer.

use std::fmt;
use std::time::Duration;

/// Close reason used when a revoked port tears down its connections.
pub const CLOSE_REASON_FINALIZER: &str = "closed-by-finalizer";

/// Port identifier, unique within one protocol registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u64);

/// Identifier of a linked connection pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(pub u64);

/// Inbound attempt identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

/// One half of a connection pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    /// Pair this connection belongs to
    pub pair: PairId,
    /// 0 or 1
    pub side: usize,
}

impl ConnectionId {
    /// The other half of the same pair.
    pub fn peer(&self) -> ConnectionId {
        ConnectionId {
            pair: self.pair,
            side: 1 - self.side,
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt#{}", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pair.0, self.side)
    }
}

/// Element of a port's ownership set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Closable {
    /// An open connection
    Connection(ConnectionId),
    /// A not-yet-consummated inbound attempt
    Attempt(AttemptId),
}

/// How a connection pair delivers packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// In-process pair: `send` awaits the peer's `on_receive` directly,
    /// racing it against close.
    Direct,
    /// Negotiated pair: `send` settles through the pending-ack table.
    Tracked,
}

impl ConnectionMode {
    /// Metric label for the establishment path.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionMode::Direct => "loopback",
            ConnectionMode::Tracked => "negotiated",
        }
    }
}

/// Why a connection was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason(String);

impl CloseReason {
    /// Create a close reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Reason used by port revocation.
    pub fn finalizer() -> Self {
        Self(CLOSE_REASON_FINALIZER.to_string())
    }

    /// Reason text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options forwarded untouched to the peer's `on_receive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendOptions {
    /// Timeout relative to the send
    pub relative_timeout: Option<Duration>,
    /// Absolute timeout height
    pub timeout_height: Option<u64>,
}

impl SendOptions {
    /// Set a relative timeout.
    pub fn with_relative_timeout(mut self, timeout: Duration) -> Self {
        self.relative_timeout = Some(timeout);
        self
    }

    /// Set a timeout height.
    pub fn with_timeout_height(mut self, height: u64) -> Self {
        self.timeout_height = Some(height);
        self
    }
}
