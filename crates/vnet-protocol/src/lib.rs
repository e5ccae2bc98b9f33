//! # VNet Protocol
//!
//! Virtual networking layer for a capability-based runtime.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Hierarchical address binding with generated port ids
//! - Listener registration with last-wins replacement
//! - Connection establishment with an in-process loopback fast path
//! - Capability-scoped revocation that tears down everything a port owns
//!
//! ## Guarantees
//!
//! | Property | Description |
//! |----------|-------------|
//! | Idempotent bind | Binding a bound address returns the same port |
//! | Prefix priority | Inbound offers go to the most specific listener |
//! | Exactly-once consummation | An inbound attempt is accepted or closed once |
//! | Monotonic revocation | `NotRevoked -> Revoking -> Revoked`, never back |
//!
//! ## Module Structure
//!
//! ```text
//! vnet-protocol/
//! ├── domain/          # Addresses, ids, revoke state, config, errors
//! ├── ports/           # Protocol API, capability traits
//! ├── service/         # ProtocolRegistry, Port, Connection, InboundAttempt
//! └── adapters/        # Loopback handler, echo, allocator, config providers
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vnet_protocol::{make_network_protocol, EchoListener, IncapableHandler, LoopbackProtocolHandler};
//!
//! let protocol = make_network_protocol("loopback", Arc::new(LoopbackProtocolHandler::new())).await?;
//! let server = protocol.bind("/server").await?;
//! server.add_listener(Arc::new(EchoListener::new())).await?;
//!
//! let client = protocol.bind("/client/").await?;
//! let conn = client.connect("/server", Arc::new(IncapableHandler)).await?;
//! let ack = conn.send("ping", Default::default()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    EchoConnectionHandler, EchoListener, IncapableHandler, LoopbackProtocolHandler, PortAllocator,
    StaticConfigProvider, TomlConfigProvider,
};
pub use domain::{
    is_underspecified, prefixes_of, tolerate_missing, validate_address, with_instance, AttemptId,
    Closable, CloseReason, ConfigError, ConnectionId, ConnectionMode, NetworkConfig, NetworkError,
    PairId, PortId, Result, RevokeState, RevokeSummary, SendOptions, CLOSE_REASON_FINALIZER,
    ENDPOINT_SEPARATOR,
};
pub use ports::{
    make_network_protocol, ConfigProvider, ConnectOutcome, ConnectionHandler, ListenHandler,
    Protocol, ProtocolHandler, ProtocolImpl,
};
pub use service::{
    AcceptOptions, Connection, InboundAttempt, InboundResolution, Port, ProtocolRegistry,
    WeakPort,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
