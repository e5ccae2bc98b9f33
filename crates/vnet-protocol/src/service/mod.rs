//! # Service Module
//!
//! Protocol registry and the handles it hands out: ports, connections
//! and inbound attempts. Handles are `(id, registry)` pairs; all state
//! lives in the registry.

mod attempt;
mod connection;
mod port;
mod registry;
mod state;


pub use attempt::{AcceptOptions, InboundAttempt};
pub use connection::Connection;
pub use port::{Port, WeakPort};
pub use registry::{InboundResolution, ProtocolRegistry};
