//! # Adapters
//!
//! Concrete implementations of the outbound ports.
//!
//! - `LoopbackProtocolHandler` - in-process protocol handler
//! - `EchoConnectionHandler` / `EchoListener` - echo every packet
//! - `IncapableHandler` - connection handler with no hooks
//! - `PortAllocator` - well-known port address families
//! - `StaticConfigProvider` / `TomlConfigProvider` - configuration

pub mod allocator;
pub mod config;
pub mod echo;
pub mod incapable;
pub mod loopback;

pub use allocator::PortAllocator;
pub use config::{StaticConfigProvider, TomlConfigProvider};
pub use echo::{EchoConnectionHandler, EchoListener};
pub use incapable::IncapableHandler;
pub use loopback::LoopbackProtocolHandler;
