//! # Outbound Ports
//!
//! Capabilities the networking layer calls into. Implementations are
//! supplied by the embedding system and may be slow, may re-enter the
//! layer and may fail.
//!
//! Optional hooks default to [`NetworkError::HookNotImplemented`], which
//! the layer treats as "absent". Any other error propagates.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::inbound::ProtocolImpl;
use crate::domain::{CloseReason, NetworkConfig, NetworkError, Result, SendOptions};
use crate::service::{Connection, Port};

/// Per-connection capability.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// The pair containing `connection` is open.
    async fn on_open(
        &self,
        _connection: &Connection,
        _local_addr: &str,
        _remote_addr: &str,
    ) -> Result<()> {
        Err(NetworkError::HookNotImplemented("on_open"))
    }

    /// A packet arrived; the returned bytes are the sender's ack.
    async fn on_receive(
        &self,
        _connection: &Connection,
        _packet: Bytes,
        _opts: &SendOptions,
    ) -> Result<Bytes> {
        Err(NetworkError::HookNotImplemented("on_receive"))
    }

    /// The connection closed.
    async fn on_close(&self, _connection: &Connection, _reason: Option<&CloseReason>) -> Result<()> {
        Err(NetworkError::HookNotImplemented("on_close"))
    }
}

/// Capability registered at an address to accept inbound offers.
#[async_trait]
pub trait ListenHandler: Send + Sync {
    /// The listener became active on `port`.
    async fn on_listen(&self, _port: &Port) -> Result<()> {
        Err(NetworkError::HookNotImplemented("on_listen"))
    }

    /// Accept an inbound offer and supply the local connection handler.
    async fn on_accept(
        &self,
        port: &Port,
        local_addr: &str,
        remote_addr: &str,
    ) -> Result<Arc<dyn ConnectionHandler>>;

    /// An inbound offer was declined.
    async fn on_reject(&self, _port: &Port, _local_addr: &str, _remote_addr: &str) -> Result<()> {
        Err(NetworkError::HookNotImplemented("on_reject"))
    }

    /// The listener was replaced or removed.
    async fn on_remove(&self, _port: &Port) -> Result<()> {
        Err(NetworkError::HookNotImplemented("on_remove"))
    }
}

/// Result of a remote negotiation.
///
/// A missing `handler` means the negotiation failed.
#[derive(Clone, Default)]
pub struct ConnectOutcome {
    /// Remote-side connection handler
    pub handler: Option<Arc<dyn ConnectionHandler>>,
    /// Instance the remote side created for this connection. Informational;
    /// the connection's remote address comes from `remote_address`.
    pub remote_instance: Option<String>,
    /// Overrides the local address of the new connection
    pub local_address: Option<String>,
    /// Overrides the remote address of the new connection
    pub remote_address: Option<String>,
}

impl ConnectOutcome {
    /// Successful outcome with a remote handler.
    pub fn with_handler(handler: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            handler: Some(handler),
            ..Self::default()
        }
    }

    /// Record the remote instance.
    pub fn remote_instance(mut self, instance: impl Into<String>) -> Self {
        self.remote_instance = Some(instance.into());
        self
    }
}

/// Pluggable strategy for address refinement, remote negotiation and
/// listener bookkeeping.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// The protocol was created; `protocol` gives raw registry access.
    async fn on_create(&self, _protocol: ProtocolImpl) -> Result<()> {
        Ok(())
    }

    /// Suffix for a port bound at an address ending in the separator.
    async fn generate_port_id(&self) -> Result<String>;

    /// A new port was bound.
    async fn on_bind(&self, _port: &Port, _local_addr: &str) -> Result<()> {
        Ok(())
    }

    /// Optional local instance suffix for a connection between the two addresses.
    async fn on_instantiate(
        &self,
        _port: &Port,
        _local_addr: &str,
        _remote_addr: &str,
    ) -> Result<Option<String>> {
        Err(NetworkError::HookNotImplemented("on_instantiate"))
    }

    /// Negotiate a connection to `remote_addr` with the remote side.
    async fn on_connect(
        &self,
        port: &Port,
        local_addr: &str,
        remote_addr: &str,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ConnectOutcome>;

    /// A listener was registered at `local_addr`.
    async fn on_listen(
        &self,
        port: &Port,
        local_addr: &str,
        listener: Arc<dyn ListenHandler>,
    ) -> Result<()>;

    /// A listener was removed from `local_addr`.
    async fn on_listen_remove(
        &self,
        port: &Port,
        local_addr: &str,
        listener: Arc<dyn ListenHandler>,
    ) -> Result<()>;

    /// The port is being revoked.
    async fn on_revoke(&self, _port: &Port, _local_addr: &str) -> Result<()> {
        Ok(())
    }
}

/// Configuration provider - outbound port.
pub trait ConfigProvider: Send + Sync {
    /// Network configuration.
    fn network_config(&self) -> NetworkConfig;
}
