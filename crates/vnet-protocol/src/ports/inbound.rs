//! # Inbound Ports
//!
//! What the networking layer offers: protocols created by
//! [`make_network_protocol`] and the raw [`ProtocolImpl`] access handed
//! to protocol handlers.

use std::sync::{Arc, Weak};

use tracing::info;

use super::outbound::{ConnectionHandler, ProtocolHandler};
use crate::domain::{NetworkError, Result};
use crate::service::{Connection, InboundAttempt, InboundResolution, Port, ProtocolRegistry};

/// Create a protocol driven by `handler`.
///
/// The handler receives a [`ProtocolImpl`] through `on_create` before the
/// protocol is returned.
pub async fn make_network_protocol(
    name: impl Into<String>,
    handler: Arc<dyn ProtocolHandler>,
) -> Result<Protocol> {
    let registry = Arc::new(ProtocolRegistry::new(name, handler.clone()));
    handler.on_create(ProtocolImpl::new(&registry)).await?;

    info!(protocol = %registry.name(), "Protocol created");
    Ok(Protocol { registry })
}

/// A network protocol. Bind ports through it.
#[derive(Debug, Clone)]
pub struct Protocol {
    registry: Arc<ProtocolRegistry>,
}

impl Protocol {
    /// Protocol name.
    pub fn name(&self) -> &str {
        self.registry.name()
    }

    /// Bind a port at `local_addr`.
    ///
    /// An address ending in `/` gets a generated suffix. Binding a bound
    /// address returns the same port.
    pub async fn bind(&self, local_addr: &str) -> Result<Port> {
        self.registry.bind(local_addr).await
    }

    /// Raw registry access for this protocol.
    pub fn protocol_impl(&self) -> ProtocolImpl {
        ProtocolImpl::new(&self.registry)
    }
}

/// Registry entry points for protocol handlers.
///
/// Holds a weak reference so a handler can keep it without keeping the
/// protocol alive.
#[derive(Debug, Clone)]
pub struct ProtocolImpl {
    registry: Weak<ProtocolRegistry>,
}

impl ProtocolImpl {
    fn new(registry: &Arc<ProtocolRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
        }
    }

    fn registry(&self) -> Result<Arc<ProtocolRegistry>> {
        self.registry.upgrade().ok_or(NetworkError::ProtocolDropped)
    }

    /// Bind a port.
    pub async fn bind(&self, local_addr: &str) -> Result<Port> {
        self.registry()?.bind(local_addr).await
    }

    /// Offer an inbound connection from `remote_addr` to the best listener
    /// for `listen_addr`.
    pub async fn inbound(&self, listen_addr: &str, remote_addr: &str) -> Result<InboundAttempt> {
        self.registry()?.inbound(listen_addr, remote_addr).await
    }

    /// Inbound resolution that distinguishes "no listener" from failure.
    pub async fn resolve_inbound(
        &self,
        listen_addr: &str,
        remote_addr: &str,
    ) -> Result<InboundResolution> {
        self.registry()?
            .resolve_inbound(listen_addr, remote_addr)
            .await
    }

    /// Outbound negotiation for `port`, bypassing the revocation checks
    /// of [`Port::connect`].
    pub async fn outbound(
        &self,
        port: &Port,
        remote_addr: &str,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Connection> {
        self.registry()?.outbound(port, remote_addr, handler).await
    }

    /// Link two in-process handlers into a connection pair.
    pub async fn crossover_connection(
        &self,
        handler0: Arc<dyn ConnectionHandler>,
        addr0: &str,
        handler1: Arc<dyn ConnectionHandler>,
        addr1: &str,
    ) -> Result<[Connection; 2]> {
        self.registry()?
            .crossover_connection(handler0, addr0, handler1, addr1)
            .await
    }
}
