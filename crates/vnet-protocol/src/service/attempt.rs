//! # Inbound Attempt
//!
//! A pending inbound connection offer, consummated exactly once by
//! `accept` or `close`.

use std::fmt;
use std::sync::Arc;

use super::connection::Connection;
use super::registry::ProtocolRegistry;
use crate::domain::{AttemptId, Result};
use crate::ports::ConnectionHandler;

/// Options for [`InboundAttempt::accept`].
#[derive(Clone)]
pub struct AcceptOptions {
    /// Overrides the attempt's local address
    pub local_address: Option<String>,
    /// Overrides the attempt's remote address
    pub remote_address: Option<String>,
    /// Handler for the caller's side of the connection
    pub handler: Arc<dyn ConnectionHandler>,
}

impl AcceptOptions {
    /// Accept with `handler` and the attempt's own addresses.
    pub fn new(handler: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            local_address: None,
            remote_address: None,
            handler,
        }
    }

    /// Override the local address.
    pub fn with_local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = Some(address.into());
        self
    }

    /// Override the remote address.
    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }
}

/// Handle to an inbound offer.
#[derive(Clone)]
pub struct InboundAttempt {
    id: AttemptId,
    local_addr: String,
    remote_addr: String,
    registry: Arc<ProtocolRegistry>,
}

impl fmt::Debug for InboundAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundAttempt")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}

impl InboundAttempt {
    pub(crate) fn new(
        id: AttemptId,
        local_addr: String,
        remote_addr: String,
        registry: Arc<ProtocolRegistry>,
    ) -> Self {
        Self {
            id,
            local_addr,
            remote_addr,
            registry,
        }
    }

    /// Attempt id.
    pub fn id(&self) -> AttemptId {
        self.id
    }

    /// Local address offered to the listener.
    pub fn local_address(&self) -> &str {
        &self.local_addr
    }

    /// Address of the initiating side.
    pub fn remote_address(&self) -> &str {
        &self.remote_addr
    }

    /// True once accepted or closed.
    pub fn is_consummated(&self) -> bool {
        !self.registry.state.lock().attempts.contains_key(&self.id)
    }

    /// Decline the offer; the listener sees `on_reject`.
    pub async fn close(&self) -> Result<()> {
        self.registry.reject_attempt(self.id).await
    }

    /// Accept the offer and return the caller's side of the new connection.
    ///
    /// The listener's `on_accept` supplies the handler for the other side.
    pub async fn accept(&self, opts: AcceptOptions) -> Result<Connection> {
        self.registry.accept_attempt(self.id, opts).await
    }
}
