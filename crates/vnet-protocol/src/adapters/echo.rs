//! # Echo Handlers
//!
//! A connection handler that acks every packet with the packet itself,
//! and a listener that hands it to every accepted connection.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{CloseReason, NetworkError, Result, SendOptions};
use crate::ports::{ConnectionHandler, ListenHandler};
use crate::service::{Connection, Port};

/// Echoes packets until closed.
#[derive(Debug, Default)]
pub struct EchoConnectionHandler {
    closed: Mutex<Option<String>>,
}

impl EchoConnectionHandler {
    /// Create an open handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close reason, once closed.
    pub fn closed_reason(&self) -> Option<String> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl ConnectionHandler for EchoConnectionHandler {
    async fn on_receive(
        &self,
        _connection: &Connection,
        packet: Bytes,
        _opts: &SendOptions,
    ) -> Result<Bytes> {
        if let Some(reason) = self.closed.lock().as_ref() {
            return Err(NetworkError::Handler(reason.clone()));
        }
        Ok(packet)
    }

    async fn on_close(&self, _connection: &Connection, reason: Option<&CloseReason>) -> Result<()> {
        let mut closed = self.closed.lock();
        if let Some(previous) = closed.as_ref() {
            return Err(NetworkError::Handler(previous.clone()));
        }
        *closed = Some(
            reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| NetworkError::ConnectionClosed.to_string()),
        );
        Ok(())
    }
}

/// Listener that accepts every offer with one shared [`EchoConnectionHandler`].
#[derive(Debug, Default)]
pub struct EchoListener {
    handler: Arc<EchoConnectionHandler>,
}

impl EchoListener {
    /// Create a listener with a fresh echo handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// The handler given to accepted connections.
    pub fn handler(&self) -> Arc<EchoConnectionHandler> {
        self.handler.clone()
    }
}

#[async_trait]
impl ListenHandler for EchoListener {
    async fn on_listen(&self, port: &Port) -> Result<()> {
        debug!(address = %port.local_address(), "Listening on echo port");
        Ok(())
    }

    async fn on_accept(
        &self,
        _port: &Port,
        _local_addr: &str,
        _remote_addr: &str,
    ) -> Result<Arc<dyn ConnectionHandler>> {
        Ok(self.handler.clone())
    }
}
