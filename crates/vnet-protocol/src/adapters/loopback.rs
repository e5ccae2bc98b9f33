//! # Loopback Protocol Handler
//!
//! Reference [`ProtocolHandler`] that only connects ports bound within
//! the same registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{tolerate_missing, NetworkConfig, NetworkError, Result};
use crate::ports::{ConnectOutcome, ConnectionHandler, ListenHandler, ProtocolHandler};
use crate::service::{Port, WeakPort};

/// Protocol handler whose remote side is this process.
///
/// Listening ports are held weakly; the registry owns this handler.
pub struct LoopbackProtocolHandler {
    listeners: Mutex<HashMap<String, (WeakPort, Arc<dyn ListenHandler>)>>,
    port_nonce: AtomicU64,
    instance_nonce: AtomicU64,
    instance_prefix: String,
}

impl LoopbackProtocolHandler {
    /// Create with the default `nonce/` instance prefix.
    pub fn new() -> Self {
        Self::with_instance_prefix(NetworkConfig::default().loopback_instance_prefix)
    }

    /// Create with a custom instance prefix.
    pub fn with_instance_prefix(instance_prefix: impl Into<String>) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            port_nonce: AtomicU64::new(0),
            instance_nonce: AtomicU64::new(0),
            instance_prefix: instance_prefix.into(),
        }
    }

    /// Create from network configuration.
    pub fn with_config(config: &NetworkConfig) -> Self {
        Self::with_instance_prefix(config.loopback_instance_prefix.clone())
    }

    /// Number of addresses with a registered listener.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Default for LoopbackProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolHandler for LoopbackProtocolHandler {
    async fn generate_port_id(&self) -> Result<String> {
        let nonce = self.port_nonce.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("port{nonce}"))
    }

    async fn on_instantiate(
        &self,
        _port: &Port,
        _local_addr: &str,
        _remote_addr: &str,
    ) -> Result<Option<String>> {
        let nonce = self.instance_nonce.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(format!("{}{nonce}", self.instance_prefix)))
    }

    async fn on_connect(
        &self,
        _port: &Port,
        local_addr: &str,
        remote_addr: &str,
        _handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ConnectOutcome> {
        let (lport, listener) = self
            .listeners
            .lock()
            .get(remote_addr)
            .cloned()
            .ok_or_else(|| NetworkError::UnknownListener(remote_addr.to_string()))?;
        let lport = lport.upgrade().ok_or(NetworkError::ProtocolDropped)?;

        let remote_handler = listener.on_accept(&lport, remote_addr, local_addr).await?;
        let remote_instance =
            tolerate_missing(self.on_instantiate(&lport, remote_addr, local_addr).await)?;

        debug!(local_addr = %local_addr, remote_addr = %remote_addr, "Loopback connect negotiated");
        Ok(ConnectOutcome {
            handler: Some(remote_handler),
            remote_instance,
            ..ConnectOutcome::default()
        })
    }

    async fn on_listen(
        &self,
        port: &Port,
        local_addr: &str,
        listener: Arc<dyn ListenHandler>,
    ) -> Result<()> {
        // Last one wins.
        self.listeners
            .lock()
            .insert(local_addr.to_string(), (port.downgrade(), listener));
        Ok(())
    }

    async fn on_listen_remove(
        &self,
        port: &Port,
        local_addr: &str,
        listener: Arc<dyn ListenHandler>,
    ) -> Result<()> {
        let mut listeners = self.listeners.lock();
        let (lport, lhandler) = listeners
            .get(local_addr)
            .ok_or_else(|| NetworkError::NotListening(local_addr.to_string()))?;
        if !lport.refers_to(port) || !Arc::ptr_eq(lhandler, &listener) {
            return Err(NetworkError::ListenerMismatch(local_addr.to_string()));
        }
        listeners.remove(local_addr);
        Ok(())
    }
}
