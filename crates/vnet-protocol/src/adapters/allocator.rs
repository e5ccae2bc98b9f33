//! # Port Allocator
//!
//! Binds ports in the well-known IBC and local address families.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::domain::{NetworkConfig, NetworkError, Result};
use crate::ports::{ConfigProvider, Protocol};
use crate::service::Port;

/// Allocates IBC, controller and local ports on a protocol.
pub struct PortAllocator {
    protocol: Protocol,
    config: NetworkConfig,
    last_ica_port: AtomicU64,
    last_icq_port: AtomicU64,
}

impl PortAllocator {
    /// Create with default prefixes.
    pub fn new(protocol: Protocol) -> Self {
        Self::with_config(protocol, NetworkConfig::default())
    }

    /// Create with explicit configuration.
    pub fn with_config(protocol: Protocol, config: NetworkConfig) -> Self {
        Self {
            protocol,
            config,
            last_ica_port: AtomicU64::new(0),
            last_icq_port: AtomicU64::new(0),
        }
    }

    /// Create from a configuration provider.
    pub fn from_provider(protocol: Protocol, provider: &dyn ConfigProvider) -> Self {
        Self::with_config(protocol, provider.network_config())
    }

    /// Bind an IBC port, generated or `custom-<name>`.
    pub async fn allocate_custom_ibc_port(&self, name: Option<&str>) -> Result<Port> {
        let addr = self.custom_address(&self.config.ibc_port_prefix, name)?;
        self.bind(&addr).await
    }

    /// Bind the next interchain-accounts controller port.
    pub async fn allocate_ica_controller_port(&self) -> Result<Port> {
        let n = self.last_ica_port.fetch_add(1, Ordering::SeqCst) + 1;
        let addr = format!("{}icacontroller-{n}", self.config.ibc_port_prefix);
        self.bind(&addr).await
    }

    /// Bind the next interchain-query controller port.
    pub async fn allocate_icq_controller_port(&self) -> Result<Port> {
        let n = self.last_icq_port.fetch_add(1, Ordering::SeqCst) + 1;
        let addr = format!("{}icqcontroller-{n}", self.config.ibc_port_prefix);
        self.bind(&addr).await
    }

    /// Bind a local port, generated or `custom-<name>`.
    pub async fn allocate_custom_local_port(&self, name: Option<&str>) -> Result<Port> {
        let addr = self.custom_address(&self.config.local_port_prefix, name)?;
        self.bind(&addr).await
    }

    fn custom_address(&self, prefix: &str, name: Option<&str>) -> Result<String> {
        match name.filter(|name| !name.is_empty()) {
            Some(name) => {
                self.validate_port_name(name)?;
                Ok(format!("{prefix}custom-{name}"))
            }
            None => Ok(prefix.to_string()),
        }
    }

    async fn bind(&self, addr: &str) -> Result<Port> {
        let port = self.protocol.bind(addr).await?;
        debug!(protocol = %self.protocol.name(), address = %port.local_address(), "Port allocated");
        Ok(port)
    }

    /// Names are 2 to 128 characters from `[a-zA-Z0-9.,_+\-#<>\[\]]`.
    fn validate_port_name(&self, name: &str) -> Result<()> {
        let len = name.chars().count();
        let allowed = |c: char| c.is_ascii_alphanumeric() || ".,_+-#<>[]".contains(c);

        if len < self.config.port_name_min_len
            || len > self.config.port_name_max_len
            || !name.chars().all(allowed)
        {
            return Err(NetworkError::InvalidPortName(name.to_string()));
        }
        Ok(())
    }
}
