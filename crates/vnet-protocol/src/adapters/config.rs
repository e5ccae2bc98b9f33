//! # Configuration Providers
//!
//! - `StaticConfigProvider` - in-memory config for tests and embedding
//! - `TomlConfigProvider` - config loaded from a TOML file

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{ConfigError, NetworkConfig};
use crate::ports::ConfigProvider;

// ============================================================================
// StaticConfigProvider - Hardcoded config for testing/development
// ============================================================================

/// Static configuration provider.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: NetworkConfig,
}

impl StaticConfigProvider {
    /// Create with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with specified config.
    #[must_use]
    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn network_config(&self) -> NetworkConfig {
        self.config.clone()
    }
}

// ============================================================================
// TomlConfigProvider - Config file loading
// ============================================================================

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    loopback: LoopbackSection,
    #[serde(default)]
    allocator: AllocatorSection,
}

#[derive(Debug, Deserialize, Default)]
struct LoopbackSection {
    instance_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AllocatorSection {
    ibc_port_prefix: Option<String>,
    local_port_prefix: Option<String>,
    port_name_min_len: Option<usize>,
    port_name_max_len: Option<usize>,
}

/// TOML-based configuration provider.
///
/// # Config File Format
///
/// ```toml
/// [loopback]
/// instance_prefix = "nonce/"
///
/// [allocator]
/// ibc_port_prefix = "/ibc-port/"
/// local_port_prefix = "/local/"
/// port_name_min_len = 2
/// port_name_max_len = 128
/// ```
///
/// Missing keys fall back to [`NetworkConfig::default`].
#[derive(Debug, Clone)]
pub struct TomlConfigProvider {
    config: NetworkConfig,
}

impl TomlConfigProvider {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = NetworkConfig::default();
        let allocator = file.allocator;
        let config = NetworkConfig {
            loopback_instance_prefix: file
                .loopback
                .instance_prefix
                .unwrap_or(defaults.loopback_instance_prefix),
            ibc_port_prefix: allocator
                .ibc_port_prefix
                .unwrap_or(defaults.ibc_port_prefix),
            local_port_prefix: allocator
                .local_port_prefix
                .unwrap_or(defaults.local_port_prefix),
            port_name_min_len: allocator
                .port_name_min_len
                .unwrap_or(defaults.port_name_min_len),
            port_name_max_len: allocator
                .port_name_max_len
                .unwrap_or(defaults.port_name_max_len),
        };
        config.validate()?;

        Ok(Self { config })
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn network_config(&self) -> NetworkConfig {
        self.config.clone()
    }
}
