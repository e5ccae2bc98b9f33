//! # Network Configuration

use serde::{Deserialize, Serialize};

use super::address::ENDPOINT_SEPARATOR;
use super::errors::ConfigError;

/// Configuration for the loopback handler and port allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Prefix of loopback instance suffixes (`nonce/<n>`)
    pub loopback_instance_prefix: String,
    /// Prefix for IBC ports
    pub ibc_port_prefix: String,
    /// Prefix for local ports
    pub local_port_prefix: String,
    /// Minimum custom port name length
    pub port_name_min_len: usize,
    /// Maximum custom port name length
    pub port_name_max_len: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            loopback_instance_prefix: "nonce/".to_string(),
            ibc_port_prefix: "/ibc-port/".to_string(),
            local_port_prefix: "/local/".to_string(),
            port_name_min_len: 2,
            port_name_max_len: 128,
        }
    }
}

impl NetworkConfig {
    /// Check that prefixes are usable and name bounds are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, prefix) in [
            ("loopback_instance_prefix", &self.loopback_instance_prefix),
            ("ibc_port_prefix", &self.ibc_port_prefix),
            ("local_port_prefix", &self.local_port_prefix),
        ] {
            if prefix.is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
            if !prefix.ends_with(ENDPOINT_SEPARATOR) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must end with '{ENDPOINT_SEPARATOR}': {prefix:?}"
                )));
            }
        }

        if self.port_name_min_len > self.port_name_max_len {
            return Err(ConfigError::Invalid(format!(
                "port_name_min_len {} exceeds port_name_max_len {}",
                self.port_name_min_len, self.port_name_max_len
            )));
        }

        Ok(())
    }
}
