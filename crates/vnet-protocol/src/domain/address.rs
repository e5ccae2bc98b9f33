//! # Addressing
//!
//! Hierarchical `/`-separated addresses. Only inbound listener lookup
//! walks prefixes; binding and connecting use exact equality.

use super::errors::{NetworkError, Result};

/// Segment separator for every address in the network.
pub const ENDPOINT_SEPARATOR: char = '/';

/// Split `address` into its prefixes, most specific first.
///
/// `"a/b/c"` yields `["a/b/c", "a/b", "a"]`.
pub fn prefixes_of(address: &str) -> Vec<String> {
    let segments: Vec<&str> = address.split(ENDPOINT_SEPARATOR).collect();
    (1..=segments.len())
        .rev()
        .map(|i| segments[..i].join(&ENDPOINT_SEPARATOR.to_string()))
        .collect()
}

/// True when `bind` has to generate a port id suffix for this address.
pub fn is_underspecified(address: &str) -> bool {
    address.ends_with(ENDPOINT_SEPARATOR)
}

/// Append an optional instance suffix to `base`.
pub fn with_instance(base: &str, instance: Option<&str>) -> String {
    match instance {
        Some(instance) => format!("{base}{ENDPOINT_SEPARATOR}{instance}"),
        None => base.to_string(),
    }
}

/// Reject addresses that cannot name anything.
pub fn validate_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(NetworkError::InvalidAddress(address.to_string()));
    }
    Ok(())
}
