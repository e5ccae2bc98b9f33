//! Connection handler with no hooks.

use async_trait::async_trait;

use crate::ports::ConnectionHandler;

/// Implements none of the optional hooks: packets are acked with empty
/// bytes and open/close are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncapableHandler;

#[async_trait]
impl ConnectionHandler for IncapableHandler {}
