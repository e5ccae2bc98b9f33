//! # Revocation
//!
//! Monotonic port revocation state machine.

use serde::{Deserialize, Serialize};

use super::errors::{NetworkError, Result};

/// Revocation state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RevokeState {
    /// Port is usable
    #[default]
    NotRevoked,
    /// `revoke` is running `on_revoke`
    Revoking,
    /// Terminal
    Revoked,
}

impl RevokeState {
    /// Transition to a new state.
    ///
    /// Only `NotRevoked -> Revoking -> Revoked` is allowed.
    pub fn transition_to(&mut self, next: RevokeState) -> Result<()> {
        let valid = matches!(
            (*self, next),
            (RevokeState::NotRevoked, RevokeState::Revoking)
                | (RevokeState::Revoking, RevokeState::Revoked)
        );

        if !valid {
            return Err(NetworkError::InvalidRevokeTransition {
                from: *self,
                to: next,
            });
        }

        *self = next;
        Ok(())
    }

    /// True once revocation has started.
    pub fn is_revoked(&self) -> bool {
        !matches!(self, RevokeState::NotRevoked)
    }
}

/// Confirmation value returned by `Port::revoke`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevokeSummary {
    /// Connections and attempts closed
    pub closed: usize,
    /// Cleanup steps that failed and were tolerated, `on_revoke` included
    pub failed: usize,
    /// Whether the port's listener was removed
    pub listener_removed: bool,
}
