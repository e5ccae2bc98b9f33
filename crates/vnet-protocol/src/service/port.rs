//! # Port
//!
//! A bound local address. Ports listen, connect and own every connection
//! and inbound attempt created through them until `revoke`.

use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use tracing::{debug, warn};
use vnet_telemetry::{log_connection_event, log_port_event, metric_dec, metric_inc, ACTIVE_LISTENERS, PORTS_REVOKED};

use super::connection::Connection;
use super::registry::ProtocolRegistry;
use super::state::ListenerEntry;
use crate::domain::{
    tolerate_missing, Closable, CloseReason, NetworkError, PortId, Result, RevokeState,
    RevokeSummary,
};
use crate::ports::{ConnectionHandler, ListenHandler};

/// Handle to a bound port.
#[derive(Clone)]
pub struct Port {
    id: PortId,
    local_addr: String,
    registry: Arc<ProtocolRegistry>,
}

impl PartialEq for Port {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.registry, &other.registry)
    }
}

impl Eq for Port {}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("protocol", &self.registry.name())
            .finish()
    }
}

/// Non-owning port handle. Holding one does not keep the protocol alive.
#[derive(Clone)]
pub struct WeakPort {
    id: PortId,
    local_addr: String,
    registry: Weak<ProtocolRegistry>,
}

impl WeakPort {
    /// The port, if its protocol still exists.
    pub fn upgrade(&self) -> Option<Port> {
        self.registry
            .upgrade()
            .map(|registry| Port::new(self.id, self.local_addr.clone(), registry))
    }

    /// True when `port` is the port this handle was made from.
    pub fn refers_to(&self, port: &Port) -> bool {
        self.id == port.id && Weak::as_ptr(&self.registry) == Arc::as_ptr(&port.registry)
    }
}

impl fmt::Debug for WeakPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPort")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl Port {
    pub(crate) fn new(id: PortId, local_addr: String, registry: Arc<ProtocolRegistry>) -> Self {
        Self {
            id,
            local_addr,
            registry,
        }
    }

    /// Port id.
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Handle that does not keep the protocol alive.
    pub fn downgrade(&self) -> WeakPort {
        WeakPort {
            id: self.id,
            local_addr: self.local_addr.clone(),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Bound address. Still valid after revoke.
    pub fn local_address(&self) -> &str {
        &self.local_addr
    }

    /// Current revocation state.
    pub fn revoke_state(&self) -> RevokeState {
        self.registry.state.lock().revoke_state(self.id)
    }

    /// Number of connection pairs and attempts this port currently owns.
    pub fn open_count(&self) -> usize {
        self.registry.state.lock().owned_by(self.id).len()
    }

    fn ensure_not_revoked(&self) -> Result<()> {
        if self.revoke_state().is_revoked() {
            return Err(NetworkError::PortRevoked(self.local_addr.clone()));
        }
        Ok(())
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Listen for inbound connections at this port's address.
    ///
    /// Registering the active listener again is a no-op. A different
    /// active listener is replaced after its `on_remove` has run.
    pub async fn add_listener(&self, listener: Arc<dyn ListenHandler>) -> Result<()> {
        let mut replaced: Option<Arc<dyn ListenHandler>> = None;

        loop {
            let stale = {
                let mut state = self.registry.state.lock();
                if state.revoke_state(self.id).is_revoked() {
                    return Err(NetworkError::PortRevoked(self.local_addr.clone()));
                }

                let existing = state.listening.get(&self.local_addr).cloned();
                match existing {
                    Some(entry) if Arc::ptr_eq(&entry.listener, &listener) => return Ok(()),
                    Some(entry)
                        if !replaced
                            .as_ref()
                            .is_some_and(|old| Arc::ptr_eq(old, &entry.listener)) =>
                    {
                        Some(entry)
                    }
                    existing => {
                        if existing.is_none() {
                            metric_inc!(ACTIVE_LISTENERS);
                        }
                        state.listening.insert(
                            self.local_addr.clone(),
                            ListenerEntry {
                                port: self.id,
                                listener: listener.clone(),
                            },
                        );
                        None
                    }
                }
            };

            // The old listener must hear about its removal before the new one is active.
            let Some(stale) = stale else {
                break;
            };
            let stale_port = Port::new(stale.port, self.local_addr.clone(), self.registry.clone());
            tolerate_missing(stale.listener.on_remove(&stale_port).await)?;
            debug!(protocol = %self.registry.name(), address = %self.local_addr, "Listener replaced");
            replaced = Some(stale.listener);
        }

        self.registry
            .handler()
            .on_listen(self, &self.local_addr, listener.clone())
            .await?;
        tolerate_missing(listener.on_listen(self).await)?;

        log_port_event!(info, self.registry.name(), "Listening", self.local_addr);
        Ok(())
    }

    /// Stop listening. `listener` must be the active listener of this port.
    pub async fn remove_listener(&self, listener: Arc<dyn ListenHandler>) -> Result<()> {
        {
            let mut state = self.registry.state.lock();
            let entry = state
                .listening
                .get(&self.local_addr)
                .ok_or_else(|| NetworkError::NotListening(self.local_addr.clone()))?;
            if entry.port != self.id || !Arc::ptr_eq(&entry.listener, &listener) {
                return Err(NetworkError::ListenerMismatch(self.local_addr.clone()));
            }
            state.listening.remove(&self.local_addr);
        }
        metric_dec!(ACTIVE_LISTENERS);

        self.registry
            .handler()
            .on_listen_remove(self, &self.local_addr, listener.clone())
            .await?;
        tolerate_missing(listener.on_remove(self).await)?;

        log_port_event!(info, self.registry.name(), "Listener removed", self.local_addr);
        Ok(())
    }

    // =========================================================================
    // CONNECT
    // =========================================================================

    /// Connect to `remote_addr`, handling this side with `handler`.
    pub async fn connect(
        &self,
        remote_addr: &str,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Connection> {
        self.ensure_not_revoked()?;

        let conn = self.registry.outbound(self, remote_addr, handler).await?;

        let revoked = {
            let mut state = self.registry.state.lock();
            let revoked = state.revoke_state(self.id).is_revoked();
            if !revoked {
                state.adopt(self.id, conn.id());
            }
            revoked
        };

        if revoked {
            debug!(protocol = %self.registry.name(), address = %self.local_addr, "Port revoked during connect, closing");
            if let Err(e) = conn.close_with_reason(CloseReason::finalizer()).await {
                log_connection_event!(warn, self.registry.name(), "Close after revoke failed", conn.id(), error = %e);
            }
            return Err(NetworkError::PortRevoked(self.local_addr.clone()));
        }

        debug!(
            protocol = %self.registry.name(),
            local_addr = %conn.local_address(),
            remote_addr = %conn.remote_address(),
            "Connected"
        );
        Ok(conn)
    }

    // =========================================================================
    // REVOKE
    // =========================================================================

    /// Revoke the port: close everything it owns, drop its listener and
    /// unbind its address.
    ///
    /// A failing `on_revoke` hook and individual cleanup failures are
    /// counted in the summary; teardown always completes. Only a second
    /// revoke fails.
    pub async fn revoke(&self) -> Result<RevokeSummary> {
        {
            let mut state = self.registry.state.lock();
            let record = state
                .ports
                .get_mut(&self.id)
                .ok_or_else(|| NetworkError::AlreadyRevoked(self.local_addr.clone()))?;
            record
                .revoked
                .transition_to(RevokeState::Revoking)
                .map_err(|_| NetworkError::AlreadyRevoked(self.local_addr.clone()))?;
        }

        let hook = self
            .registry
            .handler()
            .on_revoke(self, &self.local_addr)
            .await;

        let (owned, listener) = {
            let mut state = self.registry.state.lock();
            if let Some(record) = state.ports.get_mut(&self.id) {
                record.revoked.transition_to(RevokeState::Revoked)?;
            }
            let listener = state
                .listening
                .get(&self.local_addr)
                .filter(|entry| entry.port == self.id)
                .map(|entry| entry.listener.clone());
            (state.owned_by(self.id), listener)
        };

        let closes = join_all(owned.into_iter().map(|closable| async move {
            match closable {
                Closable::Connection(id) => {
                    self.registry
                        .close_pair(id.pair, Some(CloseReason::finalizer()))
                        .await
                }
                Closable::Attempt(id) => self.registry.reject_attempt(id).await,
            }
        }));
        let remove = async {
            match listener {
                Some(listener) => Some(self.remove_listener(listener).await),
                None => None,
            }
        };
        let (results, removed) = futures::join!(closes, remove);

        let mut summary = RevokeSummary::default();
        if let Err(e) = hook {
            warn!(protocol = %self.registry.name(), address = %self.local_addr, error = %e, "on_revoke failed, continuing teardown");
            summary.failed += 1;
        }
        for result in results {
            match result {
                Ok(()) => summary.closed += 1,
                Err(e) => {
                    warn!(protocol = %self.registry.name(), address = %self.local_addr, error = %e, "Cleanup failed during revoke");
                    summary.failed += 1;
                }
            }
        }
        match removed {
            Some(Ok(())) => summary.listener_removed = true,
            Some(Err(e)) => {
                warn!(protocol = %self.registry.name(), address = %self.local_addr, error = %e, "Listener removal failed during revoke");
                summary.failed += 1;
            }
            None => {}
        }

        {
            let mut state = self.registry.state.lock();
            state.current_connections.remove(&self.id);
            if state.bound_ports.get(&self.local_addr) == Some(&self.id) {
                state.bound_ports.remove(&self.local_addr);
            }
            state.ports.remove(&self.id);
        }

        metric_inc!(PORTS_REVOKED);
        log_port_event!(
            info,
            self.registry.name(),
            "Port revoked",
            self.local_addr,
            closed = summary.closed,
            failed = summary.failed
        );
        Ok(summary)
    }
}
