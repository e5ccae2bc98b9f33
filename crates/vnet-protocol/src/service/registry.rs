//! # Protocol Registry
//!
//! Owns the bound ports, active listeners and per-port ownership sets of
//! one protocol, and implements `bind`, inbound resolution and outbound
//! negotiation against a pluggable [`ProtocolHandler`].
//!
//! State lives behind one mutex that is never held across an `.await`:
//! every registry update happens entirely before or entirely after a
//! call into a capability.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::debug;
use vnet_telemetry::{
    log_connection_event, log_port_event, metric_dec, metric_inc, ACKS_FAILED, ACTIVE_CONNECTIONS, CONNECTIONS_CLOSED,
    CONNECTIONS_OPENED, INBOUND_ATTEMPTS, PORTS_BOUND,
};

use super::attempt::{AcceptOptions, InboundAttempt};
use super::connection::Connection;
use super::port::Port;
use super::state::{AttemptRecord, ListenerEntry, PairRecord, PortRecord, RegistryState};
use crate::domain::{
    is_underspecified, prefixes_of, tolerate_missing, validate_address, with_instance,
    AttemptId, Closable, CloseReason, ConnectionId, ConnectionMode, NetworkError, PairId, PortId,
    Result,
};
use crate::ports::{ConnectionHandler, ProtocolHandler};

/// Outcome of walking listener prefixes for an inbound address.
pub enum InboundResolution {
    /// A listener took the offer.
    Found(InboundAttempt),
    /// No listener matched; carries the last failure seen.
    NotFound(NetworkError),
}

/// Registry of ports, listeners and connections for one protocol.
pub struct ProtocolRegistry {
    name: String,
    handler: Arc<dyn ProtocolHandler>,
    pub(super) state: Mutex<RegistryState>,
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ProtocolRegistry {
    /// Create an empty registry driven by `handler`.
    pub fn new(name: impl Into<String>, handler: Arc<dyn ProtocolHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Protocol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn handler(&self) -> &Arc<dyn ProtocolHandler> {
        &self.handler
    }

    // =========================================================================
    // BIND
    // =========================================================================

    /// Bind `local_addr`, generating a port id suffix when the address ends
    /// with the separator. Binding an already bound address returns the
    /// existing port.
    pub async fn bind(self: &Arc<Self>, local_addr: &str) -> Result<Port> {
        validate_address(local_addr)?;

        let mut addr = local_addr.to_string();
        if is_underspecified(local_addr) {
            loop {
                let port_id = self.handler.generate_port_id().await?;
                let candidate = format!("{local_addr}{port_id}");
                if !self.state.lock().bound_ports.contains_key(&candidate) {
                    addr = candidate;
                    break;
                }
                debug!(protocol = %self.name, address = %candidate, "Generated port id in use");
            }
        }

        if let Some(port) = self.bound_port(&addr) {
            return Ok(port);
        }

        let port = {
            let mut state = self.state.lock();
            let id = PortId(state.allocate_id());
            state.ports.insert(id, PortRecord::new(addr.clone()));
            Port::new(id, addr.clone(), self.clone())
        };

        if let Err(e) = self.handler.on_bind(&port, &addr).await {
            self.state.lock().ports.remove(&port.id());
            return Err(e);
        }

        let mut state = self.state.lock();
        if let Some(&existing) = state.bound_ports.get(&addr) {
            // A concurrent bind of the same address won.
            state.ports.remove(&port.id());
            return Ok(Port::new(existing, addr, self.clone()));
        }
        state.bound_ports.insert(addr.clone(), port.id());
        state.current_connections.insert(port.id(), Default::default());
        drop(state);

        metric_inc!(PORTS_BOUND);
        log_port_event!(info, self.name, "Port bound", addr, port_id = %port.id());
        Ok(port)
    }

    fn bound_port(self: &Arc<Self>, addr: &str) -> Option<Port> {
        let state = self.state.lock();
        state
            .bound_ports
            .get(addr)
            .map(|&id| Port::new(id, addr.to_string(), self.clone()))
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Find the most specific listener for `listen_addr` and create an
    /// inbound attempt for it.
    ///
    /// Failures from `on_instantiate` move on to the next prefix and are
    /// reported through [`InboundResolution::NotFound`]. Only a malformed
    /// address is returned as `Err`.
    pub async fn resolve_inbound(
        self: &Arc<Self>,
        listen_addr: &str,
        remote_addr: &str,
    ) -> Result<InboundResolution> {
        validate_address(listen_addr)?;

        let mut last_failure = None;
        for prefix in prefixes_of(listen_addr) {
            let entry = self.state.lock().listening.get(&prefix).cloned();
            let Some(entry) = entry else {
                continue;
            };

            let port = Port::new(entry.port, prefix.clone(), self.clone());
            let instance = match tolerate_missing(
                self.handler
                    .on_instantiate(&port, &prefix, remote_addr)
                    .await,
            ) {
                Ok(instance) => instance,
                Err(e) => {
                    debug!(protocol = %self.name, prefix = %prefix, error = %e, "Instantiate failed, trying next prefix");
                    last_failure = Some(e);
                    continue;
                }
            };
            let local_addr = with_instance(&prefix, instance.as_deref());

            let mut state = self.state.lock();
            let Some(current) = state.listening.get(&prefix).map(|e| e.port) else {
                continue;
            };
            if state.revoke_state(current).is_revoked() {
                continue;
            }
            let id = AttemptId(state.allocate_id());
            state.attempts.insert(
                id,
                AttemptRecord {
                    port: current,
                    listen_prefix: prefix.clone(),
                    local_addr: local_addr.clone(),
                    remote_addr: remote_addr.to_string(),
                },
            );
            state.track(current, Closable::Attempt(id));
            drop(state);

            debug!(
                protocol = %self.name,
                listen_prefix = %prefix,
                local_addr = %local_addr,
                remote_addr = %remote_addr,
                "Inbound attempt created"
            );
            return Ok(InboundResolution::Found(InboundAttempt::new(
                id,
                local_addr,
                remote_addr.to_string(),
                self.clone(),
            )));
        }

        Ok(InboundResolution::NotFound(last_failure.unwrap_or_else(
            || NetworkError::NoListener(listen_addr.to_string()),
        )))
    }

    /// Inbound resolution as a plain result.
    pub async fn inbound(
        self: &Arc<Self>,
        listen_addr: &str,
        remote_addr: &str,
    ) -> Result<InboundAttempt> {
        match self.resolve_inbound(listen_addr, remote_addr).await? {
            InboundResolution::Found(attempt) => Ok(attempt),
            InboundResolution::NotFound(reason) => Err(reason),
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Connect `port` to `remote_addr`: a local listener is tried first,
    /// then the protocol handler negotiates with the remote side.
    pub async fn outbound(
        self: &Arc<Self>,
        port: &Port,
        remote_addr: &str,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Connection> {
        validate_address(remote_addr)?;

        let local_addr = port.local_address();
        let instance = tolerate_missing(
            self.handler
                .on_instantiate(port, local_addr, remote_addr)
                .await,
        )?;
        let initial_local = with_instance(local_addr, instance.as_deref());

        let last_failure = match self.resolve_inbound(remote_addr, &initial_local).await? {
            InboundResolution::Found(attempt) => {
                debug!(protocol = %self.name, local_addr = %initial_local, remote_addr = %remote_addr, "Loopback connection");
                return attempt.accept(AcceptOptions::new(handler)).await;
            }
            InboundResolution::NotFound(reason) => reason,
        };

        let outcome = self
            .handler
            .on_connect(port, &initial_local, remote_addr, handler.clone())
            .await?;
        let Some(remote_handler) = outcome.handler else {
            debug!(protocol = %self.name, remote_addr = %remote_addr, error = %last_failure, "Negotiation supplied no handler");
            return Err(last_failure);
        };

        let local = outcome.local_address.unwrap_or(initial_local);
        let remote = outcome
            .remote_address
            .unwrap_or_else(|| remote_addr.to_string());
        let [ours, _] = self
            .crossover(
                ConnectionMode::Tracked,
                Some(port.id()),
                handler,
                local,
                remote_handler,
                remote,
            )
            .await?;
        Ok(ours)
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Link two in-process handlers directly. Returns both sides, side 0
    /// first. The pair has no owning port.
    pub async fn crossover_connection(
        self: &Arc<Self>,
        handler0: Arc<dyn ConnectionHandler>,
        addr0: &str,
        handler1: Arc<dyn ConnectionHandler>,
        addr1: &str,
    ) -> Result<[Connection; 2]> {
        self.crossover(
            ConnectionMode::Direct,
            None,
            handler0,
            addr0.to_string(),
            handler1,
            addr1.to_string(),
        )
        .await
    }

    /// Build a linked pair of connections and open both sides.
    ///
    /// Side 0 is addressed at `addr0` and handled by `handler0`. When an
    /// owner is given the pair is added to its ownership set.
    pub(super) async fn crossover(
        self: &Arc<Self>,
        mode: ConnectionMode,
        owner: Option<PortId>,
        handler0: Arc<dyn ConnectionHandler>,
        addr0: String,
        handler1: Arc<dyn ConnectionHandler>,
        addr1: String,
    ) -> Result<[Connection; 2]> {
        let pair = {
            let mut state = self.state.lock();
            if let Some(owner) = owner {
                if state.revoke_state(owner).is_revoked() {
                    return Err(NetworkError::PortRevoked(addr0));
                }
            }
            let pair = PairId(state.allocate_id());
            state.pairs.insert(
                pair,
                PairRecord::new(
                    [addr0.clone(), addr1.clone()],
                    [handler0.clone(), handler1.clone()],
                    mode,
                ),
            );
            if let Some(owner) = owner {
                let side0 = ConnectionId { pair, side: 0 };
                state.adopt(owner, side0);
                state.adopt(owner, side0.peer());
            }
            pair
        };

        metric_inc!(CONNECTIONS_OPENED, &[mode.label()]);
        metric_inc!(ACTIVE_CONNECTIONS);

        let conns = [
            Connection::new(
                ConnectionId { pair, side: 0 },
                addr0.clone(),
                addr1.clone(),
                self.clone(),
            ),
            Connection::new(ConnectionId { pair, side: 1 }, addr1, addr0, self.clone()),
        ];

        for (conn, handler) in conns.iter().zip([handler0, handler1]) {
            let opened = handler
                .on_open(conn, conn.local_address(), conn.remote_address())
                .await;
            if let Err(e) = tolerate_missing(opened) {
                log_connection_event!(warn, self.name, "on_open failed", conn.id(), error = %e);
            }
        }

        debug!(protocol = %self.name, pair = pair.0, mode = mode.label(), "Connection pair opened");
        Ok(conns)
    }

    /// Tear down both halves of a pair.
    ///
    /// Pending acks are rejected and each side's handler sees `on_close`
    /// exactly once.
    pub(super) async fn close_pair(
        self: &Arc<Self>,
        pair_id: PairId,
        reason: Option<CloseReason>,
    ) -> Result<()> {
        let record = self
            .state
            .lock()
            .take_pair(pair_id)
            .ok_or(NetworkError::ConnectionClosed)?;

        for (_, waiter) in record.pending_acks {
            metric_inc!(ACKS_FAILED);
            let _ = waiter.send(Err(NetworkError::ConnectionClosed));
        }
        metric_inc!(CONNECTIONS_CLOSED);
        metric_dec!(ACTIVE_CONNECTIONS);

        let [addr0, addr1] = record.addrs;
        let conns = [
            Connection::new(
                ConnectionId {
                    pair: pair_id,
                    side: 0,
                },
                addr0.clone(),
                addr1.clone(),
                self.clone(),
            ),
            Connection::new(
                ConnectionId {
                    pair: pair_id,
                    side: 1,
                },
                addr1,
                addr0,
                self.clone(),
            ),
        ];

        let results = join_all(
            conns
                .iter()
                .zip(record.handlers.iter())
                .map(|(conn, handler)| handler.on_close(conn, reason.as_ref())),
        )
        .await;

        debug!(
            protocol = %self.name,
            pair = pair_id.0,
            reason = reason.as_ref().map(CloseReason::as_str).unwrap_or(""),
            "Connection pair closed"
        );

        results
            .into_iter()
            .map(tolerate_missing)
            .find(|result| result.is_err())
            .unwrap_or(Ok(()))
    }

    /// Consummate an attempt by declining it.
    pub(super) async fn reject_attempt(self: &Arc<Self>, id: AttemptId) -> Result<()> {
        let (record, entry) = self.take_attempt(id)?;
        let port = Port::new(entry.port, record.listen_prefix.clone(), self.clone());

        metric_inc!(INBOUND_ATTEMPTS, &["rejected"]);
        debug!(protocol = %self.name, local_addr = %record.local_addr, remote_addr = %record.remote_addr, "Inbound attempt rejected");

        tolerate_missing(
            entry
                .listener
                .on_reject(&port, &record.local_addr, &record.remote_addr)
                .await,
        )
    }

    /// Consummate an attempt by accepting it; returns the caller's side.
    pub(super) async fn accept_attempt(
        self: &Arc<Self>,
        id: AttemptId,
        opts: AcceptOptions,
    ) -> Result<Connection> {
        let (record, entry) = self.take_attempt(id)?;
        let port = Port::new(entry.port, record.listen_prefix.clone(), self.clone());

        let local = opts.local_address.unwrap_or(record.local_addr);
        let remote = opts.remote_address.unwrap_or(record.remote_addr);
        let local_handler = entry.listener.on_accept(&port, &local, &remote).await?;

        metric_inc!(INBOUND_ATTEMPTS, &["accepted"]);

        let [_, theirs] = self
            .crossover(
                ConnectionMode::Direct,
                Some(entry.port),
                local_handler,
                local,
                opts.handler,
                remote,
            )
            .await?;
        Ok(theirs)
    }

    /// Remove an attempt record and find the listener it was offered to.
    fn take_attempt(&self, id: AttemptId) -> Result<(AttemptRecord, ListenerEntry)> {
        let mut state = self.state.lock();
        let record = state
            .attempts
            .remove(&id)
            .ok_or_else(|| NetworkError::AlreadyConsummated(id.to_string()))?;
        state.untrack(record.port, Closable::Attempt(id));
        let entry = state
            .listening
            .get(&record.listen_prefix)
            .cloned()
            .ok_or_else(|| NetworkError::NotListening(record.listen_prefix.clone()))?;
        Ok((record, entry))
    }
}
