//! Plain-data registry state.
//!
//! Everything a protocol registry knows lives in [`RegistryState`], keyed
//! by id. Handles carry only an id and look their record up here, so a
//! missing record is itself meaningful: a closed pair, a consummated
//! attempt or a revoked port.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::domain::{
    AttemptId, Closable, ConnectionId, ConnectionMode, PairId, PortId, Result, RevokeState,
};
use crate::ports::{ConnectionHandler, ListenHandler};

/// Bound port.
#[derive(Debug, Clone)]
pub(crate) struct PortRecord {
    pub(crate) local_addr: String,
    pub(crate) revoked: RevokeState,
}

impl PortRecord {
    pub(crate) fn new(local_addr: String) -> Self {
        Self {
            local_addr,
            revoked: RevokeState::NotRevoked,
        }
    }
}

/// Active listener at an address.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
    pub(crate) port: PortId,
    pub(crate) listener: Arc<dyn ListenHandler>,
}

/// Waiter for the ack of one tracked send.
pub(crate) type AckSender = oneshot::Sender<Result<Bytes>>;

/// Both halves of a connection. Removed on close.
pub(crate) struct PairRecord {
    pub(crate) addrs: [String; 2],
    pub(crate) handlers: [Arc<dyn ConnectionHandler>; 2],
    pub(crate) mode: ConnectionMode,
    pub(crate) pending_acks: HashMap<u64, AckSender>,
    pub(crate) next_ack: u64,
    /// Ports whose ownership sets hold this pair
    pub(crate) owners: HashSet<PortId>,
}

impl PairRecord {
    pub(crate) fn new(
        addrs: [String; 2],
        handlers: [Arc<dyn ConnectionHandler>; 2],
        mode: ConnectionMode,
    ) -> Self {
        Self {
            addrs,
            handlers,
            mode,
            pending_acks: HashMap::new(),
            next_ack: 0,
            owners: HashSet::new(),
        }
    }

    /// Register a waiter and return its key.
    pub(crate) fn register_ack(&mut self, sender: AckSender) -> u64 {
        let ack_id = self.next_ack;
        self.next_ack += 1;
        self.pending_acks.insert(ack_id, sender);
        ack_id
    }
}

/// Not-yet-consummated inbound offer. Removed on accept or close.
#[derive(Debug, Clone)]
pub(crate) struct AttemptRecord {
    pub(crate) port: PortId,
    pub(crate) listen_prefix: String,
    pub(crate) local_addr: String,
    pub(crate) remote_addr: String,
}

/// All state of one protocol registry.
#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) bound_ports: HashMap<String, PortId>,
    pub(crate) ports: HashMap<PortId, PortRecord>,
    pub(crate) listening: HashMap<String, ListenerEntry>,
    pub(crate) current_connections: HashMap<PortId, HashSet<Closable>>,
    pub(crate) pairs: HashMap<PairId, PairRecord>,
    pub(crate) attempts: HashMap<AttemptId, AttemptRecord>,
    next_id: u64,
}

impl RegistryState {
    pub(crate) fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Revocation state; ports no longer in the registry read as revoked.
    pub(crate) fn revoke_state(&self, port: PortId) -> RevokeState {
        self.ports
            .get(&port)
            .map(|record| record.revoked)
            .unwrap_or(RevokeState::Revoked)
    }

    /// Add to a port's ownership set if the port still has one.
    pub(crate) fn track(&mut self, port: PortId, closable: Closable) {
        if let Some(set) = self.current_connections.get_mut(&port) {
            set.insert(closable);
        }
    }

    pub(crate) fn untrack(&mut self, port: PortId, closable: Closable) {
        if let Some(set) = self.current_connections.get_mut(&port) {
            set.remove(&closable);
        }
    }

    /// Record `port` as an owner of the pair containing `connection`.
    pub(crate) fn adopt(&mut self, port: PortId, connection: ConnectionId) {
        if let Some(pair) = self.pairs.get_mut(&connection.pair) {
            pair.owners.insert(port);
            self.track(port, Closable::Connection(connection));
        }
    }

    /// Remove a pair and every ownership entry that refers to it.
    pub(crate) fn take_pair(&mut self, pair_id: PairId) -> Option<PairRecord> {
        let pair = self.pairs.remove(&pair_id)?;
        for owner in &pair.owners {
            for side in 0..2 {
                self.untrack(
                    *owner,
                    Closable::Connection(ConnectionId {
                        pair: pair_id,
                        side,
                    }),
                );
            }
        }
        Some(pair)
    }

    /// Snapshot of a port's ownership set with one entry per pair.
    pub(crate) fn owned_by(&self, port: PortId) -> Vec<Closable> {
        let mut seen_pairs = HashSet::new();
        self.current_connections
            .get(&port)
            .into_iter()
            .flatten()
            .filter(|closable| match closable {
                Closable::Connection(id) => seen_pairs.insert(id.pair),
                Closable::Attempt(_) => true,
            })
            .copied()
            .collect()
    }
}
