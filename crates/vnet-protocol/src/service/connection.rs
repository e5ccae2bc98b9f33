//! # Connection
//!
//! One half of a linked connection pair.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;
use vnet_telemetry::{log_connection_event, metric_inc, ACKS_FAILED, PACKETS_SENT};

use super::registry::ProtocolRegistry;
use crate::domain::{
    tolerate_missing, CloseReason, ConnectionId, ConnectionMode, NetworkError, PairId, Result,
    SendOptions,
};
use crate::ports::ConnectionHandler;

/// How a send reaches the peer handler.
enum Delivery {
    Direct {
        peer_handler: Arc<dyn ConnectionHandler>,
        ack_id: u64,
        closed: oneshot::Receiver<Result<Bytes>>,
    },
    Tracked(oneshot::Receiver<Result<Bytes>>),
}

/// Handle to one side of an open (or closed) connection.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    local_addr: String,
    remote_addr: String,
    registry: Arc<ProtocolRegistry>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.registry, &other.registry)
    }
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        local_addr: String,
        remote_addr: String,
        registry: Arc<ProtocolRegistry>,
    ) -> Self {
        Self {
            id,
            local_addr,
            remote_addr,
            registry,
        }
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// This side's address.
    pub fn local_address(&self) -> &str {
        &self.local_addr
    }

    /// The peer's address.
    pub fn remote_address(&self) -> &str {
        &self.remote_addr
    }

    /// True once either side has closed the pair.
    pub fn is_closed(&self) -> bool {
        !self.registry.state.lock().pairs.contains_key(&self.id.pair)
    }

    /// The other side of this connection.
    pub fn peer(&self) -> Connection {
        Connection::new(
            self.id.peer(),
            self.remote_addr.clone(),
            self.local_addr.clone(),
            self.registry.clone(),
        )
    }

    /// Send a packet to the peer and wait for its ack.
    ///
    /// A peer without `on_receive` acks with empty bytes. Sends still
    /// waiting when the connection closes fail with
    /// [`NetworkError::ConnectionClosed`] in both connection modes.
    pub async fn send(&self, packet: impl Into<Bytes>, opts: SendOptions) -> Result<Bytes> {
        let packet = packet.into();

        let delivery = {
            let mut state = self.registry.state.lock();
            let pair = state
                .pairs
                .get_mut(&self.id.pair)
                .ok_or(NetworkError::ConnectionClosed)?;
            let peer_handler = pair.handlers[self.id.peer().side].clone();
            let (sender, receiver) = oneshot::channel();
            let ack_id = pair.register_ack(sender);

            match pair.mode {
                ConnectionMode::Direct => Delivery::Direct {
                    peer_handler,
                    ack_id,
                    closed: receiver,
                },
                ConnectionMode::Tracked => {
                    self.spawn_delivery(peer_handler, ack_id, packet.clone(), opts);
                    Delivery::Tracked(receiver)
                }
            }
        };
        metric_inc!(PACKETS_SENT);

        let ack = match delivery {
            Delivery::Direct {
                peer_handler,
                ack_id,
                closed,
            } => {
                let peer = self.peer();
                tokio::select! {
                    biased;
                    rejected = closed => rejected.unwrap_or(Err(NetworkError::ConnectionClosed)),
                    result = peer_handler.on_receive(&peer, packet, &opts) => {
                        self.finish_direct(ack_id, tolerate_missing(result))
                    }
                }
            }
            Delivery::Tracked(receiver) => receiver
                .await
                .unwrap_or(Err(NetworkError::ConnectionClosed)),
        };

        if let Err(e) = &ack {
            metric_inc!(ACKS_FAILED);
            log_connection_event!(debug, self.registry.name(), "Send failed", self.id, error = %e);
        }
        ack
    }

    /// Retire the waiter `ack_id` of a direct send. A waiter already taken
    /// by close means the send lost the race and is rejected.
    fn finish_direct(&self, ack_id: u64, result: Result<Bytes>) -> Result<Bytes> {
        let waiter = self
            .registry
            .state
            .lock()
            .pairs
            .get_mut(&self.id.pair)
            .and_then(|pair| pair.pending_acks.remove(&ack_id));

        match waiter {
            Some(_) => result,
            None => Err(NetworkError::ConnectionClosed),
        }
    }

    /// Deliver to the peer on the runtime and settle the waiter `ack_id`.
    fn spawn_delivery(
        &self,
        peer_handler: Arc<dyn ConnectionHandler>,
        ack_id: u64,
        packet: Bytes,
        opts: SendOptions,
    ) {
        let peer = self.peer();
        let registry = self.registry.clone();
        let pair_id = self.id.pair;

        tokio::spawn(async move {
            let result = tolerate_missing(peer_handler.on_receive(&peer, packet, &opts).await);
            settle_ack(&registry, pair_id, ack_id, result);
        });
    }

    /// Close the pair without a reason.
    pub async fn close(&self) -> Result<()> {
        self.registry.close_pair(self.id.pair, None).await
    }

    /// Close the pair, passing `reason` to both handlers' `on_close`.
    pub async fn close_with_reason(&self, reason: CloseReason) -> Result<()> {
        self.registry.close_pair(self.id.pair, Some(reason)).await
    }
}

/// Hand a delivery result to its waiter, unless close already rejected it.
fn settle_ack(registry: &ProtocolRegistry, pair_id: PairId, ack_id: u64, result: Result<Bytes>) {
    let waiter = registry
        .state
        .lock()
        .pairs
        .get_mut(&pair_id)
        .and_then(|pair| pair.pending_acks.remove(&ack_id));

    if let Some(waiter) = waiter {
        let _ = waiter.send(result);
    }
}
