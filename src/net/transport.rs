//! Transport boundary
//!
//! Raw transport lives outside the crate. A [`NetworkService`] sends
//! payloads; whatever drives the sockets reports arrivals by pushing
//! [`TransportEvent`]s into an [`InboundSender`]. All arrivals funnel into
//! one [`InboundQueue`], so the session sees them in a single order.
//!
//! [`LoopbackHub`] is an in-process implementation connecting a host and
//! any number of clients, used by tests and the CLI.

use crate::error::ProtocolError;
use crate::{DuelError, Result};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub type PeerId = u32;

/// Peer id a client uses for the host
pub const HOST_PEER: PeerId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(PeerId),
    Message { peer: PeerId, payload: Vec<u8> },
    Disconnected(PeerId),
}

/// Outbound half of a transport
pub trait NetworkService: Send + Sync {
    fn send(&self, peer: PeerId, payload: Vec<u8>) -> Result<()>;

    fn broadcast(&self, payload: Vec<u8>) -> Result<()> {
        for peer in self.peers() {
            self.send(peer, payload.clone())?;
        }
        Ok(())
    }

    fn peers(&self) -> Vec<PeerId>;

    fn disconnect(&self, peer: PeerId) -> Result<()>;
}

/// Receive callback handed to the transport
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl InboundSender {
    pub fn deliver(&self, event: TransportEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| DuelError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "inbound queue closed")))
    }
}

/// Single ordered queue of transport events
#[derive(Debug)]
pub struct InboundQueue {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl InboundQueue {
    pub fn new() -> (InboundSender, InboundQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (InboundSender { tx }, InboundQueue { rx })
    }

    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, in arrival order
    pub fn drain(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[derive(Debug, Default)]
struct HubInner {
    host: Option<InboundSender>,
    clients: FxHashMap<PeerId, InboundSender>,
    next_peer: PeerId,
}

/// In-process network between one host and its clients
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubInner>>,
}

fn lock_failed() -> DuelError {
    DuelError::Invariant("loopback hub lock poisoned".to_string())
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The host's side of the hub
    pub fn host(&self) -> Result<(LoopbackNetwork, InboundQueue)> {
        let (sender, queue) = InboundQueue::new();
        self.inner.lock().map_err(|_| lock_failed())?.host = Some(sender);
        Ok((
            LoopbackNetwork {
                hub: self.clone(),
                side: Side::Host,
            },
            queue,
        ))
    }

    /// Attach a client and announce it to the host
    pub fn connect(&self) -> Result<(PeerId, LoopbackNetwork, InboundQueue)> {
        let (sender, queue) = InboundQueue::new();
        let (peer, host) = {
            let mut inner = self.inner.lock().map_err(|_| lock_failed())?;
            inner.next_peer += 1;
            let peer = inner.next_peer;
            inner.clients.insert(peer, sender);
            (peer, inner.host.clone())
        };
        if let Some(host) = host {
            host.deliver(TransportEvent::Connected(peer))?;
        }
        let network = LoopbackNetwork {
            hub: self.clone(),
            side: Side::Client(peer),
        };
        Ok((peer, network, queue))
    }

    /// Drop a client, telling both ends
    pub fn drop_peer(&self, peer: PeerId) -> Result<()> {
        let (client, host) = {
            let mut inner = self.inner.lock().map_err(|_| lock_failed())?;
            (inner.clients.remove(&peer), inner.host.clone())
        };
        if let Some(client) = client {
            // the client may already be gone
            let _ = client.deliver(TransportEvent::Disconnected(HOST_PEER));
        }
        if let Some(host) = host {
            host.deliver(TransportEvent::Disconnected(peer))?;
        }
        Ok(())
    }

    /// Inject raw bytes as if `from` had sent them to the host
    pub fn inject_to_host(&self, from: PeerId, payload: Vec<u8>) -> Result<()> {
        let host = self.inner.lock().map_err(|_| lock_failed())?.host.clone();
        match host {
            Some(host) => host.deliver(TransportEvent::Message { peer: from, payload }),
            None => Err(ProtocolError::UnknownPeer(HOST_PEER).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Host,
    Client(PeerId),
}

/// One endpoint of a [`LoopbackHub`]
#[derive(Debug, Clone)]
pub struct LoopbackNetwork {
    hub: LoopbackHub,
    side: Side,
}

impl NetworkService for LoopbackNetwork {
    fn send(&self, peer: PeerId, payload: Vec<u8>) -> Result<()> {
        match self.side {
            Side::Host => {
                let client = self
                    .hub
                    .inner
                    .lock()
                    .map_err(|_| lock_failed())?
                    .clients
                    .get(&peer)
                    .cloned()
                    .ok_or(ProtocolError::UnknownPeer(peer))?;
                client.deliver(TransportEvent::Message {
                    peer: HOST_PEER,
                    payload,
                })
            }
            Side::Client(me) => self.hub.inject_to_host(me, payload),
        }
    }

    fn peers(&self) -> Vec<PeerId> {
        match self.side {
            Side::Host => {
                let mut peers: Vec<PeerId> = self
                    .hub
                    .inner
                    .lock()
                    .map(|inner| inner.clients.keys().copied().collect())
                    .unwrap_or_default();
                peers.sort_unstable();
                peers
            }
            Side::Client(_) => vec![HOST_PEER],
        }
    }

    fn disconnect(&self, peer: PeerId) -> Result<()> {
        match self.side {
            Side::Host => self.hub.drop_peer(peer),
            Side::Client(me) => self.hub.drop_peer(me),
        }
    }
}
