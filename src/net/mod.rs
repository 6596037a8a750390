//! Host-authoritative replication
//!
//! The host runs the only [`crate::game::Match`]. Clients send proposed
//! actions, wait for the host's answer and rebuild the match by replaying
//! the event records it broadcasts. Periodic snapshots carry a checksum so a
//! client can detect that its replica has drifted and replace it.
//!
//! Both sessions are protocol state machines: they react to
//! [`TransportEvent`]s and send through a [`NetworkService`], never touching
//! sockets themselves.

pub mod client;
pub mod host;
pub mod message;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use client::{play_remote, ClientEvent, ClientSession, SyncStatus};
pub use host::{HostConfig, HostSession};
pub use message::{decode, encode, Envelope, NetMessage, PROTOCOL_VERSION};
pub use transport::{
    InboundQueue, InboundSender, LoopbackHub, LoopbackNetwork, NetworkService, PeerId, TransportEvent, HOST_PEER,
};

/// Connection lifecycle of one peer
///
/// `Disconnected → Connected → Ready → InMatch → GameOver`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Seat granted, deck not yet accepted or not ready
    Connected,
    /// Deck accepted and ready flag sent
    Ready,
    InMatch,
    GameOver,
}

impl ConnectionState {
    pub fn can_transition_to(&self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Disconnected, Connected)
                | (Connected, Ready)
                | (Ready, InMatch)
                | (InMatch, GameOver)
                | (_, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
