//! Wire payloads
//!
//! Every message travels inside an [`Envelope`] carrying the protocol
//! version and a per-sender sequence number, encoded as JSON.

use crate::core::PlayerId;
use crate::error::{ProtocolError, RejectReason};
use crate::game::{EventRecord, MatchSnapshot, PlayerAction};
use crate::loader::{DeckIssue, DeckList};
use crate::Result;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NetMessage {
    Connect {
        name: String,
    },
    Accept {
        seat: PlayerId,
    },
    Refused {
        reason: String,
    },
    DeckSubmit {
        deck: DeckList,
    },
    DeckResult {
        accepted: bool,
        issues: Vec<DeckIssue>,
    },
    Ready,
    /// Match begins; the snapshot already holds shuffled decks and opening hands
    GameStart {
        seed: u64,
        first_player: PlayerId,
        snapshot: MatchSnapshot,
    },
    Action {
        request_id: u64,
        action: PlayerAction,
    },
    /// Answer to the sender of an action
    ActionResult {
        request_id: u64,
        success: bool,
        reason: Option<RejectReason>,
        events: Vec<EventRecord>,
    },
    /// Records produced by someone else's action
    Events {
        events: Vec<EventRecord>,
    },
    StateSync {
        snapshot: MatchSnapshot,
    },
    ResyncRequest,
    Ping {
        nonce: u64,
        sent_ms: u64,
    },
    Pong {
        nonce: u64,
        sent_ms: u64,
    },
    Surrender,
}

impl NetMessage {
    pub fn name(&self) -> &'static str {
        match self {
            NetMessage::Connect { .. } => "Connect",
            NetMessage::Accept { .. } => "Accept",
            NetMessage::Refused { .. } => "Refused",
            NetMessage::DeckSubmit { .. } => "DeckSubmit",
            NetMessage::DeckResult { .. } => "DeckResult",
            NetMessage::Ready => "Ready",
            NetMessage::GameStart { .. } => "GameStart",
            NetMessage::Action { .. } => "Action",
            NetMessage::ActionResult { .. } => "ActionResult",
            NetMessage::Events { .. } => "Events",
            NetMessage::StateSync { .. } => "StateSync",
            NetMessage::ResyncRequest => "ResyncRequest",
            NetMessage::Ping { .. } => "Ping",
            NetMessage::Pong { .. } => "Pong",
            NetMessage::Surrender => "Surrender",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    pub seq: u64,
    pub message: NetMessage,
}

impl Envelope {
    pub fn new(seq: u64, message: NetMessage) -> Self {
        Envelope {
            version: PROTOCOL_VERSION,
            seq,
            message,
        }
    }
}

pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Decode and check the protocol version
pub fn decode(bytes: &[u8]) -> std::result::Result<Envelope, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if envelope.version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            got: envelope.version,
            expected: PROTOCOL_VERSION,
        });
    }
    Ok(envelope)
}

/// Counter for outgoing sequence numbers, owned by one session
#[derive(Debug, Clone, Default)]
pub(crate) struct Outbox {
    next_seq: u64,
}

impl Outbox {
    pub(crate) fn wrap(&mut self, message: NetMessage) -> Result<Vec<u8>> {
        self.next_seq += 1;
        encode(&Envelope::new(self.next_seq, message))
    }
}
