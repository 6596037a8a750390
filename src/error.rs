//! Error types for the duel engine

use crate::core::{InstanceId, TemplateId};
use crate::loader::DeckIssue;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reason code returned to the sender of an illegal action.
///
/// Rejections happen at the validation boundary, before any state is touched,
/// so they carry a category rather than engine internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    NotYourTurn,
    WrongPhase,
    InsufficientMana,
    InsufficientEvolutionPoints,
    EvolveNotAvailable,
    AlreadyEvolved,
    BoardFull,
    HandIndexOutOfRange,
    TileOccupied,
    TileOutOfRange,
    MissingTarget,
    InvalidTarget,
    WardBlocks,
    AlreadyAttacked,
    SummoningSick,
    CannotAttack,
    NotActivatable,
    AwaitingResponse,
    MulliganClosed,
    GameOver,
    UnknownInstance,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::NotYourTurn => "not your turn",
            RejectReason::WrongPhase => "action not allowed in this phase",
            RejectReason::InsufficientMana => "not enough mana",
            RejectReason::InsufficientEvolutionPoints => "no evolution points left",
            RejectReason::EvolveNotAvailable => "evolving is not available yet",
            RejectReason::AlreadyEvolved => "unit is already evolved",
            RejectReason::BoardFull => "board is full",
            RejectReason::HandIndexOutOfRange => "no card at that hand index",
            RejectReason::TileOccupied => "tile is occupied",
            RejectReason::TileOutOfRange => "no such tile",
            RejectReason::MissingTarget => "a target is required",
            RejectReason::InvalidTarget => "target is not legal",
            RejectReason::WardBlocks => "a ward unit must be attacked first",
            RejectReason::AlreadyAttacked => "unit already attacked this turn",
            RejectReason::SummoningSick => "unit cannot attack this turn",
            RejectReason::CannotAttack => "unit cannot attack",
            RejectReason::NotActivatable => "nothing to activate",
            RejectReason::AwaitingResponse => "waiting for the host to answer",
            RejectReason::MulliganClosed => "mulligan already submitted",
            RejectReason::GameOver => "the match is over",
            RejectReason::UnknownInstance => "no such card in play",
        };
        f.write_str(text)
    }
}

/// Malformed or unexpected network payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("protocol version mismatch: got {got}, expected {expected}")]
    VersionMismatch { got: u16, expected: u16 },

    #[error("unexpected message in state {0}")]
    UnexpectedMessage(String),

    #[error("unknown peer {0}")]
    UnknownPeer(u32),
}

#[derive(Error, Debug)]
pub enum DuelError {
    #[error("Action rejected: {0}")]
    Rejected(RejectReason),

    #[error("Card template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("Instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("Invalid card definition: {0}")]
    InvalidCardDefinition(String),

    #[error("Deck failed validation ({} issue(s))", .0.len())]
    InvalidDeck(Vec<DeckIssue>),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("State desync: local checksum {local}, host checksum {host}")]
    Desync { local: String, host: String },

    #[error("Engine invariant violated: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RejectReason> for DuelError {
    fn from(reason: RejectReason) -> Self {
        DuelError::Rejected(reason)
    }
}

impl DuelError {
    /// The reject reason, if this error is an illegal-action rejection
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            DuelError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DuelError>;
