//! tileduel - deterministic simulation core for a two-player tile-board card game
//!
//! The engine interprets declarative card effects, runs the turn and combat
//! rules, records every state change as an event and replicates matches
//! between peers by shipping those events from an authoritative host.

pub mod core;
pub mod error;
pub mod game;
pub mod loader;
pub mod net;
pub mod zones;

pub use error::{DuelError, ProtocolError, RejectReason, Result};
