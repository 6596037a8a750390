//! Deterministic state checksums and full-state snapshots
//!
//! The state is serialized to a JSON value (object keys come out sorted),
//! rendered to a canonical string and hashed with SHA-256 under a fixed
//! domain prefix. Two peers holding the same gameplay state always agree on
//! the checksum, whatever order their maps were filled in.

use crate::game::MatchState;
use crate::{DuelError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::Path;

const DOMAIN_STATE: &[u8] = b"tileduel/state/v1";

/// Compute the checksum of a match state as lowercase hex
pub fn state_checksum(state: &MatchState) -> Result<String> {
    let value = serde_json::to_value(state)?;
    let canonical = serde_json::to_vec(&value)?;

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_STATE);
    hasher.update(&canonical);
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// First eight hex digits, for log lines
pub fn short(checksum: &str) -> &str {
    checksum.get(..8).unwrap_or(checksum)
}

/// A full copy of the authoritative state with its checksum
///
/// Sent at match start and periodically by the host, and used to resume a
/// match from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub state: MatchState,
    pub checksum: String,
    /// Id of the last event applied to `state`
    pub last_event_id: u64,
}

impl MatchSnapshot {
    pub fn capture(state: &MatchState, last_event_id: u64) -> Result<Self> {
        Ok(MatchSnapshot {
            state: state.clone(),
            checksum: state_checksum(state)?,
            last_event_id,
        })
    }

    /// Recompute the checksum and compare with the recorded one
    pub fn verify(&self) -> Result<()> {
        let local = state_checksum(&self.state)?;
        if local != self.checksum {
            return Err(DuelError::Desync {
                local,
                host: self.checksum.clone(),
            });
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Load a snapshot and check it against its own checksum
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let snapshot: MatchSnapshot = serde_json::from_str(&json)?;
        snapshot.verify()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlayerId, TemplateId};
    use crate::game::MatchConfig;

    fn state(seed: u64) -> MatchState {
        let deck = vec![TemplateId::new(1), TemplateId::new(2)];
        MatchState::new(MatchConfig::default(), seed, PlayerId::FIRST, [deck.clone(), deck])
    }

    #[test]
    fn test_checksum_is_stable_and_sensitive() {
        let a = state_checksum(&state(1)).unwrap();
        assert_eq!(a, state_checksum(&state(1)).unwrap());
        assert_eq!(a.len(), 64);

        let mut changed = state(1);
        changed.player_mut(PlayerId::SECOND).health -= 1;
        assert_ne!(a, state_checksum(&changed).unwrap());
        assert_ne!(a, state_checksum(&state(2)).unwrap());
    }

    #[test]
    fn test_snapshot_detects_tampering() {
        let mut snapshot = MatchSnapshot::capture(&state(3), 0).unwrap();
        snapshot.verify().unwrap();
        snapshot.state.turn = 9;
        assert!(matches!(snapshot.verify(), Err(DuelError::Desync { .. })));
    }

    #[test]
    fn test_short() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("abc"), "abc");
    }
}
