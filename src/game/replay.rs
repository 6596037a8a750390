//! Event-log replay
//!
//! A [`Replica`] reconstructs a match by applying the host's event records
//! in id order. It never consults the card catalog or the generator, and
//! records it has already applied are skipped, so feeding the same batch
//! twice is harmless.

use crate::core::{PlayerId, TemplateId};
use crate::game::actions::PlayerAction;
use crate::game::checksum::{state_checksum, MatchSnapshot};
use crate::game::{EventRecord, Match, MatchConfig, MatchState};
use crate::loader::CardCatalog;
use crate::{DuelError, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Replica {
    state: MatchState,
    last_applied: u64,
}

impl Replica {
    pub fn new(state: MatchState) -> Self {
        Replica { state, last_applied: 0 }
    }

    pub fn from_snapshot(snapshot: &MatchSnapshot) -> Self {
        Replica {
            state: snapshot.state.clone(),
            last_applied: snapshot.last_event_id,
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Apply records newer than the last applied one
    ///
    /// The batch is applied to a copy first: a record that does not fit
    /// leaves the replica untouched. A gap in ids is reported as an
    /// invariant error, since the missing events can't be reconstructed.
    pub fn apply_records(&mut self, records: &[EventRecord]) -> Result<usize> {
        let mut next = self.state.clone();
        let mut last = self.last_applied;
        let mut applied = 0;
        for record in records.iter().filter(|r| r.id > self.last_applied) {
            if record.id != last + 1 {
                return Err(DuelError::Invariant(format!(
                    "event {} arrived after {last}",
                    record.id
                )));
            }
            next.apply_event(&record.event)?;
            last = record.id;
            applied += 1;
        }
        self.state = next;
        self.last_applied = last;
        Ok(applied)
    }

    /// Replace the local state wholesale (hard resync)
    pub fn reset_to(&mut self, snapshot: &MatchSnapshot) {
        self.state = snapshot.state.clone();
        self.last_applied = snapshot.last_event_id;
    }

    pub fn checksum(&self) -> Result<String> {
        state_checksum(&self.state)
    }
}

/// Rebuild a match from its seed and the full action sequence
///
/// Every action must still be accepted; a rejection means the sequence did
/// not come from this seed.
pub fn replay_actions(
    config: MatchConfig,
    catalog: Arc<dyn CardCatalog>,
    decks: [Vec<TemplateId>; 2],
    seed: u64,
    first_player: PlayerId,
    actions: &[(PlayerId, PlayerAction)],
) -> Result<Match> {
    let mut game = Match::new(config, catalog, decks, seed, first_player);
    game.logger_mut().set_verbosity(crate::game::VerbosityLevel::Silent);
    game.start()?;
    for (player, action) in actions {
        game.submit(*player, action)?;
    }
    Ok(game)
}
