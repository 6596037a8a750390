//! Single-writer match engine
//!
//! `Match` owns the authoritative [`MatchState`] and is the only place
//! actions enter the simulation. Each action is validated against the live
//! state, resolved on a private copy and committed only when resolution
//! succeeds, so a rejected or failed action leaves no trace.

use crate::core::{PlayerId, TemplateId};
use crate::game::actions::{execute_action, legal_actions, validate_action, PlayerAction};
use crate::game::checksum::{state_checksum, MatchSnapshot};
use crate::game::turn::start_match;
use crate::game::{
    Clock, EventLog, EventRecord, GameLogger, GameOverReason, MatchConfig, MatchState, Resolver,
    SystemClock,
};
use crate::loader::CardCatalog;
use crate::{DuelError, Result};
use std::sync::Arc;

pub struct Match {
    state: MatchState,
    catalog: Arc<dyn CardCatalog>,
    log: EventLog,
    clock: Arc<dyn Clock>,
    logger: GameLogger,
}

impl Match {
    pub fn new(
        config: MatchConfig,
        catalog: Arc<dyn CardCatalog>,
        decks: [Vec<TemplateId>; 2],
        seed: u64,
        first_player: PlayerId,
    ) -> Self {
        Match {
            state: MatchState::new(config, seed, first_player, decks),
            catalog,
            log: EventLog::new(),
            clock: Arc::new(SystemClock),
            logger: GameLogger::new(),
        }
    }

    /// Resume from a snapshot after checking its checksum
    pub fn from_snapshot(snapshot: &MatchSnapshot, catalog: Arc<dyn CardCatalog>) -> Result<Self> {
        snapshot.verify()?;
        Ok(Match {
            state: snapshot.state.clone(),
            catalog,
            log: EventLog::resuming_after(snapshot.last_event_id),
            clock: Arc::new(SystemClock),
            logger: GameLogger::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_logger(mut self, logger: GameLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn logger(&self) -> &GameLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut GameLogger {
        &mut self.logger
    }

    pub fn catalog(&self) -> &Arc<dyn CardCatalog> {
        &self.catalog
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Shuffle, deal opening hands and open the mulligan
    pub fn start(&mut self) -> Result<Vec<EventRecord>> {
        self.resolve(start_match)
    }

    /// Validate and resolve one action
    ///
    /// Illegal actions come back as [`DuelError::Rejected`] without touching
    /// the state or the log.
    pub fn submit(&mut self, player: PlayerId, action: &PlayerAction) -> Result<Vec<EventRecord>> {
        validate_action(&self.state, self.catalog.as_ref(), player, action)?;
        self.resolve(|r| execute_action(r, player, action))
    }

    /// End the match from outside the rules (disconnects, turn limits)
    pub fn force_game_over(&mut self, winner: Option<PlayerId>, reason: GameOverReason) -> Result<Vec<EventRecord>> {
        if self.is_over() {
            return Ok(Vec::new());
        }
        self.resolve(|r| r.end_match(winner, reason))
    }

    pub fn legal_actions(&self, player: PlayerId) -> Vec<PlayerAction> {
        legal_actions(&self.state, self.catalog.as_ref(), player)
    }

    pub fn checksum(&self) -> Result<String> {
        state_checksum(&self.state)
    }

    pub fn snapshot(&self) -> Result<MatchSnapshot> {
        MatchSnapshot::capture(&self.state, self.log.last_id())
    }

    /// Run `f` against a copy of the state and commit it on success
    fn resolve<F>(&mut self, f: F) -> Result<Vec<EventRecord>>
    where
        F: FnOnce(&mut Resolver<'_>) -> Result<()>,
    {
        let mut next = self.state.clone();
        let events = {
            let mut resolver = Resolver::new(&mut next, self.catalog.as_ref());
            f(&mut resolver)?;
            resolver.finish()
        };
        if events.is_empty() {
            return Err(DuelError::Invariant("resolution produced no events".to_string()));
        }
        self.state = next;
        let records = self.log.append(events, self.clock.as_ref());
        self.logger.narrate(&records);
        Ok(records)
    }
}

impl std::fmt::Debug for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Match")
            .field("turn", &self.state.turn)
            .field("phase", &self.state.phase)
            .field("events", &self.log.len())
            .finish()
    }
}
