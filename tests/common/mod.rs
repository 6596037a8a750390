//! Shared fixtures for integration tests
//!
//! `Table` builds a mid-match position directly (cards in hand, units on the
//! board, mana) and turns it into a live [`Match`] through a snapshot, so
//! each scenario starts exactly where it needs to.

#![allow(dead_code)]

use std::sync::Arc;
use tileduel::core::{EntityRef, HandCard, InstanceId, PlayerId, RuntimeUnit, TemplateId};
use tileduel::game::{
    play_out, EventRecord, GameEvent, ManualClock, Match, MatchConfig, MatchResult, MatchSnapshot, MatchState, Phase,
    PlayerController, RandomController, VerbosityLevel,
};
use tileduel::loader::{starter_catalog, starter_deck, CardCatalog};

pub fn catalog() -> Arc<dyn CardCatalog> {
    Arc::new(starter_catalog())
}

pub struct Table {
    pub state: MatchState,
    pub catalog: Arc<dyn CardCatalog>,
}

impl Table {
    /// First player's main phase of turn 1, both players past their first turn
    pub fn new(decks: [Vec<TemplateId>; 2]) -> Self {
        let mut state = MatchState::new(MatchConfig::default(), 7, PlayerId::FIRST, decks);
        state.phase = Phase::Main;
        state.turn = 1;
        for player in PlayerId::both() {
            state.player_mut(player).turns_taken = 1;
        }
        Table {
            state,
            catalog: catalog(),
        }
    }

    pub fn empty() -> Self {
        Table::new([Vec::new(), Vec::new()])
    }

    pub fn mana(mut self, player: PlayerId, mana: u8) -> Self {
        let p = self.state.player_mut(player);
        p.mana = mana;
        p.max_mana = p.max_mana.max(mana);
        self
    }

    pub fn health(mut self, player: PlayerId, health: i32) -> Self {
        self.state.player_mut(player).health = health;
        self
    }

    pub fn give(&mut self, player: PlayerId, template: TemplateId) -> InstanceId {
        let id = self.state.instances.allocate();
        self.state
            .apply_event(&GameEvent::CardAddedToHand {
                player,
                card: HandCard::new(id, template),
            })
            .unwrap();
        id
    }

    /// Put a unit straight onto the first free tile, without on-play effects
    pub fn summon(&mut self, player: PlayerId, template: TemplateId, ready: bool) -> InstanceId {
        let id = self.state.instances.allocate();
        let printed = self.catalog.template(template).unwrap();
        let mut unit = RuntimeUnit::from_template(id, player, printed, false);
        unit.summoning_sick = !ready;
        let tile = self.state.player(player).board.first_empty().unwrap();
        self.state
            .apply_event(&GameEvent::Summoned { player, tile, unit })
            .unwrap();
        id
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot::capture(&self.state, 0).unwrap()
    }

    pub fn into_match(self) -> Match {
        let mut game = Match::from_snapshot(&self.snapshot(), self.catalog)
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(0)));
        game.logger_mut().set_verbosity(VerbosityLevel::Silent);
        game
    }
}

pub fn face(player: PlayerId) -> EntityRef {
    EntityRef::Player(player)
}

/// Id of the unit a batch of records summoned
pub fn summoned(records: &[EventRecord]) -> Option<InstanceId> {
    records.iter().find_map(|r| match &r.event {
        GameEvent::Summoned { unit, .. } => Some(unit.id),
        _ => None,
    })
}

pub fn count<F: Fn(&GameEvent) -> bool>(records: &[EventRecord], f: F) -> usize {
    records.iter().filter(|r| f(&r.event)).count()
}

pub fn new_match(seed: u64) -> Match {
    let mut game = Match::new(
        MatchConfig::default(),
        catalog(),
        [starter_deck(), starter_deck()],
        seed,
        PlayerId::FIRST,
    )
    .with_clock(Arc::new(ManualClock::new(0)));
    game.logger_mut().set_verbosity(VerbosityLevel::Silent);
    game
}

/// Seeded self-play to the end; returns the finished match
pub fn self_play(seed: u64, max_turns: u32) -> (Match, MatchResult) {
    let mut game = new_match(seed);
    game.start().unwrap();
    let mut controllers: [Box<dyn PlayerController>; 2] = [
        Box::new(RandomController::with_seed(PlayerId::FIRST, seed)),
        Box::new(RandomController::with_seed(PlayerId::SECOND, seed + 1)),
    ];
    let result = play_out(&mut game, &mut controllers, max_turns).unwrap();
    (game, result)
}
