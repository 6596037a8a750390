//! Match state: the single owned root of a simulation
//!
//! `MatchState` is a plain value. Cloning it is a full deep copy, which is
//! what speculative resolution and network snapshots rely on. All changes go
//! through [`MatchState::apply_event`], on the host and on every replica.

use crate::core::{
    EntityRef, HandCard, InstanceAllocator, InstanceId, Keyword, PlayerId, PlayerState,
    RuntimeUnit, TemplateId,
};
use crate::game::{GameEvent, GameOverReason, ListenerRegistry, MatchConfig, MatchRng, Phase};
use crate::{DuelError, Result};
use serde::{Deserialize, Serialize};

/// Per-seat mulligan progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulliganState {
    pub ready: [bool; 2],
    /// Hand indices each player chose to replace
    pub replaced: [Vec<usize>; 2],
}

impl MulliganState {
    pub fn all_ready(&self) -> bool {
        self.ready.iter().all(|r| *r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// `None` when both leaders fell at once
    pub winner: Option<PlayerId>,
    pub reason: GameOverReason,
}

/// Where a live instance currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceLocation {
    Hand { player: PlayerId, index: usize },
    Board { player: PlayerId, tile: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    pub config: MatchConfig,
    /// Incremented when the first player starts a turn
    pub turn: u32,
    pub active: PlayerId,
    pub first_player: PlayerId,
    pub phase: Phase,
    pub players: [PlayerState; 2],
    pub rng: MatchRng,
    pub mulligan: MulliganState,
    pub instances: InstanceAllocator,
    pub listeners: ListenerRegistry,
    pub outcome: Option<MatchOutcome>,
}

impl MatchState {
    pub fn new(config: MatchConfig, seed: u64, first_player: PlayerId, decks: [Vec<TemplateId>; 2]) -> Self {
        let [first_deck, second_deck] = decks;
        let mut players = [
            PlayerState::new(PlayerId::FIRST, config.starting_health, config.board_size, first_deck),
            PlayerState::new(PlayerId::SECOND, config.starting_health, config.board_size, second_deck),
        ];
        for player in players.iter_mut() {
            player.evolution_points = config.evolution_points;
            player.evolve_usable_from = if player.id == first_player {
                config.first_player_evolve_turn
            } else {
                config.second_player_evolve_turn
            };
        }

        MatchState {
            config,
            turn: 0,
            active: first_player,
            first_player,
            phase: Phase::NotStarted,
            players,
            rng: MatchRng::new(seed),
            mulligan: MulliganState::default(),
            instances: InstanceAllocator::new(),
            listeners: ListenerRegistry::new(),
            outcome: None,
        }
    }

    pub fn player(&self, id: PlayerId) -> &PlayerState {
        &self.players[id.index()]
    }

    pub fn player_mut(&mut self, id: PlayerId) -> &mut PlayerState {
        &mut self.players[id.index()]
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    /// Find an instance in either player's hand or board
    pub fn locate(&self, id: InstanceId) -> Option<InstanceLocation> {
        for player in &self.players {
            if let Some(tile) = player.board.position(id) {
                return Some(InstanceLocation::Board {
                    player: player.id,
                    tile,
                });
            }
            if let Some(index) = player.hand.position(id) {
                return Some(InstanceLocation::Hand {
                    player: player.id,
                    index,
                });
            }
        }
        None
    }

    pub fn unit(&self, id: InstanceId) -> Option<&RuntimeUnit> {
        self.players.iter().find_map(|p| p.board.unit(id))
    }

    pub fn unit_mut(&mut self, id: InstanceId) -> Option<&mut RuntimeUnit> {
        self.players.iter_mut().find_map(|p| p.board.unit_mut(id))
    }

    pub fn hand_card(&self, id: InstanceId) -> Option<(PlayerId, &HandCard)> {
        self.players
            .iter()
            .find_map(|p| p.hand.iter().find(|c| c.id == id).map(|c| (p.id, c)))
    }

    /// All units on both boards, active player's board first
    pub fn units_in_order(&self) -> Vec<&RuntimeUnit> {
        let active = self.player(self.active).board.units();
        let other = self.player(self.active.opponent()).board.units();
        active.chain(other).collect()
    }

    fn unit_or_err(&mut self, id: InstanceId) -> Result<&mut RuntimeUnit> {
        self.unit_mut(id)
            .ok_or_else(|| DuelError::Invariant(format!("unit {id} is not on the board")))
    }

    /// Apply one event
    ///
    /// Events that do not fit the current state (a unit that is not on the
    /// board, a deck top that differs from the drawn card...) are reported as
    /// invariant violations; the caller decides whether that means a bug or a
    /// desync.
    pub fn apply_event(&mut self, event: &GameEvent) -> Result<()> {
        match event {
            GameEvent::MatchStarted { first_player, .. } => {
                self.first_player = *first_player;
                self.active = *first_player;
            }
            GameEvent::DeckShuffled { player, order } => {
                self.player_mut(*player).deck.set_order(order.clone());
            }
            GameEvent::RngAdvanced { draws, word_pos } => {
                self.rng.restore(*draws, *word_pos);
            }
            GameEvent::PhaseChanged { from, to } => {
                if self.phase != *from {
                    return Err(DuelError::Invariant(format!(
                        "phase change from {from} while in {}",
                        self.phase
                    )));
                }
                self.phase = *to;
            }
            GameEvent::MulliganSubmitted { player, returned } => {
                let mut indices = Vec::with_capacity(returned.len());
                for id in returned {
                    let hand = &self.player(*player).hand;
                    let index = hand
                        .position(*id)
                        .ok_or_else(|| DuelError::Invariant(format!("mulligan card {id} not in hand")))?;
                    indices.push(index);
                }
                let state = self.player_mut(*player);
                for id in returned {
                    if let Some(card) = state.hand.remove(*id) {
                        state.deck.add_to_bottom(card.template);
                    }
                }
                self.mulligan.ready[player.index()] = true;
                self.mulligan.replaced[player.index()] = indices;
            }
            GameEvent::TurnStarted { player, turn } => {
                self.active = *player;
                self.turn = *turn;
                self.player_mut(*player).reset_for_turn();
            }
            GameEvent::TurnEnded { .. } => {}
            GameEvent::ManaChanged { player, current, max } => {
                let state = self.player_mut(*player);
                state.mana = *current;
                state.max_mana = *max;
            }
            GameEvent::EvolutionPointsChanged { player, points } => {
                self.player_mut(*player).evolution_points = *points;
            }
            GameEvent::CardDrawn { player, card } => {
                let state = self.player_mut(*player);
                match state.deck.draw_top() {
                    Some(top) if top == card.template => state.hand.push(*card),
                    other => {
                        return Err(DuelError::Invariant(format!(
                            "drew {} but deck top was {other:?}",
                            card.template
                        )))
                    }
                }
                self.instances.observe(card.id);
            }
            GameEvent::CardBurned {
                player,
                template,
                from_deck,
            } => {
                let state = self.player_mut(*player);
                if *from_deck && state.deck.draw_top() != Some(*template) {
                    return Err(DuelError::Invariant(format!("burned {template} was not on top of the deck")));
                }
                state.graveyard.add(*template);
            }
            GameEvent::Fatigue { player, counter } => {
                self.player_mut(*player).fatigue = *counter;
            }
            GameEvent::CardDiscarded { player, card, template } => {
                let state = self.player_mut(*player);
                if state.hand.remove(*card).is_none() {
                    return Err(DuelError::Invariant(format!("discarded card {card} not in hand")));
                }
                state.graveyard.add(*template);
            }
            GameEvent::CardAddedToHand { player, card } => {
                self.player_mut(*player).hand.push(*card);
                self.instances.observe(card.id);
            }
            GameEvent::HandShuffledIntoDeck { player } => {
                let state = self.player_mut(*player);
                let mut order = state.deck.cards().to_vec();
                order.extend(state.hand.take_all().into_iter().map(|c| c.template));
                state.deck.set_order(order);
            }
            GameEvent::CardPlayed {
                player,
                card,
                template,
                cost_paid,
                to_graveyard,
                ..
            } => {
                let state = self.player_mut(*player);
                if state.hand.remove(*card).is_none() {
                    return Err(DuelError::Invariant(format!("played card {card} not in hand")));
                }
                state.mana = state
                    .mana
                    .checked_sub(*cost_paid)
                    .ok_or_else(|| DuelError::Invariant(format!("{player} cannot pay {cost_paid}")))?;
                state.cards_played_this_turn += 1;
                if *to_graveyard {
                    state.graveyard.add(*template);
                }
            }
            GameEvent::Summoned { player, tile, unit } => {
                self.player_mut(*player)
                    .board
                    .place(*tile, unit.clone())
                    .map_err(|u| DuelError::Invariant(format!("cannot place {} on tile {tile}", u.id)))?;
                self.instances.observe(unit.id);
            }
            GameEvent::ListenerArmed { instance, triggers } => {
                self.listeners.arm(*instance, triggers);
            }
            GameEvent::Damage {
                target,
                amount,
                self_inflicted,
                ..
            } => match target {
                EntityRef::Unit(id) => self.unit_or_err(*id)?.health -= amount,
                EntityRef::Player(p) => self.player_mut(*p).take_damage(*amount, *self_inflicted),
            },
            GameEvent::Healed { target, amount } => match target {
                EntityRef::Unit(id) => {
                    let unit = self.unit_or_err(*id)?;
                    unit.health = (unit.health + amount).min(unit.max_health);
                }
                EntityRef::Player(p) => self.player_mut(*p).heal(*amount),
            },
            GameEvent::HealthSet { target, health } => match target {
                EntityRef::Unit(id) => {
                    let unit = self.unit_or_err(*id)?;
                    unit.health = *health;
                    unit.max_health = unit.max_health.max(*health);
                }
                EntityRef::Player(p) => self.player_mut(*p).health = *health,
            },
            GameEvent::BarrierConsumed { target } => match target {
                EntityRef::Unit(id) => {
                    let unit = self.unit_or_err(*id)?;
                    unit.keywords.remove(Keyword::Barrier);
                    unit.base_keywords.remove(Keyword::Barrier);
                    for modifier in unit.modifiers.iter_mut() {
                        modifier.keywords.remove(Keyword::Barrier);
                    }
                }
                EntityRef::Player(p) => self.player_mut(*p).barrier = false,
            },
            GameEvent::BarrierGained { target } => match target {
                EntityRef::Unit(id) => self.unit_or_err(*id)?.keywords.insert(Keyword::Barrier),
                EntityRef::Player(p) => self.player_mut(*p).barrier = true,
            },
            GameEvent::Destroyed {
                instance,
                owner,
                template,
            } => {
                let state = self.player_mut(*owner);
                if state.board.remove(*instance).is_none() {
                    return Err(DuelError::Invariant(format!("destroyed unit {instance} not on the board")));
                }
                state.graveyard.add(*template);
                self.listeners.disarm(*instance);
            }
            GameEvent::Vanished { instance, owner } => {
                if self.player_mut(*owner).board.remove(*instance).is_none() {
                    return Err(DuelError::Invariant(format!("vanished unit {instance} not on the board")));
                }
                self.listeners.disarm(*instance);
            }
            GameEvent::ReturnedToHand {
                instance,
                owner,
                template,
            } => {
                let state = self.player_mut(*owner);
                if state.board.remove(*instance).is_none() {
                    return Err(DuelError::Invariant(format!("returned unit {instance} not on the board")));
                }
                state.hand.push(HandCard::new(*instance, *template));
                self.listeners.disarm(*instance);
            }
            GameEvent::Evolved {
                instance,
                attack_gain,
                health_gain,
                spent_point,
            } => {
                let unit = self.unit_or_err(*instance)?;
                unit.evolve(*attack_gain, *health_gain);
                let owner = unit.owner;
                if *spent_point {
                    let state = self.player_mut(owner);
                    state.evolution_points = state
                        .evolution_points
                        .checked_sub(1)
                        .ok_or_else(|| DuelError::Invariant(format!("{owner} has no evolution points")))?;
                    state.evolved_this_turn = true;
                }
            }
            GameEvent::Buffed { instance, modifier } => {
                self.unit_or_err(*instance)?.apply_modifier(*modifier);
            }
            GameEvent::ModifiersTicked => {
                for player in self.players.iter_mut() {
                    for unit in player.board.units_mut() {
                        unit.tick_modifiers();
                    }
                }
            }
            GameEvent::ModifierExpired { instance, index } => {
                if self.unit_or_err(*instance)?.expire_modifier(*index).is_none() {
                    return Err(DuelError::Invariant(format!("unit {instance} has no modifier {index}")));
                }
            }
            GameEvent::Silenced { instance } => {
                self.unit_or_err(*instance)?.silence();
                self.listeners.disarm(*instance);
            }
            GameEvent::KeywordGained { instance, keyword } => {
                let unit = self.unit_or_err(*instance)?;
                unit.base_keywords.insert(*keyword);
                unit.keywords.insert(*keyword);
            }
            GameEvent::Transformed { instance, into } => {
                let Some(InstanceLocation::Board { player, tile }) = self.locate(*instance) else {
                    return Err(DuelError::Invariant(format!("transformed unit {instance} not on the board")));
                };
                if let Some(slot) = self.player_mut(player).board.tile_mut(tile) {
                    slot.unit = Some(into.clone());
                }
                self.listeners.disarm(*instance);
                self.instances.observe(into.id);
            }
            GameEvent::CostModified { player, card, delta } => {
                let card = self
                    .player_mut(*player)
                    .hand
                    .card_mut(*card)
                    .ok_or_else(|| DuelError::Invariant(format!("cost change for card {card} not in hand")))?;
                card.cost_delta += delta;
            }
            GameEvent::TileEffectApplied { player, tile, effect } => {
                let slot = self
                    .player_mut(*player)
                    .board
                    .tile_mut(*tile)
                    .ok_or_else(|| DuelError::Invariant(format!("no tile {tile}")))?;
                slot.effects.push(*effect);
            }
            GameEvent::TileEffectsTicked { player } => {
                for tile in self.player_mut(*player).board.tiles_mut() {
                    for effect in tile.effects.iter_mut() {
                        effect.remaining_turns = effect.remaining_turns.saturating_sub(1);
                    }
                }
            }
            GameEvent::TileEffectsPurged { player } => {
                for tile in self.player_mut(*player).board.tiles_mut() {
                    tile.effects.retain(|e| !e.is_expired());
                }
            }
            GameEvent::TileEffectsCleared { player, tile } => {
                if let Some(slot) = self.player_mut(*player).board.tile_mut(*tile) {
                    slot.effects.clear();
                }
            }
            GameEvent::CountdownChanged { instance, remaining } => {
                self.unit_or_err(*instance)?.countdown = Some(*remaining);
            }
            GameEvent::AttackDeclared { attacker, .. } => {
                self.unit_or_err(*attacker)?.attacked_this_turn = true;
            }
            GameEvent::AmuletActivated { instance, cost } => {
                let unit = self.unit_or_err(*instance)?;
                unit.activated_this_turn = true;
                let owner = unit.owner;
                let state = self.player_mut(owner);
                state.mana = state
                    .mana
                    .checked_sub(*cost)
                    .ok_or_else(|| DuelError::Invariant(format!("{owner} cannot pay {cost}")))?;
            }
            GameEvent::GameOver { winner, reason } => {
                self.phase = Phase::GameOver;
                self.outcome = Some(MatchOutcome {
                    winner: *winner,
                    reason: *reason,
                });
            }
        }
        Ok(())
    }
}
