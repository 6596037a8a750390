//! Player representation

use crate::core::{InstanceId, PlayerId, TemplateId};
use crate::zones::{Board, Deck, Graveyard, Hand};
use serde::{Deserialize, Serialize};

/// A card held in hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandCard {
    pub id: InstanceId,
    pub template: TemplateId,
    /// Accumulated cost changes from effects
    #[serde(default)]
    pub cost_delta: i32,
}

impl HandCard {
    pub fn new(id: InstanceId, template: TemplateId) -> Self {
        HandCard {
            id,
            template,
            cost_delta: 0,
        }
    }

    /// Effective cost given the printed cost
    pub fn cost(&self, printed: u8) -> u8 {
        (printed as i32 + self.cost_delta).clamp(0, u8::MAX as i32) as u8
    }
}

/// Represents one side of the match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,

    pub health: i32,
    pub max_health: i32,

    pub mana: u8,
    pub max_mana: u8,

    /// Evolution points still available
    pub evolution_points: u8,
    /// Own-turn count from which evolving is allowed
    pub evolve_usable_from: u32,
    /// Number of turns this player has started
    pub turns_taken: u32,
    pub evolved_this_turn: bool,

    /// Leader barrier: blocks the next damage to the leader
    pub barrier: bool,

    pub hand: Hand,
    pub board: Board,
    pub deck: Deck,
    pub graveyard: Graveyard,

    pub self_damage_this_turn: i32,
    pub self_damage_total: i32,
    pub fatigue: u32,
    pub cards_played_this_turn: u32,
}

impl PlayerState {
    pub fn new(id: PlayerId, health: i32, board_size: usize, deck: Vec<TemplateId>) -> Self {
        PlayerState {
            id,
            health,
            max_health: health,
            mana: 0,
            max_mana: 0,
            evolution_points: 0,
            evolve_usable_from: 0,
            turns_taken: 0,
            evolved_this_turn: false,
            barrier: false,
            hand: Hand::new(),
            board: Board::new(board_size),
            deck: Deck::from_cards(deck),
            graveyard: Graveyard::new(),
            self_damage_this_turn: 0,
            self_damage_total: 0,
            fatigue: 0,
            cards_played_this_turn: 0,
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.health <= 0
    }

    /// Whether an evolution point may be spent this turn
    pub fn can_evolve(&self) -> bool {
        self.evolution_points > 0 && self.turns_taken >= self.evolve_usable_from && !self.evolved_this_turn
    }

    pub fn heal(&mut self, amount: i32) {
        self.health = (self.health + amount).min(self.max_health);
    }

    pub fn take_damage(&mut self, amount: i32, self_inflicted: bool) {
        self.health -= amount;
        if self_inflicted {
            self.self_damage_this_turn += amount;
            self.self_damage_total += amount;
        }
    }

    pub fn reset_for_turn(&mut self) {
        self.turns_taken += 1;
        self.self_damage_this_turn = 0;
        self.cards_played_this_turn = 0;
        self.evolved_this_turn = false;
        for unit in self.board.units_mut() {
            unit.reset_for_turn();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let player = PlayerState::new(PlayerId::FIRST, 30, 6, vec![TemplateId::new(1); 5]);
        assert_eq!(player.health, 30);
        assert_eq!(player.deck.len(), 5);
        assert_eq!(player.board.len(), 6);
        assert!(!player.is_defeated());
    }

    #[test]
    fn test_self_damage_counters() {
        let mut player = PlayerState::new(PlayerId::FIRST, 30, 6, Vec::new());
        player.take_damage(2, true);
        player.take_damage(3, false);
        assert_eq!(player.health, 25);
        assert_eq!(player.self_damage_this_turn, 2);
        assert_eq!(player.self_damage_total, 2);

        player.reset_for_turn();
        assert_eq!(player.self_damage_this_turn, 0);
        assert_eq!(player.self_damage_total, 2);
        assert_eq!(player.turns_taken, 1);
    }

    #[test]
    fn test_heal_is_capped() {
        let mut player = PlayerState::new(PlayerId::SECOND, 30, 6, Vec::new());
        player.take_damage(4, false);
        player.heal(10);
        assert_eq!(player.health, 30);
    }

    #[test]
    fn test_evolve_window() {
        let mut player = PlayerState::new(PlayerId::FIRST, 30, 6, Vec::new());
        player.evolution_points = 2;
        player.evolve_usable_from = 5;
        player.turns_taken = 4;
        assert!(!player.can_evolve());
        player.turns_taken = 5;
        assert!(player.can_evolve());
        player.evolved_this_turn = true;
        assert!(!player.can_evolve());
    }

    #[test]
    fn test_hand_card_cost() {
        let mut card = HandCard::new(InstanceId::new(1), TemplateId::new(1));
        card.cost_delta = -3;
        assert_eq!(card.cost(2), 0);
        card.cost_delta = 1;
        assert_eq!(card.cost(2), 3);
    }
}
