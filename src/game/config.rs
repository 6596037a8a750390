//! Match rules configuration

use serde::{Deserialize, Serialize};

/// Tunable match rules
///
/// Carried inside [`crate::game::MatchState`] so that a snapshot is enough
/// to reproduce a match on another peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub starting_health: i32,
    pub max_mana_cap: u8,
    pub hand_limit: usize,
    pub board_size: usize,
    pub opening_hand: usize,
    pub evolution_points: u8,
    /// Own-turn number from which the first player may evolve
    pub first_player_evolve_turn: u32,
    /// Own-turn number from which the second player may evolve
    pub second_player_evolve_turn: u32,
    /// Second player draws an extra card on their first turn
    pub second_player_bonus_draw: bool,
    /// Maximum trigger dispatches while resolving a single action
    pub max_trigger_depth: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            starting_health: 30,
            max_mana_cap: 10,
            hand_limit: 10,
            board_size: 6,
            opening_hand: 3,
            evolution_points: 2,
            first_player_evolve_turn: 5,
            second_player_evolve_turn: 4,
            second_player_bonus_draw: true,
            max_trigger_depth: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MatchConfig = serde_json::from_str(r#"{"starting_health": 20}"#).unwrap();
        assert_eq!(config.starting_health, 20);
        assert_eq!(config.board_size, 6);
        assert_eq!(config.max_mana_cap, 10);
    }
}
