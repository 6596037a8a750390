//! Player controllers and the local match driver
//!
//! A controller picks one of the legal actions it is offered. The driver
//! asks the right seat (mulligan seats in order, then the active player),
//! submits the pick and repeats until the match ends or the turn limit is
//! reached.

use crate::core::PlayerId;
use crate::game::actions::PlayerAction;
use crate::game::{GameOverReason, Match, MatchState};
use crate::Result;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Implement this trait to plug AI players or a UI into a match
pub trait PlayerController {
    fn player_id(&self) -> PlayerId;

    /// Pick one of `legal`; `None` ends the turn (or keeps the hand during
    /// the mulligan)
    fn choose_action(&mut self, state: &MatchState, legal: &[PlayerAction]) -> Option<PlayerAction>;

    fn on_game_end(&mut self, _state: &MatchState, _won: bool) {}
}

/// Picks uniformly among legal actions with its own seeded generator
///
/// The generator is independent of the match generator, so a controller
/// never changes the match's random outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomController {
    player_id: PlayerId,
    rng: Xoshiro256PlusPlus,
}

impl RandomController {
    pub fn with_seed(player_id: PlayerId, seed: u64) -> Self {
        RandomController {
            player_id,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl PlayerController for RandomController {
    fn player_id(&self) -> PlayerId {
        self.player_id
    }

    fn choose_action(&mut self, _state: &MatchState, legal: &[PlayerAction]) -> Option<PlayerAction> {
        if legal.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..legal.len());
        Some(legal[index].clone())
    }
}

/// Summary of a locally driven match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Option<PlayerId>,
    pub reason: Option<GameOverReason>,
    pub turns: u32,
    /// Every accepted action, in order; replaying them from the same seed
    /// rebuilds the match
    pub actions: Vec<(PlayerId, PlayerAction)>,
}

/// Upper bound on actions within one turn before the driver ends it
const MAX_ACTIONS_PER_TURN: usize = 200;

/// Drive a started match to its end
///
/// `controllers` is indexed by seat. A match still running after
/// `max_turns` ends with [`GameOverReason::TurnLimit`] and no winner.
pub fn play_out(
    game: &mut Match,
    controllers: &mut [Box<dyn PlayerController>; 2],
    max_turns: u32,
) -> Result<MatchResult> {
    let mut actions = Vec::new();
    let mut actions_this_turn = 0usize;
    let mut current_turn = (game.state().turn, game.state().active);

    while !game.is_over() {
        let state = game.state();
        if state.turn > max_turns {
            game.force_game_over(None, GameOverReason::TurnLimit)?;
            break;
        }
        if (state.turn, state.active) != current_turn {
            current_turn = (state.turn, state.active);
            actions_this_turn = 0;
        }

        let seat = if state.phase == crate::game::Phase::Mulligan {
            PlayerId::both()
                .into_iter()
                .find(|p| !state.mulligan.ready[p.index()])
                .unwrap_or(state.active)
        } else {
            state.active
        };
        let legal = game.legal_actions(seat);
        let fallback = if state.phase == crate::game::Phase::Mulligan {
            PlayerAction::Mulligan { replace: Vec::new() }
        } else {
            PlayerAction::EndTurn
        };
        let action = if actions_this_turn >= MAX_ACTIONS_PER_TURN {
            fallback
        } else {
            controllers[seat.index()]
                .choose_action(state, &legal)
                .unwrap_or(fallback)
        };

        game.logger().controller_choice(&seat.to_string(), action.name());
        game.submit(seat, &action)?;
        actions.push((seat, action));
        actions_this_turn += 1;
    }

    let outcome = game.state().outcome;
    for controller in controllers.iter_mut() {
        let won = outcome.and_then(|o| o.winner) == Some(controller.player_id());
        controller.on_game_end(game.state(), won);
    }
    Ok(MatchResult {
        winner: outcome.and_then(|o| o.winner),
        reason: outcome.map(|o| o.reason),
        turns: game.state().turn,
        actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatchConfig;
    use crate::loader::{starter_catalog, starter_deck};
    use std::sync::Arc;

    fn controllers(seed: u64) -> [Box<dyn PlayerController>; 2] {
        [
            Box::new(RandomController::with_seed(PlayerId::FIRST, seed)),
            Box::new(RandomController::with_seed(PlayerId::SECOND, seed + 1)),
        ]
    }

    fn run(seed: u64) -> (MatchResult, String) {
        let mut game = Match::new(
            MatchConfig::default(),
            Arc::new(starter_catalog()),
            [starter_deck(), starter_deck()],
            seed,
            PlayerId::FIRST,
        );
        game.logger_mut().set_verbosity(crate::game::VerbosityLevel::Silent);
        game.start().unwrap();
        let result = play_out(&mut game, &mut controllers(seed), 30).unwrap();
        (result, game.checksum().unwrap())
    }

    #[test]
    fn test_random_match_terminates() {
        let (result, _) = run(9);
        assert!(result.reason.is_some());
        assert!(result.turns <= 31);
        assert!(!result.actions.is_empty());
    }

    #[test]
    fn test_same_seeds_same_match() {
        let (a, sum_a) = run(21);
        let (b, sum_b) = run(21);
        assert_eq!(a, b);
        assert_eq!(sum_a, sum_b);
    }

    #[test]
    fn test_random_controller_empty_choices() {
        let mut controller = RandomController::with_seed(PlayerId::FIRST, 1);
        let state = MatchState::new(MatchConfig::default(), 1, PlayerId::FIRST, [Vec::new(), Vec::new()]);
        assert_eq!(controller.choose_action(&state, &[]), None);
    }
}
