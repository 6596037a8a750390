//! Match phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the match
///
/// `NotStarted -> Mulligan -> (TurnStart -> Draw -> Main -> TurnEnd)* -> GameOver`.
/// Any phase after `NotStarted` may move to `GameOver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    NotStarted,
    Mulligan,
    TurnStart,
    Draw,
    Main,
    TurnEnd,
    GameOver,
}

impl Phase {
    /// Next phase in the regular turn cycle
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::NotStarted => Some(Phase::Mulligan),
            Phase::Mulligan => Some(Phase::TurnStart),
            Phase::TurnStart => Some(Phase::Draw),
            Phase::Draw => Some(Phase::Main),
            Phase::Main => Some(Phase::TurnEnd),
            Phase::TurnEnd => Some(Phase::TurnStart),
            Phase::GameOver => None,
        }
    }

    pub fn can_transition_to(&self, to: Phase) -> bool {
        if to == Phase::GameOver {
            return !matches!(self, Phase::GameOver);
        }
        self.next() == Some(to)
    }

    /// Whether the active player may act
    pub fn accepts_actions(&self) -> bool {
        matches!(self, Phase::Main)
    }

    pub fn is_over(&self) -> bool {
        matches!(self, Phase::GameOver)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NotStarted => "not started",
            Phase::Mulligan => "mulligan",
            Phase::TurnStart => "turn start",
            Phase::Draw => "draw",
            Phase::Main => "main",
            Phase::TurnEnd => "turn end",
            Phase::GameOver => "game over",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_cycle() {
        let mut phase = Phase::Mulligan;
        let mut seen = Vec::new();
        for _ in 0..5 {
            phase = phase.next().unwrap();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![Phase::TurnStart, Phase::Draw, Phase::Main, Phase::TurnEnd, Phase::TurnStart]
        );
    }

    #[test]
    fn test_transitions_are_one_directional() {
        assert!(Phase::Main.can_transition_to(Phase::TurnEnd));
        assert!(!Phase::Main.can_transition_to(Phase::Draw));
        assert!(!Phase::Mulligan.can_transition_to(Phase::NotStarted));
        assert!(Phase::Draw.can_transition_to(Phase::GameOver));
        assert!(!Phase::GameOver.can_transition_to(Phase::GameOver));
    }
}
