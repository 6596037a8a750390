//! Match narration logger
//!
//! Renders game events as human-readable lines. Lines go to stdout, to an
//! in-memory buffer, or both, so tests can assert on the narration and the
//! CLI can hold output back until a match finishes.

use crate::core::EntityRef;
use crate::game::{EventRecord, GameEvent};
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::ops::Deref;

/// How much of a match is narrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Silent - no output during the match
    Silent = 0,
    /// Minimal - only the outcome
    Minimal = 1,
    /// Normal - turns and player actions (default)
    #[default]
    Normal = 2,
    /// Verbose - every event
    Verbose = 3,
}

/// Output destination for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    /// Output only to stdout (default)
    #[default]
    Stdout,
    /// Capture only to in-memory buffer (no stdout)
    Memory,
    /// Both stdout and in-memory buffer
    Both,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: VerbosityLevel,
    pub message: String,
    /// Optional category (e.g. "game_event", "controller_choice")
    pub category: Option<String>,
}

/// Read-only view of captured log entries
pub struct LogGuard<'a> {
    guard: Ref<'a, Vec<LogEntry>>,
}

impl<'a> LogGuard<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.guard.iter()
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }
}

impl<'a> Deref for LogGuard<'a> {
    type Target = [LogEntry];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

pub struct GameLogger {
    verbosity: VerbosityLevel,
    output_mode: OutputMode,
    log_buffer: RefCell<Vec<LogEntry>>,
}

impl GameLogger {
    pub fn new() -> Self {
        Self::with_verbosity(VerbosityLevel::default())
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            output_mode: OutputMode::default(),
            log_buffer: RefCell::new(Vec::new()),
        }
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Capture to memory only (suppresses stdout)
    pub fn enable_capture(&mut self) {
        self.output_mode = OutputMode::Memory;
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.output_mode, OutputMode::Memory | OutputMode::Both)
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: VerbosityLevel) {
        self.verbosity = verbosity;
    }

    /// Print buffered lines the verbosity allows, then clear the buffer
    pub fn flush_buffer(&mut self) {
        let buffer = self.log_buffer.borrow();
        for entry in buffer.iter() {
            if entry.level <= self.verbosity {
                Self::log_to_stdout(entry.level, &entry.message);
            }
        }
        drop(buffer);
        self.clear_logs();
    }

    pub fn logs(&self) -> LogGuard<'_> {
        LogGuard {
            guard: self.log_buffer.borrow(),
        }
    }

    pub fn clear_logs(&mut self) {
        self.log_buffer.borrow_mut().clear();
    }

    #[inline]
    fn log_to_stdout(level: VerbosityLevel, message: &str) {
        if level == VerbosityLevel::Minimal {
            println!("{message}");
        } else {
            println!("  {message}");
        }
    }

    fn log(&self, level: VerbosityLevel, message: &str, category: Option<&str>) {
        let should_capture = self.is_capturing();
        let should_output = matches!(self.output_mode, OutputMode::Stdout | OutputMode::Both);

        if level > self.verbosity && !should_capture {
            return;
        }
        if should_capture {
            self.log_buffer.borrow_mut().push(LogEntry {
                level,
                message: message.to_string(),
                category: category.map(str::to_string),
            });
        }
        if should_output && level <= self.verbosity {
            Self::log_to_stdout(level, message);
        }
    }

    #[inline]
    pub fn minimal(&self, message: &str) {
        self.log(VerbosityLevel::Minimal, message, None);
    }

    #[inline]
    pub fn normal(&self, message: &str) {
        self.log(VerbosityLevel::Normal, message, None);
    }

    #[inline]
    pub fn verbose(&self, message: &str) {
        self.log(VerbosityLevel::Verbose, message, None);
    }

    /// Log a controller decision at Normal level
    pub fn controller_choice(&self, controller_name: &str, message: &str) {
        let line = format!("{controller_name}: {message}");
        self.log(VerbosityLevel::Normal, &line, Some("controller_choice"));
    }

    /// Narrate a batch of event records
    #[cfg(feature = "verbose-logging")]
    pub fn narrate(&self, records: &[EventRecord]) {
        if self.verbosity == VerbosityLevel::Silent && !self.is_capturing() {
            return;
        }
        for record in records {
            let level = event_level(&record.event);
            if level > self.verbosity && !self.is_capturing() {
                continue;
            }
            let line = describe(&record.event);
            self.log(level, &line, Some("game_event"));
        }
    }

    /// Narration compiled out
    #[cfg(not(feature = "verbose-logging"))]
    #[inline]
    pub fn narrate(&self, _records: &[EventRecord]) {}
}

impl Default for GameLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GameLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLogger")
            .field("verbosity", &self.verbosity)
            .field("output_mode", &self.output_mode)
            .field("log_count", &self.log_buffer.borrow().len())
            .finish()
    }
}

impl Clone for GameLogger {
    /// Settings only; the buffer starts empty
    fn clone(&self) -> Self {
        GameLogger {
            verbosity: self.verbosity,
            output_mode: self.output_mode,
            log_buffer: RefCell::new(Vec::new()),
        }
    }
}

fn event_level(event: &GameEvent) -> VerbosityLevel {
    match event {
        GameEvent::GameOver { .. } => VerbosityLevel::Minimal,
        GameEvent::TurnStarted { .. }
        | GameEvent::CardPlayed { .. }
        | GameEvent::AttackDeclared { .. }
        | GameEvent::Evolved { spent_point: true, .. }
        | GameEvent::AmuletActivated { .. }
        | GameEvent::Destroyed { .. }
        | GameEvent::Fatigue { .. } => VerbosityLevel::Normal,
        _ => VerbosityLevel::Verbose,
    }
}

fn entity(target: &EntityRef) -> String {
    match target {
        EntityRef::Unit(id) => format!("unit {id}"),
        EntityRef::Player(p) => format!("{p}"),
    }
}

/// One line of narration for an event
pub fn describe(event: &GameEvent) -> String {
    match event {
        GameEvent::MatchStarted { seed, first_player } => {
            format!("Match started (seed {seed}), {first_player} goes first")
        }
        GameEvent::TurnStarted { player, turn } => format!("Turn {turn}: {player}"),
        GameEvent::TurnEnded { player, .. } => format!("{player} ends the turn"),
        GameEvent::PhaseChanged { to, .. } => format!("Phase: {to}"),
        GameEvent::MulliganSubmitted { player, returned } => {
            format!("{player} mulligans {} card(s)", returned.len())
        }
        GameEvent::ManaChanged { player, current, max } => format!("{player} mana {current}/{max}"),
        GameEvent::CardDrawn { player, card } => format!("{player} draws {}", card.template),
        GameEvent::CardBurned { player, template, .. } => format!("{player} burns {template} (hand full)"),
        GameEvent::Fatigue { player, counter } => format!("{player} is fatigued ({counter})"),
        GameEvent::CardPlayed {
            player,
            template,
            cost_paid,
            enhanced,
            ..
        } => {
            let suffix = if *enhanced { " enhanced" } else { "" };
            format!("{player} plays {template} for {cost_paid}{suffix}")
        }
        GameEvent::Summoned { player, tile, unit } => {
            format!("{player} summons {} {} on tile {tile}", unit.template, unit.id)
        }
        GameEvent::Damage { target, amount, .. } => format!("{} takes {amount} damage", entity(target)),
        GameEvent::Healed { target, amount } => format!("{} heals {amount}", entity(target)),
        GameEvent::BarrierConsumed { target } => format!("{}'s barrier absorbs the hit", entity(target)),
        GameEvent::Destroyed { instance, template, .. } => format!("{template} {instance} is destroyed"),
        GameEvent::Vanished { instance, .. } => format!("unit {instance} vanishes"),
        GameEvent::Evolved { instance, .. } => format!("unit {instance} evolves"),
        GameEvent::AttackDeclared { attacker, target } => {
            format!("unit {attacker} attacks {}", entity(target))
        }
        GameEvent::AmuletActivated { instance, cost } => format!("amulet {instance} activated for {cost}"),
        GameEvent::GameOver { winner, reason } => match winner {
            Some(p) => format!("Game over: {p} wins ({reason:?})"),
            None => format!("Game over: draw ({reason:?})"),
        },
        other => other.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlayerId;
    use crate::game::GameOverReason;

    fn record(id: u64, event: GameEvent) -> EventRecord {
        EventRecord {
            id,
            timestamp_ms: 0,
            event,
        }
    }

    #[test]
    fn test_log_capture() {
        let mut logger = GameLogger::new();
        logger.enable_capture();
        logger.normal("test message");
        logger.minimal("minimal message");

        let logs = logger.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "test message");
        assert_eq!(logs[1].level, VerbosityLevel::Minimal);
    }

    #[test]
    fn test_flush_clears() {
        let mut logger = GameLogger::with_verbosity(VerbosityLevel::Silent);
        logger.enable_capture();
        logger.verbose("hidden");
        assert_eq!(logger.logs().len(), 1);
        logger.flush_buffer();
        assert!(logger.logs().is_empty());
    }

    #[cfg(feature = "verbose-logging")]
    #[test]
    fn test_narrate_tags_events() {
        let mut logger = GameLogger::new();
        logger.enable_capture();
        logger.narrate(&[
            record(
                1,
                GameEvent::TurnStarted {
                    player: PlayerId::FIRST,
                    turn: 1,
                },
            ),
            record(
                2,
                GameEvent::GameOver {
                    winner: Some(PlayerId::SECOND),
                    reason: GameOverReason::Surrender,
                },
            ),
        ]);
        let logs = logger.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].level, VerbosityLevel::Minimal);
        assert_eq!(logs[0].category.as_deref(), Some("game_event"));
        assert!(logs[1].message.contains("wins"));
    }

    #[test]
    fn test_clone_drops_buffer() {
        let mut logger = GameLogger::new();
        logger.enable_capture();
        logger.normal("x");
        let copy = logger.clone();
        assert!(copy.logs().is_empty());
        assert!(copy.is_capturing());
    }
}
