//! Typed event log
//!
//! Every state change is a [`GameEvent`]. The host produces events while
//! resolving an action and applies them to its own state; peers apply the
//! very same events to their replicas. Events therefore carry everything the
//! apply step needs (including random outcomes such as shuffle orders and
//! whole units for summons), so replay never consults the card catalog or
//! re-rolls randomness.

use crate::core::{
    EntityRef, HandCard, InstanceId, Keyword, PlayerId, RuntimeUnit, StatModifier, TemplateId,
    Trigger,
};
use crate::game::Phase;
use crate::zones::TileEffect;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOverReason {
    LeaderDefeated,
    Surrender,
    Disconnected,
    TurnLimit,
    /// The host could not resolve an action and ended the match without a winner
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum GameEvent {
    MatchStarted {
        seed: u64,
        first_player: PlayerId,
    },
    DeckShuffled {
        player: PlayerId,
        order: Vec<TemplateId>,
    },
    /// Generator position after a random operation
    RngAdvanced {
        draws: u64,
        word_pos: u64,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    MulliganSubmitted {
        player: PlayerId,
        returned: Vec<InstanceId>,
    },
    TurnStarted {
        player: PlayerId,
        turn: u32,
    },
    TurnEnded {
        player: PlayerId,
        turn: u32,
    },
    ManaChanged {
        player: PlayerId,
        current: u8,
        max: u8,
    },
    EvolutionPointsChanged {
        player: PlayerId,
        points: u8,
    },
    CardDrawn {
        player: PlayerId,
        card: HandCard,
    },
    /// A card that could not fit in hand went to the graveyard
    CardBurned {
        player: PlayerId,
        template: TemplateId,
        from_deck: bool,
    },
    Fatigue {
        player: PlayerId,
        counter: u32,
    },
    CardDiscarded {
        player: PlayerId,
        card: InstanceId,
        template: TemplateId,
    },
    CardAddedToHand {
        player: PlayerId,
        card: HandCard,
    },
    HandShuffledIntoDeck {
        player: PlayerId,
    },
    CardPlayed {
        player: PlayerId,
        card: InstanceId,
        template: TemplateId,
        cost_paid: u8,
        enhanced: bool,
        /// Spells go straight to the graveyard
        to_graveyard: bool,
    },
    Summoned {
        player: PlayerId,
        tile: usize,
        unit: RuntimeUnit,
    },
    ListenerArmed {
        instance: InstanceId,
        triggers: Vec<Trigger>,
    },
    Damage {
        source: Option<InstanceId>,
        target: EntityRef,
        amount: i32,
        self_inflicted: bool,
    },
    Healed {
        target: EntityRef,
        amount: i32,
    },
    HealthSet {
        target: EntityRef,
        health: i32,
    },
    BarrierConsumed {
        target: EntityRef,
    },
    BarrierGained {
        target: EntityRef,
    },
    Destroyed {
        instance: InstanceId,
        owner: PlayerId,
        template: TemplateId,
    },
    Vanished {
        instance: InstanceId,
        owner: PlayerId,
    },
    ReturnedToHand {
        instance: InstanceId,
        owner: PlayerId,
        template: TemplateId,
    },
    Evolved {
        instance: InstanceId,
        attack_gain: i32,
        health_gain: i32,
        spent_point: bool,
    },
    Buffed {
        instance: InstanceId,
        modifier: StatModifier,
    },
    /// Every temporary modifier on the board counts down one turn
    ModifiersTicked,
    ModifierExpired {
        instance: InstanceId,
        index: usize,
    },
    Silenced {
        instance: InstanceId,
    },
    KeywordGained {
        instance: InstanceId,
        keyword: Keyword,
    },
    Transformed {
        instance: InstanceId,
        into: RuntimeUnit,
    },
    CostModified {
        player: PlayerId,
        card: InstanceId,
        delta: i32,
    },
    TileEffectApplied {
        player: PlayerId,
        tile: usize,
        effect: TileEffect,
    },
    TileEffectsTicked {
        player: PlayerId,
    },
    TileEffectsPurged {
        player: PlayerId,
    },
    TileEffectsCleared {
        player: PlayerId,
        tile: usize,
    },
    CountdownChanged {
        instance: InstanceId,
        remaining: u8,
    },
    AttackDeclared {
        attacker: InstanceId,
        target: EntityRef,
    },
    AmuletActivated {
        instance: InstanceId,
        cost: u8,
    },
    GameOver {
        winner: Option<PlayerId>,
        reason: GameOverReason,
    },
}

impl GameEvent {
    /// Short category name used by the logger
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::MatchStarted { .. } => "match_started",
            GameEvent::DeckShuffled { .. } => "deck_shuffled",
            GameEvent::RngAdvanced { .. } => "rng_advanced",
            GameEvent::PhaseChanged { .. } => "phase_changed",
            GameEvent::MulliganSubmitted { .. } => "mulligan",
            GameEvent::TurnStarted { .. } => "turn_started",
            GameEvent::TurnEnded { .. } => "turn_ended",
            GameEvent::ManaChanged { .. } => "mana",
            GameEvent::EvolutionPointsChanged { .. } => "evolution_points",
            GameEvent::CardDrawn { .. } => "draw",
            GameEvent::CardBurned { .. } => "burn",
            GameEvent::Fatigue { .. } => "fatigue",
            GameEvent::CardDiscarded { .. } => "discard",
            GameEvent::CardAddedToHand { .. } => "add_to_hand",
            GameEvent::HandShuffledIntoDeck { .. } => "hand_to_deck",
            GameEvent::CardPlayed { .. } => "play",
            GameEvent::Summoned { .. } => "summon",
            GameEvent::ListenerArmed { .. } => "listener",
            GameEvent::Damage { .. } => "damage",
            GameEvent::Healed { .. } => "heal",
            GameEvent::HealthSet { .. } => "health_set",
            GameEvent::BarrierConsumed { .. } => "barrier_consumed",
            GameEvent::BarrierGained { .. } => "barrier_gained",
            GameEvent::Destroyed { .. } => "destroy",
            GameEvent::Vanished { .. } => "vanish",
            GameEvent::ReturnedToHand { .. } => "return",
            GameEvent::Evolved { .. } => "evolve",
            GameEvent::Buffed { .. } => "buff",
            GameEvent::ModifiersTicked => "modifiers_ticked",
            GameEvent::ModifierExpired { .. } => "modifier_expired",
            GameEvent::Silenced { .. } => "silence",
            GameEvent::KeywordGained { .. } => "keyword",
            GameEvent::Transformed { .. } => "transform",
            GameEvent::CostModified { .. } => "cost",
            GameEvent::TileEffectApplied { .. } => "tile_effect",
            GameEvent::TileEffectsTicked { .. } => "tile_tick",
            GameEvent::TileEffectsPurged { .. } => "tile_purge",
            GameEvent::TileEffectsCleared { .. } => "tile_clear",
            GameEvent::CountdownChanged { .. } => "countdown",
            GameEvent::AttackDeclared { .. } => "attack",
            GameEvent::AmuletActivated { .. } => "activate",
            GameEvent::GameOver { .. } => "game_over",
        }
    }

    /// Bookkeeping events that have no visible consequence
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            GameEvent::RngAdvanced { .. } | GameEvent::ListenerArmed { .. } | GameEvent::ModifiersTicked
        )
    }
}

/// An event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Strictly increasing within one match, starting at 1
    pub id: u64,
    pub timestamp_ms: u64,
    pub event: GameEvent,
}

/// Source of record timestamps
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock driven by hand, for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        ManualClock {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Ordered record of every event in one match
///
/// The id counter lives here, so separate matches number their events
/// independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
    next_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        EventLog {
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// An empty log whose first record will get id `last_id + 1`
    pub fn resuming_after(last_id: u64) -> Self {
        EventLog {
            records: Vec::new(),
            next_id: last_id + 1,
        }
    }

    /// Stamp and append a batch, returning the new records
    pub fn append(&mut self, events: Vec<GameEvent>, clock: &dyn Clock) -> Vec<EventRecord> {
        let timestamp_ms = clock.now_ms();
        let start = self.records.len();
        for event in events {
            let id = self.next_id.max(1);
            self.next_id = id + 1;
            self.records.push(EventRecord {
                id,
                timestamp_ms,
                event,
            });
        }
        self.records[start..].to_vec()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_id(&self) -> u64 {
        self.next_id.saturating_sub(1)
    }

    /// Records with an id greater than `id`
    pub fn since(&self, id: u64) -> &[EventRecord] {
        let start = self.records.partition_point(|r| r.id <= id);
        &self.records[start..]
    }

    /// The bare events, without ids or timestamps
    pub fn events(&self) -> Vec<GameEvent> {
        self.records.iter().map(|r| r.event.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_per_log() {
        let clock = ManualClock::new(1_000);
        let mut log = EventLog::new();
        let first = log.append(vec![GameEvent::ModifiersTicked, GameEvent::ModifiersTicked], &clock);
        clock.advance(5);
        let second = log.append(vec![GameEvent::ModifiersTicked], &clock);

        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second[0].id, 3);
        assert_eq!(second[0].timestamp_ms, 1_005);

        let mut other = EventLog::new();
        let records = other.append(vec![GameEvent::ModifiersTicked], &clock);
        assert_eq!(records[0].id, 1);
    }

    #[test]
    fn test_since() {
        let clock = ManualClock::new(0);
        let mut log = EventLog::new();
        log.append(vec![GameEvent::ModifiersTicked; 4], &clock);
        assert_eq!(log.since(2).len(), 2);
        assert_eq!(log.since(0).len(), 4);
        assert!(log.since(9).is_empty());
        assert_eq!(log.last_id(), 4);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = GameEvent::Damage {
            source: None,
            target: EntityRef::Player(PlayerId::FIRST),
            amount: 2,
            self_inflicted: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"Damage""#));
        let back: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
