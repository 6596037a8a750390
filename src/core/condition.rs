//! Closed set of condition predicates for effect definitions
//!
//! Conditions are evaluated against a [`ConditionContext`], a read-only
//! snapshot of the counters and flags that matter to the effect's owner,
//! captured right before the definition resolves.

use serde::{Deserialize, Serialize};

/// Numeric counters a condition can compare against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Counter {
    /// Damage the owner has dealt to their own leader this match
    CumulativeSelfDamage,
    /// Damage the owner has dealt to their own leader this turn
    TurnSelfDamage,
    OwnerHealth,
    OpponentHealth,
    OwnerMana,
    OwnerMaxMana,
    /// Allied units on the board other than the source
    OtherAllies,
    EnemyUnits,
    OwnerHandSize,
    OwnerDeckSize,
    OwnerGraveyardSize,
    TurnNumber,
    OwnerEvolutionPoints,
    CardsPlayedThisTurn,
    TriggerAmount,
    DestroyedThisResolution,
}

/// Boolean facts a condition can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    IsOwnerTurn,
    SourceEvolved,
    Enhanced,
    OwnerHasBarrier,
    OpponentHasWard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CmpOp {
    pub fn apply(&self, lhs: i32, rhs: i32) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Gt => lhs > rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Condition {
    #[default]
    Always,
    Compare {
        counter: Counter,
        op: CmpOp,
        value: i32,
    },
    Flag(Flag),
    Not(Box<Condition>),
    All(Vec<Condition>),
}

impl Condition {
    pub fn at_least(counter: Counter, value: i32) -> Self {
        Condition::Compare {
            counter,
            op: CmpOp::Ge,
            value,
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::Always => other,
            Condition::All(mut parts) => {
                parts.push(other);
                Condition::All(parts)
            }
            first => Condition::All(vec![first, other]),
        }
    }

    pub fn evaluate(&self, ctx: &ConditionContext) -> bool {
        match self {
            Condition::Always => true,
            Condition::Compare { counter, op, value } => op.apply(ctx.counter(*counter), *value),
            Condition::Flag(flag) => ctx.flag(*flag),
            Condition::Not(inner) => !inner.evaluate(ctx),
            Condition::All(parts) => parts.iter().all(|c| c.evaluate(ctx)),
        }
    }
}

/// Read-only values a condition is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionContext {
    pub cumulative_self_damage: i32,
    pub turn_self_damage: i32,
    pub owner_health: i32,
    pub opponent_health: i32,
    pub owner_mana: i32,
    pub owner_max_mana: i32,
    pub other_allies: i32,
    pub enemy_units: i32,
    pub owner_hand_size: i32,
    pub owner_deck_size: i32,
    pub owner_graveyard_size: i32,
    pub turn_number: i32,
    pub owner_evolution_points: i32,
    pub cards_played_this_turn: i32,
    pub trigger_amount: i32,
    pub destroyed_this_resolution: i32,
    pub is_owner_turn: bool,
    pub source_evolved: bool,
    pub enhanced: bool,
    pub owner_has_barrier: bool,
    pub opponent_has_ward: bool,
}

impl ConditionContext {
    pub fn counter(&self, counter: Counter) -> i32 {
        match counter {
            Counter::CumulativeSelfDamage => self.cumulative_self_damage,
            Counter::TurnSelfDamage => self.turn_self_damage,
            Counter::OwnerHealth => self.owner_health,
            Counter::OpponentHealth => self.opponent_health,
            Counter::OwnerMana => self.owner_mana,
            Counter::OwnerMaxMana => self.owner_max_mana,
            Counter::OtherAllies => self.other_allies,
            Counter::EnemyUnits => self.enemy_units,
            Counter::OwnerHandSize => self.owner_hand_size,
            Counter::OwnerDeckSize => self.owner_deck_size,
            Counter::OwnerGraveyardSize => self.owner_graveyard_size,
            Counter::TurnNumber => self.turn_number,
            Counter::OwnerEvolutionPoints => self.owner_evolution_points,
            Counter::CardsPlayedThisTurn => self.cards_played_this_turn,
            Counter::TriggerAmount => self.trigger_amount,
            Counter::DestroyedThisResolution => self.destroyed_this_resolution,
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::IsOwnerTurn => self.is_owner_turn,
            Flag::SourceEvolved => self.source_evolved,
            Flag::Enhanced => self.enhanced,
            Flag::OwnerHasBarrier => self.owner_has_barrier,
            Flag::OpponentHasWard => self.opponent_has_ward,
        }
    }
}
