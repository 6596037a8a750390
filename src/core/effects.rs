//! Declarative card effects
//!
//! An [`EffectDefinition`] is a single data-driven unit of card behaviour:
//! *when* it fires ([`Trigger`]), *what* it touches ([`TargetSpec`]), *what*
//! it does ([`EffectKind`]) and *whether* it applies ([`Condition`]).
//! Quantities that depend on live state are expressed as [`Amount`] variants
//! instead of sentinel numbers, and each effect kind checks at construction
//! time which amounts and targets it accepts.

use crate::core::{Condition, TemplateId};
use crate::zones::{TileEffectKind, TileTiming};
use crate::{DuelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named standing abilities of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Keyword {
    /// Enemies must attack ward units first
    Ward,
    /// May attack units the turn it is summoned
    Rush,
    /// May attack anything the turn it is summoned
    Storm,
    /// Reduces the next damage instance to zero, then is consumed
    Barrier,
    /// Heals the owner by the damage dealt when attacking
    Drain,
}

impl Keyword {
    pub const ALL: [Keyword; 5] = [
        Keyword::Ward,
        Keyword::Rush,
        Keyword::Storm,
        Keyword::Barrier,
        Keyword::Drain,
    ];

    fn bit(&self) -> u8 {
        match self {
            Keyword::Ward => 1,
            Keyword::Rush => 1 << 1,
            Keyword::Storm => 1 << 2,
            Keyword::Barrier => 1 << 3,
            Keyword::Drain => 1 << 4,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Compact set of keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeywordSet(u8);

impl KeywordSet {
    pub fn empty() -> Self {
        KeywordSet(0)
    }

    pub fn of(keywords: &[Keyword]) -> Self {
        let mut set = KeywordSet::empty();
        for kw in keywords {
            set.insert(*kw);
        }
        set
    }

    pub fn contains(&self, keyword: Keyword) -> bool {
        self.0 & keyword.bit() != 0
    }

    pub fn insert(&mut self, keyword: Keyword) {
        self.0 |= keyword.bit();
    }

    pub fn remove(&mut self, keyword: Keyword) {
        self.0 &= !keyword.bit();
    }

    pub fn union(&self, other: KeywordSet) -> KeywordSet {
        KeywordSet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Keyword> + '_ {
        Keyword::ALL.into_iter().filter(|kw| self.contains(*kw))
    }
}

/// The game moment that activates an effect definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// The card itself is played from hand
    OnPlay,
    /// The unit itself is destroyed (not vanished)
    OnDestroy,
    /// The unit itself declares an attack
    OnAttack,
    /// The unit itself takes non-zero damage
    OnDamaged,
    /// Start of the owner's turn
    TurnStart,
    /// End of every turn
    TurnEnd,
    /// End of the owner's turn only
    OwnerTurnEnd,
    /// The unit itself evolves
    OnEvolve,
    /// The amulet itself is activated
    OnActivate,
    /// The owner draws a card
    OnDraw,
    /// The owner plays another card
    AllyPlay,
    /// The opponent plays a card
    EnemyPlay,
    /// Another allied unit is destroyed
    AllyDestroy,
    /// An enemy unit is destroyed
    EnemyDestroy,
    /// Any minion other than the unit itself is destroyed
    AnyMinionDestroyed,
    /// The owner's leader takes non-zero damage
    OwnerDamaged,
}

impl Trigger {
    /// Triggers that fire on the card itself rather than through the
    /// standing listener registry
    pub fn is_self_trigger(&self) -> bool {
        matches!(
            self,
            Trigger::OnPlay
                | Trigger::OnDestroy
                | Trigger::OnAttack
                | Trigger::OnDamaged
                | Trigger::OnEvolve
                | Trigger::OnActivate
        )
    }

    pub fn is_reactive(&self) -> bool {
        !self.is_self_trigger()
    }
}

/// Tiles addressed by a tile-effect definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileSet {
    /// The tile named in the action payload
    Chosen,
    /// The tile the source occupies
    SourceTile,
    /// Every tile on the owner's board
    OwnAll,
    /// Every empty tile on the owner's board
    OwnEmpty,
    /// Every tile on the opponent's board
    EnemyAll,
}

/// Which card(s) in the owner's hand a hand-card effect touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandSelector {
    Random,
    All,
    Leftmost,
    Rightmost,
}

/// Rule describing which live entities an effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetSpec {
    SelfUnit,
    Owner,
    Opponent,
    BothPlayers,
    /// An enemy unit named in the action payload
    ChosenEnemy,
    /// An enemy unit or the enemy leader named in the action payload
    ChosenEnemyOrFace,
    /// Another allied unit named in the action payload
    ChosenAlly,
    /// Any unit named in the action payload
    ChosenAny,
    RandomEnemy { count: u8 },
    RandomAlly { count: u8 },
    AllEnemies,
    AllAllies,
    OtherAllies,
    AllUnits,
    /// The unit carried by the trigger (the one that died, attacked, was played...)
    TriggeringUnit,
    Tiles(TileSet),
    HandCard(HandSelector),
}

impl TargetSpec {
    /// Whether this target must come from the acting player's choice
    pub fn is_player_choice(&self) -> bool {
        matches!(
            self,
            TargetSpec::ChosenEnemy
                | TargetSpec::ChosenEnemyOrFace
                | TargetSpec::ChosenAlly
                | TargetSpec::ChosenAny
                | TargetSpec::Tiles(TileSet::Chosen)
        )
    }

    pub fn may_hit_players(&self) -> bool {
        matches!(
            self,
            TargetSpec::Owner
                | TargetSpec::Opponent
                | TargetSpec::BothPlayers
                | TargetSpec::ChosenEnemyOrFace
        )
    }

    pub fn may_hit_units(&self) -> bool {
        matches!(
            self,
            TargetSpec::SelfUnit
                | TargetSpec::ChosenEnemy
                | TargetSpec::ChosenEnemyOrFace
                | TargetSpec::ChosenAlly
                | TargetSpec::ChosenAny
                | TargetSpec::RandomEnemy { .. }
                | TargetSpec::RandomAlly { .. }
                | TargetSpec::AllEnemies
                | TargetSpec::AllAllies
                | TargetSpec::OtherAllies
                | TargetSpec::AllUnits
                | TargetSpec::TriggeringUnit
        )
    }

    pub fn is_tiles(&self) -> bool {
        matches!(self, TargetSpec::Tiles(_))
    }

    pub fn is_hand(&self) -> bool {
        matches!(self, TargetSpec::HandCard(_))
    }
}

/// A quantity, either fixed or derived from live state at resolution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Amount {
    Fixed(i32),
    TargetAttack,
    TargetHealth,
    TargetCost,
    SourceAttack,
    /// Units destroyed so far in the current resolution
    DestroyedThisResolution,
    /// Quantity carried by the trigger (damage taken, cards drawn...)
    TriggerAmount,
    OwnerHandSize,
}

impl Amount {
    fn needs_unit_target(&self) -> bool {
        matches!(self, Amount::TargetAttack | Amount::TargetHealth)
    }

    fn is_negative_fixed(&self) -> bool {
        matches!(self, Amount::Fixed(n) if *n < 0)
    }
}

impl From<i32> for Amount {
    fn from(n: i32) -> Self {
        Amount::Fixed(n)
    }
}

/// How long a stat modifier lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatDuration {
    Permanent,
    /// Expires after this many turn ends
    Turns(u8),
}

/// What an effect does to each resolved target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Damage(Amount),
    Heal(Amount),
    Draw(Amount),
    /// Discard from the owner's hand
    Discard { count: u8 },
    Summon { template: TemplateId, count: u8 },
    Buff { attack: Amount, health: Amount, duration: StatDuration },
    Debuff { attack: i32, health: i32 },
    Destroy,
    /// Removed from play without graveyard placement or on-destroy triggers
    Vanish,
    Silence,
    GrantKeyword(Keyword),
    AddToHand { template: TemplateId, count: u8 },
    /// Put a copy of each target unit into the owner's hand
    CopyToHand,
    ReturnToHand,
    Transform { template: TemplateId },
    /// Evolve the target without spending evolution points
    Evolve,
    /// Change the cost of targeted hand cards
    ModifyCost { delta: i32 },
    ApplyTileEffect {
        kind: TileEffectKind,
        magnitude: i32,
        duration: u8,
        timing: TileTiming,
    },
    ClearTileEffects,
    /// Set the target's health to the source's health (or the owner's leader
    /// health when the source is not on the board)
    EqualizeHealth,
    /// Exchange health between the source and the target
    SwapHealth,
    /// Shuffle the owner's hand into the deck, then draw
    ShuffleAndDraw { draw: u8 },
    GainMana(i32),
    GainMaxMana(i32),
    GainEvolutionPoint(u8),
    GrantBarrier,
    ReduceCountdown(u8),
}

impl EffectKind {
    /// Check that the amounts and target of a definition fit this kind
    pub fn validate(&self, target: &TargetSpec) -> std::result::Result<(), String> {
        let unit_only = || {
            if target.may_hit_units() && !target.may_hit_players() {
                Ok(())
            } else {
                Err(format!("{self:?} needs a unit target, got {target:?}"))
            }
        };
        let player_only = || {
            if target.may_hit_players() && !target.may_hit_units() {
                Ok(())
            } else {
                Err(format!("{self:?} needs a player target, got {target:?}"))
            }
        };
        let no_unit_amount = |amount: &Amount| {
            if amount.needs_unit_target() && !target.may_hit_units() {
                Err(format!("{amount:?} needs a unit target, got {target:?}"))
            } else if amount.is_negative_fixed() {
                Err(format!("{self:?} does not accept negative amounts"))
            } else {
                Ok(())
            }
        };

        match self {
            EffectKind::Damage(amount) | EffectKind::Heal(amount) => {
                if !(target.may_hit_units() || target.may_hit_players()) {
                    return Err(format!("{self:?} needs a unit or player target"));
                }
                no_unit_amount(amount)
            }
            EffectKind::Draw(amount) => {
                player_only()?;
                if matches!(
                    amount,
                    Amount::TargetAttack | Amount::TargetHealth | Amount::TargetCost
                ) {
                    return Err("draw count cannot be derived from a unit target".to_string());
                }
                no_unit_amount(amount)
            }
            EffectKind::Buff { attack, health, .. } => {
                unit_only()?;
                no_unit_amount(attack)?;
                no_unit_amount(health)
            }
            EffectKind::Debuff { attack, health } => {
                unit_only()?;
                if *attack < 0 || *health < 0 {
                    return Err("debuff magnitudes are subtracted and must be >= 0".to_string());
                }
                Ok(())
            }
            EffectKind::Destroy
            | EffectKind::Vanish
            | EffectKind::Silence
            | EffectKind::GrantKeyword(_)
            | EffectKind::CopyToHand
            | EffectKind::ReturnToHand
            | EffectKind::Transform { .. }
            | EffectKind::Evolve
            | EffectKind::ReduceCountdown(_) => unit_only(),
            EffectKind::EqualizeHealth | EffectKind::SwapHealth => {
                if target.may_hit_units() || target.may_hit_players() {
                    Ok(())
                } else {
                    Err(format!("{self:?} needs a unit or player target"))
                }
            }
            EffectKind::Discard { .. } | EffectKind::ModifyCost { .. } => {
                if target.is_hand() {
                    Ok(())
                } else {
                    Err(format!("{self:?} needs a hand-card target, got {target:?}"))
                }
            }
            EffectKind::ApplyTileEffect { duration, .. } => {
                if !target.is_tiles() {
                    return Err(format!("{self:?} needs a tile target, got {target:?}"));
                }
                if *duration == 0 {
                    return Err("tile effects need a duration of at least one turn".to_string());
                }
                Ok(())
            }
            EffectKind::ClearTileEffects => {
                if target.is_tiles() {
                    Ok(())
                } else {
                    Err(format!("{self:?} needs a tile target, got {target:?}"))
                }
            }
            EffectKind::Summon { count, .. } | EffectKind::AddToHand { count, .. } => {
                if *count == 0 {
                    return Err(format!("{self:?} with a count of zero"));
                }
                player_only()
            }
            EffectKind::ShuffleAndDraw { .. }
            | EffectKind::GainMana(_)
            | EffectKind::GainMaxMana(_)
            | EffectKind::GainEvolutionPoint(_) => player_only(),
            EffectKind::GrantBarrier => {
                if target.may_hit_units() || target.may_hit_players() {
                    Ok(())
                } else {
                    Err("barrier needs a unit or player target".to_string())
                }
            }
        }
    }
}

/// One declarative effect attached to a card template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectDefinition {
    pub trigger: Trigger,
    pub target: TargetSpec,
    pub kind: EffectKind,
    #[serde(default)]
    pub condition: Condition,
    /// Apply as much as possible instead of skipping the whole effect list
    /// when a cost-like effect (discard) cannot be paid in full
    #[serde(default)]
    pub best_effort: bool,
}

impl EffectDefinition {
    /// Build a definition, rejecting kind/target/amount combinations that
    /// could never resolve
    pub fn new(trigger: Trigger, target: TargetSpec, kind: EffectKind) -> Result<Self> {
        let def = EffectDefinition {
            trigger,
            target,
            kind,
            condition: Condition::Always,
            best_effort: false,
        };
        def.validate()?;
        Ok(def)
    }

    pub fn validate(&self) -> Result<()> {
        self.kind
            .validate(&self.target)
            .map_err(DuelError::InvalidCardDefinition)?;
        if self.target == TargetSpec::TriggeringUnit && self.trigger == Trigger::OnPlay {
            return Err(DuelError::InvalidCardDefinition(
                "on-play effects have no triggering unit".to_string(),
            ));
        }
        Ok(())
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    /// Whether resolving this definition consumes something that must be
    /// available in full before the effect list starts
    pub fn is_cost_like(&self) -> bool {
        matches!(self.kind, EffectKind::Discard { .. }) && !self.best_effort
    }
}
