//! Live board occupants

use crate::core::{CardTemplate, CardType, InstanceId, Keyword, KeywordSet, PlayerId, TemplateId};
use serde::{Deserialize, Serialize};

/// A stat change applied to a unit
///
/// `remaining_turns` of `None` means permanent; otherwise the modifier is
/// removed after that many turn ends and its deltas are reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModifier {
    pub attack: i32,
    pub health: i32,
    pub keywords: KeywordSet,
    pub remaining_turns: Option<u8>,
}

impl StatModifier {
    pub fn permanent(attack: i32, health: i32) -> Self {
        StatModifier {
            attack,
            health,
            keywords: KeywordSet::empty(),
            remaining_turns: None,
        }
    }

    pub fn temporary(attack: i32, health: i32, turns: u8) -> Self {
        StatModifier {
            attack,
            health,
            keywords: KeywordSet::empty(),
            remaining_turns: Some(turns),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.remaining_turns.is_none()
    }
}

/// A live card on a board tile (minion or amulet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeUnit {
    pub id: InstanceId,
    pub template: TemplateId,
    pub owner: PlayerId,
    pub card_type: CardType,

    /// Printed stats (evolved stats once evolved), before modifiers
    pub base_attack: i32,
    pub base_health: i32,

    pub attack: i32,
    /// May go to zero or below transiently; the unit is removed at the next
    /// death check
    pub health: i32,
    pub max_health: i32,

    pub evolved: bool,
    /// Played with its enhanced cost paid
    pub enhanced: bool,
    pub silenced: bool,

    /// Entered play this turn
    pub summoning_sick: bool,
    pub attacked_this_turn: bool,
    pub activated_this_turn: bool,

    pub countdown: Option<u8>,

    pub base_keywords: KeywordSet,
    pub keywords: KeywordSet,
    pub modifiers: Vec<StatModifier>,
}

impl RuntimeUnit {
    pub fn from_template(id: InstanceId, owner: PlayerId, template: &CardTemplate, enhanced: bool) -> Self {
        RuntimeUnit {
            id,
            template: template.id,
            owner,
            card_type: template.card_type,
            base_attack: template.attack,
            base_health: template.health,
            attack: template.attack,
            health: template.health,
            max_health: template.health,
            evolved: false,
            enhanced,
            silenced: false,
            summoning_sick: true,
            attacked_this_turn: false,
            activated_this_turn: false,
            countdown: template.countdown,
            base_keywords: template.keywords,
            keywords: template.keywords,
            modifiers: Vec::new(),
        }
    }

    pub fn is_minion(&self) -> bool {
        self.card_type == CardType::Minion
    }

    pub fn is_amulet(&self) -> bool {
        self.card_type == CardType::Amulet
    }

    pub fn has(&self, keyword: Keyword) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn is_dead(&self) -> bool {
        self.is_minion() && self.health <= 0
    }

    pub fn is_damaged(&self) -> bool {
        self.health < self.max_health
    }

    /// Whether the unit may attack an enemy unit right now
    pub fn can_attack_unit(&self) -> bool {
        self.is_minion()
            && !self.attacked_this_turn
            && (!self.summoning_sick || self.has(Keyword::Rush) || self.has(Keyword::Storm))
    }

    /// Whether the unit may attack the enemy leader right now
    pub fn can_attack_player(&self) -> bool {
        self.is_minion() && !self.attacked_this_turn && (!self.summoning_sick || self.has(Keyword::Storm))
    }

    /// Apply `modifier`, storing the attack delta actually applied so expiry
    /// reverts exactly what was granted
    pub fn apply_modifier(&mut self, mut modifier: StatModifier) {
        modifier.attack = modifier.attack.max(-self.attack);
        self.attack += modifier.attack;
        self.max_health += modifier.health;
        self.health += modifier.health;
        self.keywords = self.keywords.union(modifier.keywords);
        self.modifiers.push(modifier);
    }

    /// Remove the modifier at `index` and revert its deltas
    pub fn expire_modifier(&mut self, index: usize) -> Option<StatModifier> {
        if index >= self.modifiers.len() {
            return None;
        }
        let modifier = self.modifiers.remove(index);
        self.attack = (self.attack - modifier.attack).max(0);
        self.max_health -= modifier.health;
        self.health = self.health.min(self.max_health);
        for keyword in modifier.keywords.iter() {
            let still_granted = self.base_keywords.contains(keyword)
                || self.modifiers.iter().any(|m| m.keywords.contains(keyword));
            if !still_granted {
                self.keywords.remove(keyword);
            }
        }
        Some(modifier)
    }

    /// Count down temporary modifiers, returning the indices that reached zero
    pub fn tick_modifiers(&mut self) -> Vec<usize> {
        let mut expired = Vec::new();
        for (index, modifier) in self.modifiers.iter_mut().enumerate() {
            if let Some(turns) = modifier.remaining_turns.as_mut() {
                *turns = turns.saturating_sub(1);
                if *turns == 0 {
                    expired.push(index);
                }
            }
        }
        expired
    }

    /// Raise stats to the evolved values
    ///
    /// A unit evolving on the turn it entered play gains Rush.
    pub fn evolve(&mut self, attack_gain: i32, health_gain: i32) {
        self.evolved = true;
        self.base_attack += attack_gain;
        self.base_health += health_gain;
        self.attack += attack_gain;
        self.max_health += health_gain;
        self.health += health_gain;
        if self.summoning_sick && !self.has(Keyword::Storm) {
            self.keywords.insert(Keyword::Rush);
        }
    }

    /// Strip every modifier and keyword; the unit's effects stop resolving
    pub fn silence(&mut self) {
        self.silenced = true;
        self.modifiers.clear();
        self.attack = self.base_attack;
        self.max_health = self.base_health;
        self.health = self.health.min(self.max_health);
        self.base_keywords = KeywordSet::empty();
        self.keywords = KeywordSet::empty();
    }

    pub fn reset_for_turn(&mut self) {
        self.summoning_sick = false;
        self.attacked_this_turn = false;
        self.activated_this_turn = false;
    }
}
