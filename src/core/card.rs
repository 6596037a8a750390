//! Card templates: immutable catalog entries

use crate::core::{
    CardName, EffectDefinition, HeroClass, Keyword, KeywordSet, Rarity, Tag, TemplateId, Trigger,
};
use crate::{DuelError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Minion,
    Spell,
    Amulet,
}

/// Alternate cost and effect list used when the card is played with enough
/// mana to pay the enhanced cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enhance {
    pub cost: u8,
    pub effects: Vec<EffectDefinition>,
}

/// Represents a card definition in the catalog
///
/// Created once at catalog load and shared read-only for the process lifetime.
/// Live copies on the board are [`crate::core::RuntimeUnit`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTemplate {
    pub id: TemplateId,
    pub name: CardName,
    pub card_type: CardType,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub class: HeroClass,
    pub cost: u8,
    #[serde(default)]
    pub attack: i32,
    #[serde(default)]
    pub health: i32,
    #[serde(default)]
    pub evolved_attack: i32,
    #[serde(default)]
    pub evolved_health: i32,
    /// Turns until an amulet destroys itself
    #[serde(default)]
    pub countdown: Option<u8>,
    #[serde(default)]
    pub keywords: KeywordSet,
    #[serde(default)]
    pub tags: SmallVec<[Tag; 2]>,
    #[serde(default)]
    pub effects: Vec<EffectDefinition>,
    #[serde(default)]
    pub enhance: Option<Enhance>,
    /// Mana paid to activate an amulet's on-activate effects
    #[serde(default)]
    pub activation_cost: Option<u8>,
}

impl CardTemplate {
    fn blank(id: TemplateId, name: &str, card_type: CardType, cost: u8) -> Self {
        CardTemplate {
            id,
            name: CardName::from(name),
            card_type,
            rarity: Rarity::default(),
            class: HeroClass::default(),
            cost,
            attack: 0,
            health: 0,
            evolved_attack: 0,
            evolved_health: 0,
            countdown: None,
            keywords: KeywordSet::empty(),
            tags: SmallVec::new(),
            effects: Vec::new(),
            enhance: None,
            activation_cost: None,
        }
    }

    /// A minion whose evolved stats default to +2/+2
    pub fn minion(id: TemplateId, name: &str, cost: u8, attack: i32, health: i32) -> Self {
        let mut card = Self::blank(id, name, CardType::Minion, cost);
        card.attack = attack;
        card.health = health;
        card.evolved_attack = attack + 2;
        card.evolved_health = health + 2;
        card
    }

    pub fn spell(id: TemplateId, name: &str, cost: u8) -> Self {
        Self::blank(id, name, CardType::Spell, cost)
    }

    pub fn amulet(id: TemplateId, name: &str, cost: u8) -> Self {
        Self::blank(id, name, CardType::Amulet, cost)
    }

    pub fn with_evolved(mut self, attack: i32, health: i32) -> Self {
        self.evolved_attack = attack;
        self.evolved_health = health;
        self
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.insert(keyword);
        self
    }

    pub fn with_effect(mut self, effect: EffectDefinition) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_enhance(mut self, cost: u8, effects: Vec<EffectDefinition>) -> Self {
        self.enhance = Some(Enhance { cost, effects });
        self
    }

    pub fn with_countdown(mut self, turns: u8) -> Self {
        self.countdown = Some(turns);
        self
    }

    pub fn with_activation(mut self, cost: u8) -> Self {
        self.activation_cost = Some(cost);
        self
    }

    pub fn with_class(mut self, class: HeroClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(Tag::from(tag));
        self
    }

    pub fn is_type(&self, card_type: CardType) -> bool {
        self.card_type == card_type
    }

    pub fn occupies_tile(&self) -> bool {
        matches!(self.card_type, CardType::Minion | CardType::Amulet)
    }

    /// Definitions that run for `trigger`
    ///
    /// When the card was played enhanced and the alternate list defines
    /// anything for this trigger, those definitions are used in place of the
    /// base ones; otherwise the base list applies.
    pub fn effects_for(&self, trigger: Trigger, enhanced: bool) -> Vec<&EffectDefinition> {
        if enhanced {
            if let Some(enhance) = &self.enhance {
                let alternate: Vec<&EffectDefinition> = enhance
                    .effects
                    .iter()
                    .filter(|def| def.trigger == trigger)
                    .collect();
                if !alternate.is_empty() {
                    return alternate;
                }
            }
        }
        self.effects.iter().filter(|def| def.trigger == trigger).collect()
    }

    /// Every trigger kind this card reacts to, in either effect list
    pub fn triggers(&self) -> Vec<Trigger> {
        let mut triggers: Vec<Trigger> = self
            .effects
            .iter()
            .chain(self.enhance.iter().flat_map(|e| e.effects.iter()))
            .map(|def| def.trigger)
            .collect();
        triggers.sort();
        triggers.dedup();
        triggers
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DuelError::InvalidCardDefinition(format!("{}: {msg}", self.name)));

        match self.card_type {
            CardType::Minion => {
                if self.health <= 0 {
                    return invalid("minions need positive health".to_string());
                }
                if self.countdown.is_some() {
                    return invalid("only amulets have a countdown".to_string());
                }
            }
            CardType::Spell => {
                if self.effects.iter().any(|d| d.trigger != Trigger::OnPlay) {
                    return invalid("spells only have on-play effects".to_string());
                }
            }
            CardType::Amulet => {
                if !self.keywords.is_empty() {
                    return invalid("amulets cannot carry keywords".to_string());
                }
            }
        }
        if self.activation_cost.is_some() && !self.triggers().contains(&Trigger::OnActivate) {
            return invalid("activation cost without on-activate effects".to_string());
        }
        for def in self
            .effects
            .iter()
            .chain(self.enhance.iter().flat_map(|e| e.effects.iter()))
        {
            def.validate()
                .map_err(|e| DuelError::InvalidCardDefinition(format!("{}: {e}", self.name)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, EffectKind, TargetSpec};

    fn draw_one() -> EffectDefinition {
        EffectDefinition::new(Trigger::OnPlay, TargetSpec::Owner, EffectKind::Draw(Amount::Fixed(1))).unwrap()
    }

    #[test]
    fn test_minion_builder() {
        let card = CardTemplate::minion(TemplateId::new(1), "Squire", 2, 2, 2).with_keyword(Keyword::Ward);
        assert_eq!(card.evolved_attack, 4);
        assert!(card.keywords.contains(Keyword::Ward));
        assert!(card.occupies_tile());
        assert!(card.validate().is_ok());
    }

    #[test]
    fn test_enhanced_list_replaces_base_for_trigger() {
        let burn = EffectDefinition::new(
            Trigger::OnPlay,
            TargetSpec::Opponent,
            EffectKind::Damage(Amount::Fixed(3)),
        )
        .unwrap();
        let card = CardTemplate::spell(TemplateId::new(2), "Insight", 1)
            .with_effect(draw_one())
            .with_enhance(5, vec![burn.clone()]);

        assert_eq!(card.effects_for(Trigger::OnPlay, false), vec![&draw_one()]);
        assert_eq!(card.effects_for(Trigger::OnPlay, true), vec![&burn]);
    }

    #[test]
    fn test_enhance_without_trigger_falls_back() {
        let last_words = EffectDefinition::new(
            Trigger::OnDestroy,
            TargetSpec::Owner,
            EffectKind::Draw(Amount::Fixed(1)),
        )
        .unwrap();
        let card = CardTemplate::minion(TemplateId::new(3), "Scout", 2, 1, 1)
            .with_effect(draw_one())
            .with_enhance(6, vec![last_words]);
        assert_eq!(card.effects_for(Trigger::OnPlay, true).len(), 1);
        assert_eq!(card.triggers(), vec![Trigger::OnPlay, Trigger::OnDestroy]);
    }

    #[test]
    fn test_spell_with_non_play_trigger_is_invalid() {
        let mut card = CardTemplate::spell(TemplateId::new(4), "Odd", 1).with_effect(draw_one());
        card.effects[0].trigger = Trigger::TurnEnd;
        assert!(card.validate().is_err());
    }
}
