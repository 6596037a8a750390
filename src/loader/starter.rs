//! Built-in starter card set
//!
//! A small neutral-heavy set that exercises every keyword and most effect
//! kinds. Used by the CLI when no card directory is given, and by tests.

use crate::core::{
    Amount, CardTemplate, CmpOp, Condition, Counter, EffectDefinition, EffectKind, Flag, HandSelector, HeroClass,
    Keyword, Rarity, StatDuration, TargetSpec, TemplateId, TileSet, Trigger,
};
use crate::loader::{CardDatabase, DeckList};
use crate::zones::{TileEffectKind, TileTiming};

pub const GOBLIN: TemplateId = TemplateId::new(1);
pub const FIGHTER: TemplateId = TemplateId::new(2);
pub const WARDEN: TemplateId = TemplateId::new(3);
pub const WOLF: TemplateId = TemplateId::new(4);
pub const STORM_RIDER: TemplateId = TemplateId::new(5);
pub const SHIELD_BEARER: TemplateId = TemplateId::new(6);
pub const VAMPIRE: TemplateId = TemplateId::new(7);
pub const RECRUIT: TemplateId = TemplateId::new(8);
pub const FIRE_BOLT: TemplateId = TemplateId::new(9);
pub const BLOOD_PACT: TemplateId = TemplateId::new(10);
pub const SCHOLAR: TemplateId = TemplateId::new(11);
pub const BOMBER: TemplateId = TemplateId::new(12);
pub const INSIGHT: TemplateId = TemplateId::new(13);
pub const WAR_BANNER: TemplateId = TemplateId::new(14);
pub const ALTAR: TemplateId = TemplateId::new(15);
pub const MIRE: TemplateId = TemplateId::new(16);
pub const SANCTUARY: TemplateId = TemplateId::new(17);
pub const EXECUTIONER: TemplateId = TemplateId::new(18);
pub const DRYAD: TemplateId = TemplateId::new(19);
pub const MANA_CRYSTAL: TemplateId = TemplateId::new(20);
pub const SENTINEL: TemplateId = TemplateId::new(21);
pub const AVENGER: TemplateId = TemplateId::new(22);

fn def(trigger: Trigger, target: TargetSpec, kind: EffectKind) -> EffectDefinition {
    EffectDefinition {
        trigger,
        target,
        kind,
        condition: Condition::Always,
        best_effort: false,
    }
}

fn buff(attack: i32, health: i32) -> EffectKind {
    EffectKind::Buff {
        attack: Amount::Fixed(attack),
        health: Amount::Fixed(health),
        duration: StatDuration::Permanent,
    }
}

fn draw(n: i32) -> EffectKind {
    EffectKind::Draw(Amount::Fixed(n))
}

/// Every template of the starter set, ordered by id
pub fn starter_templates() -> Vec<CardTemplate> {
    vec![
        CardTemplate::minion(GOBLIN, "Goblin", 1, 1, 2),
        CardTemplate::minion(FIGHTER, "Fighter", 2, 2, 2),
        CardTemplate::minion(WARDEN, "Warden", 2, 1, 3).with_keyword(Keyword::Ward),
        CardTemplate::minion(WOLF, "Dire Wolf", 2, 2, 1).with_keyword(Keyword::Rush),
        CardTemplate::minion(STORM_RIDER, "Storm Rider", 4, 3, 2)
            .with_keyword(Keyword::Storm)
            .with_rarity(Rarity::Silver),
        CardTemplate::minion(SHIELD_BEARER, "Shield Bearer", 3, 2, 3).with_keyword(Keyword::Barrier),
        CardTemplate::minion(VAMPIRE, "Vampire", 3, 2, 3).with_keyword(Keyword::Drain),
        // +1/+0 when another ally is already on the board
        CardTemplate::minion(RECRUIT, "Eager Recruit", 1, 1, 1)
            .with_effect(def(Trigger::OnPlay, TargetSpec::SelfUnit, buff(1, 0)).when(Condition::at_least(Counter::OtherAllies, 1))),
        CardTemplate::spell(FIRE_BOLT, "Fire Bolt", 2).with_effect(def(
            Trigger::OnPlay,
            TargetSpec::ChosenEnemyOrFace,
            EffectKind::Damage(Amount::Fixed(3)),
        )),
        CardTemplate::spell(BLOOD_PACT, "Blood Pact", 1)
            .with_effect(def(Trigger::OnPlay, TargetSpec::Owner, EffectKind::Damage(Amount::Fixed(1))))
            .with_effect(def(Trigger::OnPlay, TargetSpec::Owner, draw(1)))
            .with_effect(
                def(Trigger::OnPlay, TargetSpec::Owner, draw(1))
                    .when(Condition::at_least(Counter::CumulativeSelfDamage, 15)),
            ),
        CardTemplate::minion(SCHOLAR, "Scholar", 2, 1, 2)
            .with_effect(def(Trigger::OnPlay, TargetSpec::Owner, draw(1)))
            .with_effect(def(Trigger::OnDraw, TargetSpec::SelfUnit, buff(1, 0))),
        CardTemplate::minion(BOMBER, "Bomber", 2, 2, 1).with_effect(def(
            Trigger::OnDestroy,
            TargetSpec::RandomEnemy { count: 1 },
            EffectKind::Damage(Amount::Fixed(2)),
        )),
        CardTemplate::spell(INSIGHT, "Insight", 1)
            .with_effect(def(Trigger::OnPlay, TargetSpec::Owner, draw(1)))
            .with_enhance(
                4,
                vec![
                    def(Trigger::OnPlay, TargetSpec::Owner, draw(2)),
                    def(Trigger::OnPlay, TargetSpec::Owner, EffectKind::GainEvolutionPoint(1)),
                ],
            ),
        CardTemplate::amulet(WAR_BANNER, "War Banner", 2)
            .with_countdown(3)
            .with_effect(def(Trigger::OwnerTurnEnd, TargetSpec::RandomAlly { count: 1 }, buff(1, 1)))
            .with_effect(def(Trigger::OnDestroy, TargetSpec::Owner, draw(1))),
        CardTemplate::amulet(ALTAR, "Summoning Altar", 1)
            .with_activation(2)
            .with_effect(def(
                Trigger::OnActivate,
                TargetSpec::Owner,
                EffectKind::Summon {
                    template: GOBLIN,
                    count: 1,
                },
            )),
        CardTemplate::spell(MIRE, "Poison Mire", 2).with_effect(def(
            Trigger::OnPlay,
            TargetSpec::Tiles(TileSet::EnemyAll),
            EffectKind::ApplyTileEffect {
                kind: TileEffectKind::DamageOccupant,
                magnitude: 1,
                duration: 2,
                timing: TileTiming::OwnerTurnStart,
            },
        )),
        CardTemplate::spell(SANCTUARY, "Sanctuary", 1).with_effect(def(
            Trigger::OnPlay,
            TargetSpec::Tiles(TileSet::OwnEmpty),
            EffectKind::ApplyTileEffect {
                kind: TileEffectKind::Fortify,
                magnitude: 1,
                duration: 3,
                timing: TileTiming::OnEnter,
            },
        )),
        CardTemplate::minion(EXECUTIONER, "Executioner", 5, 4, 4)
            .with_rarity(Rarity::Gold)
            .with_effect(def(Trigger::OnPlay, TargetSpec::ChosenEnemy, EffectKind::Destroy)),
        CardTemplate::minion(DRYAD, "Dryad", 2, 1, 3)
            .with_class(HeroClass::Forest)
            .with_effect(def(Trigger::OnPlay, TargetSpec::Owner, EffectKind::Heal(Amount::Fixed(2)))),
        CardTemplate::spell(MANA_CRYSTAL, "Mana Crystal", 2)
            .with_class(HeroClass::Dragon)
            .with_effect(def(Trigger::OnPlay, TargetSpec::Owner, EffectKind::GainMaxMana(1))),
        CardTemplate::minion(SENTINEL, "Sentinel", 4, 3, 5).with_keyword(Keyword::Ward),
        CardTemplate::minion(AVENGER, "Avenger", 3, 2, 2)
            .with_tag("Officer")
            .with_effect(
                def(Trigger::AllyDestroy, TargetSpec::SelfUnit, buff(1, 1)).when(Condition::Compare {
                    counter: Counter::OwnerHandSize,
                    op: CmpOp::Le,
                    value: 9,
                }),
            )
            .with_effect(
                def(Trigger::OnEvolve, TargetSpec::HandCard(HandSelector::Random), EffectKind::ModifyCost { delta: -1 })
                    .when(Condition::Flag(Flag::SourceEvolved)),
            ),
    ]
}

pub fn starter_catalog() -> CardDatabase {
    CardDatabase::with_templates(starter_templates())
}

/// The neutral 40-card starter list
pub fn starter_deck_list() -> DeckList {
    [
        (GOBLIN, 3),
        (FIGHTER, 3),
        (WARDEN, 3),
        (WOLF, 3),
        (STORM_RIDER, 2),
        (SHIELD_BEARER, 3),
        (VAMPIRE, 2),
        (RECRUIT, 3),
        (FIRE_BOLT, 3),
        (BLOOD_PACT, 2),
        (SCHOLAR, 2),
        (BOMBER, 3),
        (INSIGHT, 2),
        (WAR_BANNER, 1),
        (ALTAR, 1),
        (MIRE, 1),
        (SANCTUARY, 1),
        (EXECUTIONER, 1),
        (AVENGER, 1),
    ]
    .into_iter()
    .fold(DeckList::new("Starter", HeroClass::Neutral), |deck, (id, count)| {
        deck.with(id, count)
    })
}

pub fn starter_deck() -> Vec<TemplateId> {
    starter_deck_list().expand()
}
