//! Core value types: identifiers, card templates, effects and live units

pub mod card;
pub mod condition;
pub mod effects;
pub mod entity;
pub mod player;
pub mod types;
pub mod unit;

pub use card::{CardTemplate, CardType, Enhance};
pub use condition::{CmpOp, Condition, ConditionContext, Counter, Flag};
pub use effects::{
    Amount, EffectDefinition, EffectKind, HandSelector, Keyword, KeywordSet, StatDuration,
    TargetSpec, TileSet, Trigger,
};
pub use entity::{EntityRef, InstanceAllocator, InstanceId, PlayerId, TemplateId};
pub use player::{HandCard, PlayerState};
pub use types::{CardName, HeroClass, Rarity, Tag};
pub use unit::{RuntimeUnit, StatModifier};
