//! Strongly-typed wrappers for card catalog concepts
//!
//! Newtypes keep names and tags from being mixed up with each other or with
//! free-form strings elsewhere in the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Card name (display only; the engine keys everything by template id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardName(String);

impl CardName {
    pub fn new(s: impl Into<String>) -> Self {
        CardName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CardName {
    fn from(s: &str) -> Self {
        CardName(s.to_string())
    }
}

impl From<String> for CardName {
    fn from(s: String) -> Self {
        CardName(s)
    }
}

/// Card tag (tribe or archetype label, e.g. "Officer", "Machina")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    pub fn new(s: impl Into<String>) -> Self {
        Tag(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag(s.to_string())
    }
}

/// Owning hero class of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HeroClass {
    #[default]
    Neutral,
    Forest,
    Sword,
    Rune,
    Dragon,
    Abyss,
    Haven,
    Portal,
}

impl HeroClass {
    /// Whether a card of this class may go into a deck of `deck_class`
    pub fn playable_by(&self, deck_class: HeroClass) -> bool {
        *self == HeroClass::Neutral || *self == deck_class
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Self> {
        let class = match name.trim().to_ascii_lowercase().as_str() {
            "neutral" => HeroClass::Neutral,
            "forest" => HeroClass::Forest,
            "sword" => HeroClass::Sword,
            "rune" => HeroClass::Rune,
            "dragon" => HeroClass::Dragon,
            "abyss" => HeroClass::Abyss,
            "haven" => HeroClass::Haven,
            "portal" => HeroClass::Portal,
            _ => return None,
        };
        Some(class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Rarity {
    #[default]
    Bronze,
    Silver,
    Gold,
    Legendary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_playable_by_all() {
        assert!(HeroClass::Neutral.playable_by(HeroClass::Abyss));
        assert!(HeroClass::Abyss.playable_by(HeroClass::Abyss));
        assert!(!HeroClass::Forest.playable_by(HeroClass::Abyss));
    }

    #[test]
    fn test_names_display() {
        assert_eq!(CardName::from("Goblin").to_string(), "Goblin");
        assert_eq!(Tag::new("Officer").as_str(), "Officer");
    }
}
