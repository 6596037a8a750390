//! Deck lists, deck legality and deck storage
//!
//! Deck text format, one entry per line:
//!
//! ```text
//! [Forest]
//! # comment
//! 3 12
//! 2 40
//! ```
//!
//! A bracketed line names the deck class; other lines are `count template-id`.

use crate::core::{HeroClass, TemplateId};
use crate::loader::CardCatalog;
use crate::{DuelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckEntry {
    pub template: TemplateId,
    pub count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckList {
    pub name: String,
    pub class: HeroClass,
    pub entries: Vec<DeckEntry>,
}

impl DeckList {
    pub fn new(name: &str, class: HeroClass) -> Self {
        DeckList {
            name: name.to_string(),
            class,
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, template: TemplateId, count: u8) -> Self {
        self.entries.push(DeckEntry { template, count });
        self
    }

    /// Parse the text format
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let mut deck = DeckList::new(name, HeroClass::Neutral);
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(class) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                deck.class = HeroClass::from_name(class)
                    .ok_or_else(|| DuelError::InvalidCardDefinition(format!("unknown class {class:?}")))?;
                continue;
            }
            let bad_line = || DuelError::InvalidCardDefinition(format!("deck line {}: {line:?}", number + 1));
            let (count, id) = line.split_once(char::is_whitespace).ok_or_else(bad_line)?;
            let count: u8 = count.parse().map_err(|_| bad_line())?;
            let id: u32 = id.trim().parse().map_err(|_| bad_line())?;
            deck.entries.push(DeckEntry {
                template: TemplateId::new(id),
                count,
            });
        }
        Ok(deck)
    }

    pub fn total_cards(&self) -> usize {
        self.entries.iter().map(|e| e.count as usize).sum()
    }

    /// Copies per template, merged across duplicate entries
    pub fn counts(&self) -> BTreeMap<TemplateId, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.template).or_insert(0) += entry.count as usize;
        }
        counts
    }

    /// The deck as a flat card list, in entry order
    pub fn expand(&self) -> Vec<TemplateId> {
        self.entries
            .iter()
            .flat_map(|e| std::iter::repeat(e.template).take(e.count as usize))
            .collect()
    }
}

/// Construction limits for a legal deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckRules {
    pub deck_size: usize,
    pub max_copies: usize,
}

impl Default for DeckRules {
    fn default() -> Self {
        DeckRules {
            deck_size: 40,
            max_copies: 3,
        }
    }
}

/// One reason a deck is not legal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue")]
pub enum DeckIssue {
    WrongSize { expected: usize, actual: usize },
    TooManyCopies { template: TemplateId, count: usize, max: usize },
    UnknownCard { template: TemplateId },
    WrongClass { template: TemplateId },
}

/// Every legality problem of `deck`; empty when the deck is legal
pub fn deck_issues(deck: &DeckList, catalog: &dyn CardCatalog, rules: &DeckRules) -> Vec<DeckIssue> {
    let mut issues = Vec::new();
    let total = deck.total_cards();
    if total != rules.deck_size {
        issues.push(DeckIssue::WrongSize {
            expected: rules.deck_size,
            actual: total,
        });
    }
    for (template, count) in deck.counts() {
        if count > rules.max_copies {
            issues.push(DeckIssue::TooManyCopies {
                template,
                count,
                max: rules.max_copies,
            });
        }
        match catalog.template(template) {
            None => issues.push(DeckIssue::UnknownCard { template }),
            Some(card) if !card.class.playable_by(deck.class) => issues.push(DeckIssue::WrongClass { template }),
            Some(_) => {}
        }
    }
    issues
}

/// Check a deck, returning its card list when legal
pub fn validate_deck(deck: &DeckList, catalog: &dyn CardCatalog, rules: &DeckRules) -> Result<Vec<TemplateId>> {
    let issues = deck_issues(deck, catalog, rules);
    if issues.is_empty() {
        Ok(deck.expand())
    } else {
        Err(DuelError::InvalidDeck(issues))
    }
}

/// Owned copies per template
pub type Collection = BTreeMap<TemplateId, u32>;

/// Deck and collection persistence
///
/// The engine only talks to this interface; on-disk formats belong to the
/// embedding application.
pub trait DeckStore: Send + Sync {
    fn load_deck(&self, name: &str) -> Result<Option<DeckList>>;
    fn save_deck(&self, deck: &DeckList) -> Result<()>;
    fn delete_deck(&self, name: &str) -> Result<bool>;
    fn deck_names(&self) -> Result<Vec<String>>;
    fn load_collection(&self) -> Result<Collection>;
    fn save_collection(&self, collection: &Collection) -> Result<()>;
}

/// Store kept in memory, for tests and headless hosts
#[derive(Debug, Default)]
pub struct MemoryDeckStore {
    decks: Mutex<BTreeMap<String, DeckList>>,
    collection: Mutex<Collection>,
}

impl MemoryDeckStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> DuelError {
    DuelError::Invariant("deck store lock poisoned".to_string())
}

impl DeckStore for MemoryDeckStore {
    fn load_deck(&self, name: &str) -> Result<Option<DeckList>> {
        Ok(self.decks.lock().map_err(poisoned)?.get(name).cloned())
    }

    fn save_deck(&self, deck: &DeckList) -> Result<()> {
        self.decks.lock().map_err(poisoned)?.insert(deck.name.clone(), deck.clone());
        Ok(())
    }

    fn delete_deck(&self, name: &str) -> Result<bool> {
        Ok(self.decks.lock().map_err(poisoned)?.remove(name).is_some())
    }

    fn deck_names(&self) -> Result<Vec<String>> {
        Ok(self.decks.lock().map_err(poisoned)?.keys().cloned().collect())
    }

    fn load_collection(&self) -> Result<Collection> {
        Ok(self.collection.lock().map_err(poisoned)?.clone())
    }

    fn save_collection(&self, collection: &Collection) -> Result<()> {
        *self.collection.lock().map_err(poisoned)? = collection.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{starter_catalog, starter_deck_list};

    #[test]
    fn test_parse_deck_text() {
        let deck = DeckList::parse("aggro", "[Sword]\n# opening\n3 1\n2 7\n\n").unwrap();
        assert_eq!(deck.class, HeroClass::Sword);
        assert_eq!(deck.total_cards(), 5);
        assert_eq!(deck.expand()[3], TemplateId::new(7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(DeckList::parse("x", "three 1").is_err());
        assert!(DeckList::parse("x", "[Wizard]").is_err());
    }

    #[test]
    fn test_starter_deck_is_legal() {
        let catalog = starter_catalog();
        let deck = starter_deck_list();
        assert_eq!(deck_issues(&deck, &catalog, &DeckRules::default()), Vec::new());
        assert_eq!(validate_deck(&deck, &catalog, &DeckRules::default()).unwrap().len(), 40);
    }

    #[test]
    fn test_issues_are_collected() {
        let catalog = starter_catalog();
        let deck = DeckList::new("bad", HeroClass::Neutral)
            .with(TemplateId::new(1), 4)
            .with(TemplateId::new(999), 1);
        let issues = deck_issues(&deck, &catalog, &DeckRules::default());
        assert!(issues.contains(&DeckIssue::WrongSize { expected: 40, actual: 5 }));
        assert!(issues.contains(&DeckIssue::TooManyCopies {
            template: TemplateId::new(1),
            count: 4,
            max: 3
        }));
        assert!(issues.contains(&DeckIssue::UnknownCard {
            template: TemplateId::new(999)
        }));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryDeckStore::new();
        store.save_deck(&starter_deck_list()).unwrap();
        let name = starter_deck_list().name;
        assert_eq!(store.deck_names().unwrap(), vec![name.clone()]);
        assert!(store.load_deck(&name).unwrap().is_some());
        assert!(store.delete_deck(&name).unwrap());
        assert!(store.load_deck(&name).unwrap().is_none());

        let mut collection = Collection::new();
        collection.insert(TemplateId::new(1), 3);
        store.save_collection(&collection).unwrap();
        assert_eq!(store.load_collection().unwrap(), collection);
    }
}
