//! Card catalog lookup
//!
//! The simulation only needs template-by-id lookup, expressed by the
//! [`CardCatalog`] trait. [`CardDatabase`] is the in-memory implementation,
//! filled from JSON card files or built in code.

use crate::core::{CardTemplate, TemplateId};
use crate::{DuelError, Result};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Template lookup by id
pub trait CardCatalog: Send + Sync {
    fn template(&self, id: TemplateId) -> Option<&CardTemplate>;

    fn get(&self, id: TemplateId) -> Result<&CardTemplate> {
        self.template(id).ok_or(DuelError::TemplateNotFound(id))
    }
}

/// Database of card templates keyed by id
#[derive(Debug, Clone, Default)]
pub struct CardDatabase {
    cards: FxHashMap<TemplateId, CardTemplate>,
}

impl CardDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template after checking its definitions
    pub fn insert(&mut self, template: CardTemplate) -> Result<()> {
        template.validate()?;
        self.cards.insert(template.id, template);
        Ok(())
    }

    /// Build from templates constructed in code, skipping validation
    pub fn with_templates(templates: impl IntoIterator<Item = CardTemplate>) -> Self {
        CardDatabase {
            cards: templates.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    /// Check every template; used on catalogs built with [`Self::with_templates`]
    pub fn validate_all(&self) -> Result<()> {
        for id in self.ids() {
            self.get(id)?.validate()?;
        }
        Ok(())
    }

    /// Parse a JSON array of templates
    pub fn from_json_str(json: &str) -> Result<Self> {
        let templates: Vec<CardTemplate> = serde_json::from_str(json)?;
        let mut db = CardDatabase::new();
        for template in templates {
            db.insert(template)?;
        }
        Ok(db)
    }

    /// Load every `.json` file under `dir`, recursively
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            return Err(DuelError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("card directory not found: {dir:?}"),
            )));
        }
        let mut db = CardDatabase::new();
        db.load_directory(dir)?;
        Ok(db)
    }

    fn load_directory(&mut self, dir: &Path) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.path());
        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                self.load_directory(&path)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("json") {
                let json = std::fs::read_to_string(&path)?;
                let templates: Vec<CardTemplate> = serde_json::from_str(&json)?;
                for template in templates {
                    self.insert(template)?;
                }
            }
        }
        Ok(())
    }

    /// Serialize every template, ordered by id
    pub fn to_json_string(&self) -> Result<String> {
        let mut templates: Vec<&CardTemplate> = self.cards.values().collect();
        templates.sort_by_key(|t| t.id);
        Ok(serde_json::to_string_pretty(&templates)?)
    }

    pub fn contains(&self, id: TemplateId) -> bool {
        self.cards.contains_key(&id)
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<TemplateId> {
        let mut ids: Vec<TemplateId> = self.cards.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl CardCatalog for CardDatabase {
    fn template(&self, id: TemplateId) -> Option<&CardTemplate> {
        self.cards.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::starter_catalog;

    #[test]
    fn test_empty_database() {
        let db = CardDatabase::new();
        assert!(db.is_empty());
        assert!(matches!(
            db.get(TemplateId::new(1)),
            Err(DuelError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_template() {
        let mut db = CardDatabase::new();
        let broken = CardTemplate::minion(TemplateId::new(1), "Ghost", 1, 1, 0);
        assert!(matches!(db.insert(broken), Err(DuelError::InvalidCardDefinition(_))));
    }

    #[test]
    fn test_json_round_trip_of_starter_set() {
        let db = starter_catalog();
        let json = db.to_json_string().unwrap();
        let back = CardDatabase::from_json_str(&json).unwrap();
        assert_eq!(back.ids(), db.ids());
        for id in db.ids() {
            assert_eq!(back.template(id), db.template(id));
        }
    }
}
