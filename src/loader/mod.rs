//! Card catalog, deck lists and the built-in starter set

pub mod database;
pub mod deck;
pub mod starter;

pub use database::{CardCatalog, CardDatabase};
pub use deck::{
    deck_issues, validate_deck, Collection, DeckEntry, DeckIssue, DeckList, DeckRules, DeckStore,
    MemoryDeckStore,
};
pub use starter::{starter_catalog, starter_deck, starter_deck_list, starter_templates};
