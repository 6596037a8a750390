//! Card zones: hand, board tiles, deck and graveyard

use crate::core::{HandCard, InstanceId, RuntimeUnit, TemplateId};
use serde::{Deserialize, Serialize};

/// What a tile effect does to the tile's occupant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileEffectKind {
    DamageOccupant,
    HealOccupant,
    /// Permanent attack bonus for the occupant
    BuffOccupantAttack,
    /// Permanent max-health bonus for the occupant
    Fortify,
    /// Grants Barrier to the occupant
    Barrier,
}

/// When a tile effect acts on its occupant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileTiming {
    OwnerTurnStart,
    OwnerTurnEnd,
    /// When a unit is placed on the tile
    OnEnter,
}

/// A persistent modifier bound to a tile rather than a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEffect {
    pub source: TemplateId,
    pub kind: TileEffectKind,
    pub magnitude: i32,
    pub remaining_turns: u8,
    pub timing: TileTiming,
}

impl TileEffect {
    pub fn is_expired(&self) -> bool {
        self.remaining_turns == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub unit: Option<RuntimeUnit>,
    pub effects: Vec<TileEffect>,
}

impl Tile {
    pub fn is_empty(&self) -> bool {
        self.unit.is_none()
    }
}

/// A player's row of tiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    tiles: Vec<Tile>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Board {
            tiles: vec![Tile::default(); size],
        }
    }

    /// Number of tiles
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unit_count() == 0
    }

    pub fn unit_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.unit.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.unit_count() == self.tiles.len()
    }

    pub fn tile(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    pub fn tile_mut(&mut self, index: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(index)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// Occupants in tile order
    pub fn units(&self) -> impl Iterator<Item = &RuntimeUnit> {
        self.tiles.iter().filter_map(|t| t.unit.as_ref())
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut RuntimeUnit> {
        self.tiles.iter_mut().filter_map(|t| t.unit.as_mut())
    }

    pub fn first_empty(&self) -> Option<usize> {
        self.tiles.iter().position(Tile::is_empty)
    }

    pub fn empty_tiles(&self) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Tile index holding `id`
    pub fn position(&self, id: InstanceId) -> Option<usize> {
        self.tiles
            .iter()
            .position(|t| t.unit.as_ref().is_some_and(|u| u.id == id))
    }

    pub fn unit(&self, id: InstanceId) -> Option<&RuntimeUnit> {
        self.units().find(|u| u.id == id)
    }

    pub fn unit_mut(&mut self, id: InstanceId) -> Option<&mut RuntimeUnit> {
        self.units_mut().find(|u| u.id == id)
    }

    /// Place a unit, returning it back if the tile is missing or occupied
    pub fn place(&mut self, index: usize, unit: RuntimeUnit) -> std::result::Result<(), RuntimeUnit> {
        match self.tiles.get_mut(index) {
            Some(tile) if tile.unit.is_none() => {
                tile.unit = Some(unit);
                Ok(())
            }
            _ => Err(unit),
        }
    }

    pub fn remove(&mut self, id: InstanceId) -> Option<RuntimeUnit> {
        let index = self.position(id)?;
        self.tiles[index].unit.take()
    }
}

/// Cards in hand, in the order they were received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    cards: Vec<HandCard>,
}

impl Hand {
    pub fn new() -> Self {
        Hand { cards: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HandCard> {
        self.cards.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandCard> {
        self.cards.iter()
    }

    pub fn position(&self, id: InstanceId) -> Option<usize> {
        self.cards.iter().position(|c| c.id == id)
    }

    pub fn card_mut(&mut self, id: InstanceId) -> Option<&mut HandCard> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    pub fn push(&mut self, card: HandCard) {
        self.cards.push(card);
    }

    pub fn remove(&mut self, id: InstanceId) -> Option<HandCard> {
        let index = self.position(id)?;
        Some(self.cards.remove(index))
    }

    pub fn take_all(&mut self) -> Vec<HandCard> {
        std::mem::take(&mut self.cards)
    }
}

/// Draw pile; the top of the deck is the end of the list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<TemplateId>,
}

impl Deck {
    pub fn from_cards(cards: Vec<TemplateId>) -> Self {
        Deck { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[TemplateId] {
        &self.cards
    }

    pub fn draw_top(&mut self) -> Option<TemplateId> {
        self.cards.pop()
    }

    pub fn peek_top(&self) -> Option<TemplateId> {
        self.cards.last().copied()
    }

    pub fn add_to_bottom(&mut self, card: TemplateId) {
        self.cards.insert(0, card);
    }

    /// Replace the deck contents with an already-shuffled order
    pub fn set_order(&mut self, order: Vec<TemplateId>) {
        self.cards = order;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graveyard {
    cards: Vec<TemplateId>,
}

impl Graveyard {
    pub fn new() -> Self {
        Graveyard { cards: Vec::new() }
    }

    pub fn add(&mut self, card: TemplateId) {
        self.cards.push(card);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[TemplateId] {
        &self.cards
    }

    pub fn count(&self, template: TemplateId) -> usize {
        self.cards.iter().filter(|t| **t == template).count()
    }
}
