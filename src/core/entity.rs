//! Identifier newtypes for templates, live instances and seats

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog identifier of a card template
///
/// Templates are loaded once and never change, so the id is all a deck,
/// graveyard or event needs to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(u32);

impl TemplateId {
    pub const fn new(id: u32) -> Self {
        TemplateId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Identifier of a card instance inside one match
///
/// Assigned when a card enters a hand (or is summoned directly) and kept when
/// the card is played, so a hand card and the unit it becomes share the id.
/// Ids are monotonic per match and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(u32);

impl InstanceId {
    pub const fn new(id: u32) -> Self {
        InstanceId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Seat index of a player: 0 or 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    pub const FIRST: PlayerId = PlayerId(0);
    pub const SECOND: PlayerId = PlayerId(1);

    /// Create a seat id; anything other than 0 maps to seat 1
    pub fn new(seat: u8) -> Self {
        PlayerId(seat.min(1))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn opponent(&self) -> PlayerId {
        PlayerId(1 - self.0)
    }

    pub fn both() -> [PlayerId; 2] {
        [PlayerId::FIRST, PlayerId::SECOND]
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0 + 1)
    }
}

/// Something that can be damaged, healed or targeted: a unit or a leader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Unit(InstanceId),
    Player(PlayerId),
}

impl EntityRef {
    pub fn is_player(&self) -> bool {
        matches!(self, EntityRef::Player(_))
    }

    pub fn unit(&self) -> Option<InstanceId> {
        match self {
            EntityRef::Unit(id) => Some(*id),
            EntityRef::Player(_) => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Unit(id) => write!(f, "{id}"),
            EntityRef::Player(p) => write!(f, "{p} leader"),
        }
    }
}

/// Monotonic instance id allocator owned by a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAllocator {
    next_id: u32,
}

impl InstanceAllocator {
    pub fn new() -> Self {
        InstanceAllocator { next_id: 1 }
    }

    /// Id that the next allocation will return
    pub fn peek(&self) -> InstanceId {
        InstanceId(self.next_id)
    }

    pub fn allocate(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Make sure ids already handed out elsewhere are never reissued
    pub fn observe(&mut self, id: InstanceId) {
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
    }
}

impl Default for InstanceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut alloc = InstanceAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(b > a);
        assert_eq!(alloc.peek().as_u32(), b.as_u32() + 1);
    }

    #[test]
    fn test_observe_skips_seen_ids() {
        let mut alloc = InstanceAllocator::new();
        alloc.observe(InstanceId::new(10));
        assert_eq!(alloc.allocate(), InstanceId::new(11));
        alloc.observe(InstanceId::new(3));
        assert_eq!(alloc.allocate(), InstanceId::new(12));
    }

    #[test]
    fn test_player_opponent() {
        assert_eq!(PlayerId::FIRST.opponent(), PlayerId::SECOND);
        assert_eq!(PlayerId::SECOND.opponent(), PlayerId::FIRST);
        assert_eq!(PlayerId::new(7), PlayerId::SECOND);
    }
}
