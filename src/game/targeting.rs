//! Target specifier resolution
//!
//! Pure functions over a [`MatchState`]: they list the entities a specifier
//! can reach. Random picks are left to the resolver, which owns the
//! generator and records every draw.

use crate::core::{
    EffectKind, EntityRef, HandSelector, InstanceId, PlayerId, RuntimeUnit, TargetSpec, TileSet,
};
use crate::game::MatchState;

/// A concrete target produced by resolving a specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    Entity(EntityRef),
    Tile { player: PlayerId, index: usize },
    HandCard { player: PlayerId, card: InstanceId },
}

impl ResolvedTarget {
    pub fn entity(&self) -> Option<EntityRef> {
        match self {
            ResolvedTarget::Entity(e) => Some(*e),
            _ => None,
        }
    }

    pub fn unit(&self) -> Option<InstanceId> {
        self.entity().and_then(|e| e.unit())
    }

    pub fn player(&self) -> Option<PlayerId> {
        match self {
            ResolvedTarget::Entity(EntityRef::Player(p)) => Some(*p),
            _ => None,
        }
    }
}

/// Outcome of looking a specifier up against the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// These exact targets, in order
    Fixed(Vec<ResolvedTarget>),
    /// Pick `count` distinct entries from `pool` at random
    Random { pool: Vec<ResolvedTarget>, count: usize },
}

/// Inputs a specifier is resolved against
#[derive(Debug, Clone, Copy)]
pub struct TargetScope {
    pub owner: PlayerId,
    /// The source instance (a played spell's id never appears on the board)
    pub source: Option<InstanceId>,
    pub triggering: Option<InstanceId>,
    pub choice: Option<EntityRef>,
    pub tile: Option<usize>,
}

/// Whether a unit can be touched by an effect of this kind
///
/// Countdown effects reach amulets; everything else reaches minions.
pub fn eligible(unit: &RuntimeUnit, kind: &EffectKind) -> bool {
    match kind {
        EffectKind::ReduceCountdown(_) => unit.is_amulet() && unit.countdown.is_some(),
        _ => unit.is_minion(),
    }
}

fn units_of<'a>(
    state: &'a MatchState,
    player: PlayerId,
    kind: &'a EffectKind,
    exclude: Option<InstanceId>,
) -> impl Iterator<Item = EntityRef> + 'a {
    state
        .player(player)
        .board
        .units()
        .filter(move |u| eligible(u, kind) && Some(u.id) != exclude)
        .map(|u| EntityRef::Unit(u.id))
}

/// Legal picks for a player-choice specifier
pub fn legal_choices(
    state: &MatchState,
    spec: TargetSpec,
    kind: &EffectKind,
    owner: PlayerId,
    source: Option<InstanceId>,
) -> Vec<EntityRef> {
    let enemy = owner.opponent();
    match spec {
        TargetSpec::ChosenEnemy => units_of(state, enemy, kind, None).collect(),
        TargetSpec::ChosenEnemyOrFace => {
            let mut choices: Vec<EntityRef> = units_of(state, enemy, kind, None).collect();
            choices.push(EntityRef::Player(enemy));
            choices
        }
        TargetSpec::ChosenAlly => units_of(state, owner, kind, source).collect(),
        TargetSpec::ChosenAny => units_of(state, owner, kind, source)
            .chain(units_of(state, enemy, kind, source))
            .collect(),
        _ => Vec::new(),
    }
}

fn hand_count(kind: &EffectKind) -> usize {
    match kind {
        EffectKind::Discard { count } => *count as usize,
        _ => 1,
    }
}

/// Resolve a specifier into candidates
pub fn candidates(state: &MatchState, spec: TargetSpec, kind: &EffectKind, scope: &TargetScope) -> Candidates {
    let owner = scope.owner;
    let enemy = owner.opponent();
    let live = |id: Option<InstanceId>| id.filter(|id| state.unit(*id).is_some());
    let entities = |refs: Vec<EntityRef>| Candidates::Fixed(refs.into_iter().map(ResolvedTarget::Entity).collect());

    match spec {
        TargetSpec::SelfUnit => entities(
            scope
                .source
                .filter(|id| state.unit(*id).is_some())
                .map(EntityRef::Unit)
                .into_iter()
                .collect(),
        ),
        TargetSpec::Owner => entities(vec![EntityRef::Player(owner)]),
        TargetSpec::Opponent => entities(vec![EntityRef::Player(enemy)]),
        TargetSpec::BothPlayers => entities(vec![EntityRef::Player(owner), EntityRef::Player(enemy)]),
        TargetSpec::ChosenEnemy
        | TargetSpec::ChosenEnemyOrFace
        | TargetSpec::ChosenAlly
        | TargetSpec::ChosenAny => {
            let legal = legal_choices(state, spec, kind, owner, scope.source);
            match scope.choice {
                Some(choice) if legal.contains(&choice) => entities(vec![choice]),
                Some(_) => Candidates::Fixed(Vec::new()),
                None => Candidates::Random {
                    pool: legal.into_iter().map(ResolvedTarget::Entity).collect(),
                    count: 1,
                },
            }
        }
        TargetSpec::RandomEnemy { count } => Candidates::Random {
            pool: units_of(state, enemy, kind, None).map(ResolvedTarget::Entity).collect(),
            count: count as usize,
        },
        TargetSpec::RandomAlly { count } => Candidates::Random {
            pool: units_of(state, owner, kind, scope.source)
                .map(ResolvedTarget::Entity)
                .collect(),
            count: count as usize,
        },
        TargetSpec::AllEnemies => entities(units_of(state, enemy, kind, None).collect()),
        TargetSpec::AllAllies => entities(units_of(state, owner, kind, None).collect()),
        TargetSpec::OtherAllies => entities(units_of(state, owner, kind, scope.source).collect()),
        TargetSpec::AllUnits => entities(
            units_of(state, owner, kind, None)
                .chain(units_of(state, enemy, kind, None))
                .collect(),
        ),
        TargetSpec::TriggeringUnit => entities(live(scope.triggering).map(EntityRef::Unit).into_iter().collect()),
        TargetSpec::Tiles(set) => Candidates::Fixed(tiles(state, set, scope)),
        TargetSpec::HandCard(selector) => {
            let cards: Vec<ResolvedTarget> = state
                .player(owner)
                .hand
                .iter()
                .map(|c| ResolvedTarget::HandCard {
                    player: owner,
                    card: c.id,
                })
                .collect();
            let n = hand_count(kind);
            match selector {
                HandSelector::All => Candidates::Fixed(cards),
                HandSelector::Leftmost => Candidates::Fixed(cards.into_iter().take(n).collect()),
                HandSelector::Rightmost => {
                    let skip = cards.len().saturating_sub(n);
                    Candidates::Fixed(cards.into_iter().skip(skip).collect())
                }
                HandSelector::Random => Candidates::Random { pool: cards, count: n },
            }
        }
    }
}

fn tiles(state: &MatchState, set: TileSet, scope: &TargetScope) -> Vec<ResolvedTarget> {
    let owner = scope.owner;
    let board = &state.player(owner).board;
    let tile = |player: PlayerId, index: usize| ResolvedTarget::Tile { player, index };
    match set {
        TileSet::Chosen => scope
            .tile
            .filter(|i| *i < board.len())
            .map(|i| tile(owner, i))
            .into_iter()
            .collect(),
        TileSet::SourceTile => scope
            .source
            .and_then(|id| board.position(id))
            .map(|i| tile(owner, i))
            .into_iter()
            .collect(),
        TileSet::OwnAll => (0..board.len()).map(|i| tile(owner, i)).collect(),
        TileSet::OwnEmpty => board.empty_tiles().into_iter().map(|i| tile(owner, i)).collect(),
        TileSet::EnemyAll => {
            let enemy = owner.opponent();
            (0..state.player(enemy).board.len()).map(|i| tile(enemy, i)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, CardTemplate, Keyword, TemplateId};
    use crate::game::{GameEvent, MatchConfig};

    fn board_state() -> MatchState {
        let mut state = MatchState::new(MatchConfig::default(), 1, PlayerId::FIRST, [Vec::new(), Vec::new()]);
        let goblin = CardTemplate::minion(TemplateId::new(1), "Goblin", 1, 1, 2);
        let totem = CardTemplate::amulet(TemplateId::new(2), "Totem", 1).with_countdown(3);
        let place = |state: &mut MatchState, id: u32, owner: PlayerId, tile: usize, template: &CardTemplate| {
            let unit = RuntimeUnit::from_template(InstanceId::new(id), owner, template, false);
            state
                .apply_event(&GameEvent::Summoned {
                    player: owner,
                    tile,
                    unit,
                })
                .unwrap();
        };
        place(&mut state, 1, PlayerId::FIRST, 0, &goblin);
        place(&mut state, 2, PlayerId::FIRST, 1, &goblin);
        place(&mut state, 3, PlayerId::SECOND, 0, &goblin.clone().with_keyword(Keyword::Ward));
        place(&mut state, 4, PlayerId::SECOND, 3, &totem);
        state
    }

    fn scope(source: Option<u32>) -> TargetScope {
        TargetScope {
            owner: PlayerId::FIRST,
            source: source.map(InstanceId::new),
            triggering: None,
            choice: None,
            tile: None,
        }
    }

    #[test]
    fn test_chosen_enemy_or_face_includes_leader() {
        let state = board_state();
        let damage = EffectKind::Damage(Amount::Fixed(1));
        let legal = legal_choices(&state, TargetSpec::ChosenEnemyOrFace, &damage, PlayerId::FIRST, None);
        assert_eq!(
            legal,
            vec![EntityRef::Unit(InstanceId::new(3)), EntityRef::Player(PlayerId::SECOND)]
        );
    }

    #[test]
    fn test_other_allies_excludes_source() {
        let state = board_state();
        let kind = EffectKind::Destroy;
        let result = candidates(&state, TargetSpec::OtherAllies, &kind, &scope(Some(1)));
        assert_eq!(
            result,
            Candidates::Fixed(vec![ResolvedTarget::Entity(EntityRef::Unit(InstanceId::new(2)))])
        );
    }

    #[test]
    fn test_countdown_reaches_amulets_only() {
        let state = board_state();
        let kind = EffectKind::ReduceCountdown(1);
        let result = candidates(&state, TargetSpec::AllEnemies, &kind, &scope(None));
        assert_eq!(
            result,
            Candidates::Fixed(vec![ResolvedTarget::Entity(EntityRef::Unit(InstanceId::new(4)))])
        );
    }

    #[test]
    fn test_stale_choice_fizzles() {
        let state = board_state();
        let kind = EffectKind::Destroy;
        let mut s = scope(None);
        s.choice = Some(EntityRef::Unit(InstanceId::new(99)));
        assert_eq!(
            candidates(&state, TargetSpec::ChosenEnemy, &kind, &s),
            Candidates::Fixed(Vec::new())
        );
    }

    #[test]
    fn test_missing_choice_becomes_random_pick() {
        let state = board_state();
        let kind = EffectKind::Destroy;
        match candidates(&state, TargetSpec::ChosenAny, &kind, &scope(Some(1))) {
            Candidates::Random { pool, count } => {
                assert_eq!(count, 1);
                assert_eq!(pool.len(), 2);
            }
            other => panic!("expected random pick, got {other:?}"),
        }
    }

    #[test]
    fn test_own_empty_tiles() {
        let state = board_state();
        let kind = EffectKind::ClearTileEffects;
        match candidates(&state, TargetSpec::Tiles(TileSet::OwnEmpty), &kind, &scope(None)) {
            Candidates::Fixed(tiles) => assert_eq!(tiles.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
    }
}
