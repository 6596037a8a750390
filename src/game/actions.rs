//! Player actions: validation, enumeration and execution
//!
//! Validation only reads the state and answers with a [`RejectReason`].
//! Execution assumes a validated action and drives the resolver.

use crate::core::{
    CardTemplate, EffectDefinition, EntityRef, HandCard, InstanceId, PlayerId, RuntimeUnit, TargetSpec, TileSet,
    Trigger,
};
use crate::error::RejectReason;
use crate::game::combat::{resolve_attack, validate_attack};
use crate::game::targeting::legal_choices;
use crate::game::turn::{end_turn, mulligan};
use crate::game::{EffectSource, GameEvent, GameOverReason, MatchState, Phase, Resolver, TriggerContext};
use crate::loader::CardCatalog;
use crate::Result;
use serde::{Deserialize, Serialize};

/// An action submitted by a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PlayerAction {
    /// Play the card at `hand_index`; `tile` places units (first free tile
    /// when absent) or names the tile for tile effects
    PlayCard {
        hand_index: usize,
        tile: Option<usize>,
        target: Option<EntityRef>,
    },
    Attack {
        attacker: InstanceId,
        target: EntityRef,
    },
    Evolve {
        unit: InstanceId,
        target: Option<EntityRef>,
    },
    ActivateAmulet {
        amulet: InstanceId,
        target: Option<EntityRef>,
    },
    EndTurn,
    Surrender,
    /// Hand indices to send back during the mulligan
    Mulligan { replace: Vec<usize> },
}

impl PlayerAction {
    pub fn play(hand_index: usize) -> Self {
        PlayerAction::PlayCard {
            hand_index,
            tile: None,
            target: None,
        }
    }

    pub fn play_at(hand_index: usize, target: EntityRef) -> Self {
        PlayerAction::PlayCard {
            hand_index,
            tile: None,
            target: Some(target),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlayerAction::PlayCard { .. } => "play",
            PlayerAction::Attack { .. } => "attack",
            PlayerAction::Evolve { .. } => "evolve",
            PlayerAction::ActivateAmulet { .. } => "activate",
            PlayerAction::EndTurn => "end-turn",
            PlayerAction::Surrender => "surrender",
            PlayerAction::Mulligan { .. } => "mulligan",
        }
    }
}

type Validation = std::result::Result<(), RejectReason>;

/// Mana to pay and whether the enhanced list applies
///
/// Enhance kicks in automatically when the player can afford the enhanced
/// cost and it exceeds the (modified) printed cost.
pub fn play_cost(player_mana: u8, card: &HandCard, template: &CardTemplate) -> (u8, bool) {
    let base = card.cost(template.cost);
    match &template.enhance {
        Some(enhance) if enhance.cost > base && player_mana >= enhance.cost => (enhance.cost, true),
        _ => (base, false),
    }
}

/// Every player-choice specifier in `defs` must be satisfied by `target`
/// whenever it has at least one legal choice
fn check_choices(
    state: &MatchState,
    defs: &[&EffectDefinition],
    player: PlayerId,
    source: Option<InstanceId>,
    target: Option<EntityRef>,
) -> Validation {
    for def in defs.iter().filter(|d| d.target.is_player_choice()) {
        let legal = legal_choices(state, def.target, &def.kind, player, source);
        if legal.is_empty() {
            continue;
        }
        match target {
            None => return Err(RejectReason::MissingTarget),
            Some(t) if !legal.contains(&t) => return Err(RejectReason::InvalidTarget),
            Some(_) => {}
        }
    }
    Ok(())
}

fn needs_chosen_tile(defs: &[&EffectDefinition]) -> bool {
    defs.iter().any(|d| d.target == TargetSpec::Tiles(TileSet::Chosen))
}

fn validate_play(
    state: &MatchState,
    catalog: &dyn CardCatalog,
    player: PlayerId,
    hand_index: usize,
    tile: Option<usize>,
    target: Option<EntityRef>,
) -> Validation {
    let me = state.player(player);
    let card = me.hand.get(hand_index).ok_or(RejectReason::HandIndexOutOfRange)?;
    let template = catalog.template(card.template).ok_or(RejectReason::UnknownInstance)?;
    let (cost, enhanced) = play_cost(me.mana, card, template);
    if me.mana < cost {
        return Err(RejectReason::InsufficientMana);
    }

    if template.occupies_tile() {
        match tile {
            None if me.board.is_full() => return Err(RejectReason::BoardFull),
            None => {}
            Some(i) => match me.board.tile(i) {
                None => return Err(RejectReason::TileOutOfRange),
                Some(t) if !t.is_empty() => {
                    return Err(if me.board.is_full() {
                        RejectReason::BoardFull
                    } else {
                        RejectReason::TileOccupied
                    })
                }
                Some(_) => {}
            },
        }
    }

    let defs = template.effects_for(Trigger::OnPlay, enhanced);
    if !template.occupies_tile() && needs_chosen_tile(&defs) {
        match tile {
            None => return Err(RejectReason::MissingTarget),
            Some(i) if i >= me.board.len() => return Err(RejectReason::TileOutOfRange),
            Some(_) => {}
        }
    }
    check_choices(state, &defs, player, None, target)
}

fn validate_evolve(
    state: &MatchState,
    catalog: &dyn CardCatalog,
    player: PlayerId,
    unit: InstanceId,
    target: Option<EntityRef>,
) -> Validation {
    let me = state.player(player);
    let live = me.board.unit(unit).ok_or(RejectReason::UnknownInstance)?;
    if !live.is_minion() {
        return Err(RejectReason::InvalidTarget);
    }
    if live.evolved {
        return Err(RejectReason::AlreadyEvolved);
    }
    if me.turns_taken < me.evolve_usable_from || me.evolved_this_turn {
        return Err(RejectReason::EvolveNotAvailable);
    }
    if me.evolution_points == 0 {
        return Err(RejectReason::InsufficientEvolutionPoints);
    }
    let template = catalog.template(live.template).ok_or(RejectReason::UnknownInstance)?;
    let defs = template.effects_for(Trigger::OnEvolve, live.enhanced);
    check_choices(state, &defs, player, Some(unit), target)
}

fn validate_activation(
    state: &MatchState,
    catalog: &dyn CardCatalog,
    player: PlayerId,
    amulet: InstanceId,
    target: Option<EntityRef>,
) -> Validation {
    let me = state.player(player);
    let live = me.board.unit(amulet).ok_or(RejectReason::UnknownInstance)?;
    let template = catalog.template(live.template).ok_or(RejectReason::UnknownInstance)?;
    let cost = match template.activation_cost {
        Some(cost) if live.is_amulet() && !live.silenced && !live.activated_this_turn => cost,
        _ => return Err(RejectReason::NotActivatable),
    };
    if me.mana < cost {
        return Err(RejectReason::InsufficientMana);
    }
    let defs = template.effects_for(Trigger::OnActivate, live.enhanced);
    check_choices(state, &defs, player, Some(amulet), target)
}

/// Check an action against the current state without touching it
pub fn validate_action(
    state: &MatchState,
    catalog: &dyn CardCatalog,
    player: PlayerId,
    action: &PlayerAction,
) -> Validation {
    if state.is_over() {
        return Err(RejectReason::GameOver);
    }
    match action {
        PlayerAction::Surrender => return Ok(()),
        PlayerAction::Mulligan { replace } => {
            if state.phase != Phase::Mulligan || state.mulligan.ready[player.index()] {
                return Err(RejectReason::MulliganClosed);
            }
            let hand = state.player(player).hand.len();
            if replace.iter().any(|i| *i >= hand) {
                return Err(RejectReason::HandIndexOutOfRange);
            }
            return Ok(());
        }
        _ => {}
    }

    if state.active != player {
        return Err(RejectReason::NotYourTurn);
    }
    if !state.phase.accepts_actions() {
        return Err(RejectReason::WrongPhase);
    }

    match action {
        PlayerAction::PlayCard {
            hand_index,
            tile,
            target,
        } => validate_play(state, catalog, player, *hand_index, *tile, *target),
        PlayerAction::Attack { attacker, target } => validate_attack(state, player, *attacker, *target),
        PlayerAction::Evolve { unit, target } => validate_evolve(state, catalog, player, *unit, *target),
        PlayerAction::ActivateAmulet { amulet, target } => {
            validate_activation(state, catalog, player, *amulet, *target)
        }
        PlayerAction::EndTurn => Ok(()),
        PlayerAction::Surrender | PlayerAction::Mulligan { .. } => Ok(()),
    }
}

/// Targets worth trying for a set of definitions: every legal choice of
/// the first player-choice specifier, or nothing
fn choice_options(
    state: &MatchState,
    defs: &[&EffectDefinition],
    player: PlayerId,
    source: Option<InstanceId>,
) -> Vec<Option<EntityRef>> {
    let choices = defs
        .iter()
        .find(|d| d.target.is_player_choice())
        .map(|d| legal_choices(state, d.target, &d.kind, player, source))
        .unwrap_or_default();
    if choices.is_empty() {
        vec![None]
    } else {
        choices.into_iter().map(Some).collect()
    }
}

/// Enumerate the legal actions of `player`
///
/// Surrender is always legal but never listed.
pub fn legal_actions(state: &MatchState, catalog: &dyn CardCatalog, player: PlayerId) -> Vec<PlayerAction> {
    let mut actions = Vec::new();
    if state.is_over() {
        return actions;
    }
    if state.phase == Phase::Mulligan {
        if !state.mulligan.ready[player.index()] {
            let hand = state.player(player).hand.len();
            actions.push(PlayerAction::Mulligan { replace: Vec::new() });
            actions.push(PlayerAction::Mulligan {
                replace: (0..hand).collect(),
            });
        }
        return actions;
    }
    if state.active != player || !state.phase.accepts_actions() {
        return actions;
    }

    let me = state.player(player);
    let mut push = |action: PlayerAction| {
        if validate_action(state, catalog, player, &action).is_ok() {
            actions.push(action);
        }
    };

    for (hand_index, card) in me.hand.iter().enumerate() {
        let Some(template) = catalog.template(card.template) else {
            continue;
        };
        let (_, enhanced) = play_cost(me.mana, card, template);
        let defs = template.effects_for(Trigger::OnPlay, enhanced);
        let tiles: Vec<Option<usize>> = if template.occupies_tile() {
            me.board.empty_tiles().into_iter().map(Some).collect()
        } else if needs_chosen_tile(&defs) {
            (0..me.board.len()).map(Some).collect()
        } else {
            vec![None]
        };
        for tile in tiles {
            for target in choice_options(state, &defs, player, None) {
                push(PlayerAction::PlayCard {
                    hand_index,
                    tile,
                    target,
                });
            }
        }
    }

    let enemy = player.opponent();
    let targets: Vec<EntityRef> = state
        .player(enemy)
        .board
        .units()
        .map(|u| EntityRef::Unit(u.id))
        .chain(std::iter::once(EntityRef::Player(enemy)))
        .collect();
    let units: Vec<&RuntimeUnit> = me.board.units().collect();
    for unit in &units {
        for target in &targets {
            push(PlayerAction::Attack {
                attacker: unit.id,
                target: *target,
            });
        }
    }

    for unit in &units {
        let Some(template) = catalog.template(unit.template) else {
            continue;
        };
        if unit.is_minion() {
            let defs = template.effects_for(Trigger::OnEvolve, unit.enhanced);
            for target in choice_options(state, &defs, player, Some(unit.id)) {
                push(PlayerAction::Evolve { unit: unit.id, target });
            }
        } else if template.activation_cost.is_some() {
            let defs = template.effects_for(Trigger::OnActivate, unit.enhanced);
            for target in choice_options(state, &defs, player, Some(unit.id)) {
                push(PlayerAction::ActivateAmulet {
                    amulet: unit.id,
                    target,
                });
            }
        }
    }

    push(PlayerAction::EndTurn);
    actions
}

/// Carry out an action that already passed [`validate_action`]
pub fn execute_action(r: &mut Resolver<'_>, player: PlayerId, action: &PlayerAction) -> Result<()> {
    match action {
        PlayerAction::PlayCard {
            hand_index,
            tile,
            target,
        } => play_card(r, player, *hand_index, *tile, *target),
        PlayerAction::Attack { attacker, target } => resolve_attack(r, *attacker, *target),
        PlayerAction::Evolve { unit, target } => {
            r.evolve_unit(*unit, true)?;
            run_own_trigger(r, *unit, Trigger::OnEvolve, *target)
        }
        PlayerAction::ActivateAmulet { amulet, target } => {
            let catalog = r.catalog();
            let cost = r
                .state()
                .unit(*amulet)
                .and_then(|u| catalog.template(u.template))
                .and_then(|t| t.activation_cost)
                .unwrap_or(0);
            r.emit(GameEvent::AmuletActivated { instance: *amulet, cost })?;
            run_own_trigger(r, *amulet, Trigger::OnActivate, *target)
        }
        PlayerAction::EndTurn => end_turn(r),
        PlayerAction::Surrender => r.end_match(Some(player.opponent()), GameOverReason::Surrender),
        PlayerAction::Mulligan { replace } => mulligan(r, player, replace),
    }
}

fn run_own_trigger(r: &mut Resolver<'_>, unit: InstanceId, trigger: Trigger, choice: Option<EntityRef>) -> Result<()> {
    if let Some(live) = r.state().unit(unit) {
        let source = EffectSource::of_unit(live);
        r.resolve_now(source, TriggerContext::new(trigger).with_choice(choice))?;
    }
    r.settle()
}

fn play_card(
    r: &mut Resolver<'_>,
    player: PlayerId,
    hand_index: usize,
    tile: Option<usize>,
    target: Option<EntityRef>,
) -> Result<()> {
    let catalog = r.catalog();
    let me = r.state().player(player);
    let card = *me
        .hand
        .get(hand_index)
        .ok_or(RejectReason::HandIndexOutOfRange)?;
    let template = catalog.get(card.template)?;
    let (cost_paid, enhanced) = play_cost(me.mana, &card, template);
    let placement = if template.occupies_tile() {
        tile.or_else(|| me.board.first_empty())
    } else {
        None
    };

    r.emit(GameEvent::CardPlayed {
        player,
        card: card.id,
        template: card.template,
        cost_paid,
        enhanced,
        to_graveyard: !template.occupies_tile(),
    })?;

    let source = match placement {
        Some(index) => {
            let unit = RuntimeUnit::from_template(card.id, player, template, enhanced);
            r.place_unit(player, index, unit)?;
            match r.state().unit(card.id) {
                Some(live) => EffectSource::of_unit(live),
                None => EffectSource::of_card(player, &card, template, enhanced),
            }
        }
        None => EffectSource::of_card(player, &card, template, enhanced),
    };
    let ctx = TriggerContext::new(Trigger::OnPlay)
        .with_choice(target)
        .with_tile(tile.or(placement));
    r.resolve_now(source, ctx)?;
    r.check_deaths()?;
    r.check_game_over()?;

    // Armed only now, so the card never reacts to its own on-play effects.
    r.arm_listeners(card.id)?;
    r.raise_reactive(Trigger::AllyPlay, Some(player), Some(card.id), 1);
    r.raise_reactive(Trigger::EnemyPlay, Some(player.opponent()), Some(card.id), 1);
    r.settle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, EffectKind, Keyword, TemplateId};
    use crate::game::MatchConfig;
    use crate::loader::CardDatabase;

    const BOLT: TemplateId = TemplateId::new(1);
    const GRUNT: TemplateId = TemplateId::new(2);
    const SURGE: TemplateId = TemplateId::new(3);

    fn db() -> CardDatabase {
        let mut db = CardDatabase::new();
        db.insert(
            CardTemplate::spell(BOLT, "Bolt", 1).with_effect(
                EffectDefinition::new(
                    Trigger::OnPlay,
                    TargetSpec::ChosenEnemyOrFace,
                    EffectKind::Damage(Amount::Fixed(3)),
                )
                .unwrap(),
            ),
        )
        .unwrap();
        db.insert(CardTemplate::minion(GRUNT, "Grunt", 2, 2, 2)).unwrap();
        db.insert(
            CardTemplate::minion(SURGE, "Surge", 2, 2, 2).with_enhance(
                5,
                vec![EffectDefinition::new(
                    Trigger::OnPlay,
                    TargetSpec::SelfUnit,
                    EffectKind::GrantKeyword(Keyword::Storm),
                )
                .unwrap()],
            ),
        )
        .unwrap();
        db
    }

    fn main_phase(hand: &[TemplateId], mana: u8) -> MatchState {
        let mut state = MatchState::new(MatchConfig::default(), 4, PlayerId::FIRST, [Vec::new(), Vec::new()]);
        state.phase = Phase::Main;
        state.turn = 1;
        for (i, template) in hand.iter().enumerate() {
            state
                .apply_event(&GameEvent::CardAddedToHand {
                    player: PlayerId::FIRST,
                    card: HandCard::new(InstanceId::new(i as u32 + 1), *template),
                })
                .unwrap();
        }
        let me = state.player_mut(PlayerId::FIRST);
        me.mana = mana;
        me.max_mana = mana;
        state
    }

    #[test]
    fn test_rejections() {
        let db = db();
        let state = main_phase(&[BOLT, GRUNT], 1);
        assert_eq!(
            validate_action(&state, &db, PlayerId::SECOND, &PlayerAction::EndTurn),
            Err(RejectReason::NotYourTurn)
        );
        assert_eq!(
            validate_action(&state, &db, PlayerId::FIRST, &PlayerAction::play(1)),
            Err(RejectReason::InsufficientMana)
        );
        assert_eq!(
            validate_action(&state, &db, PlayerId::FIRST, &PlayerAction::play(5)),
            Err(RejectReason::HandIndexOutOfRange)
        );
        assert_eq!(
            validate_action(&state, &db, PlayerId::FIRST, &PlayerAction::play(0)),
            Err(RejectReason::MissingTarget)
        );
        assert_eq!(
            validate_action(
                &state,
                &db,
                PlayerId::FIRST,
                &PlayerAction::play_at(0, EntityRef::Player(PlayerId::FIRST))
            ),
            Err(RejectReason::InvalidTarget)
        );
        assert_eq!(
            validate_action(
                &state,
                &db,
                PlayerId::FIRST,
                &PlayerAction::Mulligan { replace: vec![] }
            ),
            Err(RejectReason::MulliganClosed)
        );
    }

    #[test]
    fn test_play_spell_to_face() {
        let db = db();
        let mut state = main_phase(&[BOLT], 1);
        let action = PlayerAction::play_at(0, EntityRef::Player(PlayerId::SECOND));
        validate_action(&state, &db, PlayerId::FIRST, &action).unwrap();
        let mut r = Resolver::new(&mut state, &db);
        execute_action(&mut r, PlayerId::FIRST, &action).unwrap();
        let state = r.state();
        assert_eq!(state.player(PlayerId::SECOND).health, 27);
        assert_eq!(state.player(PlayerId::FIRST).mana, 0);
        assert_eq!(state.player(PlayerId::FIRST).graveyard.count(BOLT), 1);
    }

    #[test]
    fn test_enhance_replaces_on_play() {
        let db = db();
        let mut state = main_phase(&[SURGE, SURGE], 7);
        let mut r = Resolver::new(&mut state, &db);
        execute_action(&mut r, PlayerId::FIRST, &PlayerAction::play(0)).unwrap();
        let enhanced = r.state().unit(InstanceId::new(1)).unwrap();
        assert!(enhanced.enhanced);
        assert!(enhanced.has(Keyword::Storm));
        assert_eq!(r.state().player(PlayerId::FIRST).mana, 2);

        execute_action(&mut r, PlayerId::FIRST, &PlayerAction::play(0)).unwrap();
        let plain = r.state().unit(InstanceId::new(2)).unwrap();
        assert!(!plain.enhanced);
        assert!(!plain.has(Keyword::Storm));
    }

    #[test]
    fn test_legal_actions_are_valid() {
        let db = db();
        let state = main_phase(&[BOLT, GRUNT], 3);
        let actions = legal_actions(&state, &db, PlayerId::FIRST);
        assert!(actions.contains(&PlayerAction::EndTurn));
        // Bolt can only go face; Grunt can go on any of the six tiles.
        assert_eq!(actions.len(), 1 + 1 + 6);
        for action in &actions {
            assert_eq!(validate_action(&state, &db, PlayerId::FIRST, action), Ok(()));
        }
        assert!(legal_actions(&state, &db, PlayerId::SECOND).is_empty());
    }
}
