//! Turn and phase flow
//!
//! Match setup, the mulligan, and the automatic steps between two players'
//! main phases. Each function drives a [`Resolver`], so the turn machinery
//! produces events exactly like card effects do.

use crate::core::{InstanceId, PlayerId, Trigger};
use crate::game::{GameEvent, Phase, Resolver};
use crate::zones::TileTiming;
use crate::{DuelError, Result};

/// Shuffle both decks, deal opening hands and open the mulligan
pub fn start_match(r: &mut Resolver<'_>) -> Result<()> {
    if r.state().phase != Phase::NotStarted {
        return Err(DuelError::Invariant("match already started".to_string()));
    }
    let seed = r.state().rng.seed();
    let first_player = r.state().first_player;
    r.emit(GameEvent::MatchStarted { seed, first_player })?;

    let order = [first_player, first_player.opponent()];
    for player in order {
        r.shuffle_deck(player)?;
    }
    let opening = r.state().config.opening_hand;
    for player in order {
        for _ in 0..opening {
            r.draw_card(player)?;
        }
    }
    // Listeners are not armed yet; nothing can react to the opening draws.
    r.enter_phase(Phase::Mulligan)
}

/// Return the cards at `replace` (hand indices) to the bottom of the deck,
/// reshuffle and draw as many
///
/// When both players have submitted, the first turn starts.
pub fn mulligan(r: &mut Resolver<'_>, player: PlayerId, replace: &[usize]) -> Result<()> {
    let mut indices: Vec<usize> = replace.to_vec();
    indices.sort_unstable();
    indices.dedup();
    let hand = &r.state().player(player).hand;
    let returned: Vec<InstanceId> = indices.iter().filter_map(|i| hand.get(*i)).map(|c| c.id).collect();
    let count = returned.len();

    r.emit(GameEvent::MulliganSubmitted { player, returned })?;
    if count > 0 {
        r.shuffle_deck(player)?;
        for _ in 0..count {
            r.draw_card(player)?;
        }
    }

    if r.state().mulligan.all_ready() {
        r.enter_phase(Phase::TurnStart)?;
        let first = r.state().first_player;
        begin_turn(r, first)?;
    }
    Ok(())
}

/// Run the start-of-turn and draw steps for `player`, leaving the match in
/// its main phase (or over)
pub fn begin_turn(r: &mut Resolver<'_>, player: PlayerId) -> Result<()> {
    let state = r.state();
    let turn = if player == state.first_player {
        state.turn + 1
    } else {
        state.turn.max(1)
    };
    r.emit(GameEvent::TurnStarted { player, turn })?;

    let cap = r.state().config.max_mana_cap;
    let max = r.state().player(player).max_mana.saturating_add(1).min(cap);
    r.emit(GameEvent::ManaChanged {
        player,
        current: max,
        max,
    })?;

    tick_tiles(r, player)?;
    tick_countdowns(r, player)?;
    r.settle()?;

    r.raise_reactive(Trigger::TurnStart, Some(player), None, 0);
    r.run_queue()?;
    r.settle()?;
    if r.is_over() {
        return Ok(());
    }

    r.enter_phase(Phase::Draw)?;
    r.draw_card(player)?;
    let bonus = r.state().config.second_player_bonus_draw
        && player != r.state().first_player
        && r.state().player(player).turns_taken == 1;
    if bonus {
        r.draw_card(player)?;
    }
    r.settle()?;
    if r.is_over() {
        return Ok(());
    }
    r.enter_phase(Phase::Main)
}

/// Purge expired tile effects, fire the owner-turn-start ones, then count
/// every remaining effect down
fn tick_tiles(r: &mut Resolver<'_>, player: PlayerId) -> Result<()> {
    let board = &r.state().player(player).board;
    let any_expired = board.tiles().any(|t| t.effects.iter().any(|e| e.is_expired()));
    let any_effects = board.tiles().any(|t| !t.effects.is_empty());
    if any_expired {
        r.emit(GameEvent::TileEffectsPurged { player })?;
    }
    if !any_effects {
        return Ok(());
    }
    r.apply_tile_effects(player, TileTiming::OwnerTurnStart)?;
    r.emit(GameEvent::TileEffectsTicked { player })
}

/// Count the owner's amulets down; those reaching zero are destroyed
fn tick_countdowns(r: &mut Resolver<'_>, player: PlayerId) -> Result<()> {
    let ticking: Vec<(InstanceId, u8)> = r
        .state()
        .player(player)
        .board
        .units()
        .filter_map(|u| u.countdown.map(|c| (u.id, c)))
        .collect();
    for (instance, current) in ticking {
        let remaining = current.saturating_sub(1);
        r.emit(GameEvent::CountdownChanged { instance, remaining })?;
        if remaining == 0 {
            r.destroy_unit(instance)?;
        }
    }
    Ok(())
}

/// Close the active player's turn and start the opponent's
pub fn end_turn(r: &mut Resolver<'_>) -> Result<()> {
    let player = r.state().active;
    let turn = r.state().turn;
    r.enter_phase(Phase::TurnEnd)?;

    r.apply_tile_effects(player, TileTiming::OwnerTurnEnd)?;
    r.settle()?;

    r.raise_reactive(Trigger::TurnEnd, None, None, 0);
    r.raise_reactive(Trigger::OwnerTurnEnd, Some(player), None, 0);
    r.run_queue()?;
    r.settle()?;
    if r.is_over() {
        return Ok(());
    }

    expire_modifiers(r)?;
    r.settle()?;
    if r.is_over() {
        return Ok(());
    }

    r.emit(GameEvent::TurnEnded { player, turn })?;
    r.enter_phase(Phase::TurnStart)?;
    begin_turn(r, player.opponent())
}

fn expire_modifiers(r: &mut Resolver<'_>) -> Result<()> {
    let any_temporary = r
        .state()
        .units_in_order()
        .iter()
        .any(|u| u.modifiers.iter().any(|m| !m.is_permanent()));
    if !any_temporary {
        return Ok(());
    }
    r.emit(GameEvent::ModifiersTicked)?;

    let expired: Vec<(InstanceId, Vec<usize>)> = r
        .state()
        .units_in_order()
        .iter()
        .map(|u| {
            let indices = u
                .modifiers
                .iter()
                .enumerate()
                .filter(|(_, m)| m.remaining_turns == Some(0))
                .map(|(i, _)| i)
                .rev()
                .collect();
            (u.id, indices)
        })
        .collect();
    for (instance, indices) in expired {
        for index in indices {
            r.emit(GameEvent::ModifierExpired { instance, index })?;
        }
    }
    Ok(())
}
