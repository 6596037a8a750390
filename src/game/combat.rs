//! Combat resolution
//!
//! Attack legality is checked against a shared borrow of the state so an
//! illegal attack never reaches the resolver. Resolution itself deals both
//! hits before any death check, which is what lets drain heal by the dealt
//! amount even when the defender dies from it.

use crate::core::{EntityRef, InstanceId, Keyword, PlayerId, Trigger};
use crate::error::RejectReason;
use crate::game::{GameEvent, MatchState, Resolver};
use crate::Result;

/// Whether the defender's ward units restrict this attack
fn ward_blocks(state: &MatchState, defender: PlayerId, target: EntityRef) -> bool {
    let board = &state.player(defender).board;
    if !board.units().any(|u| u.has(Keyword::Ward)) {
        return false;
    }
    match target {
        EntityRef::Player(_) => true,
        EntityRef::Unit(id) => !board.unit(id).is_some_and(|u| u.has(Keyword::Ward)),
    }
}

/// Check that `attacker` (owned by `player`) may attack `target` right now
pub fn validate_attack(
    state: &MatchState,
    player: PlayerId,
    attacker: InstanceId,
    target: EntityRef,
) -> std::result::Result<(), RejectReason> {
    let unit = state
        .player(player)
        .board
        .unit(attacker)
        .ok_or(RejectReason::UnknownInstance)?;
    if !unit.is_minion() {
        return Err(RejectReason::CannotAttack);
    }
    if unit.attacked_this_turn {
        return Err(RejectReason::AlreadyAttacked);
    }

    let defender = player.opponent();
    match target {
        EntityRef::Player(p) => {
            if p != defender {
                return Err(RejectReason::InvalidTarget);
            }
            if !unit.can_attack_player() {
                return Err(RejectReason::SummoningSick);
            }
        }
        EntityRef::Unit(id) => {
            let Some(victim) = state.player(defender).board.unit(id) else {
                return Err(if state.unit(id).is_some() {
                    RejectReason::InvalidTarget
                } else {
                    RejectReason::UnknownInstance
                });
            };
            if !victim.is_minion() {
                return Err(RejectReason::InvalidTarget);
            }
            if !unit.can_attack_unit() {
                return Err(RejectReason::SummoningSick);
            }
        }
    }

    if ward_blocks(state, defender, target) {
        return Err(RejectReason::WardBlocks);
    }
    Ok(())
}

/// Resolve a validated attack
pub fn resolve_attack(r: &mut Resolver<'_>, attacker: InstanceId, target: EntityRef) -> Result<()> {
    r.emit(GameEvent::AttackDeclared { attacker, target })?;
    r.raise_self(Trigger::OnAttack, attacker, target.unit(), 0);
    r.run_queue()?;
    r.check_deaths()?;
    r.check_game_over()?;
    r.run_queue()?;
    if r.is_over() {
        return Ok(());
    }

    // The attacker or its target may have left play during on-attack effects.
    let Some(unit) = r.state().unit(attacker) else {
        return Ok(());
    };
    let (owner, attack, drain) = (unit.owner, unit.attack, unit.has(Keyword::Drain));
    let counter = match target {
        EntityRef::Unit(id) => match r.state().unit(id) {
            Some(victim) => Some(victim.attack),
            None => return Ok(()),
        },
        EntityRef::Player(_) => None,
    };

    let dealt = r.deal_damage(Some(attacker), Some(owner), target, attack)?;
    if let (Some(counter), EntityRef::Unit(defender)) = (counter, target) {
        r.deal_damage(Some(defender), Some(owner.opponent()), EntityRef::Unit(attacker), counter)?;
    }
    if drain && dealt > 0 {
        r.heal(EntityRef::Player(owner), dealt)?;
    }
    r.settle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CardTemplate, RuntimeUnit, TemplateId};
    use crate::game::MatchConfig;
    use crate::loader::{CardCatalog, CardDatabase};

    fn setup() -> (CardDatabase, MatchState) {
        let mut db = CardDatabase::new();
        db.insert(CardTemplate::minion(TemplateId::new(1), "Footman", 2, 2, 2)).unwrap();
        db.insert(CardTemplate::minion(TemplateId::new(2), "Warden", 2, 1, 3).with_keyword(Keyword::Ward))
            .unwrap();
        db.insert(CardTemplate::minion(TemplateId::new(3), "Leech", 3, 3, 2).with_keyword(Keyword::Drain))
            .unwrap();
        let mut state = MatchState::new(MatchConfig::default(), 1, PlayerId::FIRST, [Vec::new(), Vec::new()]);
        state.phase = crate::game::Phase::Main;
        (db, state)
    }

    fn place(state: &mut MatchState, db: &CardDatabase, id: u32, template: u32, owner: PlayerId, ready: bool) {
        let template = db.template(TemplateId::new(template)).unwrap();
        let mut unit = RuntimeUnit::from_template(InstanceId::new(id), owner, template, false);
        unit.summoning_sick = !ready;
        let tile = state.player(owner).board.first_empty().unwrap();
        state
            .apply_event(&GameEvent::Summoned {
                player: owner,
                tile,
                unit,
            })
            .unwrap();
    }

    #[test]
    fn test_ward_restricts_targets() {
        let (db, mut state) = setup();
        place(&mut state, &db, 1, 1, PlayerId::FIRST, true);
        place(&mut state, &db, 2, 1, PlayerId::SECOND, true);
        place(&mut state, &db, 3, 2, PlayerId::SECOND, true);

        let attacker = InstanceId::new(1);
        assert_eq!(
            validate_attack(&state, PlayerId::FIRST, attacker, EntityRef::Player(PlayerId::SECOND)),
            Err(RejectReason::WardBlocks)
        );
        assert_eq!(
            validate_attack(&state, PlayerId::FIRST, attacker, EntityRef::Unit(InstanceId::new(2))),
            Err(RejectReason::WardBlocks)
        );
        assert_eq!(
            validate_attack(&state, PlayerId::FIRST, attacker, EntityRef::Unit(InstanceId::new(3))),
            Ok(())
        );
    }

    #[test]
    fn test_summoning_sickness() {
        let (db, mut state) = setup();
        place(&mut state, &db, 1, 1, PlayerId::FIRST, false);
        place(&mut state, &db, 2, 1, PlayerId::SECOND, true);
        assert_eq!(
            validate_attack(&state, PlayerId::FIRST, InstanceId::new(1), EntityRef::Unit(InstanceId::new(2))),
            Err(RejectReason::SummoningSick)
        );
        state.unit_mut(InstanceId::new(1)).unwrap().keywords.insert(Keyword::Rush);
        assert_eq!(
            validate_attack(&state, PlayerId::FIRST, InstanceId::new(1), EntityRef::Unit(InstanceId::new(2))),
            Ok(())
        );
        assert_eq!(
            validate_attack(&state, PlayerId::FIRST, InstanceId::new(1), EntityRef::Player(PlayerId::SECOND)),
            Err(RejectReason::SummoningSick)
        );
    }

    #[test]
    fn test_trade_destroys_both() {
        let (db, mut state) = setup();
        place(&mut state, &db, 1, 1, PlayerId::FIRST, true);
        place(&mut state, &db, 2, 1, PlayerId::SECOND, true);
        let mut r = Resolver::new(&mut state, &db);
        resolve_attack(&mut r, InstanceId::new(1), EntityRef::Unit(InstanceId::new(2))).unwrap();
        assert!(r.state().player(PlayerId::FIRST).board.is_empty());
        assert!(r.state().player(PlayerId::SECOND).board.is_empty());
        assert_eq!(r.state().player(PlayerId::SECOND).graveyard.len(), 1);
    }

    #[test]
    fn test_drain_heals_by_dealt_amount() {
        let (db, mut state) = setup();
        state.player_mut(PlayerId::FIRST).health = 20;
        place(&mut state, &db, 1, 3, PlayerId::FIRST, true);
        let mut r = Resolver::new(&mut state, &db);
        resolve_attack(&mut r, InstanceId::new(1), EntityRef::Player(PlayerId::SECOND)).unwrap();
        assert_eq!(r.state().player(PlayerId::SECOND).health, 27);
        assert_eq!(r.state().player(PlayerId::FIRST).health, 23);
        assert!(r.state().unit(InstanceId::new(1)).unwrap().attacked_this_turn);
    }
}
