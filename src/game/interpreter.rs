//! Effect interpreter
//!
//! The [`Resolver`] evaluates declarative effect definitions against a
//! [`MatchState`]. Every mutation is expressed as a [`GameEvent`], applied to
//! the state immediately and recorded, so the list handed back by
//! [`Resolver::finish`] replays to the exact same state on any peer.
//!
//! Triggers raised while resolving are queued and dispatched first-in,
//! first-out after the current definition list completes. The listener set
//! of a reactive trigger is captured when it is raised, and a card never
//! reacts to triggers raised by its own resolution.

use crate::core::{
    Amount, CardTemplate, ConditionContext, EffectDefinition, EffectKind, EntityRef, HandCard,
    InstanceId, Keyword, PlayerId, RuntimeUnit, StatDuration, StatModifier, TemplateId, Trigger,
};
use crate::game::targeting::{self, Candidates, ResolvedTarget, TargetScope};
use crate::game::{GameEvent, GameOverReason, MatchState, Phase};
use crate::loader::CardCatalog;
use crate::zones::{TileEffect, TileEffectKind, TileTiming};
use crate::{DuelError, Result};
use std::collections::VecDeque;

/// The card whose definitions are resolving
///
/// Captured when the trigger is raised so that last-words effects still know
/// their owner and stats after the unit has left play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectSource {
    pub instance: InstanceId,
    pub owner: PlayerId,
    pub template: TemplateId,
    pub enhanced: bool,
    pub evolved: bool,
    pub attack: i32,
}

impl EffectSource {
    pub fn of_unit(unit: &RuntimeUnit) -> Self {
        EffectSource {
            instance: unit.id,
            owner: unit.owner,
            template: unit.template,
            enhanced: unit.enhanced,
            evolved: unit.evolved,
            attack: unit.attack,
        }
    }

    /// A card resolving from hand (spells)
    pub fn of_card(owner: PlayerId, card: &HandCard, template: &CardTemplate, enhanced: bool) -> Self {
        EffectSource {
            instance: card.id,
            owner,
            template: card.template,
            enhanced,
            evolved: false,
            attack: template.attack,
        }
    }
}

/// Payload of a trigger event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerContext {
    pub trigger: Trigger,
    /// The unit the trigger is about (the one destroyed, played, attacked...)
    pub triggering: Option<InstanceId>,
    /// Quantity carried by the trigger (damage taken, cards drawn...)
    pub amount: i32,
    /// Target named in the action payload
    pub choice: Option<EntityRef>,
    /// Tile named in the action payload
    pub tile: Option<usize>,
}

impl TriggerContext {
    pub fn new(trigger: Trigger) -> Self {
        TriggerContext {
            trigger,
            triggering: None,
            amount: 0,
            choice: None,
            tile: None,
        }
    }

    pub fn with_choice(mut self, choice: Option<EntityRef>) -> Self {
        self.choice = choice;
        self
    }

    pub fn with_tile(mut self, tile: Option<usize>) -> Self {
        self.tile = tile;
        self
    }

    pub fn about(mut self, triggering: Option<InstanceId>, amount: i32) -> Self {
        self.triggering = triggering;
        self.amount = amount;
        self
    }
}

#[derive(Debug, Clone)]
struct Dispatch {
    source: EffectSource,
    ctx: TriggerContext,
    /// Skip when the source is no longer on the board (or silenced)
    requires_live: bool,
}

/// Single-writer effect resolution over a match state
pub struct Resolver<'a> {
    state: &'a mut MatchState,
    catalog: &'a dyn CardCatalog,
    events: Vec<GameEvent>,
    queue: VecDeque<Dispatch>,
    dispatched: u32,
    destroyed: i32,
    resolving: Option<InstanceId>,
}

impl<'a> Resolver<'a> {
    pub fn new(state: &'a mut MatchState, catalog: &'a dyn CardCatalog) -> Self {
        Resolver {
            state,
            catalog,
            events: Vec::new(),
            queue: VecDeque::new(),
            dispatched: 0,
            destroyed: 0,
            resolving: None,
        }
    }

    pub fn state(&self) -> &MatchState {
        self.state
    }

    pub fn catalog(&self) -> &'a dyn CardCatalog {
        self.catalog
    }

    /// Events produced so far, in order
    pub fn finish(self) -> Vec<GameEvent> {
        self.events
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Units destroyed since this resolver was created
    pub fn destroyed_count(&self) -> i32 {
        self.destroyed
    }

    /// Apply an event to the state and record it
    pub fn emit(&mut self, event: GameEvent) -> Result<()> {
        self.state.apply_event(&event)?;
        self.events.push(event);
        Ok(())
    }

    fn record_rng(&mut self) -> Result<()> {
        let pos = self.state.rng.position();
        self.emit(GameEvent::RngAdvanced {
            draws: pos.draws,
            word_pos: pos.word_pos,
        })
    }

    pub fn enter_phase(&mut self, to: Phase) -> Result<()> {
        let from = self.state.phase;
        if !from.can_transition_to(to) {
            return Err(DuelError::Invariant(format!("illegal phase transition {from} -> {to}")));
        }
        self.emit(GameEvent::PhaseChanged { from, to })
    }

    pub fn shuffle_deck(&mut self, player: PlayerId) -> Result<()> {
        let mut order = self.state.player(player).deck.cards().to_vec();
        self.state.rng.shuffle(&mut order);
        self.emit(GameEvent::DeckShuffled { player, order })?;
        self.record_rng()
    }

    /// Pick up to `count` entries at random; no draw happens when every
    /// entry is taken anyway
    fn pick<T: Copy>(&mut self, pool: &[T], count: usize) -> Result<Vec<T>> {
        if pool.is_empty() || count == 0 {
            return Ok(Vec::new());
        }
        if count >= pool.len() {
            return Ok(pool.to_vec());
        }
        let picks = self.state.rng.sample(pool.len(), count);
        self.record_rng()?;
        Ok(picks.into_iter().map(|i| pool[i]).collect())
    }

    // ---- trigger plumbing ----

    /// Queue the reactive listeners of `trigger`
    ///
    /// `scope` limits listeners to one owner. The listener set is captured
    /// now; the card currently resolving and the triggering unit itself are
    /// left out.
    pub fn raise_reactive(
        &mut self,
        trigger: Trigger,
        scope: Option<PlayerId>,
        triggering: Option<InstanceId>,
        amount: i32,
    ) {
        let holders = self.state.listeners.listeners(trigger).to_vec();
        for id in holders {
            if Some(id) == self.resolving || Some(id) == triggering {
                continue;
            }
            let Some(unit) = self.state.unit(id) else {
                continue;
            };
            if unit.silenced || scope.is_some_and(|p| p != unit.owner) {
                continue;
            }
            self.queue.push_back(Dispatch {
                source: EffectSource::of_unit(unit),
                ctx: TriggerContext::new(trigger).about(triggering, amount),
                requires_live: true,
            });
        }
    }

    /// Queue a self trigger on a live unit
    pub fn raise_self(&mut self, trigger: Trigger, unit: InstanceId, triggering: Option<InstanceId>, amount: i32) {
        let Some(unit) = self.state.unit(unit) else {
            return;
        };
        if unit.silenced || !self.has_definitions(unit.template, trigger, unit.enhanced) {
            return;
        }
        self.queue.push_back(Dispatch {
            source: EffectSource::of_unit(unit),
            ctx: TriggerContext::new(trigger).about(triggering, amount),
            requires_live: true,
        });
    }

    fn has_definitions(&self, template: TemplateId, trigger: Trigger, enhanced: bool) -> bool {
        self.catalog
            .template(template)
            .is_some_and(|t| !t.effects_for(trigger, enhanced).is_empty())
    }

    /// Dispatch queued triggers until the queue is empty or the match ends
    pub fn run_queue(&mut self) -> Result<()> {
        while let Some(dispatch) = self.queue.pop_front() {
            if self.is_over() {
                self.queue.clear();
                break;
            }
            let mut source = dispatch.source;
            if dispatch.requires_live {
                match self.state.unit(source.instance) {
                    Some(unit) if !unit.silenced => source = EffectSource::of_unit(unit),
                    _ => continue,
                }
            }
            self.resolve_now(source, dispatch.ctx)?;
        }
        Ok(())
    }

    /// Death checks, game-over check and queue drain
    pub fn settle(&mut self) -> Result<()> {
        self.check_deaths()?;
        self.check_game_over()?;
        self.run_queue()
    }

    /// Resolve the definitions `source` has for `ctx.trigger`, in list order
    pub fn resolve_now(&mut self, source: EffectSource, ctx: TriggerContext) -> Result<()> {
        self.dispatched += 1;
        let limit = self.state.config.max_trigger_depth;
        if self.dispatched > limit {
            return Err(DuelError::Invariant(format!(
                "trigger cascade exceeded {limit} dispatches"
            )));
        }

        let catalog = self.catalog;
        let template = catalog.get(source.template)?;
        let definitions = template.effects_for(ctx.trigger, source.enhanced);
        if definitions.is_empty() || !self.costs_payable(&definitions, source.owner) {
            return Ok(());
        }

        let previous = self.resolving.replace(source.instance);
        let outcome = self.resolve_definitions(&definitions, &source, &ctx);
        self.resolving = previous;
        outcome
    }

    fn resolve_definitions(
        &mut self,
        definitions: &[&EffectDefinition],
        source: &EffectSource,
        ctx: &TriggerContext,
    ) -> Result<()> {
        for def in definitions {
            if self.is_over() {
                break;
            }
            let context = self.condition_context(source, ctx);
            if !def.condition.evaluate(&context) {
                continue;
            }
            let targets = self.resolve_targets(def, source, ctx)?;
            self.apply_definition(def, &targets, source, ctx)?;
            self.check_deaths()?;
            self.check_game_over()?;
        }
        Ok(())
    }

    /// Cost-like definitions (discards) must be payable in full, or the
    /// whole list is skipped
    fn costs_payable(&self, definitions: &[&EffectDefinition], owner: PlayerId) -> bool {
        let hand = self.state.player(owner).hand.len();
        let required: usize = definitions
            .iter()
            .filter(|d| d.is_cost_like())
            .map(|d| match d.kind {
                EffectKind::Discard { count } => count as usize,
                _ => 0,
            })
            .sum();
        hand >= required
    }

    pub fn condition_context(&self, source: &EffectSource, ctx: &TriggerContext) -> ConditionContext {
        let owner = self.state.player(source.owner);
        let opponent = self.state.player(source.owner.opponent());
        let live = self.state.unit(source.instance);
        ConditionContext {
            cumulative_self_damage: owner.self_damage_total,
            turn_self_damage: owner.self_damage_this_turn,
            owner_health: owner.health,
            opponent_health: opponent.health,
            owner_mana: owner.mana as i32,
            owner_max_mana: owner.max_mana as i32,
            other_allies: owner
                .board
                .units()
                .filter(|u| u.is_minion() && u.id != source.instance)
                .count() as i32,
            enemy_units: opponent.board.units().filter(|u| u.is_minion()).count() as i32,
            owner_hand_size: owner.hand.len() as i32,
            owner_deck_size: owner.deck.len() as i32,
            owner_graveyard_size: owner.graveyard.len() as i32,
            turn_number: self.state.turn as i32,
            owner_evolution_points: owner.evolution_points as i32,
            cards_played_this_turn: owner.cards_played_this_turn as i32,
            trigger_amount: ctx.amount,
            destroyed_this_resolution: self.destroyed,
            is_owner_turn: self.state.active == source.owner,
            source_evolved: live.map(|u| u.evolved).unwrap_or(source.evolved),
            enhanced: source.enhanced,
            owner_has_barrier: owner.barrier,
            opponent_has_ward: opponent.board.units().any(|u| u.has(Keyword::Ward)),
        }
    }

    fn resolve_targets(
        &mut self,
        def: &EffectDefinition,
        source: &EffectSource,
        ctx: &TriggerContext,
    ) -> Result<Vec<ResolvedTarget>> {
        let scope = TargetScope {
            owner: source.owner,
            source: Some(source.instance),
            triggering: ctx.triggering,
            choice: ctx.choice,
            tile: ctx.tile,
        };
        match targeting::candidates(self.state, def.target, &def.kind, &scope) {
            Candidates::Fixed(targets) => Ok(targets),
            Candidates::Random { pool, count } => self.pick(&pool, count),
        }
    }

    fn amount(&self, amount: Amount, target: Option<&ResolvedTarget>, source: &EffectSource, ctx: &TriggerContext) -> i32 {
        let unit = target.and_then(|t| t.unit()).and_then(|id| self.state.unit(id));
        match amount {
            Amount::Fixed(n) => n,
            Amount::TargetAttack => unit.map(|u| u.attack).unwrap_or(0),
            Amount::TargetHealth => match target.and_then(|t| t.entity()) {
                Some(EntityRef::Player(p)) => self.state.player(p).health,
                _ => unit.map(|u| u.health).unwrap_or(0),
            },
            Amount::TargetCost => match target {
                Some(ResolvedTarget::HandCard { card, .. }) => self
                    .state
                    .hand_card(*card)
                    .and_then(|(_, c)| self.catalog.template(c.template).map(|t| c.cost(t.cost) as i32))
                    .unwrap_or(0),
                _ => unit
                    .and_then(|u| self.catalog.template(u.template))
                    .map(|t| t.cost as i32)
                    .unwrap_or(0),
            },
            Amount::SourceAttack => self
                .state
                .unit(source.instance)
                .map(|u| u.attack)
                .unwrap_or(source.attack),
            Amount::DestroyedThisResolution => self.destroyed,
            Amount::TriggerAmount => ctx.amount,
            Amount::OwnerHandSize => self.state.player(source.owner).hand.len() as i32,
        }
    }

    // ---- primitive operations shared with turn and combat ----

    /// Deal damage, honouring barrier
    ///
    /// Returns the damage actually dealt: zero when a barrier absorbed the
    /// hit.
    pub fn deal_damage(
        &mut self,
        source: Option<InstanceId>,
        source_owner: Option<PlayerId>,
        target: EntityRef,
        amount: i32,
    ) -> Result<i32> {
        if amount <= 0 {
            return Ok(0);
        }
        match target {
            EntityRef::Unit(id) => {
                let Some(unit) = self.state.unit(id) else {
                    return Ok(0);
                };
                if unit.has(Keyword::Barrier) {
                    self.emit(GameEvent::BarrierConsumed { target })?;
                    return Ok(0);
                }
                self.emit(GameEvent::Damage {
                    source,
                    target,
                    amount,
                    self_inflicted: false,
                })?;
                self.raise_self(Trigger::OnDamaged, id, source, amount);
            }
            EntityRef::Player(p) => {
                if self.state.player(p).barrier {
                    self.emit(GameEvent::BarrierConsumed { target })?;
                    return Ok(0);
                }
                self.emit(GameEvent::Damage {
                    source,
                    target,
                    amount,
                    self_inflicted: source_owner == Some(p),
                })?;
                self.raise_reactive(Trigger::OwnerDamaged, Some(p), None, amount);
            }
        }
        Ok(amount)
    }

    pub fn heal(&mut self, target: EntityRef, amount: i32) -> Result<()> {
        if amount <= 0 {
            return Ok(());
        }
        if let EntityRef::Unit(id) = target {
            if self.state.unit(id).is_none() {
                return Ok(());
            }
        }
        self.emit(GameEvent::Healed { target, amount })
    }

    /// Draw one card: fatigue on an empty deck, burn on a full hand
    pub fn draw_card(&mut self, player: PlayerId) -> Result<()> {
        let hand_limit = self.state.config.hand_limit;
        let state = self.state.player(player);
        let Some(top) = state.deck.peek_top() else {
            let counter = state.fatigue + 1;
            self.emit(GameEvent::Fatigue { player, counter })?;
            self.deal_damage(None, None, EntityRef::Player(player), counter as i32)?;
            return Ok(());
        };
        if state.hand.len() >= hand_limit {
            return self.emit(GameEvent::CardBurned {
                player,
                template: top,
                from_deck: true,
            });
        }
        let card = HandCard::new(self.state.instances.peek(), top);
        self.emit(GameEvent::CardDrawn { player, card })?;
        self.raise_reactive(Trigger::OnDraw, Some(player), None, 1);
        Ok(())
    }

    pub fn add_to_hand(&mut self, player: PlayerId, template: TemplateId) -> Result<()> {
        if self.state.player(player).hand.len() >= self.state.config.hand_limit {
            return self.emit(GameEvent::CardBurned {
                player,
                template,
                from_deck: false,
            });
        }
        let card = HandCard::new(self.state.instances.peek(), template);
        self.emit(GameEvent::CardAddedToHand { player, card })
    }

    /// Put a unit on a tile and run the tile's on-enter effects
    pub fn place_unit(&mut self, player: PlayerId, tile: usize, unit: RuntimeUnit) -> Result<()> {
        let id = unit.id;
        self.emit(GameEvent::Summoned { player, tile, unit })?;
        let entering: Vec<TileEffect> = self
            .state
            .player(player)
            .board
            .tile(tile)
            .map(|t| {
                t.effects
                    .iter()
                    .filter(|e| e.timing == TileTiming::OnEnter && !e.is_expired())
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        for effect in entering {
            self.apply_tile_effect(player, &effect, id)?;
        }
        Ok(())
    }

    /// Register a unit's reactive triggers with the listener registry
    pub fn arm_listeners(&mut self, instance: InstanceId) -> Result<()> {
        let Some(unit) = self.state.unit(instance) else {
            return Ok(());
        };
        if unit.silenced {
            return Ok(());
        }
        let template = self.catalog.get(unit.template)?;
        let triggers: Vec<Trigger> = template.triggers().into_iter().filter(|t| t.is_reactive()).collect();
        if triggers.is_empty() {
            return Ok(());
        }
        self.emit(GameEvent::ListenerArmed { instance, triggers })
    }

    /// Summon a fresh unit from the catalog on the first free tile
    pub fn summon(&mut self, player: PlayerId, template: TemplateId) -> Result<Option<InstanceId>> {
        let catalog = self.catalog;
        let template = catalog.get(template)?;
        if !template.occupies_tile() {
            return Ok(None);
        }
        let Some(tile) = self.state.player(player).board.first_empty() else {
            return Ok(None);
        };
        let id = self.state.instances.peek();
        let unit = RuntimeUnit::from_template(id, player, template, false);
        self.place_unit(player, tile, unit)?;
        self.arm_listeners(id)?;
        Ok(Some(id))
    }

    /// Evolve a unit to its printed evolved stats
    pub fn evolve_unit(&mut self, instance: InstanceId, spent_point: bool) -> Result<()> {
        let Some(unit) = self.state.unit(instance) else {
            return Ok(());
        };
        if unit.evolved || !unit.is_minion() {
            return Ok(());
        }
        let template = self.catalog.get(unit.template)?;
        self.emit(GameEvent::Evolved {
            instance,
            attack_gain: template.evolved_attack - template.attack,
            health_gain: template.evolved_health - template.health,
            spent_point,
        })
    }

    /// Destroy a unit: graveyard, last words and destroy listeners
    pub fn destroy_unit(&mut self, instance: InstanceId) -> Result<()> {
        let Some(unit) = self.state.unit(instance).cloned() else {
            return Ok(());
        };
        self.emit(GameEvent::Destroyed {
            instance,
            owner: unit.owner,
            template: unit.template,
        })?;
        self.destroyed += 1;

        if !unit.silenced && self.has_definitions(unit.template, Trigger::OnDestroy, unit.enhanced) {
            self.queue.push_back(Dispatch {
                source: EffectSource::of_unit(&unit),
                ctx: TriggerContext::new(Trigger::OnDestroy).about(Some(instance), 1),
                requires_live: false,
            });
        }
        if unit.is_minion() {
            self.raise_reactive(Trigger::AllyDestroy, Some(unit.owner), Some(instance), 1);
            self.raise_reactive(Trigger::EnemyDestroy, Some(unit.owner.opponent()), Some(instance), 1);
            self.raise_reactive(Trigger::AnyMinionDestroyed, None, Some(instance), 1);
        }
        Ok(())
    }

    /// Remove every minion at zero health or below
    pub fn check_deaths(&mut self) -> Result<()> {
        let dead: Vec<InstanceId> = self
            .state
            .units_in_order()
            .into_iter()
            .filter(|u| u.is_dead())
            .map(|u| u.id)
            .collect();
        for id in dead {
            self.destroy_unit(id)?;
        }
        Ok(())
    }

    /// End the match if a leader has fallen
    pub fn check_game_over(&mut self) -> Result<()> {
        if self.is_over() {
            return Ok(());
        }
        let first_down = self.state.player(PlayerId::FIRST).is_defeated();
        let second_down = self.state.player(PlayerId::SECOND).is_defeated();
        let winner = match (first_down, second_down) {
            (false, false) => return Ok(()),
            (true, true) => None,
            (true, false) => Some(PlayerId::SECOND),
            (false, true) => Some(PlayerId::FIRST),
        };
        self.end_match(winner, GameOverReason::LeaderDefeated)
    }

    pub fn end_match(&mut self, winner: Option<PlayerId>, reason: GameOverReason) -> Result<()> {
        if self.is_over() {
            return Ok(());
        }
        self.queue.clear();
        self.emit(GameEvent::GameOver { winner, reason })
    }

    /// Run the tile effects of `player`'s board that fire at `timing`
    pub fn apply_tile_effects(&mut self, player: PlayerId, timing: TileTiming) -> Result<()> {
        let due: Vec<(InstanceId, TileEffect)> = self
            .state
            .player(player)
            .board
            .tiles()
            .filter_map(|tile| tile.unit.as_ref().map(|u| (u.id, &tile.effects)))
            .flat_map(|(id, effects)| {
                effects
                    .iter()
                    .filter(|e| e.timing == timing && !e.is_expired())
                    .map(move |e| (id, *e))
            })
            .collect();
        for (id, effect) in due {
            self.apply_tile_effect(player, &effect, id)?;
        }
        Ok(())
    }

    fn apply_tile_effect(&mut self, player: PlayerId, effect: &TileEffect, occupant: InstanceId) -> Result<()> {
        let target = EntityRef::Unit(occupant);
        match effect.kind {
            TileEffectKind::DamageOccupant => {
                self.deal_damage(None, Some(player), target, effect.magnitude)?;
            }
            TileEffectKind::HealOccupant => self.heal(target, effect.magnitude)?,
            TileEffectKind::BuffOccupantAttack => self.emit(GameEvent::Buffed {
                instance: occupant,
                modifier: StatModifier::permanent(effect.magnitude, 0),
            })?,
            TileEffectKind::Fortify => self.emit(GameEvent::Buffed {
                instance: occupant,
                modifier: StatModifier::permanent(0, effect.magnitude),
            })?,
            TileEffectKind::Barrier => {
                if self.state.unit(occupant).is_some_and(|u| !u.has(Keyword::Barrier)) {
                    self.emit(GameEvent::BarrierGained { target })?;
                }
            }
        }
        Ok(())
    }

    // ---- effect kinds ----

    fn apply_definition(
        &mut self,
        def: &EffectDefinition,
        targets: &[ResolvedTarget],
        source: &EffectSource,
        ctx: &TriggerContext,
    ) -> Result<()> {
        let owner = source.owner;
        let cap = self.state.config.max_mana_cap;
        match &def.kind {
            EffectKind::Damage(amount) => {
                for target in targets {
                    if let Some(entity) = target.entity() {
                        let n = self.amount(*amount, Some(target), source, ctx);
                        self.deal_damage(Some(source.instance), Some(owner), entity, n)?;
                    }
                }
            }
            EffectKind::Heal(amount) => {
                for target in targets {
                    if let Some(entity) = target.entity() {
                        let n = self.amount(*amount, Some(target), source, ctx);
                        self.heal(entity, n)?;
                    }
                }
            }
            EffectKind::Draw(amount) => {
                let n = self.amount(*amount, None, source, ctx);
                for player in targets.iter().filter_map(ResolvedTarget::player) {
                    for _ in 0..n.max(0) {
                        self.draw_card(player)?;
                    }
                }
            }
            EffectKind::Discard { .. } => {
                for target in targets {
                    if let ResolvedTarget::HandCard { player, card } = *target {
                        if let Some((_, held)) = self.state.hand_card(card) {
                            let template = held.template;
                            self.emit(GameEvent::CardDiscarded { player, card, template })?;
                        }
                    }
                }
            }
            EffectKind::Summon { template, count } => {
                for player in targets.iter().filter_map(ResolvedTarget::player) {
                    for _ in 0..*count {
                        self.summon(player, *template)?;
                    }
                }
            }
            EffectKind::Buff {
                attack,
                health,
                duration,
            } => {
                for target in targets {
                    let Some(id) = target.unit() else { continue };
                    let a = self.amount(*attack, Some(target), source, ctx);
                    let h = self.amount(*health, Some(target), source, ctx);
                    if a == 0 && h == 0 {
                        continue;
                    }
                    let modifier = match duration {
                        StatDuration::Permanent => StatModifier::permanent(a, h),
                        StatDuration::Turns(n) => StatModifier::temporary(a, h, *n),
                    };
                    self.emit(GameEvent::Buffed { instance: id, modifier })?;
                }
            }
            EffectKind::Debuff { attack, health } => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    let Some(unit) = self.state.unit(id) else { continue };
                    let modifier = StatModifier::permanent(-(*attack).min(unit.attack), -*health);
                    self.emit(GameEvent::Buffed { instance: id, modifier })?;
                }
            }
            EffectKind::Destroy => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    self.destroy_unit(id)?;
                }
            }
            EffectKind::Vanish => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    if let Some(unit) = self.state.unit(id) {
                        let owner = unit.owner;
                        self.emit(GameEvent::Vanished { instance: id, owner })?;
                    }
                }
            }
            EffectKind::Silence => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    if self.state.unit(id).is_some_and(|u| !u.silenced) {
                        self.emit(GameEvent::Silenced { instance: id })?;
                    }
                }
            }
            EffectKind::GrantKeyword(keyword) => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    if self.state.unit(id).is_some_and(|u| !u.has(*keyword)) {
                        if *keyword == Keyword::Barrier {
                            self.emit(GameEvent::BarrierGained {
                                target: EntityRef::Unit(id),
                            })?;
                        } else {
                            self.emit(GameEvent::KeywordGained {
                                instance: id,
                                keyword: *keyword,
                            })?;
                        }
                    }
                }
            }
            EffectKind::AddToHand { template, count } => {
                for player in targets.iter().filter_map(ResolvedTarget::player) {
                    for _ in 0..*count {
                        self.add_to_hand(player, *template)?;
                    }
                }
            }
            EffectKind::CopyToHand => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    if let Some(template) = self.state.unit(id).map(|u| u.template) {
                        self.add_to_hand(owner, template)?;
                    }
                }
            }
            EffectKind::ReturnToHand => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    let Some(unit) = self.state.unit(id) else { continue };
                    let (unit_owner, template) = (unit.owner, unit.template);
                    if self.state.player(unit_owner).hand.len() >= self.state.config.hand_limit {
                        self.emit(GameEvent::Vanished {
                            instance: id,
                            owner: unit_owner,
                        })?;
                        self.emit(GameEvent::CardBurned {
                            player: unit_owner,
                            template,
                            from_deck: false,
                        })?;
                    } else {
                        self.emit(GameEvent::ReturnedToHand {
                            instance: id,
                            owner: unit_owner,
                            template,
                        })?;
                    }
                }
            }
            EffectKind::Transform { template } => {
                let catalog = self.catalog;
                let into_template = catalog.get(*template)?;
                if !into_template.occupies_tile() {
                    return Err(DuelError::InvalidCardDefinition(format!(
                        "cannot transform into {}",
                        into_template.name
                    )));
                }
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    let Some(unit) = self.state.unit(id) else { continue };
                    let new_id = self.state.instances.peek();
                    let mut into = RuntimeUnit::from_template(new_id, unit.owner, into_template, false);
                    into.summoning_sick = unit.summoning_sick;
                    into.attacked_this_turn = unit.attacked_this_turn;
                    self.emit(GameEvent::Transformed { instance: id, into })?;
                    self.arm_listeners(new_id)?;
                }
            }
            EffectKind::Evolve => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    if self.state.unit(id).is_some_and(|u| !u.evolved) {
                        self.evolve_unit(id, false)?;
                        self.raise_self(Trigger::OnEvolve, id, Some(source.instance), 0);
                    }
                }
            }
            EffectKind::ModifyCost { delta } => {
                for target in targets {
                    if let ResolvedTarget::HandCard { player, card } = *target {
                        self.emit(GameEvent::CostModified {
                            player,
                            card,
                            delta: *delta,
                        })?;
                    }
                }
            }
            EffectKind::ApplyTileEffect {
                kind,
                magnitude,
                duration,
                timing,
            } => {
                for target in targets {
                    if let ResolvedTarget::Tile { player, index } = *target {
                        self.emit(GameEvent::TileEffectApplied {
                            player,
                            tile: index,
                            effect: TileEffect {
                                source: source.template,
                                kind: *kind,
                                magnitude: *magnitude,
                                remaining_turns: *duration,
                                timing: *timing,
                            },
                        })?;
                    }
                }
            }
            EffectKind::ClearTileEffects => {
                for target in targets {
                    if let ResolvedTarget::Tile { player, index } = *target {
                        let has_effects = self
                            .state
                            .player(player)
                            .board
                            .tile(index)
                            .is_some_and(|t| !t.effects.is_empty());
                        if has_effects {
                            self.emit(GameEvent::TileEffectsCleared { player, tile: index })?;
                        }
                    }
                }
            }
            EffectKind::EqualizeHealth => {
                let (_, source_health) = self.source_entity(source);
                for target in targets.iter().filter_map(ResolvedTarget::entity) {
                    let health = match target {
                        EntityRef::Player(p) => source_health.min(self.state.player(p).max_health),
                        EntityRef::Unit(_) => source_health,
                    };
                    self.emit(GameEvent::HealthSet { target, health })?;
                }
            }
            EffectKind::SwapHealth => {
                for target in targets.iter().filter_map(ResolvedTarget::entity) {
                    let (source_entity, source_health) = self.source_entity(source);
                    if target == source_entity {
                        continue;
                    }
                    let Some(target_health) = self.entity_health(target) else { continue };
                    let to_target = self.clamp_leader(target, source_health);
                    let to_source = self.clamp_leader(source_entity, target_health);
                    self.emit(GameEvent::HealthSet {
                        target,
                        health: to_target,
                    })?;
                    self.emit(GameEvent::HealthSet {
                        target: source_entity,
                        health: to_source,
                    })?;
                }
            }
            EffectKind::ShuffleAndDraw { draw } => {
                for player in targets.iter().filter_map(ResolvedTarget::player) {
                    self.emit(GameEvent::HandShuffledIntoDeck { player })?;
                    self.shuffle_deck(player)?;
                    for _ in 0..*draw {
                        self.draw_card(player)?;
                    }
                }
            }
            EffectKind::GainMana(n) => {
                for player in targets.iter().filter_map(ResolvedTarget::player) {
                    let state = self.state.player(player);
                    let current = (state.mana as i32 + n).clamp(0, cap as i32) as u8;
                    let max = state.max_mana;
                    self.emit(GameEvent::ManaChanged { player, current, max })?;
                }
            }
            EffectKind::GainMaxMana(n) => {
                for player in targets.iter().filter_map(ResolvedTarget::player) {
                    let state = self.state.player(player);
                    let max = (state.max_mana as i32 + n).clamp(0, cap as i32) as u8;
                    let current = state.mana.min(max);
                    self.emit(GameEvent::ManaChanged { player, current, max })?;
                }
            }
            EffectKind::GainEvolutionPoint(n) => {
                for player in targets.iter().filter_map(ResolvedTarget::player) {
                    let points = self.state.player(player).evolution_points.saturating_add(*n);
                    self.emit(GameEvent::EvolutionPointsChanged { player, points })?;
                }
            }
            EffectKind::GrantBarrier => {
                for target in targets.iter().filter_map(ResolvedTarget::entity) {
                    let already = match target {
                        EntityRef::Unit(id) => self.state.unit(id).map(|u| u.has(Keyword::Barrier)),
                        EntityRef::Player(p) => Some(self.state.player(p).barrier),
                    };
                    if already == Some(false) {
                        self.emit(GameEvent::BarrierGained { target })?;
                    }
                }
            }
            EffectKind::ReduceCountdown(n) => {
                for id in targets.iter().filter_map(ResolvedTarget::unit) {
                    let Some(current) = self.state.unit(id).and_then(|u| u.countdown) else {
                        continue;
                    };
                    let remaining = current.saturating_sub(*n);
                    self.emit(GameEvent::CountdownChanged { instance: id, remaining })?;
                    if remaining == 0 {
                        self.destroy_unit(id)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The source unit if it is on the board, otherwise its owner's leader
    fn source_entity(&self, source: &EffectSource) -> (EntityRef, i32) {
        match self.state.unit(source.instance) {
            Some(unit) => (EntityRef::Unit(unit.id), unit.health),
            None => (
                EntityRef::Player(source.owner),
                self.state.player(source.owner).health,
            ),
        }
    }

    fn entity_health(&self, entity: EntityRef) -> Option<i32> {
        match entity {
            EntityRef::Unit(id) => self.state.unit(id).map(|u| u.health),
            EntityRef::Player(p) => Some(self.state.player(p).health),
        }
    }

    fn clamp_leader(&self, entity: EntityRef, health: i32) -> i32 {
        match entity {
            EntityRef::Player(p) => health.min(self.state.player(p).max_health),
            EntityRef::Unit(_) => health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Condition, Counter, TargetSpec};
    use crate::game::MatchConfig;
    use crate::loader::CardDatabase;

    const DRAW_BUFF: TemplateId = TemplateId::new(1);
    const FILLER: TemplateId = TemplateId::new(2);
    const PINGER: TemplateId = TemplateId::new(3);
    const LAST_WORDS: TemplateId = TemplateId::new(4);
    const BANISH: TemplateId = TemplateId::new(5);

    fn catalog() -> CardDatabase {
        let mut db = CardDatabase::new();
        db.insert(
            CardTemplate::minion(DRAW_BUFF, "Bookworm", 2, 1, 1)
                .with_effect(
                    EffectDefinition::new(Trigger::OnPlay, TargetSpec::Owner, EffectKind::Draw(Amount::Fixed(1)))
                        .unwrap(),
                )
                .with_effect(
                    EffectDefinition::new(
                        Trigger::OnDraw,
                        TargetSpec::SelfUnit,
                        EffectKind::Buff {
                            attack: Amount::Fixed(1),
                            health: Amount::Fixed(1),
                            duration: StatDuration::Permanent,
                        },
                    )
                    .unwrap(),
                ),
        )
        .unwrap();
        db.insert(CardTemplate::minion(FILLER, "Filler", 1, 1, 1)).unwrap();
        db.insert(
            CardTemplate::spell(PINGER, "Ping", 1).with_effect(
                EffectDefinition::new(
                    Trigger::OnPlay,
                    TargetSpec::AllEnemies,
                    EffectKind::Damage(Amount::Fixed(1)),
                )
                .unwrap(),
            ),
        )
        .unwrap();
        db.insert(
            CardTemplate::minion(LAST_WORDS, "Martyr", 2, 1, 1).with_effect(
                EffectDefinition::new(Trigger::OnDestroy, TargetSpec::Opponent, EffectKind::Damage(Amount::Fixed(2)))
                    .unwrap()
                    .when(Condition::at_least(Counter::TurnNumber, 0)),
            ),
        )
        .unwrap();
        db.insert(
            CardTemplate::spell(BANISH, "Banish", 4).with_effect(
                EffectDefinition::new(Trigger::OnPlay, TargetSpec::AllEnemies, EffectKind::Vanish).unwrap(),
            ),
        )
        .unwrap();
        db
    }

    fn state() -> MatchState {
        let deck = vec![FILLER; 10];
        let mut state = MatchState::new(MatchConfig::default(), 5, PlayerId::FIRST, [deck.clone(), deck]);
        state.phase = Phase::Main;
        state
    }

    fn put(r: &mut Resolver<'_>, owner: PlayerId, template: TemplateId) -> InstanceId {
        r.summon(owner, template).unwrap().unwrap()
    }

    #[test]
    fn test_listener_armed_after_on_play_ignores_own_draw() {
        let db = catalog();
        let mut state = state();
        let mut r = Resolver::new(&mut state, &db);

        let id = r.state.instances.peek();
        let unit = RuntimeUnit::from_template(id, PlayerId::FIRST, db.get(DRAW_BUFF).unwrap(), false);
        r.place_unit(PlayerId::FIRST, 0, unit).unwrap();
        let source = EffectSource::of_unit(r.state().unit(id).unwrap());
        r.resolve_now(source, TriggerContext::new(Trigger::OnPlay)).unwrap();
        r.arm_listeners(id).unwrap();
        r.run_queue().unwrap();
        assert_eq!(r.state().unit(id).unwrap().attack, 1);

        r.draw_card(PlayerId::FIRST).unwrap();
        r.run_queue().unwrap();
        assert_eq!(r.state().unit(id).unwrap().attack, 2);
    }

    #[test]
    fn test_destroy_fires_last_words_and_counts() {
        let db = catalog();
        let mut state = state();
        let mut r = Resolver::new(&mut state, &db);
        let martyr = put(&mut r, PlayerId::SECOND, LAST_WORDS);

        let card = HandCard::new(InstanceId::new(50), PINGER);
        let source = EffectSource::of_card(PlayerId::FIRST, &card, db.get(PINGER).unwrap(), false);
        r.resolve_now(source, TriggerContext::new(Trigger::OnPlay)).unwrap();
        r.run_queue().unwrap();

        assert!(r.state().unit(martyr).is_none());
        assert_eq!(r.destroyed_count(), 1);
        assert_eq!(r.state().player(PlayerId::FIRST).health, 28);
        let events = r.finish();
        assert!(events.iter().any(|e| matches!(e, GameEvent::Destroyed { instance, .. } if *instance == martyr)));
    }

    #[test]
    fn test_barrier_absorbs_one_hit() {
        let db = catalog();
        let mut state = state();
        let mut r = Resolver::new(&mut state, &db);
        let id = put(&mut r, PlayerId::SECOND, FILLER);
        r.emit(GameEvent::BarrierGained {
            target: EntityRef::Unit(id),
        })
        .unwrap();

        assert_eq!(r.deal_damage(None, None, EntityRef::Unit(id), 100).unwrap(), 0);
        assert_eq!(r.state().unit(id).unwrap().health, 1);
        assert_eq!(r.deal_damage(None, None, EntityRef::Unit(id), 1).unwrap(), 1);
    }

    #[test]
    fn test_fatigue_escalates() {
        let db = catalog();
        let mut state = MatchState::new(MatchConfig::default(), 5, PlayerId::FIRST, [Vec::new(), Vec::new()]);
        let mut r = Resolver::new(&mut state, &db);
        r.draw_card(PlayerId::FIRST).unwrap();
        r.draw_card(PlayerId::FIRST).unwrap();
        let player = r.state().player(PlayerId::FIRST);
        assert_eq!(player.fatigue, 2);
        assert_eq!(player.health, 27);
        assert!(player.hand.is_empty());
    }

    #[test]
    fn test_vanish_skips_last_words_and_graveyard() {
        let db = catalog();
        let mut state = state();
        let mut r = Resolver::new(&mut state, &db);
        let martyr = put(&mut r, PlayerId::SECOND, LAST_WORDS);

        let card = HandCard::new(InstanceId::new(50), BANISH);
        let source = EffectSource::of_card(PlayerId::FIRST, &card, db.get(BANISH).unwrap(), false);
        r.resolve_now(source, TriggerContext::new(Trigger::OnPlay)).unwrap();
        r.settle().unwrap();

        assert!(r.state().unit(martyr).is_none());
        assert_eq!(r.destroyed_count(), 0);
        assert!(r.state().player(PlayerId::SECOND).graveyard.is_empty());
        assert_eq!(r.state().player(PlayerId::FIRST).health, 30);
        let events = r.finish();
        assert!(events.contains(&GameEvent::Vanished {
            instance: martyr,
            owner: PlayerId::SECOND,
        }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, GameEvent::Destroyed { .. } | GameEvent::Damage { .. })));
    }

    #[test]
    fn test_draw_into_full_hand_burns_top_card() {
        let db = catalog();
        let mut state = state();
        let limit = state.config.hand_limit;
        for _ in 0..limit {
            let id = state.instances.allocate();
            state.player_mut(PlayerId::FIRST).hand.push(HandCard::new(id, DRAW_BUFF));
        }
        let mut r = Resolver::new(&mut state, &db);
        r.draw_card(PlayerId::FIRST).unwrap();

        let me = r.state().player(PlayerId::FIRST);
        assert_eq!(me.hand.len(), limit);
        assert_eq!(me.deck.len(), 9);
        assert_eq!(me.graveyard.cards(), &[FILLER]);
        assert_eq!(
            r.finish(),
            vec![GameEvent::CardBurned {
                player: PlayerId::FIRST,
                template: FILLER,
                from_deck: true,
            }]
        );
    }

    #[test]
    fn test_cascade_limit_is_invariant() {
        let db = catalog();
        let mut state = state();
        state.config.max_trigger_depth = 1;
        let mut r = Resolver::new(&mut state, &db);
        let card = HandCard::new(InstanceId::new(50), PINGER);
        let source = EffectSource::of_card(PlayerId::FIRST, &card, db.get(PINGER).unwrap(), false);
        r.resolve_now(source, TriggerContext::new(Trigger::OnPlay)).unwrap();
        let err = r.resolve_now(source, TriggerContext::new(Trigger::OnPlay)).unwrap_err();
        assert!(matches!(err, DuelError::Invariant(_)));
    }
}
