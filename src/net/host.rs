//! Authoritative host session
//!
//! The host seats two peers, checks their decks, starts the match once both
//! are ready and from then on is the only writer of match state. Every
//! action is validated and resolved by [`Match::submit`]; the sender gets an
//! `ActionResult` and the other peer the same records as `Events`.

use crate::core::{PlayerId, TemplateId};
use crate::error::{ProtocolError, RejectReason};
use crate::game::{Clock, EventRecord, GameOverReason, Match, MatchConfig, MatchSnapshot, PlayerAction, SystemClock};
use crate::loader::{deck_issues, CardCatalog, DeckList, DeckRules};
use crate::net::message::{decode, NetMessage, Outbox};
use crate::net::transport::{InboundQueue, NetworkService, PeerId, TransportEvent};
use crate::net::ConnectionState;
use crate::{DuelError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Host-side settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub match_config: MatchConfig,
    pub deck_rules: DeckRules,
    pub seed: u64,
    pub first_player: PlayerId,
    /// Accepted actions between two state syncs; 0 disables periodic syncs
    pub sync_every_actions: u32,
    /// Silence after which a peer counts as disconnected
    pub heartbeat_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            match_config: MatchConfig::default(),
            deck_rules: DeckRules::default(),
            seed: 0,
            first_player: PlayerId::FIRST,
            sync_every_actions: 8,
            heartbeat_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone)]
struct Seat {
    peer: PeerId,
    name: String,
    state: ConnectionState,
    deck: Option<Vec<TemplateId>>,
    last_seen_ms: u64,
    last_seq: u64,
}

pub struct HostSession<N: NetworkService> {
    net: N,
    config: HostConfig,
    catalog: Arc<dyn CardCatalog>,
    clock: Arc<dyn Clock>,
    outbox: Outbox,
    seats: [Option<Seat>; 2],
    game: Option<Match>,
    actions_since_sync: u32,
}

impl<N: NetworkService> HostSession<N> {
    pub fn new(net: N, config: HostConfig, catalog: Arc<dyn CardCatalog>) -> Self {
        HostSession {
            net,
            config,
            catalog,
            clock: Arc::new(SystemClock),
            outbox: Outbox::default(),
            seats: [None, None],
            game: None,
            actions_since_sync: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn game(&self) -> Option<&Match> {
        self.game.as_ref()
    }

    pub fn seat_state(&self, seat: PlayerId) -> ConnectionState {
        self.seats[seat.index()]
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn seat_of(&self, peer: PeerId) -> Option<PlayerId> {
        PlayerId::both()
            .into_iter()
            .find(|p| self.seats[p.index()].as_ref().is_some_and(|s| s.peer == peer))
    }

    pub fn is_finished(&self) -> bool {
        self.game.as_ref().is_some_and(|g| g.is_over())
    }

    /// Process one transport event
    ///
    /// Malformed or unexpected payloads are logged and dropped. An action the
    /// engine fails to resolve aborts the match instead of the session.
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        let now = self.clock.now_ms();
        match event {
            TransportEvent::Connected(peer) => {
                debug!(peer, "transport connected");
                Ok(())
            }
            TransportEvent::Disconnected(peer) => self.on_disconnect(peer),
            TransportEvent::Message { peer, payload } => {
                let envelope = match decode(&payload) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(peer, %err, "dropping malformed payload");
                        return Ok(());
                    }
                };
                if let Some(seat) = self.seat_of(peer) {
                    if let Some(s) = self.seats[seat.index()].as_mut() {
                        if envelope.seq <= s.last_seq {
                            warn!(peer, seq = envelope.seq, "dropping replayed message");
                            return Ok(());
                        }
                        s.last_seq = envelope.seq;
                        s.last_seen_ms = now;
                    }
                }
                match self.on_message(peer, envelope.message, now) {
                    Err(DuelError::Protocol(err)) => {
                        warn!(peer, %err, "ignoring message");
                        Ok(())
                    }
                    other => other,
                }
            }
        }
    }

    /// Time-driven work: heartbeat timeouts
    pub fn tick(&mut self) -> Result<()> {
        let now = self.clock.now_ms();
        let timeout = self.config.heartbeat_timeout_ms;
        let silent: Vec<PeerId> = self
            .seats
            .iter()
            .flatten()
            .filter(|s| {
                !matches!(s.state, ConnectionState::GameOver | ConnectionState::Disconnected)
                    && now.saturating_sub(s.last_seen_ms) > timeout
            })
            .map(|s| s.peer)
            .collect();
        for peer in silent {
            warn!(peer, timeout_ms = timeout, "heartbeat timed out");
            self.net.disconnect(peer)?;
            self.on_disconnect(peer)?;
        }
        Ok(())
    }

    /// Drive the session from an inbound queue until the match ends or the
    /// transport goes away
    pub async fn serve(mut self, mut inbound: InboundQueue, tick_every: Duration) -> Result<Option<MatchSnapshot>> {
        let mut ticker = tokio::time::interval(tick_every);
        loop {
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(event) => self.handle_event(event)?,
                    None => break,
                },
                _ = ticker.tick() => self.tick()?,
            }
            if self.is_finished() {
                break;
            }
        }
        self.game.as_ref().map(|g| g.snapshot()).transpose()
    }

    fn send(&mut self, peer: PeerId, message: NetMessage) -> Result<()> {
        let payload = self.outbox.wrap(message)?;
        if let Err(err) = self.net.send(peer, payload) {
            warn!(peer, %err, "send failed");
        }
        Ok(())
    }

    fn send_seat(&mut self, seat: PlayerId, message: NetMessage) -> Result<()> {
        match self.seats[seat.index()].as_ref().map(|s| s.peer) {
            Some(peer) => self.send(peer, message),
            None => Ok(()),
        }
    }

    fn on_message(&mut self, peer: PeerId, message: NetMessage, now: u64) -> Result<()> {
        let name = message.name();
        if let NetMessage::Connect { name } = message {
            return self.on_connect(peer, name, now);
        }
        let Some(seat) = self.seat_of(peer) else {
            return Err(ProtocolError::UnknownPeer(peer).into());
        };
        match message {
            NetMessage::DeckSubmit { deck } => self.on_deck(seat, deck),
            NetMessage::Ready => self.on_ready(seat),
            NetMessage::Action { request_id, action } => self.on_action(seat, request_id, action),
            NetMessage::Surrender => self.on_action(seat, 0, PlayerAction::Surrender),
            NetMessage::ResyncRequest => {
                let snapshot = self.snapshot()?;
                info!(%seat, "resync requested");
                self.send(peer, NetMessage::StateSync { snapshot })
            }
            NetMessage::Ping { nonce, sent_ms } => self.send(peer, NetMessage::Pong { nonce, sent_ms }),
            NetMessage::Pong { .. } => Ok(()),
            _ => Err(ProtocolError::UnexpectedMessage(name.to_string()).into()),
        }
    }

    fn on_connect(&mut self, peer: PeerId, name: String, now: u64) -> Result<()> {
        if self.seat_of(peer).is_some() {
            return Err(ProtocolError::UnexpectedMessage("Connect".to_string()).into());
        }
        let free = if self.game.is_none() {
            PlayerId::both().into_iter().find(|p| self.seats[p.index()].is_none())
        } else {
            None
        };
        let Some(seat) = free else {
            return self.send(
                peer,
                NetMessage::Refused {
                    reason: "no free seat".to_string(),
                },
            );
        };
        info!(peer, %seat, %name, "peer seated");
        self.seats[seat.index()] = Some(Seat {
            peer,
            name,
            state: ConnectionState::Connected,
            deck: None,
            last_seen_ms: now,
            last_seq: 0,
        });
        self.send(peer, NetMessage::Accept { seat })
    }

    fn on_deck(&mut self, seat: PlayerId, deck: DeckList) -> Result<()> {
        if self.seat_state(seat) != ConnectionState::Connected {
            return Err(ProtocolError::UnexpectedMessage("DeckSubmit".to_string()).into());
        }
        let issues = deck_issues(&deck, self.catalog.as_ref(), &self.config.deck_rules);
        let accepted = issues.is_empty();
        if let Some(s) = self.seats[seat.index()].as_mut() {
            s.deck = accepted.then(|| deck.expand());
        }
        debug!(%seat, accepted, issues = issues.len(), "deck checked");
        self.send_seat(seat, NetMessage::DeckResult { accepted, issues })
    }

    fn on_ready(&mut self, seat: PlayerId) -> Result<()> {
        let Some(s) = self.seats[seat.index()].as_mut() else {
            return Ok(());
        };
        if s.state != ConnectionState::Connected || s.deck.is_none() {
            return Err(ProtocolError::UnexpectedMessage("Ready".to_string()).into());
        }
        s.state = ConnectionState::Ready;
        let all_ready = self
            .seats
            .iter()
            .all(|s| s.as_ref().is_some_and(|s| s.state == ConnectionState::Ready));
        if all_ready {
            self.start_match()?;
        }
        Ok(())
    }

    fn start_match(&mut self) -> Result<()> {
        let decks = [
            self.seats[0].as_ref().and_then(|s| s.deck.clone()).unwrap_or_default(),
            self.seats[1].as_ref().and_then(|s| s.deck.clone()).unwrap_or_default(),
        ];
        let mut game = Match::new(
            self.config.match_config.clone(),
            Arc::clone(&self.catalog),
            decks,
            self.config.seed,
            self.config.first_player,
        )
        .with_clock(Arc::clone(&self.clock));
        game.logger_mut().set_verbosity(crate::game::VerbosityLevel::Silent);
        game.start()?;
        let snapshot = game.snapshot()?;
        self.game = Some(game);
        for seat in self.seats.iter_mut().flatten() {
            seat.state = ConnectionState::InMatch;
        }
        info!(seed = self.config.seed, "match started");
        let start = NetMessage::GameStart {
            seed: self.config.seed,
            first_player: self.config.first_player,
            snapshot,
        };
        for seat in PlayerId::both() {
            self.send_seat(seat, start.clone())?;
        }
        Ok(())
    }

    fn on_action(&mut self, seat: PlayerId, request_id: u64, action: PlayerAction) -> Result<()> {
        let Some(game) = self.game.as_mut() else {
            return Err(ProtocolError::UnexpectedMessage("Action".to_string()).into());
        };
        let outcome = if game.is_over() {
            Err(DuelError::Rejected(RejectReason::GameOver))
        } else {
            game.submit(seat, &action)
        };
        match outcome {
            Ok(records) => {
                self.send_seat(
                    seat,
                    NetMessage::ActionResult {
                        request_id,
                        success: true,
                        reason: None,
                        events: records.clone(),
                    },
                )?;
                self.send_seat(seat.opponent(), NetMessage::Events { events: records })?;
                self.after_commit()
            }
            Err(DuelError::Rejected(reason)) => {
                debug!(%seat, %reason, "action rejected");
                self.send_seat(
                    seat,
                    NetMessage::ActionResult {
                        request_id,
                        success: false,
                        reason: Some(reason),
                        events: Vec::new(),
                    },
                )
            }
            Err(err) => self.abort_match(seat, request_id, err),
        }
    }

    /// Answer the proposer and end the match without a winner after the
    /// engine failed to resolve an action. The failed action left the state
    /// untouched.
    fn abort_match(&mut self, seat: PlayerId, request_id: u64, err: DuelError) -> Result<()> {
        error!(%seat, request_id, %err, "engine failure, aborting match");
        self.send_seat(
            seat,
            NetMessage::ActionResult {
                request_id,
                success: false,
                reason: None,
                events: Vec::new(),
            },
        )?;
        let Some(game) = self.game.as_mut() else {
            return Err(err);
        };
        let records = game.force_game_over(None, GameOverReason::Aborted)?;
        for seat in PlayerId::both() {
            self.send_seat(
                seat,
                NetMessage::Events {
                    events: records.clone(),
                },
            )?;
        }
        self.after_commit()
    }

    fn after_commit(&mut self) -> Result<()> {
        if self.is_finished() {
            for seat in self.seats.iter_mut().flatten() {
                seat.state = ConnectionState::GameOver;
            }
            info!("match over");
            return self.push_sync();
        }
        self.actions_since_sync += 1;
        let every = self.config.sync_every_actions;
        if every > 0 && self.actions_since_sync >= every {
            self.push_sync()?;
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<MatchSnapshot> {
        match &self.game {
            Some(game) => game.snapshot(),
            None => Err(ProtocolError::UnexpectedMessage("no match running".to_string()).into()),
        }
    }

    /// Send a full snapshot to every seated peer
    pub fn push_sync(&mut self) -> Result<()> {
        let snapshot = self.snapshot()?;
        self.actions_since_sync = 0;
        for seat in PlayerId::both() {
            self.send_seat(
                seat,
                NetMessage::StateSync {
                    snapshot: snapshot.clone(),
                },
            )?;
        }
        Ok(())
    }

    fn on_disconnect(&mut self, peer: PeerId) -> Result<()> {
        let Some(seat) = self.seat_of(peer) else {
            return Ok(());
        };
        warn!(peer, %seat, "peer disconnected");
        match self.game.as_mut() {
            None => {
                self.seats[seat.index()] = None;
                Ok(())
            }
            Some(game) => {
                if let Some(s) = self.seats[seat.index()].as_mut() {
                    s.state = ConnectionState::Disconnected;
                }
                let records: Vec<EventRecord> =
                    game.force_game_over(Some(seat.opponent()), GameOverReason::Disconnected)?;
                if !records.is_empty() {
                    self.send_seat(seat.opponent(), NetMessage::Events { events: records })?;
                }
                if let Some(s) = self.seats[seat.opponent().index()].as_mut() {
                    s.state = ConnectionState::GameOver;
                }
                Ok(())
            }
        }
    }
}

impl<N: NetworkService> std::fmt::Debug for HostSession<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let seats: Vec<(String, ConnectionState)> = self
            .seats
            .iter()
            .flatten()
            .map(|s| (s.name.clone(), s.state))
            .collect();
        f.debug_struct("HostSession")
            .field("seats", &seats)
            .field("game", &self.game)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HandCard;
    use crate::game::{GameEvent, ManualClock};
    use crate::loader::starter::GOBLIN;
    use crate::loader::{starter_catalog, starter_deck_list};
    use crate::zones::Hand;
    use crate::net::message::{encode, Envelope};
    use crate::net::transport::{LoopbackHub, LoopbackNetwork, HOST_PEER};

    struct Peer {
        id: PeerId,
        net: LoopbackNetwork,
        queue: InboundQueue,
        seq: u64,
    }

    impl Peer {
        fn send(&mut self, message: NetMessage) {
            self.seq += 1;
            let bytes = encode(&Envelope::new(self.seq, message)).unwrap();
            self.net.send(HOST_PEER, bytes).unwrap();
        }

        fn received(&mut self) -> Vec<NetMessage> {
            self.queue
                .drain()
                .into_iter()
                .filter_map(|e| match e {
                    TransportEvent::Message { payload, .. } => Some(decode(&payload).unwrap().message),
                    _ => None,
                })
                .collect()
        }
    }

    fn setup() -> (HostSession<LoopbackNetwork>, InboundQueue, LoopbackHub, Arc<ManualClock>) {
        let hub = LoopbackHub::new();
        let (net, queue) = hub.host().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let host = HostSession::new(net, HostConfig::default(), Arc::new(starter_catalog())).with_clock(clock.clone());
        (host, queue, hub, clock)
    }

    fn pump(host: &mut HostSession<LoopbackNetwork>, queue: &mut InboundQueue) {
        for event in queue.drain() {
            host.handle_event(event).unwrap();
        }
    }

    fn join(hub: &LoopbackHub, name: &str) -> Peer {
        let (id, net, queue) = hub.connect().unwrap();
        let mut peer = Peer { id, net, queue, seq: 0 };
        peer.send(NetMessage::Connect { name: name.to_string() });
        peer
    }

    #[test]
    fn test_seating_and_refusal() {
        let (mut host, mut queue, hub, _) = setup();
        let mut a = join(&hub, "a");
        let mut b = join(&hub, "b");
        let mut c = join(&hub, "c");
        pump(&mut host, &mut queue);
        assert_eq!(a.received(), vec![NetMessage::Accept { seat: PlayerId::FIRST }]);
        assert_eq!(b.received(), vec![NetMessage::Accept { seat: PlayerId::SECOND }]);
        assert!(matches!(c.received()[..], [NetMessage::Refused { .. }]));
        assert_eq!(host.seat_state(PlayerId::FIRST), ConnectionState::Connected);
    }

    #[test]
    fn test_bad_deck_is_reported() {
        let (mut host, mut queue, hub, _) = setup();
        let mut a = join(&hub, "a");
        let mut deck = starter_deck_list();
        deck.entries.pop();
        a.send(NetMessage::DeckSubmit { deck });
        a.send(NetMessage::Ready);
        pump(&mut host, &mut queue);
        let received = a.received();
        assert!(matches!(received[1], NetMessage::DeckResult { accepted: false, .. }));
        assert_eq!(host.seat_state(PlayerId::FIRST), ConnectionState::Connected);
    }

    #[test]
    fn test_full_start_and_rejection() {
        let (mut host, mut queue, hub, _) = setup();
        let mut a = join(&hub, "a");
        let mut b = join(&hub, "b");
        for p in [&mut a, &mut b] {
            p.send(NetMessage::DeckSubmit {
                deck: starter_deck_list(),
            });
            p.send(NetMessage::Ready);
        }
        pump(&mut host, &mut queue);
        assert!(host.game().is_some());
        assert_eq!(host.seat_state(PlayerId::SECOND), ConnectionState::InMatch);
        assert!(a.received().iter().any(|m| matches!(m, NetMessage::GameStart { .. })));
        b.received();

        // mulligan is still open, so ending the turn is rejected
        a.send(NetMessage::Action {
            request_id: 1,
            action: PlayerAction::EndTurn,
        });
        pump(&mut host, &mut queue);
        assert_eq!(
            a.received(),
            vec![NetMessage::ActionResult {
                request_id: 1,
                success: false,
                reason: Some(RejectReason::WrongPhase),
                events: Vec::new(),
            }]
        );
        assert!(b.received().is_empty());

        a.send(NetMessage::Action {
            request_id: 2,
            action: PlayerAction::Mulligan { replace: Vec::new() },
        });
        pump(&mut host, &mut queue);
        assert!(matches!(a.received()[..], [NetMessage::ActionResult { success: true, .. }]));
        assert!(matches!(b.received()[..], [NetMessage::Events { .. }]));
    }

    #[test]
    fn test_engine_failure_aborts_match() {
        let (mut host, mut queue, hub, _) = setup();
        let mut a = join(&hub, "a");
        let mut b = join(&hub, "b");
        for p in [&mut a, &mut b] {
            p.send(NetMessage::DeckSubmit {
                deck: starter_deck_list(),
            });
            p.send(NetMessage::Ready);
        }
        pump(&mut host, &mut queue);
        for (i, p) in [&mut a, &mut b].into_iter().enumerate() {
            p.send(NetMessage::Action {
                request_id: i as u64 + 1,
                action: PlayerAction::Mulligan { replace: Vec::new() },
            });
        }
        pump(&mut host, &mut queue);
        a.received();
        b.received();

        // no trigger dispatch budget at all: any play fails inside the engine
        let snapshot = host.game().unwrap().snapshot().unwrap();
        let mut state = snapshot.state.clone();
        state.config.max_trigger_depth = 0;
        let goblin = HandCard::new(state.instances.allocate(), GOBLIN);
        let me = state.player_mut(PlayerId::FIRST);
        me.mana = 10;
        me.hand = Hand::new();
        me.hand.push(goblin);
        let rigged = MatchSnapshot::capture(&state, snapshot.last_event_id).unwrap();
        let mut game = Match::from_snapshot(&rigged, Arc::new(starter_catalog())).unwrap();
        game.logger_mut().set_verbosity(crate::game::VerbosityLevel::Silent);
        host.game = Some(game);
        let before = host.game().unwrap().log().last_id();

        a.send(NetMessage::Action {
            request_id: 7,
            action: PlayerAction::play(0),
        });
        pump(&mut host, &mut queue);

        assert!(host.is_finished());
        let game = host.game().unwrap();
        let outcome = game.state().outcome.unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.reason, GameOverReason::Aborted);
        // the failed play committed nothing
        assert_eq!(game.state().player(PlayerId::FIRST).hand.len(), 1);
        let tail: Vec<&GameEvent> = game
            .log()
            .records()
            .iter()
            .filter(|r| r.id > before)
            .map(|r| &r.event)
            .collect();
        assert!(matches!(tail[..], [GameEvent::GameOver { winner: None, .. }]));
        assert_eq!(host.seat_state(PlayerId::FIRST), ConnectionState::GameOver);
        assert_eq!(host.seat_state(PlayerId::SECOND), ConnectionState::GameOver);

        let to_a = a.received();
        assert_eq!(
            to_a[0],
            NetMessage::ActionResult {
                request_id: 7,
                success: false,
                reason: None,
                events: Vec::new(),
            }
        );
        for received in [to_a, b.received()] {
            assert!(received.iter().any(|m| matches!(m, NetMessage::Events { .. })));
            assert!(received.iter().any(|m| matches!(m, NetMessage::StateSync { .. })));
        }
    }

    #[test]
    fn test_malformed_payload_keeps_connection() {
        let (mut host, mut queue, hub, _) = setup();
        let mut a = join(&hub, "a");
        pump(&mut host, &mut queue);
        a.received();
        a.net.send(HOST_PEER, b"garbage".to_vec()).unwrap();
        a.send(NetMessage::Ping { nonce: 5, sent_ms: 10 });
        pump(&mut host, &mut queue);
        assert_eq!(a.received(), vec![NetMessage::Pong { nonce: 5, sent_ms: 10 }]);
        assert_eq!(host.seat_state(PlayerId::FIRST), ConnectionState::Connected);
    }

    #[test]
    fn test_heartbeat_timeout_ends_match() {
        let (mut host, mut queue, hub, clock) = setup();
        let mut a = join(&hub, "a");
        let mut b = join(&hub, "b");
        for p in [&mut a, &mut b] {
            p.send(NetMessage::DeckSubmit {
                deck: starter_deck_list(),
            });
            p.send(NetMessage::Ready);
        }
        pump(&mut host, &mut queue);
        b.received();

        clock.advance(10_000);
        b.send(NetMessage::Ping { nonce: 1, sent_ms: 0 });
        pump(&mut host, &mut queue);
        clock.advance(6_000);
        host.tick().unwrap();
        pump(&mut host, &mut queue);

        assert!(host.is_finished());
        let outcome = host.game().unwrap().state().outcome.unwrap();
        assert_eq!(outcome.winner, Some(PlayerId::SECOND));
        assert_eq!(outcome.reason, GameOverReason::Disconnected);
        assert_eq!(host.seat_state(PlayerId::SECOND), ConnectionState::GameOver);
        assert!(b
            .received()
            .iter()
            .any(|m| matches!(m, NetMessage::Events { .. })));
        assert_eq!(host.seat_of(a.id), Some(PlayerId::FIRST));
    }
}
