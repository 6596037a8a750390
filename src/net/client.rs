//! Client session
//!
//! A client never resolves actions itself. It proposes one action at a time
//! and blocks further input until the host answers, while still applying
//! every event batch the host sends. Its [`Replica`] is checked against each
//! `StateSync`; a checksum mismatch is reported and the replica is replaced
//! by the host's snapshot.

use crate::core::PlayerId;
use crate::error::{ProtocolError, RejectReason};
use crate::game::{
    legal_actions, Clock, EventRecord, GameOverReason, MatchSnapshot, MatchState, Phase, PlayerAction,
    PlayerController, Replica, SystemClock,
};
use crate::loader::{CardCatalog, DeckIssue, DeckList};
use crate::net::message::{decode, NetMessage, Outbox};
use crate::net::transport::{InboundQueue, NetworkService, TransportEvent, HOST_PEER};
use crate::net::ConnectionState;
use crate::{DuelError, Result};
use tracing::{debug, warn};

/// Whether the local replica is known to agree with the host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    InSync,
    /// The last state sync disagreed with the replica
    Desynced { local: String, host: String },
    /// Waiting for a snapshot after a gap in the event stream
    Resyncing,
}

/// What happened as a result of one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Seated { seat: PlayerId },
    Refused { reason: String },
    DeckChecked { accepted: bool, issues: Vec<DeckIssue> },
    MatchStarted { seat: PlayerId, first_player: PlayerId },
    ActionAccepted { request_id: u64 },
    ActionRejected { request_id: u64, reason: Option<RejectReason> },
    EventsApplied { count: usize },
    DesyncDetected { local: String, host: String },
    Resynced { last_event_id: u64 },
    GameOver { winner: Option<PlayerId>, reason: GameOverReason },
    Pong { rtt_ms: u64 },
    Disconnected,
}

pub struct ClientSession<N: NetworkService> {
    net: N,
    outbox: Outbox,
    state: ConnectionState,
    seat: Option<PlayerId>,
    replica: Option<Replica>,
    awaiting: Option<u64>,
    next_request: u64,
    sync: SyncStatus,
    desyncs: u32,
    next_nonce: u64,
}

impl<N: NetworkService> ClientSession<N> {
    pub fn new(net: N) -> Self {
        ClientSession {
            net,
            outbox: Outbox::default(),
            state: ConnectionState::Disconnected,
            seat: None,
            replica: None,
            awaiting: None,
            next_request: 0,
            sync: SyncStatus::InSync,
            desyncs: 0,
            next_nonce: 0,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn seat(&self) -> Option<PlayerId> {
        self.seat
    }

    pub fn match_state(&self) -> Option<&MatchState> {
        self.replica.as_ref().map(|r| r.state())
    }

    pub fn replica(&self) -> Option<&Replica> {
        self.replica.as_ref()
    }

    pub fn sync_status(&self) -> &SyncStatus {
        &self.sync
    }

    /// Number of checksum mismatches seen so far
    pub fn desync_count(&self) -> u32 {
        self.desyncs
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting.is_some()
    }

    fn send(&mut self, message: NetMessage) -> Result<()> {
        let payload = self.outbox.wrap(message)?;
        self.net.send(HOST_PEER, payload)
    }

    pub fn connect(&mut self, name: &str) -> Result<()> {
        self.send(NetMessage::Connect { name: name.to_string() })
    }

    pub fn submit_deck(&mut self, deck: &DeckList) -> Result<()> {
        self.send(NetMessage::DeckSubmit { deck: deck.clone() })
    }

    pub fn ready(&mut self) -> Result<()> {
        self.send(NetMessage::Ready)?;
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Ready;
        }
        Ok(())
    }

    /// Send an action to the host
    ///
    /// Only one action may be in flight; a second proposal before the
    /// answer arrives is rejected locally with `AwaitingResponse`.
    pub fn propose(&mut self, action: PlayerAction) -> Result<u64> {
        if self.awaiting.is_some() {
            return Err(RejectReason::AwaitingResponse.into());
        }
        match self.state {
            ConnectionState::InMatch => {}
            ConnectionState::GameOver => return Err(RejectReason::GameOver.into()),
            _ => return Err(RejectReason::WrongPhase.into()),
        }
        self.next_request += 1;
        let request_id = self.next_request;
        self.send(NetMessage::Action { request_id, action })?;
        self.awaiting = Some(request_id);
        Ok(request_id)
    }

    pub fn surrender(&mut self) -> Result<()> {
        self.send(NetMessage::Surrender)
    }

    pub fn ping(&mut self, now_ms: u64) -> Result<()> {
        self.next_nonce += 1;
        let nonce = self.next_nonce;
        self.send(NetMessage::Ping { nonce, sent_ms: now_ms })
    }

    /// Process one transport event
    ///
    /// Bad payloads are logged and dropped without touching the session.
    pub fn handle_event(&mut self, event: TransportEvent, now_ms: u64) -> Result<Vec<ClientEvent>> {
        match event {
            TransportEvent::Connected(_) => Ok(Vec::new()),
            TransportEvent::Disconnected(_) => {
                warn!("lost connection to host");
                self.awaiting = None;
                self.state = if self.state == ConnectionState::InMatch {
                    ConnectionState::GameOver
                } else {
                    ConnectionState::Disconnected
                };
                Ok(vec![ClientEvent::Disconnected])
            }
            TransportEvent::Message { payload, .. } => {
                let envelope = match decode(&payload) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(%err, "dropping malformed payload");
                        return Ok(Vec::new());
                    }
                };
                match self.on_message(envelope.message, now_ms) {
                    Err(DuelError::Protocol(err)) => {
                        warn!(%err, "ignoring message");
                        Ok(Vec::new())
                    }
                    other => other,
                }
            }
        }
    }

    fn on_message(&mut self, message: NetMessage, now_ms: u64) -> Result<Vec<ClientEvent>> {
        let mut out = Vec::new();
        match message {
            NetMessage::Accept { seat } => {
                self.seat = Some(seat);
                self.state = ConnectionState::Connected;
                out.push(ClientEvent::Seated { seat });
            }
            NetMessage::Refused { reason } => out.push(ClientEvent::Refused { reason }),
            NetMessage::DeckResult { accepted, issues } => out.push(ClientEvent::DeckChecked { accepted, issues }),
            NetMessage::GameStart {
                first_player, snapshot, ..
            } => {
                let seat = self
                    .seat
                    .ok_or_else(|| ProtocolError::UnexpectedMessage("GameStart before Accept".to_string()))?;
                snapshot
                    .verify()
                    .map_err(|err| ProtocolError::Malformed(format!("GameStart snapshot: {err}")))?;
                self.replica = Some(Replica::from_snapshot(&snapshot));
                self.state = ConnectionState::InMatch;
                self.sync = SyncStatus::InSync;
                out.push(ClientEvent::MatchStarted { seat, first_player });
            }
            NetMessage::ActionResult {
                request_id,
                success,
                reason,
                events,
            } => {
                if self.awaiting == Some(request_id) {
                    self.awaiting = None;
                } else {
                    debug!(request_id, "result for an action not in flight");
                }
                if success {
                    out.push(ClientEvent::ActionAccepted { request_id });
                    self.apply(&events, &mut out)?;
                } else {
                    out.push(ClientEvent::ActionRejected { request_id, reason });
                }
            }
            NetMessage::Events { events } => self.apply(&events, &mut out)?,
            NetMessage::StateSync { snapshot } => self.on_sync(&snapshot, &mut out)?,
            NetMessage::Ping { nonce, sent_ms } => self.send(NetMessage::Pong { nonce, sent_ms })?,
            NetMessage::Pong { sent_ms, .. } => out.push(ClientEvent::Pong {
                rtt_ms: now_ms.saturating_sub(sent_ms),
            }),
            other => return Err(ProtocolError::UnexpectedMessage(other.name().to_string()).into()),
        }
        Ok(out)
    }

    fn apply(&mut self, records: &[EventRecord], out: &mut Vec<ClientEvent>) -> Result<()> {
        let Some(replica) = self.replica.as_mut() else {
            return Err(ProtocolError::UnexpectedMessage("events before GameStart".to_string()).into());
        };
        if self.sync == SyncStatus::Resyncing {
            return Ok(());
        }
        match replica.apply_records(records) {
            Ok(count) => {
                if count > 0 {
                    out.push(ClientEvent::EventsApplied { count });
                }
                self.note_game_over(out);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "event stream broken, requesting resync");
                self.sync = SyncStatus::Resyncing;
                self.send(NetMessage::ResyncRequest)
            }
        }
    }

    fn on_sync(&mut self, snapshot: &MatchSnapshot, out: &mut Vec<ClientEvent>) -> Result<()> {
        let Some(replica) = self.replica.as_mut() else {
            return Err(ProtocolError::UnexpectedMessage("StateSync before GameStart".to_string()).into());
        };
        if let Err(err) = snapshot.verify() {
            // the snapshot does not match its own checksum; ask for a fresh one
            warn!(%err, "dropping corrupt state sync");
            self.sync = SyncStatus::Resyncing;
            return self.send(NetMessage::ResyncRequest);
        }
        if self.sync != SyncStatus::Resyncing {
            if replica.last_applied() < snapshot.last_event_id {
                // host ran ahead of us; nothing to compare yet
                debug!(
                    local = replica.last_applied(),
                    host = snapshot.last_event_id,
                    "sync ahead of replica"
                );
                return Ok(());
            }
            let local = replica.checksum()?;
            if replica.last_applied() == snapshot.last_event_id && local == snapshot.checksum {
                self.sync = SyncStatus::InSync;
                return Ok(());
            }
            warn!(local = %local, host = %snapshot.checksum, "state desync detected");
            self.desyncs += 1;
            out.push(ClientEvent::DesyncDetected {
                local: local.clone(),
                host: snapshot.checksum.clone(),
            });
            self.sync = SyncStatus::Desynced {
                local,
                host: snapshot.checksum.clone(),
            };
        } else {
            self.sync = SyncStatus::InSync;
        }
        replica.reset_to(snapshot);
        out.push(ClientEvent::Resynced {
            last_event_id: snapshot.last_event_id,
        });
        self.note_game_over(out);
        Ok(())
    }

    fn note_game_over(&mut self, out: &mut Vec<ClientEvent>) {
        if self.state != ConnectionState::InMatch {
            return;
        }
        let Some(outcome) = self.replica.as_ref().and_then(|r| r.state().outcome) else {
            return;
        };
        self.state = ConnectionState::GameOver;
        self.awaiting = None;
        out.push(ClientEvent::GameOver {
            winner: outcome.winner,
            reason: outcome.reason,
        });
    }
}

/// Upper bound on actions within one turn before the client ends it
const MAX_ACTIONS_PER_TURN: usize = 200;

/// Whether `seat` is expected to act in `state`
fn seat_to_act(state: &MatchState, seat: PlayerId) -> bool {
    match state.phase {
        Phase::Mulligan => !state.mulligan.ready[seat.index()],
        Phase::Main => state.active == seat,
        _ => false,
    }
}

/// Play a whole remote match with `controller` choosing the actions
///
/// Connects, submits `deck`, readies up and then answers every turn of its
/// seat. Past `max_turns` the client surrenders on its next turn. Returns the
/// session once the match is over or the host is gone.
pub async fn play_remote<N, C>(
    mut session: ClientSession<N>,
    mut inbound: InboundQueue,
    controller: &mut C,
    catalog: &dyn CardCatalog,
    deck: &DeckList,
    max_turns: u32,
) -> Result<ClientSession<N>>
where
    N: NetworkService,
    C: PlayerController,
{
    let clock = SystemClock;
    let mut turn = (0, PlayerId::FIRST);
    let mut actions_this_turn = 0usize;
    session.connect(&deck.name)?;

    while let Some(event) = inbound.recv().await {
        for outcome in session.handle_event(event, clock.now_ms())? {
            match outcome {
                ClientEvent::Seated { .. } => session.submit_deck(deck)?,
                ClientEvent::DeckChecked { accepted: true, .. } => session.ready()?,
                ClientEvent::DeckChecked { issues, .. } => return Err(DuelError::InvalidDeck(issues)),
                ClientEvent::Refused { reason } => {
                    return Err(ProtocolError::UnexpectedMessage(format!("refused: {reason}")).into())
                }
                ClientEvent::GameOver { .. } | ClientEvent::Disconnected => {
                    if let Some(state) = session.match_state() {
                        controller.on_game_end(state, state.outcome.and_then(|o| o.winner) == session.seat());
                    }
                    return Ok(session);
                }
                _ => {}
            }
        }

        if session.connection_state() != ConnectionState::InMatch || session.is_awaiting_response() {
            continue;
        }
        let (Some(seat), Some(state)) = (session.seat(), session.match_state()) else {
            continue;
        };
        if !seat_to_act(state, seat) {
            continue;
        }
        if (state.turn, state.active) != turn {
            turn = (state.turn, state.active);
            actions_this_turn = 0;
        }
        let fallback = if state.phase == Phase::Mulligan {
            PlayerAction::Mulligan { replace: Vec::new() }
        } else {
            PlayerAction::EndTurn
        };
        let action = if state.phase == Phase::Main && state.turn > max_turns {
            PlayerAction::Surrender
        } else if actions_this_turn >= MAX_ACTIONS_PER_TURN {
            fallback
        } else {
            let legal = legal_actions(state, catalog, seat);
            controller.choose_action(state, &legal).unwrap_or(fallback)
        };
        actions_this_turn += 1;
        session.propose(action)?;
    }
    Ok(session)
}

impl<N: NetworkService> std::fmt::Debug for ClientSession<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("state", &self.state)
            .field("seat", &self.seat)
            .field("awaiting", &self.awaiting)
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Match, MatchConfig, MatchSnapshot};
    use crate::loader::{starter_catalog, starter_deck};
    use crate::net::message::{encode, Envelope};
    use crate::net::transport::{InboundQueue, LoopbackHub};
    use std::sync::Arc;

    fn host_message(seq: u64, message: NetMessage) -> TransportEvent {
        TransportEvent::Message {
            peer: HOST_PEER,
            payload: encode(&Envelope::new(seq, message)).unwrap(),
        }
    }

    fn started_match() -> Match {
        let mut game = Match::new(
            MatchConfig::default(),
            Arc::new(starter_catalog()),
            [starter_deck(), starter_deck()],
            3,
            PlayerId::FIRST,
        );
        game.logger_mut().set_verbosity(crate::game::VerbosityLevel::Silent);
        game.start().unwrap();
        game
    }

    fn in_match(game: &Match) -> (ClientSession<crate::net::LoopbackNetwork>, InboundQueue) {
        let hub = LoopbackHub::new();
        let (_host, host_queue) = hub.host().unwrap();
        let (_, net, _) = hub.connect().unwrap();
        let mut client = ClientSession::new(net);
        client
            .handle_event(host_message(1, NetMessage::Accept { seat: PlayerId::FIRST }), 0)
            .unwrap();
        let events = client
            .handle_event(
                host_message(
                    2,
                    NetMessage::GameStart {
                        seed: 3,
                        first_player: PlayerId::FIRST,
                        snapshot: game.snapshot().unwrap(),
                    },
                ),
                0,
            )
            .unwrap();
        assert!(matches!(events[..], [ClientEvent::MatchStarted { .. }]));
        (client, host_queue)
    }

    #[test]
    fn test_one_action_in_flight() {
        let game = started_match();
        let (mut client, _queue) = in_match(&game);
        let id = client.propose(PlayerAction::EndTurn).unwrap();
        let err = client.propose(PlayerAction::EndTurn).unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::AwaitingResponse));

        let events = client
            .handle_event(
                host_message(
                    3,
                    NetMessage::ActionResult {
                        request_id: id,
                        success: false,
                        reason: Some(RejectReason::WrongPhase),
                        events: Vec::new(),
                    },
                ),
                0,
            )
            .unwrap();
        assert_eq!(
            events,
            vec![ClientEvent::ActionRejected {
                request_id: id,
                reason: Some(RejectReason::WrongPhase)
            }]
        );
        assert!(!client.is_awaiting_response());
    }

    #[test]
    fn test_events_then_matching_sync() {
        let mut game = started_match();
        let (mut client, _queue) = in_match(&game);
        let records = game
            .submit(PlayerId::FIRST, &PlayerAction::Mulligan { replace: vec![0] })
            .unwrap();
        let events = client
            .handle_event(host_message(3, NetMessage::Events { events: records }), 0)
            .unwrap();
        assert!(matches!(events[..], [ClientEvent::EventsApplied { .. }]));

        let snapshot = game.snapshot().unwrap();
        let events = client
            .handle_event(host_message(4, NetMessage::StateSync { snapshot }), 0)
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(client.sync_status(), &SyncStatus::InSync);
        assert_eq!(client.match_state(), Some(game.state()));
    }

    #[test]
    fn test_desync_forces_resync() {
        let game = started_match();
        let (mut client, _queue) = in_match(&game);

        // host state drifted: same event id, different content
        let mut drifted = game.state().clone();
        drifted.player_mut(PlayerId::SECOND).health -= 1;
        let snapshot = MatchSnapshot::capture(&drifted, game.log().last_id()).unwrap();

        let events = client
            .handle_event(host_message(3, NetMessage::StateSync { snapshot }), 0)
            .unwrap();
        assert!(matches!(events[0], ClientEvent::DesyncDetected { .. }));
        assert!(matches!(events[1], ClientEvent::Resynced { .. }));
        assert!(matches!(client.sync_status(), SyncStatus::Desynced { .. }));
        assert_eq!(client.desync_count(), 1);
        assert_eq!(client.match_state(), Some(&drifted));
    }

    #[test]
    fn test_corrupt_sync_requests_resync() {
        let game = started_match();
        let (mut client, mut host_queue) = in_match(&game);
        let before = client.match_state().cloned();

        let mut snapshot = game.snapshot().unwrap();
        snapshot.checksum = "00".repeat(32);
        let events = client
            .handle_event(host_message(3, NetMessage::StateSync { snapshot }), 0)
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(client.sync_status(), &SyncStatus::Resyncing);
        assert_eq!(client.connection_state(), ConnectionState::InMatch);
        assert_eq!(client.match_state().cloned(), before);
        let sent: Vec<NetMessage> = host_queue
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Message { payload, .. } => Some(decode(&payload).unwrap().message),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![NetMessage::ResyncRequest]);

        // a good snapshot completes the resync
        let events = client
            .handle_event(
                host_message(
                    4,
                    NetMessage::StateSync {
                        snapshot: game.snapshot().unwrap(),
                    },
                ),
                0,
            )
            .unwrap();
        assert!(matches!(events[..], [ClientEvent::Resynced { .. }]));
        assert_eq!(client.sync_status(), &SyncStatus::InSync);
    }

    #[test]
    fn test_corrupt_game_start_dropped() {
        let game = started_match();
        let hub = LoopbackHub::new();
        let (_host, _host_queue) = hub.host().unwrap();
        let (_, net, _) = hub.connect().unwrap();
        let mut client = ClientSession::new(net);
        client
            .handle_event(host_message(1, NetMessage::Accept { seat: PlayerId::FIRST }), 0)
            .unwrap();

        let mut snapshot = game.snapshot().unwrap();
        snapshot.checksum = "00".repeat(32);
        let events = client
            .handle_event(
                host_message(
                    2,
                    NetMessage::GameStart {
                        seed: 3,
                        first_player: PlayerId::FIRST,
                        snapshot,
                    },
                ),
                0,
            )
            .unwrap();
        assert!(events.is_empty());
        assert!(client.replica().is_none());
        assert_eq!(client.connection_state(), ConnectionState::Connected);
    }

    #[test]
    fn test_gap_requests_resync() {
        let mut game = started_match();
        let (mut client, mut host_queue) = in_match(&game);
        game.submit(PlayerId::FIRST, &PlayerAction::Mulligan { replace: Vec::new() })
            .unwrap();
        let second = game
            .submit(PlayerId::SECOND, &PlayerAction::Mulligan { replace: Vec::new() })
            .unwrap();
        client
            .handle_event(host_message(3, NetMessage::Events { events: second }), 0)
            .unwrap();
        assert_eq!(client.sync_status(), &SyncStatus::Resyncing);
        let sent: Vec<NetMessage> = host_queue
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Message { payload, .. } => Some(decode(&payload).unwrap().message),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![NetMessage::ResyncRequest]);

        let snapshot = game.snapshot().unwrap();
        let events = client
            .handle_event(host_message(4, NetMessage::StateSync { snapshot }), 0)
            .unwrap();
        assert!(matches!(events[..], [ClientEvent::Resynced { .. }]));
        assert_eq!(client.sync_status(), &SyncStatus::InSync);
        assert_eq!(client.match_state(), Some(game.state()));
    }

    #[test]
    fn test_malformed_payload_ignored() {
        let game = started_match();
        let (mut client, _queue) = in_match(&game);
        let events = client
            .handle_event(
                TransportEvent::Message {
                    peer: HOST_PEER,
                    payload: b"\x00\x01".to_vec(),
                },
                0,
            )
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(client.connection_state(), ConnectionState::InMatch);
    }
}
