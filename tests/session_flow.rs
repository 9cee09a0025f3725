//! Two sessions and a relay on an in-memory network.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use peer_chess::Transport;
use peer_chess::game_logic::{DEFAULT_CLOCK, Game, GameStatus};
use peer_chess::game_state::{Color, PieceKind, Square};
use peer_chess::mock::{MockNetwork, MockTransport};
use peer_chess::protocol::{
    ClientState, PairKind, Session, SessionConfig, SessionError, SessionEvent,
};
use peer_chess::relay::{Relay, RelayConfig, RoomState};

const RELAY: &str = "10.0.0.1:7878";
const ALICE: &str = "10.0.0.2:4000";
const BOB: &str = "10.0.0.3:4000";
const BOB_AGAIN: &str = "10.0.0.3:4001";

fn addr(s: &str) -> SocketAddr {
    s.parse().expect("valid address")
}

fn sq(s: &str) -> Square {
    s.parse().expect("valid square")
}

struct Harness {
    network: MockNetwork,
    relay: Relay,
    relay_socket: MockTransport,
}

impl Harness {
    fn new() -> Self {
        let network = MockNetwork::new();
        let relay_socket = network.endpoint(addr(RELAY));
        Self {
            network,
            relay: Relay::new(RelayConfig::default()),
            relay_socket,
        }
    }

    fn client(&self, local: &str, kind: PairKind, color: Option<Color>) -> Session<MockTransport> {
        Session::new(
            self.network.endpoint(addr(local)),
            addr(RELAY),
            kind,
            SessionConfig {
                preferred_color: color,
                ..SessionConfig::default()
            },
        )
    }

    /// Let the relay handle everything queued for it, then sweep.
    fn pump_relay(&mut self, now: Instant) {
        let mut buf = [0u8; 256];
        while let Some((len, from)) = self
            .relay_socket
            .recv_from(&mut buf, Duration::ZERO)
            .expect("infallible")
        {
            let outbox = self.relay.handle(&buf[..len], from, now);
            self.flush(outbox);
        }
        let outbox = self.relay.sweep(now);
        self.flush(outbox);
    }

    fn flush(&mut self, outbox: Vec<(Vec<u8>, SocketAddr)>) {
        for (datagram, to) in outbox {
            self.relay_socket.send_to(&datagram, to).expect("infallible");
        }
    }
}

/// Poll `session` a few times and collect what it reports.
fn pump(session: &mut Session<MockTransport>, game: &mut Game, now: Instant) -> Vec<SessionEvent> {
    (0..8)
        .filter_map(|_| session.poll(game, now).expect("poll"))
        .collect()
}

fn play(game: &mut Game, from: &str, to: &str) {
    game.try_move(sq(from), sq(to)).expect("legal move");
}

/// Pair Alice (white, assigns colors) with Bob.
fn paired(
    harness: &mut Harness,
    now: Instant,
) -> (Session<MockTransport>, Game, Session<MockTransport>, Game) {
    let mut alice = harness.client(ALICE, PairKind::Fresh, Some(Color::White));
    let mut bob = harness.client(BOB, PairKind::Fresh, None);
    let mut alice_game = Game::new(DEFAULT_CLOCK);
    let mut bob_game = Game::new(DEFAULT_CLOCK);

    assert!(pump(&mut alice, &mut alice_game, now).is_empty());
    harness.pump_relay(now);
    assert!(pump(&mut bob, &mut bob_game, now).is_empty());
    harness.pump_relay(now);

    // Both punch through with Hello; colors go out once Bob has answered.
    assert!(pump(&mut alice, &mut alice_game, now).is_empty());
    assert!(pump(&mut bob, &mut bob_game, now).is_empty());
    assert_eq!(alice.state(), ClientState::SendColor);

    alice.transport_mut().ack_after(addr(BOB), 1);
    assert_eq!(
        pump(&mut alice, &mut alice_game, now),
        vec![SessionEvent::Paired {
            color: Color::White
        }]
    );
    assert_eq!(
        pump(&mut bob, &mut bob_game, now),
        vec![SessionEvent::Paired {
            color: Color::Black
        }]
    );
    assert_eq!(harness.relay.rooms()[0].state, RoomState::Playing);
    (alice, alice_game, bob, bob_game)
}

#[test]
fn handshake_assigns_opposite_colors() {
    let mut harness = Harness::new();
    let (alice, _, bob, _) = paired(&mut harness, Instant::now());

    assert_eq!(alice.state(), ClientState::Connected);
    assert_eq!(bob.state(), ClientState::Connected);
    assert_eq!(alice.color(), Some(Color::White));
    assert_eq!(bob.color(), Some(Color::Black));
    assert_eq!(alice.peer(), Some(addr(BOB)));
    assert_eq!(bob.peer(), Some(addr(ALICE)));
}

#[test]
fn moves_travel_both_ways() {
    let mut harness = Harness::new();
    let now = Instant::now();
    let (mut alice, mut alice_game, mut bob, mut bob_game) = paired(&mut harness, now);

    play(&mut alice_game, "e2", "e4");
    alice.transport_mut().ack_after(addr(BOB), 1);
    alice.send_move(&alice_game).expect("acknowledged");
    assert_eq!(
        pump(&mut bob, &mut bob_game, now),
        vec![SessionEvent::OpponentMoved {
            from: sq("e2"),
            to: sq("e4"),
            promotion: None
        }]
    );

    play(&mut bob_game, "c7", "c5");
    bob.transport_mut().ack_after(addr(ALICE), 1);
    bob.send_move(&bob_game).expect("acknowledged");
    assert_eq!(pump(&mut alice, &mut alice_game, now).len(), 1);

    assert_eq!(alice_game.board(), bob_game.board());
    assert_eq!(alice_game.turn(), Color::White);
    assert_eq!(bob_game.board().piece_at(sq("c5")), PieceKind::BlackPawn);
}

#[test]
fn unacknowledged_move_fails_after_every_attempt() {
    let mut harness = Harness::new();
    let now = Instant::now();
    let (mut alice, mut alice_game, _bob, _) = paired(&mut harness, now);
    // Drain Bob's handshake traffic so a stale ACK cannot satisfy the send.
    pump(&mut alice, &mut alice_game, now);

    harness.network.block(addr(BOB));
    alice.transport_mut().take_sent();
    play(&mut alice_game, "d2", "d4");

    assert!(matches!(
        alice.send_move(&alice_game),
        Err(SessionError::SendFailed { attempts: 10 })
    ));
    assert_eq!(alice.transport().sent().len(), 10);
}

#[test]
fn reconnect_replays_history_into_identical_game() {
    let mut harness = Harness::new();
    let start = Instant::now();
    let (mut alice, mut alice_game, mut bob, mut bob_game) = paired(&mut harness, start);

    for (from, to, white) in [("e2", "e4", true), ("e7", "e5", false), ("g1", "f3", true)] {
        let (sender, sender_game, receiver, receiver_game, to_addr) = if white {
            (&mut alice, &mut alice_game, &mut bob, &mut bob_game, BOB)
        } else {
            (&mut bob, &mut bob_game, &mut alice, &mut alice_game, ALICE)
        };
        play(sender_game, from, to);
        sender.transport_mut().ack_after(addr(to_addr), 1);
        sender.send_move(sender_game).expect("acknowledged");
        assert_eq!(pump(receiver, receiver_game, start).len(), 1);
    }
    harness.pump_relay(start);
    drop(bob);

    // Alice keeps her heartbeat going, Bob goes silent.
    let later = start + Duration::from_secs(3);
    pump(&mut alice, &mut alice_game, later);
    harness.pump_relay(later);

    let lost = start + Duration::from_secs(6);
    harness.pump_relay(lost);
    assert_eq!(harness.relay.rooms()[0].state, RoomState::WaitReconnect);
    assert!(pump(&mut alice, &mut alice_game, lost).contains(&SessionEvent::PeerLost));
    assert!(!alice.peer_connected());
    harness.pump_relay(lost);

    // Bob restarts on a new port with an empty board.
    let mut bob = harness.client(BOB_AGAIN, PairKind::Reconnect, None);
    let mut bob_game = Game::new(DEFAULT_CLOCK);
    assert!(pump(&mut bob, &mut bob_game, lost).is_empty());
    pump(&mut alice, &mut alice_game, lost);
    harness.pump_relay(lost);
    assert_eq!(harness.relay.rooms()[0].state, RoomState::Playing);

    assert!(pump(&mut alice, &mut alice_game, lost).is_empty());
    assert!(pump(&mut bob, &mut bob_game, lost).is_empty());
    alice.transport_mut().ack_after(addr(BOB_AGAIN), 1);
    assert_eq!(
        pump(&mut alice, &mut alice_game, lost),
        vec![SessionEvent::Resynced {
            color: Color::White
        }]
    );
    assert_eq!(
        pump(&mut bob, &mut bob_game, lost),
        vec![SessionEvent::Resynced {
            color: Color::Black
        }]
    );

    assert_eq!(bob_game.board(), alice_game.board());
    assert_eq!(bob_game.history(), alice_game.history());
    assert_eq!(bob_game.turn(), Color::Black);
    assert_eq!(bob_game.clock(Color::White), alice_game.clock(Color::White));
    assert_eq!(bob_game.clock(Color::Black), alice_game.clock(Color::Black));

    // Play resumes where it stopped.
    play(&mut bob_game, "b8", "c6");
    bob.transport_mut().ack_after(addr(ALICE), 1);
    bob.send_move(&bob_game).expect("acknowledged");
    assert_eq!(pump(&mut alice, &mut alice_game, lost).len(), 1);
    assert_eq!(alice_game.board(), bob_game.board());
}

#[test]
fn quit_ends_both_games_and_closes_the_room() {
    let mut harness = Harness::new();
    let now = Instant::now();
    let (mut alice, mut alice_game, mut bob, mut bob_game) = paired(&mut harness, now);

    alice.transport_mut().ack_after(addr(BOB), 1);
    alice.send_quit(&mut alice_game).expect("acknowledged");
    assert_eq!(
        pump(&mut bob, &mut bob_game, now),
        vec![SessionEvent::PeerQuit]
    );
    assert_eq!(
        alice_game.status(),
        GameStatus::Abandoned { by: Color::White }
    );
    assert_eq!(bob_game.status(), alice_game.status());

    alice.close().expect("sent");
    harness.pump_relay(now);
    assert!(harness.relay.rooms().is_empty());
}

#[test]
fn leaving_mid_game_closes_the_room() {
    let mut harness = Harness::new();
    let now = Instant::now();
    let (mut alice, _, _bob, _) = paired(&mut harness, now);

    alice.disconnect().expect("sent");
    harness.pump_relay(now);
    assert!(harness.relay.rooms().is_empty());
}

#[test]
fn restarted_member_is_resynced_by_its_partner() {
    let mut harness = Harness::new();
    let now = Instant::now();
    let (mut alice, mut alice_game, bob, _) = paired(&mut harness, now);

    play(&mut alice_game, "e2", "e4");
    alice.transport_mut().ack_after(addr(BOB), 1);
    alice.send_move(&alice_game).expect("acknowledged");
    drop(bob);

    // Bob comes back on the same address before the relay notices he was gone.
    let mut bob = harness.client(BOB, PairKind::Reconnect, None);
    let mut bob_game = Game::new(DEFAULT_CLOCK);
    assert!(pump(&mut bob, &mut bob_game, now).is_empty());
    harness.pump_relay(now);
    assert_eq!(harness.relay.rooms()[0].state, RoomState::WaitReconnect);

    assert!(pump(&mut alice, &mut alice_game, now).contains(&SessionEvent::PeerLost));
    pump(&mut alice, &mut alice_game, now);
    harness.pump_relay(now);
    assert_eq!(harness.relay.rooms()[0].state, RoomState::Playing);

    assert!(pump(&mut alice, &mut alice_game, now).is_empty());
    assert!(pump(&mut bob, &mut bob_game, now).is_empty());
    alice.transport_mut().ack_after(addr(BOB), 1);
    assert_eq!(
        pump(&mut alice, &mut alice_game, now),
        vec![SessionEvent::Resynced {
            color: Color::White
        }]
    );
    assert_eq!(
        pump(&mut bob, &mut bob_game, now),
        vec![SessionEvent::Resynced {
            color: Color::Black
        }]
    );
    assert_eq!(bob_game.board(), alice_game.board());
    assert_eq!(bob_game.turn(), Color::Black);
}
