//! Peer session: rendezvous, reliable delivery, inbound validation, liveness and reconnect.
//!
//! Everything runs on the caller's thread. [`Session::poll`] handles at most one datagram per
//! call and never blocks longer than the receive timeout, except while a reliable send triggered
//! by the handshake is waiting for its ACK.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::codec::{
    ACK, CLIENT_ALIVE, CodecError, DISCONNECT, GAME_END, HELLO, Message, MovePacket,
    ReconnectSnapshot, decode,
};
use super::rendezvous::{PEER_INFO_SIZE, PairKind, PeerInfo, PeerRole};
use crate::Transport;
use crate::game_logic::{Game, MoveOutcome, Snapshot};
use crate::game_state::{Color, PieceKind, Role, Square};

/// Largest datagram the session reads.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Protocol tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Receive wait per poll and per send attempt.
    pub recv_timeout: Duration,
    /// Transmissions before a reliable send gives up.
    pub max_attempts: u32,
    /// Interval between `CLIENT_ALIVE` datagrams to the relay.
    pub heartbeat_interval: Duration,
    /// Interval between join requests while waiting for a peer.
    pub handshake_resend: Duration,
    /// Color to play when this side assigns colors; random if unset.
    pub preferred_color: Option<Color>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_millis(50),
            max_attempts: 10,
            heartbeat_interval: Duration::from_secs(1),
            handshake_resend: Duration::from_millis(500),
            preferred_color: None,
        }
    }
}

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Asking the relay for a peer.
    Init,
    /// Paired; assigning colors once the peer's Hello arrives.
    SendColor,
    /// Paired; waiting for the peer to assign colors.
    WaitColor,
    /// Re-paired after a drop; sending or waiting for the snapshot.
    Reconnect(PeerRole),
    Connected,
}

/// Something the front end should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Paired {
        color: Color,
    },
    OpponentMoved {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    },
    /// Game state was rebuilt from the peer's snapshot, or ours was sent.
    Resynced {
        color: Color,
    },
    /// The relay reported the peer gone; a reconnect is underway.
    PeerLost,
    PeerQuit,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("no acknowledgement after {attempts} attempts")]
    SendFailed { attempts: u32 },
    #[error("no peer to send to")]
    NotConnected,
    #[error("no color assigned yet")]
    NoColor,
}

#[derive(Debug)]
struct Inbound {
    bytes: Vec<u8>,
    from: SocketAddr,
    acked: bool,
}

/// One side of a two-player network game.
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    relay: SocketAddr,
    peer: Option<SocketAddr>,
    state: ClientState,
    kind: PairKind,
    peer_connected: bool,
    color: Option<Color>,
    last_processed: Option<Vec<u8>>,
    pending: VecDeque<Inbound>,
    last_request: Option<Instant>,
    last_heartbeat: Option<Instant>,
    buf: Vec<u8>,
}

impl<T: Transport> Session<T> {
    /// Start a session that pairs through `relay`. `kind` selects a fresh game or a rejoin.
    pub fn new(transport: T, relay: SocketAddr, kind: PairKind, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            relay,
            peer: None,
            state: ClientState::Init,
            kind,
            peer_connected: false,
            color: None,
            last_processed: None,
            pending: VecDeque::new(),
            last_request: None,
            last_heartbeat: None,
            buf: vec![0; MAX_DATAGRAM],
        }
    }

    #[inline]
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Our color once assigned.
    #[inline]
    pub fn color(&self) -> Option<Color> {
        self.color
    }

    #[inline]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    #[inline]
    pub fn peer_connected(&self) -> bool {
        self.peer_connected
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Drive the session: keep-alive, then handle at most one datagram.
    pub fn poll(
        &mut self,
        game: &mut Game,
        now: Instant,
    ) -> Result<Option<SessionEvent>, SessionError> {
        self.keep_alive(now)?;
        match self.next_inbound()? {
            Some(inbound) => self.dispatch(inbound, game),
            None => Ok(None),
        }
    }

    /// Send a game message and wait for the peer's ACK, retransmitting up to the attempt ceiling.
    pub fn send(&mut self, message: &Message) -> Result<(), SessionError> {
        let peer = self.peer.ok_or(SessionError::NotConnected)?;
        let bytes = message.encode()?;
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            self.transmit(&bytes, peer)?;
            if self.await_ack(peer)? {
                log::debug!("{message:?} acknowledged after {attempt} attempt(s)");
                return Ok(());
            }
        }
        log::warn!("giving up on {message:?} after {attempts} attempts");
        Err(SessionError::SendFailed { attempts })
    }

    /// Send the latest committed move of `game`.
    pub fn send_move(&mut self, game: &Game) -> Result<(), SessionError> {
        let color = self.color.ok_or(SessionError::NoColor)?;
        let Some(record) = game.history().last() else {
            return Ok(());
        };
        let mut packet = MovePacket {
            turn: game.turn_counter(),
            from: record.from,
            to: record.to,
            piece: record.piece_before,
            clock: game.clock(color).as_secs(),
        };
        let message = if record.is_promotion() {
            packet.piece = record.piece_after;
            Message::Promotion(packet)
        } else {
            Message::Move(packet)
        };
        self.send(&message)
    }

    /// Resign: end the local game and tell the peer.
    pub fn send_quit(&mut self, game: &mut Game) -> Result<(), SessionError> {
        if let Some(color) = self.color {
            game.abandon(color);
        }
        self.send(&Message::Quit {
            turn: game.turn_counter(),
        })
    }

    /// Tell the relay the game is over so it can close the room.
    pub fn close(&mut self) -> Result<(), SessionError> {
        self.transmit(GAME_END, self.relay)?;
        self.peer_connected = false;
        Ok(())
    }

    /// Leave before the game has ended: send the disconnect notice to the relay.
    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        self.transmit(DISCONNECT, self.relay)?;
        self.peer_connected = false;
        Ok(())
    }

    /// Re-run the rendezvous in reconnect mode.
    pub fn begin_reconnect(&mut self) {
        log::info!("peer lost, reconnecting through {}", self.relay);
        self.state = ClientState::Init;
        self.kind = PairKind::Reconnect;
        self.peer = None;
        self.peer_connected = false;
        self.last_processed = None;
        self.last_request = None;
    }

    fn keep_alive(&mut self, now: Instant) -> Result<(), SessionError> {
        let due = |last: Option<Instant>, every: Duration| {
            last.is_none_or(|at| now.duration_since(at) >= every)
        };
        if self.state == ClientState::Init {
            if due(self.last_request, self.config.handshake_resend) {
                self.transmit(self.kind.request(), self.relay)?;
                self.last_request = Some(now);
            }
            return Ok(());
        }
        if self.awaiting_hello()
            && let Some(peer) = self.peer
            && due(self.last_request, self.config.handshake_resend)
        {
            self.transmit(HELLO, peer)?;
            self.last_request = Some(now);
        }
        if due(self.last_heartbeat, self.config.heartbeat_interval) {
            self.transmit(CLIENT_ALIVE, self.relay)?;
            self.last_heartbeat = Some(now);
        }
        Ok(())
    }

    fn transmit(&mut self, bytes: &[u8], to: SocketAddr) -> Result<(), SessionError> {
        self.transport
            .send_to(bytes, to)
            .map_err(|e| SessionError::Transport(Box::new(e)))
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<Inbound>, SessionError> {
        let received = self
            .transport
            .recv_from(&mut self.buf, timeout)
            .map_err(|e| SessionError::Transport(Box::new(e)))?;
        Ok(received.map(|(len, from)| Inbound {
            bytes: self.buf[..len].to_vec(),
            from,
            acked: false,
        }))
    }

    fn next_inbound(&mut self) -> Result<Option<Inbound>, SessionError> {
        match self.pending.pop_front() {
            Some(inbound) => Ok(Some(inbound)),
            None => self.receive(self.config.recv_timeout),
        }
    }

    /// Wait one receive timeout for an ACK from `peer`. Anything else is queued for `poll`.
    fn await_ack(&mut self, peer: SocketAddr) -> Result<bool, SessionError> {
        let deadline = Instant::now() + self.config.recv_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let Some(mut inbound) = self.receive(remaining)? else {
                return Ok(false);
            };
            if inbound.from == peer {
                if inbound.bytes == ACK {
                    return Ok(true);
                }
                // The peer may be blocked on its own send.
                if decode(&inbound.bytes).is_ok_and(|m| m.is_game_message()) {
                    self.transmit(ACK, peer)?;
                    inbound.acked = true;
                }
            }
            self.pending.push_back(inbound);
        }
    }

    fn dispatch(
        &mut self,
        inbound: Inbound,
        game: &mut Game,
    ) -> Result<Option<SessionEvent>, SessionError> {
        if inbound.from == self.relay {
            return self.on_relay(&inbound.bytes);
        }
        if Some(inbound.from) != self.peer {
            log::debug!("dropping datagram from unknown sender {}", inbound.from);
            return Ok(None);
        }

        let message = match decode(&inbound.bytes) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("discarding datagram from peer: {e}");
                return Ok(None);
            }
        };
        if message == Message::Hello {
            return self.on_peer_hello(game);
        }
        if !message.is_game_message() {
            return Ok(None);
        }

        if !inbound.acked {
            self.transmit(ACK, inbound.from)?;
        }
        if self.last_processed.as_deref() == Some(inbound.bytes.as_slice()) {
            log::debug!("discarding duplicate {message:?}");
            return Ok(None);
        }

        let event = self.apply(message, game);
        if event.is_some() {
            self.last_processed = Some(inbound.bytes);
        }
        Ok(event)
    }

    fn on_relay(&mut self, bytes: &[u8]) -> Result<Option<SessionEvent>, SessionError> {
        if bytes.len() == PEER_INFO_SIZE {
            return match PeerInfo::decode(bytes) {
                Ok(info) => self.on_peer_info(info),
                Err(e) => {
                    log::warn!("bad peer info from relay: {e}");
                    Ok(None)
                }
            };
        }
        match decode(bytes) {
            Ok(Message::Disconnect) if self.state != ClientState::Init => {
                self.begin_reconnect();
                Ok(Some(SessionEvent::PeerLost))
            }
            Ok(message) => {
                log::debug!("ignoring {message:?} from relay");
                Ok(None)
            }
            Err(e) => {
                log::debug!("discarding datagram from relay: {e}");
                Ok(None)
            }
        }
    }

    fn on_peer_info(&mut self, info: PeerInfo) -> Result<Option<SessionEvent>, SessionError> {
        if info.kind != self.kind {
            log::debug!("ignoring stale {:?} peer info", info.kind);
            return Ok(None);
        }
        if self.state != ClientState::Init {
            if self.peer == Some(info.addr) {
                self.transmit(HELLO, info.addr)?;
            }
            return Ok(None);
        }

        log::info!("paired with {} as {:?}", info.addr, info.role);
        self.peer = Some(info.addr);
        self.transmit(HELLO, info.addr)?;

        self.state = match (info.kind, info.role) {
            (PairKind::Fresh, PeerRole::Send) => ClientState::SendColor,
            (PairKind::Fresh, PeerRole::Wait) => ClientState::WaitColor,
            (PairKind::Reconnect, role) => ClientState::Reconnect(role),
        };
        Ok(None)
    }

    /// Sending side: COLOR and the snapshot go out only once the peer has answered directly.
    #[inline]
    fn awaiting_hello(&self) -> bool {
        matches!(
            self.state,
            ClientState::SendColor | ClientState::Reconnect(PeerRole::Send)
        )
    }

    fn on_peer_hello(&mut self, game: &Game) -> Result<Option<SessionEvent>, SessionError> {
        let peer = self.peer.ok_or(SessionError::NotConnected)?;
        match self.state {
            ClientState::WaitColor | ClientState::Reconnect(PeerRole::Wait) => {
                self.transmit(HELLO, peer)?;
                Ok(None)
            }
            ClientState::SendColor => {
                let color = self
                    .config
                    .preferred_color
                    .unwrap_or_else(|| if rand::random() { Color::White } else { Color::Black });
                self.send(&Message::Color {
                    turn: game.turn_counter(),
                    color: color.opposite(),
                })?;
                self.color = Some(color);
                self.connected();
                Ok(Some(SessionEvent::Paired { color }))
            }
            ClientState::Reconnect(PeerRole::Send) => {
                let color = self.color.ok_or(SessionError::NoColor)?;
                let snapshot = ReconnectSnapshot {
                    turn: game.turn_counter(),
                    sender: color,
                    history: game.history().to_vec(),
                    peer_clock: game.clock(color.opposite()).as_secs(),
                    own_clock: game.clock(color).as_secs(),
                };
                self.send(&Message::Reconnect(snapshot))?;
                self.connected();
                Ok(Some(SessionEvent::Resynced { color }))
            }
            ClientState::Init | ClientState::Connected => Ok(None),
        }
    }

    fn connected(&mut self) {
        self.state = ClientState::Connected;
        self.peer_connected = true;
    }

    /// Apply a validated game message. `None` means it was rejected.
    fn apply(&mut self, message: Message, game: &mut Game) -> Option<SessionEvent> {
        match (self.state, message) {
            (ClientState::WaitColor, Message::Color { color, .. }) => {
                log::info!("playing {color}");
                self.color = Some(color);
                self.connected();
                Some(SessionEvent::Paired { color })
            }
            (ClientState::Connected, Message::Move(packet)) => {
                self.apply_move(packet, false, game)
            }
            (ClientState::Connected, Message::Promotion(packet)) => {
                self.apply_move(packet, true, game)
            }
            (ClientState::Reconnect(PeerRole::Wait), Message::Reconnect(snapshot)) => {
                self.restore(snapshot, game)
            }
            (_, Message::Quit { .. }) => {
                if let Some(color) = self.color {
                    game.abandon(color.opposite());
                }
                Some(SessionEvent::PeerQuit)
            }
            (state, message) => {
                log::debug!("discarding {message:?} in state {state:?}");
                None
            }
        }
    }

    /// Replay the opponent's move on a copy of the game and keep it only if every check passes.
    fn apply_move(
        &mut self,
        packet: MovePacket,
        promotion: bool,
        game: &mut Game,
    ) -> Option<SessionEvent> {
        let opponent = self.color?.opposite();
        if game.turn() != opponent {
            log::warn!("peer moved out of turn: {packet:?}");
            return None;
        }

        let mover = game.board().piece_at(packet.from);
        let last_rank = packet.to.rank_index() == opponent.promotion_rank();
        let piece_ok = if promotion {
            mover == PieceKind::new(opponent, Role::Pawn)
                && last_rank
                && PieceKind::promotions(opponent).contains(&packet.piece)
        } else {
            mover == packet.piece && !(mover.is(Role::Pawn) && last_rank)
        };
        if !piece_ok {
            log::warn!("peer move does not match the board: {packet:?}");
            return None;
        }

        let mut next = game.clone();
        let applied = match next.try_move(packet.from, packet.to) {
            Ok(MoveOutcome::Ok) => !promotion,
            Ok(MoveOutcome::PromotionPending) => {
                promotion && next.promote(packet.piece).is_ok()
            }
            Ok(MoveOutcome::IllegalQuit) => false,
            Err(e) => {
                log::warn!("rejecting peer move {}{}: {e}", packet.from, packet.to);
                false
            }
        };
        if !applied {
            return None;
        }

        next.set_clock(opponent, Duration::from_secs(packet.clock));
        *game = next;
        Some(SessionEvent::OpponentMoved {
            from: packet.from,
            to: packet.to,
            promotion: promotion.then_some(packet.piece),
        })
    }

    fn restore(&mut self, snapshot: ReconnectSnapshot, game: &mut Game) -> Option<SessionEvent> {
        let own = snapshot.sender.opposite();
        let mut clocks = [Duration::ZERO; 2];
        clocks[snapshot.sender.index()] = Duration::from_secs(snapshot.own_clock);
        clocks[own.index()] = Duration::from_secs(snapshot.peer_clock);

        match Game::restore(&Snapshot {
            history: snapshot.history,
            clocks,
        }) {
            Ok(restored) => {
                if restored.turn_counter() != snapshot.turn {
                    log::debug!(
                        "snapshot turn {} differs from replayed {}",
                        snapshot.turn,
                        restored.turn_counter()
                    );
                }
                *game = restored;
                self.color = Some(own);
                self.connected();
                log::info!("resynchronized as {own}");
                Some(SessionEvent::Resynced { color: own })
            }
            Err(e) => {
                log::warn!("rejecting snapshot: {e}");
                None
            }
        }
    }
}
