//! Rendezvous server.
//!
//! Pairs clients into two-player rooms, tells each member where its peer is, tracks heartbeats
//! and brokers reconnects. [`Relay`] is a pure state machine: it consumes datagrams and the
//! current time and returns the datagrams to send, so the binary and the tests drive it the same
//! way.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::Transport;
use crate::protocol::codec::{CLIENT_ALIVE, DISCONNECT, GAME_END};
use crate::protocol::rendezvous::{PairKind, PeerInfo, PeerRole};

/// Datagrams to send, with their destinations.
pub type Outbox = Vec<(Vec<u8>, SocketAddr)>;

/// Relay tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Silence after which a member counts as gone.
    pub heartbeat_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// One client waiting for a partner.
    Waiting,
    Playing,
    /// A member dropped; the survivor waits for it to come back.
    WaitReconnect,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessClient {
    pub addr: SocketAddr,
    pub role: PeerRole,
    pub last_seen: Instant,
    /// Survivor has asked to reconnect.
    pub rejoining: bool,
}

impl ChessClient {
    fn new(addr: SocketAddr, role: PeerRole, now: Instant) -> Self {
        Self {
            addr,
            role,
            last_seen: now,
            rejoining: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessRoom {
    pub id: u32,
    pub state: RoomState,
    pub kind: PairKind,
    /// At most two members. In `WaitReconnect` the survivor comes first.
    pub clients: Vec<ChessClient>,
}

impl ChessRoom {
    fn member(&self, addr: SocketAddr) -> Option<usize> {
        self.clients.iter().position(|c| c.addr == addr)
    }

    /// Peer info for member `idx`, pointing at the other member.
    fn peer_info(&self, idx: usize) -> Option<(Vec<u8>, SocketAddr)> {
        let me = self.clients.get(idx)?;
        let other = self.clients.get(1 - idx)?;
        let info = PeerInfo {
            kind: self.kind,
            addr: other.addr,
            role: me.role,
        };
        Some((info.encode().to_vec(), me.addr))
    }

    fn announce(&self) -> Outbox {
        (0..self.clients.len())
            .filter_map(|idx| self.peer_info(idx))
            .collect()
    }
}

/// Room bookkeeping for the rendezvous server.
#[derive(Debug, Default)]
pub struct Relay {
    config: RelayConfig,
    rooms: Vec<ChessRoom>,
    next_id: u32,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            rooms: Vec::new(),
            next_id: 0,
        }
    }

    pub fn rooms(&self) -> &[ChessRoom] {
        &self.rooms
    }

    fn find_member(&self, addr: SocketAddr) -> Option<(usize, usize)> {
        self.rooms
            .iter()
            .enumerate()
            .find_map(|(room, r)| r.member(addr).map(|idx| (room, idx)))
    }

    /// Handle one datagram from `from`.
    pub fn handle(&mut self, datagram: &[u8], from: SocketAddr, now: Instant) -> Outbox {
        let member = self.find_member(from);
        if let Some((room, idx)) = member {
            self.rooms[room].clients[idx].last_seen = now;
        }

        if let Some(kind) = PairKind::from_request(datagram) {
            return match member {
                Some((room, idx)) => self.repeat_request(room, idx, kind, now),
                None => match kind {
                    PairKind::Fresh => self.pair_fresh(from, now),
                    PairKind::Reconnect => self.join_reconnect(from, now),
                },
            };
        }

        match (datagram, member) {
            (CLIENT_ALIVE, Some((room, idx))) => {
                let room = &self.rooms[room];
                let lost_peer =
                    room.state == RoomState::WaitReconnect && !room.clients[idx].rejoining;
                if lost_peer {
                    vec![(DISCONNECT.to_vec(), from)]
                } else {
                    Vec::new()
                }
            }
            (CLIENT_ALIVE, None) => {
                log::debug!("heartbeat from {from} outside any room");
                vec![(DISCONNECT.to_vec(), from)]
            }
            (GAME_END | DISCONNECT, Some((room, _))) => {
                log::info!("room {} closed by {from}", self.rooms[room].id);
                self.rooms[room].state = RoomState::End;
                self.rooms.retain(|r| r.state != RoomState::End);
                Vec::new()
            }
            _ => {
                log::debug!("ignoring {} byte datagram from {from}", datagram.len());
                Vec::new()
            }
        }
    }

    /// Drop members that went silent and tell their peers.
    pub fn sweep(&mut self, now: Instant) -> Outbox {
        let timeout = self.config.heartbeat_timeout;
        let mut outbox = Outbox::new();

        for room in &mut self.rooms {
            let before = room.clients.len();
            let survivor = room.clients.first().map(|c| c.addr);
            room.clients
                .retain(|c| now.saturating_duration_since(c.last_seen) <= timeout);
            if room.clients.len() == before {
                continue;
            }
            match (room.state, room.clients.len()) {
                (_, 0) | (RoomState::Waiting, _) => room.state = RoomState::End,
                (RoomState::Playing, _) => {
                    log::info!("room {}: peer timed out", room.id);
                    room.state = RoomState::WaitReconnect;
                    room.clients[0].rejoining = false;
                    outbox.push((DISCONNECT.to_vec(), room.clients[0].addr));
                }
                (RoomState::WaitReconnect, _) => {
                    // Without the survivor nobody holds the game.
                    if room.clients.first().map(|c| c.addr) != survivor {
                        room.state = RoomState::End;
                    }
                }
                (RoomState::End, _) => {}
            }
        }
        self.rooms.retain(|r| r.state != RoomState::End);
        outbox
    }

    /// Receive one datagram from `transport`, handle it, sweep, and flush replies.
    pub fn step<T: Transport>(
        &mut self,
        transport: &mut T,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(), T::Error> {
        let mut outbox = match transport.recv_from(buf, timeout)? {
            Some((len, from)) => self.handle(&buf[..len], from, Instant::now()),
            None => Outbox::new(),
        };
        outbox.extend(self.sweep(Instant::now()));
        for (datagram, to) in outbox {
            transport.send_to(&datagram, to)?;
        }
        Ok(())
    }

    fn open_room(&mut self, state: RoomState, kind: PairKind, client: ChessClient) -> usize {
        self.next_id = self.next_id.wrapping_add(1);
        self.rooms.push(ChessRoom {
            id: self.next_id,
            state,
            kind,
            clients: vec![client],
        });
        self.rooms.len() - 1
    }

    fn pair_fresh(&mut self, from: SocketAddr, now: Instant) -> Outbox {
        let waiting = self
            .rooms
            .iter_mut()
            .find(|r| r.state == RoomState::Waiting && r.clients.len() == 1);
        match waiting {
            Some(room) => {
                room.clients.push(ChessClient::new(from, PeerRole::Wait, now));
                room.state = RoomState::Playing;
                log::info!(
                    "room {}: paired {} with {from}",
                    room.id,
                    room.clients[0].addr
                );
                room.announce()
            }
            None => {
                let client = ChessClient::new(from, PeerRole::Send, now);
                let room = self.open_room(RoomState::Waiting, PairKind::Fresh, client);
                log::info!("room {}: {from} waiting for a partner", self.rooms[room].id);
                Vec::new()
            }
        }
    }

    fn join_reconnect(&mut self, from: SocketAddr, now: Instant) -> Outbox {
        let open = self
            .rooms
            .iter_mut()
            .find(|r| r.state == RoomState::WaitReconnect && r.clients.len() == 1);
        let Some(room) = open else {
            log::debug!("no room awaiting {from}");
            return Vec::new();
        };
        room.clients.push(ChessClient::new(from, PeerRole::Wait, now));
        log::info!("room {}: {from} returned", room.id);
        Self::complete_reconnect(room)
    }

    /// Pair survivor and returner once both are present and asking.
    fn complete_reconnect(room: &mut ChessRoom) -> Outbox {
        if room.clients.len() < 2 || !room.clients[0].rejoining {
            return Vec::new();
        }
        room.clients[0].role = PeerRole::Send;
        room.clients[1].role = PeerRole::Wait;
        room.kind = PairKind::Reconnect;
        room.state = RoomState::Playing;
        log::info!("room {}: reconnected", room.id);
        room.announce()
    }

    fn repeat_request(&mut self, room: usize, idx: usize, kind: PairKind, now: Instant) -> Outbox {
        let room = &mut self.rooms[room];
        match (room.state, kind) {
            (RoomState::Playing, _) if kind == room.kind => {
                room.peer_info(idx).into_iter().collect()
            }
            (RoomState::Playing, PairKind::Reconnect) => {
                // The member restarted before its heartbeat lapsed; the other one holds the game.
                let returner = room.clients.remove(idx);
                log::info!("room {}: {} came back without dropping", room.id, returner.addr);
                room.state = RoomState::WaitReconnect;
                room.clients[0].rejoining = false;
                room.clients.push(ChessClient::new(returner.addr, PeerRole::Wait, now));
                vec![(DISCONNECT.to_vec(), room.clients[0].addr)]
            }
            (RoomState::WaitReconnect, PairKind::Reconnect) => {
                if idx == 0 {
                    room.clients[0].rejoining = true;
                }
                Self::complete_reconnect(room)
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().expect("valid address")
    }

    const A: &str = "10.0.0.2:4000";
    const B: &str = "10.0.0.3:4000";
    const C: &str = "10.0.0.4:4000";

    fn info(outbox: &Outbox, to: &str) -> PeerInfo {
        let (bytes, _) = outbox
            .iter()
            .find(|(_, dest)| *dest == addr(to))
            .unwrap_or_else(|| panic!("nothing sent to {to}"));
        PeerInfo::decode(bytes).expect("peer info")
    }

    fn paired(now: Instant) -> Relay {
        let mut relay = Relay::default();
        relay.handle(b"Hello", addr(A), now);
        relay.handle(b"Hello", addr(B), now);
        relay
    }

    #[test]
    fn first_hello_waits() {
        let mut relay = Relay::default();
        let out = relay.handle(b"Hello", addr(A), Instant::now());
        assert!(out.is_empty());
        assert_eq!(relay.rooms()[0].state, RoomState::Waiting);
    }

    #[test]
    fn second_hello_pairs_both() {
        let mut relay = Relay::default();
        let now = Instant::now();
        relay.handle(b"Hello", addr(A), now);
        let out = relay.handle(b"Hello", addr(B), now);

        assert_eq!(out.len(), 2);
        let to_a = info(&out, A);
        let to_b = info(&out, B);
        assert_eq!((to_a.addr, to_a.role), (addr(B), PeerRole::Send));
        assert_eq!((to_b.addr, to_b.role), (addr(A), PeerRole::Wait));
        assert_eq!(to_a.kind, PairKind::Fresh);
        assert_eq!(relay.rooms()[0].state, RoomState::Playing);
    }

    #[test]
    fn repeated_hello_resends_peer_info() {
        let now = Instant::now();
        let mut relay = paired(now);
        let out = relay.handle(b"Hello", addr(B), now);
        assert_eq!(out.len(), 1);
        assert_eq!(info(&out, B).addr, addr(A));
    }

    #[test]
    fn third_client_opens_a_new_room() {
        let now = Instant::now();
        let mut relay = paired(now);
        assert!(relay.handle(b"Hello", addr(C), now).is_empty());
        assert_eq!(relay.rooms().len(), 2);
    }

    #[test]
    fn game_end_closes_room() {
        let now = Instant::now();
        let mut relay = paired(now);
        relay.handle(b"GAME_END", addr(A), now);
        assert!(relay.rooms().is_empty());
    }

    #[test]
    fn heartbeat_timeout_notifies_survivor() {
        let start = Instant::now();
        let mut relay = paired(start);
        relay.handle(b"CLIENT_ALIVE", addr(A), start + Duration::from_secs(4));

        assert!(relay.sweep(start + Duration::from_secs(5)).is_empty());
        let out = relay.sweep(start + Duration::from_secs(6));

        assert_eq!(out, vec![(DISCONNECT.to_vec(), addr(A))]);
        assert_eq!(relay.rooms()[0].state, RoomState::WaitReconnect);
        assert_eq!(relay.rooms()[0].clients.len(), 1);
    }

    #[test]
    fn reconnect_pairs_survivor_as_sender() {
        let start = Instant::now();
        let mut relay = paired(start);
        relay.handle(b"CLIENT_ALIVE", addr(A), start + Duration::from_secs(4));
        relay.sweep(start + Duration::from_secs(6));
        let later = start + Duration::from_secs(7);

        // The returner may arrive from a new port before the survivor asks.
        assert!(relay.handle(b"PEER_CHESS_RECON", addr(C), later).is_empty());
        let out = relay.handle(b"PEER_CHESS_RECON", addr(A), later);

        let to_a = info(&out, A);
        let to_c = info(&out, C);
        assert_eq!(
            (to_a.kind, to_a.addr, to_a.role),
            (PairKind::Reconnect, addr(C), PeerRole::Send)
        );
        assert_eq!((to_c.addr, to_c.role), (addr(A), PeerRole::Wait));
        assert_eq!(relay.rooms()[0].state, RoomState::Playing);
    }

    #[test]
    fn reconnect_from_playing_member_counts_as_a_drop() {
        let start = Instant::now();
        let mut relay = paired(start);

        // B restarts on the same address while its heartbeat is still fresh.
        let out = relay.handle(b"PEER_CHESS_RECON", addr(B), start + Duration::from_secs(1));

        assert_eq!(out, vec![(DISCONNECT.to_vec(), addr(A))]);
        let room = &relay.rooms()[0];
        assert_eq!(room.state, RoomState::WaitReconnect);
        assert_eq!(room.clients[0].addr, addr(A));
        assert_eq!(room.clients[1].addr, addr(B));

        // Once A asks to rejoin, both are re-paired with A sending the snapshot.
        let out = relay.handle(b"PEER_CHESS_RECON", addr(A), start + Duration::from_secs(2));
        let to_a = info(&out, A);
        let to_b = info(&out, B);
        assert_eq!(
            (to_a.kind, to_a.addr, to_a.role),
            (PairKind::Reconnect, addr(B), PeerRole::Send)
        );
        assert_eq!((to_b.addr, to_b.role), (addr(A), PeerRole::Wait));
        assert_eq!(relay.rooms()[0].state, RoomState::Playing);
    }

    #[test]
    fn repeated_reconnect_after_rejoin_resends_peer_info() {
        let start = Instant::now();
        let mut relay = paired(start);
        relay.handle(b"PEER_CHESS_RECON", addr(B), start);
        relay.handle(b"PEER_CHESS_RECON", addr(A), start);

        let out = relay.handle(b"PEER_CHESS_RECON", addr(B), start);
        assert_eq!(out.len(), 1);
        assert_eq!(info(&out, B).role, PeerRole::Wait);
        assert_eq!(relay.rooms()[0].state, RoomState::Playing);
    }

    #[test]
    fn disconnect_closes_room() {
        let now = Instant::now();
        let mut relay = paired(now);
        relay.handle(b"DISCONNECT", addr(B), now);
        assert!(relay.rooms().is_empty());
    }

    #[test]
    fn stray_reconnect_is_ignored() {
        let mut relay = Relay::default();
        assert!(
            relay
                .handle(b"PEER_CHESS_RECON", addr(C), Instant::now())
                .is_empty()
        );
        assert!(relay.rooms().is_empty());
    }

    #[test]
    fn survivor_heartbeat_repeats_disconnect_until_it_rejoins() {
        let start = Instant::now();
        let mut relay = paired(start);
        relay.handle(b"CLIENT_ALIVE", addr(A), start + Duration::from_secs(4));
        relay.sweep(start + Duration::from_secs(6));

        let out = relay.handle(b"CLIENT_ALIVE", addr(A), start + Duration::from_secs(7));
        assert_eq!(out, vec![(DISCONNECT.to_vec(), addr(A))]);

        relay.handle(b"PEER_CHESS_RECON", addr(A), start + Duration::from_secs(7));
        let out = relay.handle(b"CLIENT_ALIVE", addr(A), start + Duration::from_secs(8));
        assert!(out.is_empty());
    }

    #[test]
    fn heartbeat_from_stranger_gets_disconnect() {
        let mut relay = Relay::default();
        let out = relay.handle(b"CLIENT_ALIVE", addr(C), Instant::now());
        assert_eq!(out, vec![(DISCONNECT.to_vec(), addr(C))]);
    }

    #[test]
    fn lone_waiter_expires() {
        let start = Instant::now();
        let mut relay = Relay::default();
        relay.handle(b"Hello", addr(A), start);
        relay.sweep(start + Duration::from_secs(10));
        assert!(relay.rooms().is_empty());
    }
}
