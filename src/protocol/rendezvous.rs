//! Framing between clients and the relay.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use super::codec::{CodecError, HELLO};

/// Well-known relay port.
pub const RELAY_PORT: u16 = 7878;

pub const MAGIC_SIZE: usize = 16;
pub const PAIR_MAGIC: [u8; MAGIC_SIZE] = *b"PEER_CHESS_PAIR!";
pub const RECONNECT_MAGIC: [u8; MAGIC_SIZE] = *b"PEER_CHESS_RECON";

const ADDRESS_SIZE: usize = 19;
/// Magic, address and role byte.
pub const PEER_INFO_SIZE: usize = MAGIC_SIZE + ADDRESS_SIZE + 1;

/// Which handshake a client is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairKind {
    Fresh,
    Reconnect,
}

impl PairKind {
    /// Datagram a client sends to the relay to join a room.
    pub fn request(self) -> &'static [u8] {
        match self {
            PairKind::Fresh => HELLO,
            PairKind::Reconnect => &RECONNECT_MAGIC,
        }
    }

    /// Recognize a join request.
    pub fn from_request(buf: &[u8]) -> Option<PairKind> {
        if buf == HELLO {
            Some(PairKind::Fresh)
        } else if buf == RECONNECT_MAGIC {
            Some(PairKind::Reconnect)
        } else {
            None
        }
    }

    fn magic(self) -> &'static [u8; MAGIC_SIZE] {
        match self {
            PairKind::Fresh => &PAIR_MAGIC,
            PairKind::Reconnect => &RECONNECT_MAGIC,
        }
    }
}

/// What a client does first once paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// Send COLOR, or the snapshot when reconnecting.
    Send = 0,
    /// Wait for the peer's COLOR or snapshot.
    Wait = 1,
}

/// Relay answer telling a client where its peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub kind: PairKind,
    pub addr: SocketAddr,
    pub role: PeerRole,
}

impl PeerInfo {
    pub fn encode(&self) -> [u8; PEER_INFO_SIZE] {
        let mut buf = [0; PEER_INFO_SIZE];
        buf[..MAGIC_SIZE].copy_from_slice(self.kind.magic());

        let address = &mut buf[MAGIC_SIZE..MAGIC_SIZE + ADDRESS_SIZE];
        match self.addr.ip() {
            IpAddr::V4(ip) => {
                address[0] = 4;
                address[1..5].copy_from_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                address[0] = 6;
                address[1..17].copy_from_slice(&ip.octets());
            }
        }
        address[17..19].copy_from_slice(&self.addr.port().to_le_bytes());

        buf[PEER_INFO_SIZE - 1] = self.role as u8;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<PeerInfo, CodecError> {
        if buf.len() != PEER_INFO_SIZE {
            return Err(CodecError::Length {
                tag: buf.first().copied().unwrap_or_default(),
                len: buf.len(),
            });
        }
        let kind = match &buf[..MAGIC_SIZE] {
            magic if magic == PAIR_MAGIC => PairKind::Fresh,
            magic if magic == RECONNECT_MAGIC => PairKind::Reconnect,
            _ => return Err(CodecError::Magic),
        };

        let address = &buf[MAGIC_SIZE..MAGIC_SIZE + ADDRESS_SIZE];
        let ip = match address[0] {
            4 => IpAddr::V4(Ipv4Addr::new(
                address[1], address[2], address[3], address[4],
            )),
            6 => {
                let mut octets = [0; 16];
                octets.copy_from_slice(&address[1..17]);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            family => return Err(CodecError::AddressFamily(family)),
        };
        let port = u16::from_le_bytes([address[17], address[18]]);

        let role = match buf[PEER_INFO_SIZE - 1] {
            0 => PeerRole::Send,
            1 => PeerRole::Wait,
            other => return Err(CodecError::PeerRole(other)),
        };

        Ok(PeerInfo {
            kind,
            addr: SocketAddr::new(ip, port),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("127.0.0.1:50123", PairKind::Fresh, PeerRole::Send)]
    #[test_case("10.1.2.3:7878", PairKind::Reconnect, PeerRole::Wait)]
    #[test_case("[::1]:9000", PairKind::Fresh, PeerRole::Wait)]
    fn peer_info_round_trip(addr: &str, kind: PairKind, role: PeerRole) {
        let info = PeerInfo {
            kind,
            addr: addr.parse().expect("valid address"),
            role,
        };
        let buf = info.encode();
        assert_eq!(buf.len(), 36);
        assert_eq!(PeerInfo::decode(&buf), Ok(info));
    }

    #[test]
    fn ipv4_is_left_aligned_and_port_little_endian() {
        let info = PeerInfo {
            kind: PairKind::Fresh,
            addr: "192.168.0.7:258".parse().expect("valid address"),
            role: PeerRole::Wait,
        };
        let buf = info.encode();

        assert_eq!(&buf[..16], b"PEER_CHESS_PAIR!");
        assert_eq!(&buf[16..21], &[4, 192, 168, 0, 7]);
        assert!(buf[21..33].iter().all(|&b| b == 0));
        assert_eq!(&buf[33..35], &[2, 1]);
        assert_eq!(buf[35], 1);
    }

    #[test]
    fn requests_are_recognized() {
        assert_eq!(PairKind::from_request(b"Hello"), Some(PairKind::Fresh));
        assert_eq!(
            PairKind::from_request(&RECONNECT_MAGIC),
            Some(PairKind::Reconnect)
        );
        assert_eq!(PairKind::from_request(b"ACK"), None);
    }

    #[test]
    fn bad_peer_info_is_rejected() {
        let mut buf = PeerInfo {
            kind: PairKind::Fresh,
            addr: "127.0.0.1:1".parse().expect("valid address"),
            role: PeerRole::Send,
        }
        .encode();

        assert!(matches!(
            PeerInfo::decode(&buf[..20]),
            Err(CodecError::Length { .. })
        ));

        buf[16] = 5;
        assert_eq!(PeerInfo::decode(&buf), Err(CodecError::AddressFamily(5)));

        buf[0] = b'X';
        assert_eq!(PeerInfo::decode(&buf), Err(CodecError::Magic));
    }
}
