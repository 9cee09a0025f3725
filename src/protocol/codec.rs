//! Binary packet format shared by both peers.
//!
//! Square and piece fields travel as `value + 1` so a genuine payload byte is never zero. The tag
//! and turn bytes are sent unchanged.

use thiserror::Error;

use crate::game_state::{Color, MoveRecord, PieceKind, Square};

/// Size of every fixed game packet.
pub const MESSAGE_SIZE: usize = 14;
/// Header of a RECONNECT packet before the history array.
pub const RECONNECT_HEADER: usize = 9;
const HISTORY_ENTRY: usize = 4;
const CLOCKS_SIZE: usize = 16;

pub const TAG_COLOR: u8 = 1;
pub const TAG_MOVE: u8 = 2;
pub const TAG_PROMOTION: u8 = 3;
pub const TAG_RECONNECT: u8 = 4;
pub const TAG_QUIT: u8 = 5;

pub const ACK: &[u8] = b"ACK";
pub const HELLO: &[u8] = b"Hello";
pub const CLIENT_ALIVE: &[u8] = b"CLIENT_ALIVE";
pub const DISCONNECT: &[u8] = b"DISCONNECT";
pub const GAME_END: &[u8] = b"GAME_END";

/// Error decoding or encoding a packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
    #[error("bad length for message type {tag}: {len} bytes")]
    Length { tag: u8, len: usize },
    #[error("square byte {0} out of range")]
    Square(u8),
    #[error("piece byte {0} out of range")]
    Piece(u8),
    #[error("color byte {0} out of range")]
    Color(u8),
    #[error("history of {0} moves does not fit in a packet")]
    HistoryTooLong(usize),
    #[error("unknown rendezvous magic")]
    Magic,
    #[error("unknown address family {0}")]
    AddressFamily(u8),
    #[error("unknown peer role {0}")]
    PeerRole(u8),
}

/// Payload of MOVE and PROMOTION packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePacket {
    pub turn: u8,
    pub from: Square,
    pub to: Square,
    /// Moving piece, or the promoted kind in a PROMOTION packet.
    pub piece: PieceKind,
    /// Sender's remaining time in seconds.
    pub clock: u64,
}

/// Full game state sent to resynchronize a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSnapshot {
    pub turn: u8,
    /// Color of the sending player.
    pub sender: Color,
    pub history: Vec<MoveRecord>,
    /// Receiver's remaining time in seconds.
    pub peer_clock: u64,
    /// Sender's remaining time in seconds.
    pub own_clock: u64,
}

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Color assigned to the receiver.
    Color { turn: u8, color: Color },
    Move(MovePacket),
    Promotion(MovePacket),
    Reconnect(ReconnectSnapshot),
    Quit { turn: u8 },
    Ack,
    Hello,
    ClientAlive,
    Disconnect,
    GameEnd,
}

impl Message {
    /// Game messages are acknowledged and deduplicated; the literals are not.
    pub fn is_game_message(&self) -> bool {
        matches!(
            self,
            Message::Color { .. }
                | Message::Move(_)
                | Message::Promotion(_)
                | Message::Reconnect(_)
                | Message::Quit { .. }
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(match self {
            Message::Color { turn, color } => encode_color(*turn, *color).to_vec(),
            Message::Move(packet) => encode_move(packet).to_vec(),
            Message::Promotion(packet) => encode_promotion(packet).to_vec(),
            Message::Reconnect(snapshot) => encode_reconnect_snapshot(snapshot)?,
            Message::Quit { turn } => encode_quit(*turn).to_vec(),
            Message::Ack => ACK.to_vec(),
            Message::Hello => HELLO.to_vec(),
            Message::ClientAlive => CLIENT_ALIVE.to_vec(),
            Message::Disconnect => DISCONNECT.to_vec(),
            Message::GameEnd => GAME_END.to_vec(),
        })
    }
}

#[inline]
fn offset(value: usize) -> u8 {
    value as u8 + 1
}

fn header(tag: u8, turn: u8) -> [u8; MESSAGE_SIZE] {
    let mut buf = [0; MESSAGE_SIZE];
    buf[0] = tag;
    buf[1] = turn;
    buf
}

pub fn encode_color(turn: u8, color: Color) -> [u8; MESSAGE_SIZE] {
    let mut buf = header(TAG_COLOR, turn);
    buf[3] = offset(color.index());
    buf
}

fn encode_move_with(tag: u8, packet: &MovePacket) -> [u8; MESSAGE_SIZE] {
    let mut buf = header(tag, packet.turn);
    buf[3] = offset(packet.from.index());
    buf[4] = offset(packet.to.index());
    buf[5] = offset(packet.piece.index());
    buf[6..14].copy_from_slice(&packet.clock.to_le_bytes());
    buf
}

pub fn encode_move(packet: &MovePacket) -> [u8; MESSAGE_SIZE] {
    encode_move_with(TAG_MOVE, packet)
}

pub fn encode_promotion(packet: &MovePacket) -> [u8; MESSAGE_SIZE] {
    encode_move_with(TAG_PROMOTION, packet)
}

pub fn encode_quit(turn: u8) -> [u8; MESSAGE_SIZE] {
    header(TAG_QUIT, turn)
}

/// Encode a RECONNECT packet: header, packed history, then peer and own clocks.
pub fn encode_reconnect_snapshot(snapshot: &ReconnectSnapshot) -> Result<Vec<u8>, CodecError> {
    let count = snapshot.history.len();
    let bytes = count * HISTORY_ENTRY;
    let total = RECONNECT_HEADER + bytes + CLOCKS_SIZE;
    if total > u16::MAX as usize {
        return Err(CodecError::HistoryTooLong(count));
    }

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&[TAG_RECONNECT, snapshot.turn, offset(snapshot.sender.index())]);
    buf.extend_from_slice(&(total as u16).to_le_bytes());
    buf.extend_from_slice(&(count as u16).to_le_bytes());
    buf.extend_from_slice(&(bytes as u16).to_le_bytes());
    for record in &snapshot.history {
        buf.extend_from_slice(&[
            offset(record.from.index()),
            offset(record.to.index()),
            offset(record.piece_before.index()),
            offset(record.piece_after.index()),
        ]);
    }
    buf.extend_from_slice(&snapshot.peer_clock.to_le_bytes());
    buf.extend_from_slice(&snapshot.own_clock.to_le_bytes());
    Ok(buf)
}

fn square(byte: u8) -> Result<Square, CodecError> {
    byte.checked_sub(1)
        .and_then(Square::new)
        .ok_or(CodecError::Square(byte))
}

/// Pieces on the wire are real pieces only; `Empty` is never valid.
fn piece(byte: u8) -> Result<PieceKind, CodecError> {
    byte.checked_sub(1)
        .and_then(PieceKind::from_index)
        .filter(|kind| kind.color().is_some())
        .ok_or(CodecError::Piece(byte))
}

fn color(byte: u8) -> Result<Color, CodecError> {
    byte.checked_sub(1)
        .and_then(Color::from_index)
        .ok_or(CodecError::Color(byte))
}

fn u16_at(buf: &[u8], at: usize) -> usize {
    u16::from_le_bytes([buf[at], buf[at + 1]]) as usize
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn literal(buf: &[u8], expected: &[u8], message: Message) -> Result<Message, CodecError> {
    if buf == expected {
        Ok(message)
    } else {
        Err(CodecError::Length {
            tag: buf[0],
            len: buf.len(),
        })
    }
}

/// Parse a datagram, keyed on its first byte.
pub fn decode(buf: &[u8]) -> Result<Message, CodecError> {
    let &tag = buf.first().ok_or(CodecError::Empty)?;
    let fixed = |buf: &[u8]| {
        if buf.len() == MESSAGE_SIZE {
            Ok(())
        } else {
            Err(CodecError::Length {
                tag,
                len: buf.len(),
            })
        }
    };

    match tag {
        TAG_COLOR => {
            fixed(buf)?;
            Ok(Message::Color {
                turn: buf[1],
                color: color(buf[3])?,
            })
        }
        TAG_MOVE | TAG_PROMOTION => {
            fixed(buf)?;
            let packet = MovePacket {
                turn: buf[1],
                from: square(buf[3])?,
                to: square(buf[4])?,
                piece: piece(buf[5])?,
                clock: u64_at(buf, 6),
            };
            Ok(if tag == TAG_MOVE {
                Message::Move(packet)
            } else {
                Message::Promotion(packet)
            })
        }
        TAG_RECONNECT => decode_reconnect(buf).map(Message::Reconnect),
        TAG_QUIT => {
            fixed(buf)?;
            Ok(Message::Quit { turn: buf[1] })
        }
        b'A' => literal(buf, ACK, Message::Ack),
        b'H' => literal(buf, HELLO, Message::Hello),
        b'C' => literal(buf, CLIENT_ALIVE, Message::ClientAlive),
        b'D' => literal(buf, DISCONNECT, Message::Disconnect),
        b'G' => literal(buf, GAME_END, Message::GameEnd),
        other => Err(CodecError::UnknownType(other)),
    }
}

fn decode_reconnect(buf: &[u8]) -> Result<ReconnectSnapshot, CodecError> {
    let bad_length = CodecError::Length {
        tag: TAG_RECONNECT,
        len: buf.len(),
    };
    if buf.len() < RECONNECT_HEADER + CLOCKS_SIZE {
        return Err(bad_length);
    }
    let total = u16_at(buf, 3);
    let count = u16_at(buf, 5);
    let bytes = u16_at(buf, 7);
    if total != buf.len()
        || bytes != count * HISTORY_ENTRY
        || RECONNECT_HEADER + bytes + CLOCKS_SIZE != buf.len()
    {
        return Err(bad_length);
    }

    let array = &buf[RECONNECT_HEADER..RECONNECT_HEADER + bytes];
    let history = array
        .chunks_exact(HISTORY_ENTRY)
        .map(|entry| {
            Ok(MoveRecord {
                from: square(entry[0])?,
                to: square(entry[1])?,
                piece_before: piece(entry[2])?,
                piece_after: piece(entry[3])?,
            })
        })
        .collect::<Result<Vec<_>, CodecError>>()?;

    let clocks = RECONNECT_HEADER + bytes;
    Ok(ReconnectSnapshot {
        turn: buf[1],
        sender: color(buf[2])?,
        history,
        peer_clock: u64_at(buf, clocks),
        own_clock: u64_at(buf, clocks + 8),
    })
}
