//! Peer-to-peer wire protocol: packet codec, relay framing and the session state machine.

pub mod codec;
pub mod rendezvous;
pub mod session;

pub use codec::{CodecError, Message, MovePacket, ReconnectSnapshot, decode};
pub use rendezvous::{PairKind, PeerInfo, PeerRole, RELAY_PORT};
pub use session::{ClientState, Session, SessionConfig, SessionError, SessionEvent};
