use std::net::SocketAddr;
use std::time::Duration;

pub mod feedback;
pub mod game_logic;
pub mod game_state;
pub mod hint;
pub mod mock;
pub mod movegen;
pub mod net;
pub mod protocol;
pub mod relay;
pub mod terminal;

/// Trait for exchanging datagrams with the relay and the peer.
///
/// Abstracts over the UDP socket and in-memory test networks, providing a uniform
/// interface for [`protocol::Session`] and [`relay::Relay`] drivers.
pub trait Transport {
    /// Error type for socket failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one datagram to `addr`.
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<(), Self::Error>;

    /// Wait up to `timeout` for one datagram.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn recv_from(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, Self::Error>;
}

/// Trait for displaying the board and its feedback to the player.
///
/// Abstracts over terminal rendering and test captures, providing a uniform interface for
/// the output side of the game loop. Mirrors [`Transport`] on the network side.
pub trait BoardDisplay {
    /// Error type for display update failures.
    type Error: std::fmt::Debug + std::fmt::Display;

    /// Show the board together with the given feedback state.
    ///
    /// Implementations map [`feedback::SquareFeedback`] variants to their own output
    /// (terminal colors, etc.).
    fn show(
        &mut self,
        board: &game_state::BoardState,
        feedback: &feedback::BoardFeedback,
    ) -> Result<(), Self::Error>;
}
