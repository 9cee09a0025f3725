//! Board representation: squares, bitboards, piece kinds and the engine-side board state.

mod bitboard;
mod board;
mod fen;
mod piece;

pub use bitboard::{Bitboard, Square, SquareParseError, Squares};
pub use board::{
    BoardState, CastleSide, Flags, GameOver, MoveRecord, PendingPromotion, Pieces, Selection,
};
pub use fen::FenError;
pub(crate) use fen::{from_role, load_fen};
pub use piece::{Color, PieceKind, Role};

/// Number of squares on the board
pub const NUM_SQUARES: usize = 64;
