//! FEN bridge.
//!
//! Positions are read and written through `shakmaty`'s FEN layer so the strings we exchange
//! with external tools are exactly the standard notation.

use std::num::NonZeroU32;

use shakmaty::fen::{Fen, ParseFenError};
use shakmaty::{CastlingMode, CastlingSide, Chess, EnPassantMode, File, Position, Rank, Setup};
use thiserror::Error;

use super::{BoardState, CastleSide, Color, PieceKind, Role, Square};

/// Error when loading a position from FEN.
#[derive(Debug, Error)]
pub enum FenError {
    #[error("invalid FEN: {0}")]
    Parse(#[from] ParseFenError),
    #[error("illegal position: {0}")]
    Position(String),
}

impl BoardState {
    /// Load a board and the side to move from a FEN string.
    ///
    /// Castling rights that the FEN does not grant are recorded as moved rooks.
    pub fn from_fen(fen: &str) -> Result<(BoardState, Color), FenError> {
        let (board, turn, _) = load_fen(fen)?;
        Ok((board, turn))
    }

    /// Serialize the position as FEN with `turn` to move and the given move counters.
    pub fn to_fen(&self, turn: Color, halfmoves: u32, fullmoves: u32) -> String {
        let mut placement = shakmaty::Board::empty();
        for square in self.pieces().occupied() {
            let kind = self.piece_at(square);
            if let Some(piece) = to_piece(kind) {
                placement.set_piece_at(to_square(square), piece);
            }
        }

        let mut castling_rights = shakmaty::Bitboard::default();
        for color in Color::ALL {
            for side in CastleSide::ALL {
                let rook = side.rook_home(color);
                let king_home = self.piece_at(CastleSide::king_home(color))
                    == PieceKind::new(color, Role::King);
                let rook_home = self.piece_at(rook) == PieceKind::new(color, Role::Rook);
                if self.flags().may_castle(color, side) && king_home && rook_home {
                    castling_rights.toggle(to_square(rook));
                }
            }
        }

        let mut setup = Setup::empty();
        setup.board = placement;
        setup.turn = to_color(turn);
        setup.castling_rights = castling_rights;
        setup.ep_square = self.en_passant().first().map(to_square);
        setup.halfmoves = halfmoves;
        setup.fullmoves = NonZeroU32::new(fullmoves).unwrap_or(NonZeroU32::MIN);

        // Keep the setup even where shakmaty would reject the position.
        Fen::try_from_setup(setup)
            .unwrap_or_else(|e| e.ignore())
            .to_string()
    }
}

/// Load a board, the side to move and the halfmove clock from a FEN string.
pub(crate) fn load_fen(fen: &str) -> Result<(BoardState, Color, u32), FenError> {
    let position: Chess = fen
        .parse::<Fen>()?
        .into_position(CastlingMode::Standard)
        .map_err(|e| FenError::Position(e.to_string()))?;

    let mut board = BoardState::empty();
    for (rank_idx, rank) in Rank::ALL.into_iter().enumerate() {
        for (file_idx, file) in File::ALL.into_iter().enumerate() {
            let theirs = shakmaty::Square::from_coords(file, rank);
            if let Some(piece) = position.board().piece_at(theirs)
                && let Some(square) = Square::from_coords(file_idx as u8, rank_idx as u8)
            {
                board.put(square, from_piece(piece));
            }
        }
    }

    let turn = from_color(position.turn());
    for color in Color::ALL {
        for side in CastleSide::ALL {
            if !position.castles().has(to_color(color), to_castling_side(side)) {
                board.flags_mut().set_rook_moved(color, side);
            }
        }
    }

    let target = position
        .ep_square(EnPassantMode::Always)
        .and_then(|sq| sq.to_string().parse::<Square>().ok());
    let capture = target.and_then(|t| match turn {
        // The pawn that double-stepped sits one rank past the target.
        Color::White => Square::new(t.value().wrapping_sub(8)),
        Color::Black => Square::new(t.value() + 8),
    });
    board.set_en_passant(target, capture);
    board.settle();

    Ok((board, turn, position.halfmoves()))
}

fn to_square(square: Square) -> shakmaty::Square {
    shakmaty::Square::from_coords(
        File::ALL[square.file_index() as usize],
        Rank::ALL[square.rank_index() as usize],
    )
}

fn to_color(color: Color) -> shakmaty::Color {
    match color {
        Color::White => shakmaty::Color::White,
        Color::Black => shakmaty::Color::Black,
    }
}

fn from_color(color: shakmaty::Color) -> Color {
    match color {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

fn to_castling_side(side: CastleSide) -> CastlingSide {
    match side {
        CastleSide::King => CastlingSide::KingSide,
        CastleSide::Queen => CastlingSide::QueenSide,
    }
}

pub(crate) fn from_role(role: shakmaty::Role) -> Role {
    match role {
        shakmaty::Role::Pawn => Role::Pawn,
        shakmaty::Role::Knight => Role::Knight,
        shakmaty::Role::Bishop => Role::Bishop,
        shakmaty::Role::Rook => Role::Rook,
        shakmaty::Role::Queen => Role::Queen,
        shakmaty::Role::King => Role::King,
    }
}

fn to_role(role: Role) -> shakmaty::Role {
    match role {
        Role::Pawn => shakmaty::Role::Pawn,
        Role::Knight => shakmaty::Role::Knight,
        Role::Bishop => shakmaty::Role::Bishop,
        Role::Rook => shakmaty::Role::Rook,
        Role::Queen => shakmaty::Role::Queen,
        Role::King => shakmaty::Role::King,
    }
}

fn from_piece(piece: shakmaty::Piece) -> PieceKind {
    PieceKind::new(from_color(piece.color), from_role(piece.role))
}

fn to_piece(kind: PieceKind) -> Option<shakmaty::Piece> {
    Some(shakmaty::Piece {
        color: to_color(kind.color()?),
        role: to_role(kind.role()?),
    })
}
