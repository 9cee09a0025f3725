//! Move generation.
//!
//! `pseudo_moves` follows piece movement rules only. `legal_moves` replays each candidate on a
//! copy of the placement and drops those that leave the mover's king attacked.

pub mod tables;

use crate::game_state::{
    Bitboard, BoardState, CastleSide, Color, GameOver, PieceKind, Pieces, Role, Square,
};
use tables::{
    BISHOP_DIRS, KING_ATTACKS, KNIGHT_ATTACKS, NORTH, PAWN_ATTACKS, QUEEN_DIRS, ROOK_DIRS, SOUTH,
    slide,
};

/// Squares attacked by `kind` standing on `from`, blockers included regardless of color.
pub fn attacks(pieces: &Pieces, kind: PieceKind, from: Square) -> Bitboard {
    let origin = Bitboard::from(from);
    let occupied = pieces.occupied();
    match (kind.role(), kind.color()) {
        (Some(Role::Pawn), Some(color)) => Bitboard::new(PAWN_ATTACKS[color.index()][from.index()]),
        (Some(Role::Knight), _) => Bitboard::new(KNIGHT_ATTACKS[from.index()]),
        (Some(Role::King), _) => Bitboard::new(KING_ATTACKS[from.index()]),
        (Some(Role::Bishop), _) => slide(origin, &BISHOP_DIRS, occupied),
        (Some(Role::Rook), _) => slide(origin, &ROOK_DIRS, occupied),
        (Some(Role::Queen), _) => slide(origin, &QUEEN_DIRS, occupied),
        _ => Bitboard::EMPTY,
    }
}

/// Union of every square `color` attacks.
pub fn control(pieces: &Pieces, color: Color) -> Bitboard {
    PieceKind::ALL
        .into_iter()
        .filter(|kind| kind.color() == Some(color))
        .flat_map(|kind| pieces.of(kind).squares().map(move |from| (kind, from)))
        .fold(Bitboard::EMPTY, |acc, (kind, from)| acc | attacks(pieces, kind, from))
}

/// Whether `side`'s king is attacked on the settled board.
pub fn is_in_check(board: &BoardState, side: Color) -> bool {
    let pieces = board.pieces();
    !(pieces.control(side.opposite()) & pieces.king(side)).is_empty()
}

/// Destinations allowed by movement rules, before the own-king safety check.
pub fn pseudo_moves(board: &BoardState, kind: PieceKind, from: Square) -> Bitboard {
    let Some(color) = kind.color() else {
        return Bitboard::EMPTY;
    };
    debug_assert_eq!(board.piece_at(from), kind, "no {kind:?} on {from}");

    let own = board.pieces().by_color(color);
    match kind.role() {
        Some(Role::Pawn) => pawn_moves(board, color, from),
        Some(Role::King) => (attacks(board.pieces(), kind, from) & !own) | castle_moves(board, color, from),
        Some(_) => attacks(board.pieces(), kind, from) & !own,
        None => Bitboard::EMPTY,
    }
}

/// Pseudo moves that do not leave the mover's own king attacked.
pub fn legal_moves(board: &BoardState, kind: PieceKind, from: Square) -> Bitboard {
    pseudo_moves(board, kind, from)
        .squares()
        .filter(|&to| keeps_king_safe(board, kind, from, to))
        .collect()
}

/// Legal destinations for whatever stands on `square`. Empty squares have none.
pub fn legal_moves_from(board: &BoardState, square: Square) -> Bitboard {
    match board.piece_at(square) {
        PieceKind::Empty => Bitboard::EMPTY,
        kind => legal_moves(board, kind, square),
    }
}

/// Every legal `(from, destinations)` pair for `side`, skipping pieces with no moves.
pub fn all_legal_moves(board: &BoardState, side: Color) -> Vec<(Square, Bitboard)> {
    board
        .pieces()
        .by_color(side)
        .squares()
        .map(|from| (from, legal_moves_from(board, from)))
        .filter(|(_, to)| !to.is_empty())
        .collect()
}

/// Terminal state for `side` to move: no legal move at all is mate or stalemate.
pub fn is_game_over(board: &BoardState, side: Color) -> GameOver {
    let any_move = board
        .pieces()
        .by_color(side)
        .squares()
        .any(|from| !legal_moves_from(board, from).is_empty());
    if any_move {
        GameOver::None
    } else if is_in_check(board, side) {
        GameOver::Checkmate
    } else {
        GameOver::Stalemate
    }
}

fn pawn_moves(board: &BoardState, color: Color, from: Square) -> Bitboard {
    let pieces = board.pieces();
    let empty = !pieces.occupied();
    let forward = match color {
        Color::White => NORTH,
        Color::Black => SOUTH,
    };

    let single = forward.apply(Bitboard::from(from)) & empty;
    let mut moves = single;
    if from.rank_index() == color.pawn_rank() && !single.is_empty() {
        moves |= forward.apply(single) & empty;
    }

    let mut targets = pieces.by_color(color.opposite());
    if let Some(victim) = board.en_passant_capture()
        && pieces.piece_at(victim) == PieceKind::new(color.opposite(), Role::Pawn)
    {
        targets |= board.en_passant();
    }
    moves | (Bitboard::new(PAWN_ATTACKS[color.index()][from.index()]) & targets)
}

fn castle_moves(board: &BoardState, color: Color, from: Square) -> Bitboard {
    let mut moves = Bitboard::EMPTY;
    let flags = board.flags();
    if from != CastleSide::king_home(color) || flags.king_moved(color) {
        return moves;
    }

    let pieces = board.pieces();
    let enemy = pieces.control(color.opposite());
    if enemy.contains(from) {
        return moves;
    }

    for side in CastleSide::ALL {
        let rook_home = side.rook_home(color);
        if !flags.may_castle(color, side)
            || pieces.piece_at(rook_home) != PieceKind::new(color, Role::Rook)
        {
            continue;
        }
        let target = side.king_target(color);
        let path = between(from, target) | Bitboard::from(target);
        if (between(from, rook_home) & pieces.occupied()).is_empty() && (path & enemy).is_empty() {
            moves.set(target);
        }
    }
    moves
}

/// Squares strictly between two squares of the same rank.
fn between(a: Square, b: Square) -> Bitboard {
    debug_assert_eq!(a.rank_index(), b.rank_index());
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    (lo.value() + 1..hi.value()).filter_map(Square::new).collect()
}

fn keeps_king_safe(board: &BoardState, kind: PieceKind, from: Square, to: Square) -> bool {
    let Some(color) = kind.color() else {
        return false;
    };
    let mut trial = *board.pieces();
    play_on(
        &mut trial,
        kind,
        from,
        to,
        board.en_passant(),
        board.en_passant_capture(),
    );
    (control(&trial, color.opposite()) & trial.king(color)).is_empty()
}

/// Apply a move to a bare placement, without any bookkeeping beyond occupancy.
fn play_on(
    pieces: &mut Pieces,
    kind: PieceKind,
    from: Square,
    to: Square,
    en_passant: Bitboard,
    en_passant_capture: Option<Square>,
) {
    pieces.take(to);
    if kind.is(Role::Pawn)
        && en_passant.contains(to)
        && let Some(victim) = en_passant_capture
    {
        pieces.take(victim);
    }
    pieces.take(from);
    pieces.put(to, kind);

    if kind.is(Role::King)
        && from.value().abs_diff(to.value()) == 2
        && let Some(color) = kind.color()
    {
        let side = CastleSide::from_king_target(to);
        let rook = pieces.take(side.rook_home(color));
        if rook != PieceKind::Empty {
            pieces.put(side.rook_target(color), rook);
        }
    }
    pieces.settle_occupancy();
}
