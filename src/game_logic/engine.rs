use crate::game_state::{
    BoardState, CastleSide, Color, GameOver, MoveRecord, PendingPromotion, PieceKind, Role, Square,
};
use crate::movegen;

/// Result of applying a move to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Move committed and recorded.
    Ok,
    /// Pawn reached the last rank; call [`finalize_promotion`] with the chosen kind.
    PromotionPending,
    /// The board refused the move and is unchanged.
    IllegalQuit,
}

/// Apply a pre-validated move.
///
/// Callers check membership in [`movegen::legal_moves`] first. A move whose origin does not hold
/// `piece`, or one issued while a promotion is pending or after the game ended, is refused with
/// [`MoveOutcome::IllegalQuit`] without touching the board.
pub fn execute_move(board: &mut BoardState, from: Square, to: Square, piece: PieceKind) -> MoveOutcome {
    let Some(color) = piece.color() else {
        return MoveOutcome::IllegalQuit;
    };
    if board.pending_promotion.is_some()
        || board.game_over != GameOver::None
        || board.piece_at(from) != piece
    {
        log::warn!("refusing {piece:?} {from}{to}");
        return MoveOutcome::IllegalQuit;
    }
    debug_assert!(
        movegen::legal_moves(board, piece, from).contains(to),
        "{piece:?} {from}{to} is not legal"
    );

    resolve_capture(board, color, piece, to);
    relocate(board, from, to, piece, false);
    update_castling_rights(board, color, piece, from);
    update_en_passant(board, piece, from, to);
    board.last_move = Some((from, to));

    if piece.is(Role::Pawn) && to.rank_index() == color.promotion_rank() {
        board.pending_promotion = Some(PendingPromotion { from, to, pawn: piece });
        return MoveOutcome::PromotionPending;
    }

    commit(
        board,
        MoveRecord {
            from,
            to,
            piece_before: piece,
            piece_after: piece,
        },
    );
    MoveOutcome::Ok
}

/// Replace the pending pawn with `kind` and commit the move.
///
/// A kind that is not a queen, rook, bishop or knight of the pawn's color is refused and the
/// promotion stays pending.
pub fn finalize_promotion(board: &mut BoardState, kind: PieceKind) -> MoveOutcome {
    let Some(pending) = board.pending_promotion else {
        return MoveOutcome::IllegalQuit;
    };
    let Some(color) = pending.pawn.color() else {
        return MoveOutcome::IllegalQuit;
    };
    if !PieceKind::promotions(color).contains(&kind) {
        log::warn!("refusing promotion to {kind:?}");
        return MoveOutcome::IllegalQuit;
    }

    board.pieces.take(pending.to);
    board.pieces.put(pending.to, kind);
    board.settle();
    board.pending_promotion = None;

    commit(
        board,
        MoveRecord {
            from: pending.from,
            to: pending.to,
            piece_before: pending.pawn,
            piece_after: kind,
        },
    );
    MoveOutcome::Ok
}

/// Remove whatever `piece` lands on, including a pawn taken en passant.
fn resolve_capture(board: &mut BoardState, color: Color, piece: PieceKind, to: Square) {
    let victim_square = if piece.is(Role::Pawn) && board.en_passant.contains(to) {
        board.en_passant_capture.unwrap_or(to)
    } else {
        to
    };

    let victim = board.pieces.take(victim_square);
    if victim == PieceKind::Empty {
        return;
    }
    debug_assert_eq!(victim.color(), Some(color.opposite()));
    board.record_kill(color, victim);

    // A rook taken on its home square forfeits that castle.
    if victim.is(Role::Rook) {
        for side in CastleSide::ALL {
            if side.rook_home(color.opposite()) == victim_square {
                board.flags.set_rook_moved(color.opposite(), side);
            }
        }
    }
}

/// Move `piece` on the bitboards. A two-file king step drags its rook along through an inner
/// call that skips the castling check.
fn relocate(board: &mut BoardState, from: Square, to: Square, piece: PieceKind, inner: bool) {
    if !inner
        && piece.is(Role::King)
        && from.value().abs_diff(to.value()) == 2
        && let Some(color) = piece.color()
    {
        let side = CastleSide::from_king_target(to);
        relocate(
            board,
            side.rook_home(color),
            side.rook_target(color),
            PieceKind::new(color, Role::Rook),
            true,
        );
    }

    board.pieces.take(from);
    board.pieces.put(to, piece);
    board.settle();
}

fn update_castling_rights(board: &mut BoardState, color: Color, piece: PieceKind, from: Square) {
    match piece.role() {
        Some(Role::King) if from == CastleSide::king_home(color) => {
            board.flags.set_king_moved(color);
        }
        Some(Role::Rook) => {
            for side in CastleSide::ALL {
                if from == side.rook_home(color) {
                    board.flags.set_rook_moved(color, side);
                }
            }
        }
        _ => {}
    }
}

/// Only a double pawn step leaves a target, and only until the next move.
fn update_en_passant(board: &mut BoardState, piece: PieceKind, from: Square, to: Square) {
    if piece.is(Role::Pawn) && from.value().abs_diff(to.value()) == 16 {
        let passed = Square::new((from.value() + to.value()) / 2);
        board.set_en_passant(passed, Some(to));
    } else {
        board.set_en_passant(None, None);
    }
}

/// Evaluate the opponent's position and append the history entry.
fn commit(board: &mut BoardState, record: MoveRecord) {
    let Some(color) = record.piece_before.color() else {
        return;
    };
    board.game_over = movegen::is_game_over(board, color.opposite());
    board.history.push(record);
    log::debug!(
        "{:?} {}{} recorded, opponent state {:?}",
        record.piece_after,
        record.from,
        record.to,
        board.game_over
    );
}
