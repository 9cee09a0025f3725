use super::{Bitboard, Color, PieceKind, Role, Square};
use crate::movegen;

/// Standard starting masks, indexed by [`PieceKind`] ordinal.
const START_MASKS: [u64; 12] = [
    0x0000_0000_0000_FF00,
    0x0000_0000_0000_0042,
    0x0000_0000_0000_0024,
    0x0000_0000_0000_0081,
    0x0000_0000_0000_0008,
    0x0000_0000_0000_0010,
    0x00FF_0000_0000_0000,
    0x4200_0000_0000_0000,
    0x2400_0000_0000_0000,
    0x8100_0000_0000_0000,
    0x0800_0000_0000_0000,
    0x1000_0000_0000_0000,
];

/// Piece placement: the twelve authoritative per-kind bitboards plus derived aggregates.
///
/// The aggregates are only valid after [`Pieces::settle`]; nothing mutates them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pieces {
    kinds: [Bitboard; 12],
    occupied: Bitboard,
    by_color: [Bitboard; 2],
    control: [Bitboard; 2],
}

impl Pieces {
    pub fn starting() -> Self {
        let mut pieces = Self {
            kinds: START_MASKS.map(Bitboard::new),
            ..Self::default()
        };
        pieces.settle();
        pieces
    }

    #[inline]
    pub fn of(&self, kind: PieceKind) -> Bitboard {
        debug_assert!(kind != PieceKind::Empty);
        self.kinds[kind.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.occupied
    }

    #[inline]
    pub fn by_color(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    /// Squares attacked by `color` as of the last settle.
    #[inline]
    pub fn control(&self, color: Color) -> Bitboard {
        self.control[color.index()]
    }

    pub fn king(&self, color: Color) -> Bitboard {
        self.of(PieceKind::new(color, Role::King))
    }

    pub fn piece_at(&self, square: Square) -> PieceKind {
        if !self.occupied.contains(square) {
            return PieceKind::Empty;
        }
        PieceKind::ALL
            .into_iter()
            .find(|kind| self.kinds[kind.index()].contains(square))
            .unwrap_or(PieceKind::Empty)
    }

    /// Place `kind` on `square`. The square must be empty in every kind board.
    pub fn put(&mut self, square: Square, kind: PieceKind) {
        debug_assert!(kind != PieceKind::Empty);
        debug_assert!(
            self.kinds.iter().all(|bb| !bb.contains(square)),
            "{square} already occupied"
        );
        self.kinds[kind.index()].set(square);
    }

    /// Remove whatever stands on `square`, returning it.
    pub fn take(&mut self, square: Square) -> PieceKind {
        for kind in PieceKind::ALL {
            let bb = &mut self.kinds[kind.index()];
            if bb.contains(square) {
                bb.clear(square);
                return kind;
            }
        }
        PieceKind::Empty
    }

    /// Recompute occupancy aggregates only.
    pub fn settle_occupancy(&mut self) {
        let mut by_color = [Bitboard::EMPTY; 2];
        for kind in PieceKind::ALL {
            if let Some(color) = kind.color() {
                by_color[color.index()] |= self.kinds[kind.index()];
            }
        }
        self.by_color = by_color;
        self.occupied = by_color[0] | by_color[1];
    }

    /// Recompute every aggregate from the kind boards.
    pub fn settle(&mut self) {
        self.settle_occupancy();
        for color in Color::ALL {
            self.control[color.index()] = movegen::control(self, color);
        }
    }
}

/// Eight packed booleans: check state and castling bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Flags(u8);

impl Flags {
    const WHITE_CHECK: u8 = 1 << 0;
    const BLACK_CHECK: u8 = 1 << 1;
    const WHITE_KING_MOVED: u8 = 1 << 2;
    const WHITE_KINGSIDE_ROOK_MOVED: u8 = 1 << 3;
    const WHITE_QUEENSIDE_ROOK_MOVED: u8 = 1 << 4;
    const BLACK_KING_MOVED: u8 = 1 << 5;
    const BLACK_KINGSIDE_ROOK_MOVED: u8 = 1 << 6;
    const BLACK_QUEENSIDE_ROOK_MOVED: u8 = 1 << 7;

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    fn get(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    fn put(&mut self, bit: u8, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn in_check(self, color: Color) -> bool {
        self.get(match color {
            Color::White => Self::WHITE_CHECK,
            Color::Black => Self::BLACK_CHECK,
        })
    }

    pub fn set_in_check(&mut self, color: Color, on: bool) {
        let bit = match color {
            Color::White => Self::WHITE_CHECK,
            Color::Black => Self::BLACK_CHECK,
        };
        self.put(bit, on);
    }

    pub fn king_moved(self, color: Color) -> bool {
        self.get(match color {
            Color::White => Self::WHITE_KING_MOVED,
            Color::Black => Self::BLACK_KING_MOVED,
        })
    }

    pub fn set_king_moved(&mut self, color: Color) {
        let bit = match color {
            Color::White => Self::WHITE_KING_MOVED,
            Color::Black => Self::BLACK_KING_MOVED,
        };
        self.put(bit, true);
    }

    pub fn rook_moved(self, color: Color, side: CastleSide) -> bool {
        self.get(Self::rook_bit(color, side))
    }

    pub fn set_rook_moved(&mut self, color: Color, side: CastleSide) {
        self.put(Self::rook_bit(color, side), true);
    }

    fn rook_bit(color: Color, side: CastleSide) -> u8 {
        match (color, side) {
            (Color::White, CastleSide::King) => Self::WHITE_KINGSIDE_ROOK_MOVED,
            (Color::White, CastleSide::Queen) => Self::WHITE_QUEENSIDE_ROOK_MOVED,
            (Color::Black, CastleSide::King) => Self::BLACK_KINGSIDE_ROOK_MOVED,
            (Color::Black, CastleSide::Queen) => Self::BLACK_QUEENSIDE_ROOK_MOVED,
        }
    }

    /// Whether castling on `side` is still permitted by the move bookkeeping.
    pub fn may_castle(self, color: Color, side: CastleSide) -> bool {
        !self.king_moved(color) && !self.rook_moved(color, side)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    King,
    Queen,
}

impl CastleSide {
    pub const ALL: [CastleSide; 2] = [CastleSide::King, CastleSide::Queen];

    pub const fn king_home(color: Color) -> Square {
        match color {
            Color::White => Square::E1,
            Color::Black => Square::E8,
        }
    }

    /// Rook home square for this side.
    pub const fn rook_home(self, color: Color) -> Square {
        match (color, self) {
            (Color::White, CastleSide::King) => Square::H1,
            (Color::White, CastleSide::Queen) => Square::A1,
            (Color::Black, CastleSide::King) => Square::H8,
            (Color::Black, CastleSide::Queen) => Square::A8,
        }
    }

    /// Where the king lands.
    pub const fn king_target(self, color: Color) -> Square {
        match (color, self) {
            (Color::White, CastleSide::King) => Square::G1,
            (Color::White, CastleSide::Queen) => Square::C1,
            (Color::Black, CastleSide::King) => Square::G8,
            (Color::Black, CastleSide::Queen) => Square::C8,
        }
    }

    /// Where the rook lands, adjacent to the king's destination.
    pub const fn rook_target(self, color: Color) -> Square {
        match (color, self) {
            (Color::White, CastleSide::King) => Square::F1,
            (Color::White, CastleSide::Queen) => Square::D1,
            (Color::Black, CastleSide::King) => Square::F8,
            (Color::Black, CastleSide::Queen) => Square::D8,
        }
    }

    /// Side implied by a two-file king step to `to`.
    pub fn from_king_target(to: Square) -> CastleSide {
        if to.file_index() > 4 {
            CastleSide::King
        } else {
            CastleSide::Queen
        }
    }
}

/// One committed move. `piece_before != piece_after` marks a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    pub piece_before: PieceKind,
    pub piece_after: PieceKind,
}

impl MoveRecord {
    pub fn is_promotion(&self) -> bool {
        self.piece_before != self.piece_after
    }
}

/// Terminal condition for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum GameOver {
    #[default]
    None,
    Checkmate,
    Stalemate,
}

/// UI bookkeeping: which square is picked up and where it may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub square: Option<Square>,
    pub piece: Option<PieceKind>,
    pub destinations: Bitboard,
}

/// A pawn move waiting for the promotion choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPromotion {
    pub from: Square,
    pub to: Square,
    pub pawn: PieceKind,
}

/// Complete engine-side board: placement, rule bookkeeping and history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    pub(crate) pieces: Pieces,
    pub(crate) selection: Selection,
    pub(crate) en_passant: Bitboard,
    pub(crate) en_passant_capture: Option<Square>,
    pub(crate) last_move: Option<(Square, Square)>,
    pub(crate) history: Vec<MoveRecord>,
    pub(crate) kills: [Vec<PieceKind>; 2],
    pub(crate) flags: Flags,
    pub(crate) pending_promotion: Option<PendingPromotion>,
    pub(crate) game_over: GameOver,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardState {
    /// A board in the standard starting position.
    pub fn new() -> Self {
        let mut board = Self::empty();
        board.reset();
        board
    }

    /// A board with no pieces at all.
    pub fn empty() -> Self {
        Self {
            pieces: Pieces::default(),
            selection: Selection::default(),
            en_passant: Bitboard::EMPTY,
            en_passant_capture: None,
            last_move: None,
            history: Vec::new(),
            kills: [Vec::new(), Vec::new()],
            flags: Flags::default(),
            pending_promotion: None,
            game_over: GameOver::None,
        }
    }

    /// Return to the standard starting position, clearing flags and history.
    pub fn reset(&mut self) {
        *self = Self::empty();
        self.pieces = Pieces::starting();
        self.settle();
    }

    /// Kind standing on `square`, or `Empty`.
    #[inline]
    pub fn piece_at(&self, square: Square) -> PieceKind {
        self.pieces.piece_at(square)
    }

    /// Recompute aggregates and check flags after a kind-board change.
    pub fn settle(&mut self) {
        self.pieces.settle();
        for color in Color::ALL {
            let attacked = !(self.pieces.control(color.opposite()) & self.pieces.king(color)).is_empty();
            self.flags.set_in_check(color, attacked);
        }
    }

    #[inline]
    pub fn pieces(&self) -> &Pieces {
        &self.pieces
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[inline]
    pub fn en_passant(&self) -> Bitboard {
        self.en_passant
    }

    /// Square of the pawn that an en passant capture would remove.
    #[inline]
    pub fn en_passant_capture(&self) -> Option<Square> {
        self.en_passant_capture
    }

    #[inline]
    pub fn last_move(&self) -> Option<(Square, Square)> {
        self.last_move
    }

    #[inline]
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    /// Pieces captured by `color`, ordered by kind.
    #[inline]
    pub fn kills(&self, color: Color) -> &[PieceKind] {
        &self.kills[color.index()]
    }

    #[inline]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[inline]
    pub fn pending_promotion(&self) -> Option<PendingPromotion> {
        self.pending_promotion
    }

    /// Terminal state reached by the last committed move.
    #[inline]
    pub fn game_over(&self) -> GameOver {
        self.game_over
    }

    /// Insert a capture into the kill list of `by`, keeping kind order.
    pub(crate) fn record_kill(&mut self, by: Color, kind: PieceKind) {
        let list = &mut self.kills[by.index()];
        let at = list.partition_point(|k| *k <= kind);
        list.insert(at, kind);
    }

    /// Place a piece directly, for position setup. Call [`BoardState::settle`] afterwards.
    pub fn put(&mut self, square: Square, kind: PieceKind) {
        self.pieces.put(square, kind);
    }

    pub(crate) fn flags_mut(&mut self) -> &mut Flags {
        &mut self.flags
    }

    pub(crate) fn set_en_passant(&mut self, target: Option<Square>, capture: Option<Square>) {
        self.en_passant = target.map(Bitboard::from).unwrap_or_default();
        self.en_passant_capture = capture;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().expect("valid square")
    }

    #[test]
    fn starting_position_has_every_piece_in_place() {
        let board = BoardState::new();
        let back_rank = [
            Role::Rook,
            Role::Knight,
            Role::Bishop,
            Role::Queen,
            Role::King,
            Role::Bishop,
            Role::Knight,
            Role::Rook,
        ];

        for square in Square::all() {
            let expected = match square.rank() {
                1 => PieceKind::new(Color::White, back_rank[square.file_index() as usize]),
                2 => PieceKind::WhitePawn,
                7 => PieceKind::BlackPawn,
                8 => PieceKind::new(Color::Black, back_rank[square.file_index() as usize]),
                _ => PieceKind::Empty,
            };
            assert_eq!(board.piece_at(square), expected, "at {square}");
        }
        assert_eq!(board.pieces().occupied().count(), 32);
    }

    #[test]
    fn no_square_is_shared_by_two_kinds() {
        let board = BoardState::new();
        let mut seen = Bitboard::EMPTY;
        for kind in PieceKind::ALL {
            assert!((seen & board.pieces().of(kind)).is_empty());
            seen |= board.pieces().of(kind);
        }
        assert_eq!(seen, board.pieces().occupied());
    }

    #[test]
    fn aggregates_follow_settle() {
        let mut board = BoardState::empty();
        board.put(sq("e1"), PieceKind::WhiteKing);
        board.put(sq("e8"), PieceKind::BlackKing);
        board.put(sq("e5"), PieceKind::BlackRook);
        board.settle();

        assert_eq!(board.pieces().by_color(Color::White), Bitboard::from(sq("e1")));
        assert_eq!(board.pieces().occupied().count(), 3);
        assert!(board.flags().in_check(Color::White));
        assert!(!board.flags().in_check(Color::Black));
    }

    #[test]
    fn take_removes_and_reports() {
        let mut board = BoardState::new();
        assert_eq!(board.pieces.take(sq("d8")), PieceKind::BlackQueen);
        assert_eq!(board.pieces.take(sq("d4")), PieceKind::Empty);
        board.settle();
        assert_eq!(board.piece_at(sq("d8")), PieceKind::Empty);
    }

    #[test]
    fn kill_list_stays_ordered() {
        let mut board = BoardState::new();
        board.record_kill(Color::White, PieceKind::BlackQueen);
        board.record_kill(Color::White, PieceKind::BlackPawn);
        board.record_kill(Color::White, PieceKind::BlackKnight);
        board.record_kill(Color::White, PieceKind::BlackPawn);
        assert_eq!(
            board.kills(Color::White),
            &[
                PieceKind::BlackPawn,
                PieceKind::BlackPawn,
                PieceKind::BlackKnight,
                PieceKind::BlackQueen
            ]
        );
        assert!(board.kills(Color::Black).is_empty());
    }

    #[test]
    fn flags_track_each_bit_independently() {
        let mut flags = Flags::default();
        flags.set_rook_moved(Color::Black, CastleSide::Queen);
        assert!(flags.may_castle(Color::Black, CastleSide::King));
        assert!(!flags.may_castle(Color::Black, CastleSide::Queen));
        flags.set_king_moved(Color::White);
        assert!(!flags.may_castle(Color::White, CastleSide::King));
        assert_eq!(flags.bits(), (1 << 7) | (1 << 2));
        flags.set_in_check(Color::Black, true);
        flags.set_in_check(Color::Black, false);
        assert!(!flags.in_check(Color::Black));
    }

    #[test]
    fn reset_clears_history_and_flags() {
        let mut board = BoardState::new();
        board.flags_mut().set_king_moved(Color::White);
        board.history.push(MoveRecord {
            from: sq("e2"),
            to: sq("e4"),
            piece_before: PieceKind::WhitePawn,
            piece_after: PieceKind::WhitePawn,
        });
        board.reset();
        assert_eq!(board, BoardState::new());
    }
}
