//! Game orchestration: turn order, clocks and the move entry points used by the front end and
//! the network session.

mod engine;

use std::time::Duration;

use thiserror::Error;

use crate::game_state::{
    Bitboard, BoardState, Color, FenError, GameOver, MoveRecord, PieceKind, Role, Selection,
    Square, load_fen,
};
use crate::movegen;

pub use engine::{MoveOutcome, execute_move, finalize_promotion};

/// Default clock per side.
pub const DEFAULT_CLOCK: Duration = Duration::from_secs(10 * 60);

/// Overall state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Playing,
    Checkmate { winner: Color },
    Stalemate,
    Timeout { loser: Color },
    Abandoned { by: Color },
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::Playing
    }
}

/// Reasons a requested move is rejected before it reaches the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("the game is over")]
    GameOver,
    #[error("a promotion choice is pending")]
    PromotionPending,
    #[error("no promotion is pending")]
    NoPromotionPending,
    #[error("no piece on {0}")]
    EmptySquare(Square),
    #[error("it is {0}'s turn")]
    WrongTurn(Color),
    #[error("{from}{to} is not a legal move")]
    Illegal { from: Square, to: Square },
    #[error("cannot promote to {0:?}")]
    InvalidPromotion(PieceKind),
    #[error("history entry {from}{to} does not match the board")]
    HistoryMismatch { from: Square, to: Square },
}

/// Everything needed to rebuild a game on another machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub history: Vec<MoveRecord>,
    /// Remaining time, indexed by [`Color::index`].
    pub clocks: [Duration; 2],
}

/// One game in progress: the board plus turn order and clocks.
///
/// Every move, local or from the network, goes through [`Game::try_move`] and
/// [`Game::promote`], so both peers run the same legality and side-effect path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    board: BoardState,
    turn: Color,
    turn_counter: u8,
    /// Plies since the last capture or pawn move.
    halfmoves: u32,
    clocks: [Duration; 2],
    status: GameStatus,
}

impl Default for Game {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK)
    }
}

impl Game {
    /// New game from the starting position with `clock` per side.
    pub fn new(clock: Duration) -> Self {
        Self::from_board(BoardState::new(), Color::White, clock)
    }

    pub fn from_board(board: BoardState, turn: Color, clock: Duration) -> Self {
        let mut game = Self {
            board,
            turn,
            turn_counter: 0,
            halfmoves: 0,
            clocks: [clock; 2],
            status: GameStatus::Playing,
        };
        game.refresh_status();
        game
    }

    pub fn from_fen(fen: &str, clock: Duration) -> Result<Self, FenError> {
        let (board, turn, halfmoves) = load_fen(fen)?;
        Ok(Self {
            halfmoves,
            ..Self::from_board(board, turn, clock)
        })
    }

    /// Rebuild a game by replaying `history` from the starting position.
    pub fn replay(history: &[MoveRecord], clock: Duration) -> Result<Self, MoveError> {
        let mut game = Self::new(clock);
        for record in history {
            game.apply_record(record)?;
        }
        Ok(game)
    }

    /// Capture history and clocks for a reconnect.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            history: self.history().to_vec(),
            clocks: self.clocks,
        }
    }

    /// Rebuild a game from a snapshot by replaying its history.
    pub fn restore(snapshot: &Snapshot) -> Result<Self, MoveError> {
        let mut game = Self::replay(&snapshot.history, DEFAULT_CLOCK)?;
        game.clocks = snapshot.clocks;
        Ok(game)
    }

    #[inline]
    pub fn board(&self) -> &BoardState {
        &self.board
    }

    /// Side to move.
    #[inline]
    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Half-move counter, wrapping at 255. Informational only.
    #[inline]
    pub fn turn_counter(&self) -> u8 {
        self.turn_counter
    }

    #[inline]
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Plies since the last capture or pawn move, as written in FEN.
    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmoves
    }

    #[inline]
    pub fn clock(&self, color: Color) -> Duration {
        self.clocks[color.index()]
    }

    pub fn set_clock(&mut self, color: Color, remaining: Duration) {
        self.clocks[color.index()] = remaining;
    }

    #[inline]
    pub fn history(&self) -> &[MoveRecord] {
        self.board.history()
    }

    /// Legal destinations for the piece on `square`, if it belongs to the side to move.
    pub fn legal_moves(&self, square: Square) -> Bitboard {
        match self.board.piece_at(square).color() {
            Some(color) if color == self.turn && !self.status.is_over() => {
                movegen::legal_moves_from(&self.board, square)
            }
            _ => Bitboard::EMPTY,
        }
    }

    /// Pick up the piece on `square` and remember where it may go.
    pub fn select(&mut self, square: Square) -> Bitboard {
        let destinations = self.legal_moves(square);
        self.board.selection = if destinations.is_empty() {
            Selection::default()
        } else {
            Selection {
                square: Some(square),
                piece: Some(self.board.piece_at(square)),
                destinations,
            }
        };
        destinations
    }

    pub fn clear_selection(&mut self) {
        self.board.selection = Selection::default();
    }

    /// Validate and play a move for the side to move.
    pub fn try_move(&mut self, from: Square, to: Square) -> Result<MoveOutcome, MoveError> {
        if self.status.is_over() {
            return Err(MoveError::GameOver);
        }
        if self.board.pending_promotion().is_some() {
            return Err(MoveError::PromotionPending);
        }
        let piece = self.board.piece_at(from);
        match piece.color() {
            None => return Err(MoveError::EmptySquare(from)),
            Some(color) if color != self.turn => return Err(MoveError::WrongTurn(self.turn)),
            Some(_) => {}
        }
        if !movegen::legal_moves(&self.board, piece, from).contains(to) {
            return Err(MoveError::Illegal { from, to });
        }

        let resets_halfmoves = piece.is(Role::Pawn) || self.board.piece_at(to) != PieceKind::Empty;
        let outcome = execute_move(&mut self.board, from, to, piece);
        if outcome != MoveOutcome::IllegalQuit {
            self.halfmoves = if resets_halfmoves { 0 } else { self.halfmoves + 1 };
        }
        self.clear_selection();
        if outcome == MoveOutcome::Ok {
            self.end_turn();
        }
        Ok(outcome)
    }

    /// Choose the piece for a pending promotion.
    pub fn promote(&mut self, kind: PieceKind) -> Result<MoveOutcome, MoveError> {
        if self.board.pending_promotion().is_none() {
            return Err(MoveError::NoPromotionPending);
        }
        match finalize_promotion(&mut self.board, kind) {
            MoveOutcome::Ok => {
                self.end_turn();
                Ok(MoveOutcome::Ok)
            }
            _ => Err(MoveError::InvalidPromotion(kind)),
        }
    }

    /// Play one history entry, including its promotion choice.
    pub fn apply_record(&mut self, record: &MoveRecord) -> Result<(), MoveError> {
        if self.board.piece_at(record.from) != record.piece_before {
            return Err(MoveError::HistoryMismatch {
                from: record.from,
                to: record.to,
            });
        }
        match self.try_move(record.from, record.to)? {
            MoveOutcome::PromotionPending => {
                self.promote(record.piece_after)?;
            }
            _ if record.is_promotion() => {
                return Err(MoveError::HistoryMismatch {
                    from: record.from,
                    to: record.to,
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Run the clock of the side to move. Returns the status afterwards.
    pub fn tick_clock(&mut self, elapsed: Duration) -> GameStatus {
        if self.status.is_over() {
            return self.status;
        }
        let clock = &mut self.clocks[self.turn.index()];
        *clock = clock.saturating_sub(elapsed);
        if clock.is_zero() {
            log::info!("{} ran out of time", self.turn);
            self.status = GameStatus::Timeout { loser: self.turn };
        }
        self.status
    }

    /// End the game because `by` left it.
    pub fn abandon(&mut self, by: Color) {
        if !self.status.is_over() {
            self.status = GameStatus::Abandoned { by };
        }
    }

    fn end_turn(&mut self) {
        self.turn = self.turn.opposite();
        self.turn_counter = self.turn_counter.wrapping_add(1);
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.status = match movegen::is_game_over(&self.board, self.turn) {
            GameOver::None => GameStatus::Playing,
            GameOver::Checkmate => GameStatus::Checkmate {
                winner: self.turn.opposite(),
            },
            GameOver::Stalemate => GameStatus::Stalemate,
        };
        if self.status.is_over() {
            log::info!("game over: {:?}", self.status);
        }
    }
}
