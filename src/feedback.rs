use crate::game_logic::Game;
use crate::game_state::{BoardState, Color, Role, Square};

/// Type of visual feedback for an individual square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SquareFeedback {
    /// Start or end of the most recent move
    LastMove,
    /// King of this color is attacked
    Check,
    /// Selected piece
    Origin,
    /// Legal destination for the selected piece
    Destination,
    /// Moving here captures an opponent piece
    Capture,
}

/// Contains the set of squares and their associated feedback types for the current board state.
///
/// `BoardFeedback` is computed by [`compute_feedback`] and consumed by a [`crate::BoardDisplay`].
/// A square carries at most one feedback kind; later, more specific kinds replace earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardFeedback {
    squares: Vec<(Square, SquareFeedback)>,
}

impl BoardFeedback {
    /// Create empty feedback (no highlights)
    #[inline]
    pub const fn new() -> Self {
        Self {
            squares: Vec::new(),
        }
    }

    /// Get all square feedback entries
    #[inline]
    pub fn squares(&self) -> &[(Square, SquareFeedback)] {
        &self.squares
    }

    /// Get feedback for a specific square, if any
    #[inline]
    pub fn get(&self, square: Square) -> Option<SquareFeedback> {
        self.squares
            .iter()
            .find(|(sq, _)| *sq == square)
            .map(|(_, feedback)| *feedback)
    }

    /// Set feedback for a square, replacing any previous kind.
    pub fn set(&mut self, square: Square, feedback: SquareFeedback) {
        match self.squares.iter_mut().find(|(sq, _)| *sq == square) {
            Some(entry) => entry.1 = feedback,
            None => self.squares.push((square, feedback)),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }
}

impl From<Vec<(Square, SquareFeedback)>> for BoardFeedback {
    fn from(squares: Vec<(Square, SquareFeedback)>) -> Self {
        let mut feedback = Self::new();
        for (square, kind) in squares {
            feedback.set(square, kind);
        }
        feedback
    }
}

/// Game state information needed to compute feedback
pub trait FeedbackSource {
    fn board(&self) -> &BoardState;
}

impl FeedbackSource for Game {
    fn board(&self) -> &BoardState {
        Game::board(self)
    }
}

/// Compute visual feedback for the current board.
///
/// Layers, lowest priority first:
/// - last move origin and destination
/// - the king of any side in check
/// - the selected piece and its legal destinations, captures marked separately
pub fn compute_feedback(source: &impl FeedbackSource) -> BoardFeedback {
    let board = source.board();
    let mut feedback = BoardFeedback::new();

    if let Some((from, to)) = board.last_move() {
        feedback.set(from, SquareFeedback::LastMove);
        feedback.set(to, SquareFeedback::LastMove);
    }

    for color in Color::ALL {
        if board.flags().in_check(color)
            && let Some(king) = board.pieces().king(color).first()
        {
            feedback.set(king, SquareFeedback::Check);
        }
    }

    let selection = board.selection();
    if let Some(from) = selection.square {
        feedback.set(from, SquareFeedback::Origin);
        for to in selection.destinations {
            feedback.set(to, classify_destination(board, from, to));
        }
    }

    feedback
}

/// Classify a destination as either a capture or a quiet move
fn classify_destination(board: &BoardState, from: Square, to: Square) -> SquareFeedback {
    let mover = board.piece_at(from);
    let target = board.piece_at(to);
    let en_passant = mover.is(Role::Pawn) && board.en_passant().contains(to);

    if (target.color().is_some() && target.color() != mover.color()) || en_passant {
        SquareFeedback::Capture
    } else {
        SquareFeedback::Destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_logic::DEFAULT_CLOCK;

    fn sq(s: &str) -> Square {
        s.parse().expect("valid square")
    }

    #[test]
    fn test_no_feedback_on_fresh_board() {
        let feedback = compute_feedback(&Game::default());
        assert!(feedback.is_empty());
        assert_eq!(feedback.squares().len(), 0);
    }

    #[test]
    fn test_show_destinations_when_piece_selected() {
        let mut game = Game::default();
        game.select(sq("e2"));

        let feedback = compute_feedback(&game);

        assert_eq!(feedback.get(sq("e2")), Some(SquareFeedback::Origin));
        assert_eq!(feedback.get(sq("e3")), Some(SquareFeedback::Destination));
        assert_eq!(feedback.get(sq("e4")), Some(SquareFeedback::Destination));
        assert_eq!(feedback.get(sq("d2")), None);
    }

    #[test]
    fn test_distinguish_captures() {
        let mut game = Game::from_fen(
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 1",
            DEFAULT_CLOCK,
        )
        .expect("valid FEN");
        game.select(sq("e4"));

        let feedback = compute_feedback(&game);

        assert_eq!(feedback.get(sq("e4")), Some(SquareFeedback::Origin));
        assert_eq!(feedback.get(sq("e5")), Some(SquareFeedback::Destination));
        assert_eq!(feedback.get(sq("d5")), Some(SquareFeedback::Capture));
    }

    #[test]
    fn test_en_passant_destination_is_a_capture() {
        let mut game = Game::from_fen(
            "rnbqkbnr/1pp1pppp/p7/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 1",
            DEFAULT_CLOCK,
        )
        .expect("valid FEN");
        game.select(sq("e5"));

        let feedback = compute_feedback(&game);

        assert_eq!(feedback.get(sq("d6")), Some(SquareFeedback::Capture));
        assert_eq!(feedback.get(sq("e6")), Some(SquareFeedback::Destination));
    }

    #[test]
    fn test_last_move_and_check() {
        let mut game = Game::default();
        for (from, to) in [("e2", "e4"), ("f7", "f6"), ("d1", "h5")] {
            game.try_move(sq(from), sq(to)).expect("legal move");
        }

        let feedback = compute_feedback(&game);

        assert_eq!(feedback.get(sq("d1")), Some(SquareFeedback::LastMove));
        assert_eq!(feedback.get(sq("h5")), Some(SquareFeedback::LastMove));
        assert_eq!(feedback.get(sq("e8")), Some(SquareFeedback::Check));
        assert_eq!(feedback.get(sq("e1")), None);
    }

    #[test]
    fn test_selection_overrides_last_move() {
        let mut game = Game::default();
        game.try_move(sq("g1"), sq("f3")).expect("legal move");
        game.try_move(sq("b8"), sq("c6")).expect("legal move");
        game.select(sq("f3"));

        let feedback = compute_feedback(&game);

        assert_eq!(feedback.get(sq("f3")), Some(SquareFeedback::Origin));
        assert_eq!(feedback.get(sq("c6")), Some(SquareFeedback::LastMove));
        assert_eq!(feedback.get(sq("g1")), Some(SquareFeedback::Destination));
    }

    #[test]
    fn test_from_vec_keeps_last_kind_per_square() {
        let feedback = BoardFeedback::from(vec![
            (sq("a1"), SquareFeedback::Destination),
            (sq("a1"), SquareFeedback::Capture),
        ]);
        assert_eq!(feedback.squares(), &[(sq("a1"), SquareFeedback::Capture)]);
    }
}
