use std::io::{self, Write};

use crate::BoardDisplay;
use crate::feedback::{BoardFeedback, SquareFeedback};
use crate::game_state::{BoardState, Color, PieceKind, Square};

/// Terminal board display.
///
/// Renders the pieces as FEN letters on an 8×8 grid with ANSI color-coded squares matching the
/// feedback type (destinations, captures, etc.).
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    /// Draw from Black's side.
    flipped: bool,
}

impl TerminalDisplay {
    /// Create a display seen from White's side.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a display seen from `color`'s side.
    pub fn for_color(color: Color) -> Self {
        Self {
            flipped: color == Color::Black,
        }
    }
}

/// Error type for terminal display operations.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("failed to write to terminal: {0}")]
    Io(#[from] io::Error),
}

impl BoardDisplay for TerminalDisplay {
    type Error = DisplayError;

    fn show(&mut self, board: &BoardState, feedback: &BoardFeedback) -> Result<(), Self::Error> {
        render_board(&mut io::stdout(), board, feedback, self.flipped)
    }
}

/// Render the board to any writer. Extracted for testability.
fn render_board(
    w: &mut impl Write,
    board: &BoardState,
    feedback: &BoardFeedback,
    flipped: bool,
) -> Result<(), DisplayError> {
    let ranks: Vec<u8> = if flipped {
        (0..8).collect()
    } else {
        (0..8).rev().collect()
    };
    let files: Vec<u8> = if flipped {
        (0..8).rev().collect()
    } else {
        (0..8).collect()
    };

    for &rank in &ranks {
        write!(w, " {} ", rank + 1)?;
        for &file in &files {
            let Some(square) = Square::from_coords(file, rank) else {
                continue;
            };
            let cell = format_square(board.piece_at(square), feedback.get(square));
            write!(w, "{cell}")?;
        }
        writeln!(w)?;
    }
    let labels: Vec<String> = files
        .iter()
        .map(|&f| char::from(b'a' + f).to_string())
        .collect();
    writeln!(w, "    {}", labels.join("  "))?;

    for color in Color::ALL {
        let kills: String = board.kills(color).iter().map(|k| k.char()).collect();
        if !kills.is_empty() {
            writeln!(w, "{color} captured: {kills}")?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Piece letter on an ANSI background matching the feedback variant.
fn format_square(piece: PieceKind, feedback: Option<SquareFeedback>) -> String {
    let letter = match piece {
        PieceKind::Empty => '·',
        kind => kind.char(),
    };
    let background = match feedback {
        Some(SquareFeedback::Destination) => "44",
        Some(SquareFeedback::Capture) => "41",
        Some(SquareFeedback::Origin) => "42",
        Some(SquareFeedback::Check) => "45",
        Some(SquareFeedback::LastMove) => "43",
        None => return format!(" {letter} "),
    };
    format!("\x1b[{background}m {letter} \x1b[0m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sq(s: &str) -> Square {
        s.parse().expect("valid square")
    }

    fn render_to_string(board: &BoardState, feedback: &BoardFeedback, flipped: bool) -> String {
        let mut buf = Vec::new();
        render_board(&mut buf, board, feedback, flipped)
            .expect("rendering to buffer should succeed");
        String::from_utf8(buf).expect("output should be valid UTF-8")
    }

    #[test]
    fn start_position_rows() {
        let output = render_to_string(&BoardState::new(), &BoardFeedback::new(), false);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], " 8  r  n  b  q  k  b  n  r ");
        assert_eq!(lines[7], " 1  R  N  B  Q  K  B  N  R ");
        assert_eq!(lines[8], "    a  b  c  d  e  f  g  h");
    }

    #[test]
    fn flipped_board_starts_from_rank_one() {
        let output = render_to_string(&BoardState::new(), &BoardFeedback::new(), true);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], " 1  R  N  B  K  Q  B  N  R ");
        assert_eq!(lines[8], "    h  g  f  e  d  c  b  a");
    }

    #[test]
    fn empty_feedback_has_no_ansi_codes() {
        let output = render_to_string(&BoardState::new(), &BoardFeedback::new(), false);

        assert!(
            !output.contains("\x1b[4"),
            "empty feedback should have no ANSI background codes"
        );
    }

    #[test_case(SquareFeedback::Destination, "\x1b[44m"; "destination is blue")]
    #[test_case(SquareFeedback::Capture, "\x1b[41m"; "capture is red")]
    #[test_case(SquareFeedback::Origin, "\x1b[42m"; "origin is green")]
    #[test_case(SquareFeedback::Check, "\x1b[45m"; "check is magenta")]
    #[test_case(SquareFeedback::LastMove, "\x1b[43m"; "last move is yellow")]
    fn feedback_backgrounds(kind: SquareFeedback, code: &str) {
        let mut feedback = BoardFeedback::new();
        feedback.set(sq("e4"), kind);

        let output = render_to_string(&BoardState::new(), &feedback, false);

        assert!(output.contains(code), "{kind:?} should use {code:?}");
    }
}
