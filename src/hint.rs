//! Boundary to an external move-suggestion service.
//!
//! The service takes a FEN and answers with text containing a UCI move, either a bare `e2e4`
//! or an engine line such as `bestmove e7e8q ponder d2d1`.

use shakmaty::uci::{ParseUciMoveError, UciMove};
use thiserror::Error;

use crate::game_logic::{Game, MoveError, MoveOutcome};
use crate::game_state::{PieceKind, Role, Square, SquareParseError, from_role};

#[derive(Debug, Error)]
pub enum HintError {
    #[error("no move in hint response")]
    Missing,
    #[error("invalid UCI move: {0}")]
    Uci(#[from] ParseUciMoveError),
    #[error("unsupported hint move {0}")]
    Unsupported(String),
    #[error(transparent)]
    Square(#[from] SquareParseError),
}

/// A suggested move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl HintMove {
    /// Play the suggestion on `game`, choosing the promotion piece when one is named.
    pub fn apply(&self, game: &mut Game) -> Result<MoveOutcome, MoveError> {
        let color = game.turn();
        match game.try_move(self.from, self.to)? {
            MoveOutcome::PromotionPending => match self.promotion {
                Some(role) => game.promote(PieceKind::new(color, role)),
                None => Ok(MoveOutcome::PromotionPending),
            },
            outcome => Ok(outcome),
        }
    }
}

/// FEN of the live position, the request body for the service.
pub fn position_fen(game: &Game) -> String {
    let fullmoves = game.history().len() as u32 / 2 + 1;
    game.board().to_fen(game.turn(), game.halfmove_clock(), fullmoves)
}

/// Pull the suggested move out of the service's answer.
pub fn parse_best_move(text: &str) -> Result<HintMove, HintError> {
    let mut tokens = text.split_whitespace();
    let token = match tokens.next() {
        Some("bestmove") => tokens.next(),
        first => first,
    }
    .ok_or(HintError::Missing)?;

    match token.parse::<UciMove>()? {
        UciMove::Normal {
            from,
            to,
            promotion,
        } => Ok(HintMove {
            from: from.to_string().parse()?,
            to: to.to_string().parse()?,
            promotion: promotion.map(from_role),
        }),
        other => Err(HintError::Unsupported(other.to_string())),
    }
}
