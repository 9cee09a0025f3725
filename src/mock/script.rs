use std::collections::VecDeque;
use std::str::FromStr;

use thiserror::Error;

use crate::game_logic::{Game, MoveError, MoveOutcome};
use crate::game_state::{PieceKind, Square};

/// Error when parsing a move script.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid move notation: '{0}'")]
pub struct ScriptError(String);

/// One scripted move in coordinate notation, e.g. `e2e4` or `e7e8q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptMove {
    pub from: Square,
    pub to: Square,
    /// Promotion letter, applied for whichever side is moving.
    pub promotion: Option<char>,
}

impl ScriptMove {
    /// Play this move for the side to move, finishing a promotion if a letter was given.
    pub fn play(self, game: &mut Game) -> Result<MoveOutcome, MoveError> {
        let color = game.turn();
        match (game.try_move(self.from, self.to)?, self.promotion) {
            (MoveOutcome::PromotionPending, Some(letter)) => {
                let kind = PieceKind::from_promotion_char(color, letter)
                    .ok_or(MoveError::InvalidPromotion(PieceKind::Empty))?;
                game.promote(kind)
            }
            (outcome, _) => Ok(outcome),
        }
    }
}

impl FromStr for ScriptMove {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_move(s)
    }
}

/// A scripted player that feeds queued moves into a [`Game`].
///
/// New script can be appended at any time for interactive use.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlayer {
    pending: VecDeque<ScriptMove>,
}

impl ScriptedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and queue additional moves.
    ///
    /// Format: whitespace-separated moves of four characters plus an optional promotion
    /// letter (`q`, `r`, `b`, `n`). Example: `"e2e4 e7e5 g1f3"`.
    ///
    /// A script with any bad token is rejected as a whole.
    pub fn push_script(&mut self, script: &str) -> Result<(), ScriptError> {
        let moves = parse_script(script)?;
        self.pending.extend(moves);
        Ok(())
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Play the next queued move. Returns `None` once the script is exhausted.
    pub fn tick(&mut self, game: &mut Game) -> Option<Result<MoveOutcome, MoveError>> {
        let next = self.pending.pop_front()?;
        Some(next.play(game))
    }

    /// Play every queued move, calling `on_move` after each, stopping at the first error.
    pub fn drain<F>(&mut self, game: &mut Game, mut on_move: F) -> Result<(), MoveError>
    where
        F: FnMut(&Game),
    {
        while let Some(result) = self.tick(game) {
            result?;
            on_move(game);
        }
        Ok(())
    }
}

/// Parse a move script into individual moves.
pub fn parse_script(script: &str) -> Result<Vec<ScriptMove>, ScriptError> {
    script.split_whitespace().map(parse_move).collect()
}

fn parse_move(token: &str) -> Result<ScriptMove, ScriptError> {
    let bad = || ScriptError(token.to_owned());
    if !token.is_ascii() || !(4..=5).contains(&token.len()) {
        return Err(bad());
    }
    let from = token[0..2].parse().map_err(|_| bad())?;
    let to = token[2..4].parse().map_err(|_| bad())?;
    let promotion = match token[4..].chars().next() {
        None => None,
        Some(c @ ('q' | 'r' | 'b' | 'n')) => Some(c),
        Some(_) => return Err(bad()),
    };
    Ok(ScriptMove {
        from,
        to,
        promotion,
    })
}
