use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::display::{DisplayError, TerminalDisplay};
use crate::feedback::compute_feedback;
use crate::game_logic::{Game, GameStatus, MoveError, MoveOutcome};
use crate::game_state::{Color, PieceKind, Square};
use crate::hint::{self, HintError};
use crate::mock::{ScriptError, ScriptMove};
use crate::protocol::{ClientState, Session, SessionError, SessionEvent};
use crate::{BoardDisplay, Transport};

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `s e2`
    Select(Square),
    /// `m e2e4`, `m e7e8q`
    Move(ScriptMove),
    /// `p q`
    Promote(char),
    /// `load <fen>` or `load startpos`
    Load(String),
    /// `fen`
    Fen,
    /// `hint <best move text>`
    Hint(String),
    /// `r`
    Reset,
    /// `d`
    Redraw,
    /// `q`
    Quit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid square: {0}")]
    Square(#[from] crate::game_state::SquareParseError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    Hint(#[from] HintError),
    #[error(transparent)]
    Fen(#[from] crate::game_state::FenError),
    #[error("not available in a network game")]
    NetworkGame,
    #[error("wait for your turn")]
    NotYourTurn,
    #[error("opponent is away, wait for them to return")]
    PeerAway,
}

#[derive(Debug, Error)]
pub enum PlayError {
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// Parse one prompt line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let command = match word {
        "" => return Ok(None),
        "s" if !rest.is_empty() => Command::Select(rest.parse()?),
        "s" => return Err(CommandError::Usage("s <square>")),
        "m" if !rest.is_empty() => Command::Move(rest.parse()?),
        "m" => return Err(CommandError::Usage("m <from><to>[q|r|b|n]")),
        "p" => match rest.chars().next() {
            Some(c @ ('q' | 'r' | 'b' | 'n')) if rest.len() == 1 => Command::Promote(c),
            _ => return Err(CommandError::Usage("p q|r|b|n")),
        },
        "load" if rest == "startpos" => Command::Load(START_FEN.to_owned()),
        "load" if !rest.is_empty() => Command::Load(rest.to_owned()),
        "load" => return Err(CommandError::Usage("load <fen> | load startpos")),
        "fen" => Command::Fen,
        "hint" if !rest.is_empty() => Command::Hint(rest.to_owned()),
        "hint" => return Err(CommandError::Usage("hint <bestmove text>")),
        "r" => Command::Reset,
        "d" => Command::Redraw,
        "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_owned())),
    };
    Ok(Some(command))
}

/// Apply a command to the game. Returns a message for the player.
///
/// Setup commands (`load`, `r`) only work when `setup` is allowed.
pub fn apply_command(
    game: &mut Game,
    command: Command,
    clock: Duration,
    setup: bool,
) -> Result<String, CommandError> {
    match command {
        Command::Select(square) => {
            let targets = game.select(square);
            Ok(format!("{square}: {} legal move(s)", targets.count()))
        }
        Command::Move(mv) => Ok(describe_outcome(mv.play(game)?)),
        Command::Promote(letter) => {
            let kind = PieceKind::from_promotion_char(game.turn(), letter)
                .ok_or(MoveError::InvalidPromotion(PieceKind::Empty))?;
            Ok(describe_outcome(game.promote(kind)?))
        }
        Command::Load(fen) if setup => {
            *game = Game::from_fen(&fen, clock)?;
            Ok("position loaded".to_owned())
        }
        Command::Reset if setup => {
            *game = Game::new(clock);
            Ok("reset to the starting position".to_owned())
        }
        Command::Load(_) | Command::Reset => Err(CommandError::NetworkGame),
        Command::Fen => Ok(hint::position_fen(game)),
        Command::Hint(text) => {
            let suggestion = hint::parse_best_move(&text)?;
            Ok(describe_outcome(suggestion.apply(game)?))
        }
        Command::Redraw | Command::Quit => Ok(String::new()),
    }
}

fn describe_outcome(outcome: MoveOutcome) -> String {
    match outcome {
        MoveOutcome::Ok => String::new(),
        MoveOutcome::PromotionPending => "choose a promotion: p q|r|b|n".to_owned(),
        MoveOutcome::IllegalQuit => "move refused".to_owned(),
    }
}

fn format_clock(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn describe_status(game: &Game) -> String {
    match game.status() {
        GameStatus::Playing => format!("{} to move", game.turn()),
        GameStatus::Checkmate { winner } => format!("checkmate, {winner} wins"),
        GameStatus::Stalemate => "stalemate".to_owned(),
        GameStatus::Timeout { loser } => format!("{loser} ran out of time"),
        GameStatus::Abandoned { by } => format!("{by} left the game"),
    }
}

/// Clears the screen and moves cursor to top-left.
#[inline]
fn clear_screen() {
    print!("\x1B[2J\x1B[H");
}

/// Draws the complete interface: help text, status, clocks and the board.
fn draw(display: &mut TerminalDisplay, game: &Game, message: &str) -> Result<(), DisplayError> {
    clear_screen();
    println!("♟️  Peer Chess");
    println!();
    println!(
        "Commands: s <sq> | m <move> | p <piece> | load <fen> | fen | hint <move> | r | d | q"
    );
    println!();
    println!(
        "{} | white {} | black {}",
        describe_status(game),
        format_clock(game.clock(Color::White)),
        format_clock(game.clock(Color::Black))
    );
    display.show(game.board(), &compute_feedback(game))?;
    if !message.is_empty() {
        println!("{message}");
    }
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

/// Two players at one terminal.
pub fn run_local(mut game: Game, clock: Duration) -> Result<(), PlayError> {
    let mut display = TerminalDisplay::new();
    draw(&mut display, &game, "")?;

    let mut last_tick = Instant::now();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let now = Instant::now();
        game.tick_clock(now.duration_since(last_tick));
        last_tick = now;

        let message = match parse_command(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => apply_command(&mut game, command, clock, true)
                .unwrap_or_else(|e| e.to_string()),
            Ok(None) => String::new(),
            Err(e) => e.to_string(),
        };
        draw(&mut display, &game, &message)?;
    }
    Ok(())
}

/// Read stdin lines on a helper thread so the game loop never blocks on the keyboard.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Play against a remote peer through `session`.
///
/// A move the peer never acknowledges ends the game with an error.
/// Apply a command typed during a network game and send any move it completes.
///
/// Board commands need a connected peer and our turn.
fn network_command<T: Transport>(
    session: &mut Session<T>,
    game: &mut Game,
    command: Command,
    clock: Duration,
) -> Result<String, SessionError> {
    let played = game.history().len();
    let result = match command {
        Command::Select(_) | Command::Move(_) | Command::Promote(_) | Command::Hint(_) => {
            if session.state() != ClientState::Connected || !session.peer_connected() {
                Err(CommandError::PeerAway)
            } else if session.color() != Some(game.turn()) {
                Err(CommandError::NotYourTurn)
            } else {
                apply_command(game, command, clock, false)
            }
        }
        command => apply_command(game, command, clock, false),
    };
    if game.history().len() > played {
        session.send_move(game)?;
    }
    Ok(result.unwrap_or_else(|e| e.to_string()))
}

pub fn run_network<T: Transport>(
    mut session: Session<T>,
    mut game: Game,
    clock: Duration,
) -> Result<(), PlayError> {
    let commands = spawn_stdin_reader();
    let mut display = TerminalDisplay::new();
    println!("waiting for an opponent...");

    let mut last_tick = Instant::now();
    loop {
        let now = Instant::now();
        if session.state() == ClientState::Connected && session.peer_connected() {
            game.tick_clock(now.duration_since(last_tick));
        }
        last_tick = now;

        if let Some(event) = session.poll(&mut game, now)? {
            let message = match event {
                SessionEvent::Paired { color } | SessionEvent::Resynced { color } => {
                    display = TerminalDisplay::for_color(color);
                    format!("you play {color}")
                }
                SessionEvent::OpponentMoved { from, to, .. } => format!("opponent: {from}{to}"),
                SessionEvent::PeerLost => "opponent lost, waiting for them to return".to_owned(),
                SessionEvent::PeerQuit => "opponent quit".to_owned(),
            };
            draw(&mut display, &game, &message)?;
        }

        if game.status().is_over() {
            draw(&mut display, &game, "game over")?;
            session.close()?;
            return Ok(());
        }

        let line = match commands.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => continue,
            Err(TryRecvError::Disconnected) => {
                session.disconnect()?;
                return Ok(());
            }
        };

        let message = match parse_command(&line) {
            Ok(Some(Command::Quit)) => {
                if let Err(e) = session.send_quit(&mut game) {
                    log::warn!("quit not delivered: {e}");
                }
                session.disconnect()?;
                return Ok(());
            }
            Ok(Some(command)) => network_command(&mut session, &mut game, command, clock)?,
            Ok(None) => String::new(),
            Err(e) => e.to_string(),
        };
        draw(&mut display, &game, &message)?;
    }
}
