use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use peer_chess::game_logic::{DEFAULT_CLOCK, Game};
use peer_chess::game_state::Color;
use peer_chess::net::{self, UdpTransport};
use peer_chess::protocol::{PairKind, Session, SessionConfig};
use peer_chess::terminal;

#[derive(Parser, Debug)]
#[command(name = "peer-chess", about = "Two-player chess over the terminal or the network")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Two players at this terminal.
    Local {
        /// Start from this position instead of the initial one.
        #[arg(long)]
        fen: Option<String>,
        /// Seconds on each player's clock.
        #[arg(long, default_value_t = DEFAULT_CLOCK.as_secs())]
        clock: u64,
    },
    /// Play a remote opponent paired through a relay.
    Net {
        /// Relay address, e.g. `relay.example.org:7878`.
        #[arg(long)]
        relay: String,
        /// Local address to bind.
        #[arg(long, default_value = "0.0.0.0:0")]
        bind: String,
        /// Seconds on each player's clock.
        #[arg(long, default_value_t = DEFAULT_CLOCK.as_secs())]
        clock: u64,
        /// Color to play if this side assigns colors.
        #[arg(long, value_enum)]
        color: Option<Side>,
        /// Rejoin a game that lost its connection.
        #[arg(long)]
        reconnect: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.mode {
        Mode::Local { fen, clock } => {
            let clock = Duration::from_secs(clock);
            let game = match fen {
                Some(fen) => Game::from_fen(&fen, clock)?,
                None => Game::new(clock),
            };
            terminal::run_local(game, clock)?;
        }
        Mode::Net {
            relay,
            bind,
            clock,
            color,
            reconnect,
        } => {
            let clock = Duration::from_secs(clock);
            let relay = net::resolve(&relay)?;
            let transport = UdpTransport::bind(&bind)?;
            log::info!("bound {}, relay {relay}", transport.local_addr()?);

            let kind = if reconnect {
                PairKind::Reconnect
            } else {
                PairKind::Fresh
            };
            let config = SessionConfig {
                preferred_color: color.map(Color::from),
                ..SessionConfig::default()
            };
            let session = Session::new(transport, relay, kind, config);
            terminal::run_network(session, Game::new(clock), clock)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
