//! Text front end: board rendering and the interactive game loops.

mod display;
mod play;

pub use display::{DisplayError, TerminalDisplay};
pub use play::{
    Command, CommandError, PlayError, apply_command, parse_command, run_local, run_network,
};
