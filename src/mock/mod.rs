//! In-memory stand-ins for the network and the player, used by tests and demos.

mod script;
mod transport;

pub use script::{ScriptError, ScriptMove, ScriptedPlayer, parse_script};
pub use transport::{MockNetwork, MockTransport};
