use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use peer_chess::net::UdpTransport;
use peer_chess::protocol::RELAY_PORT;
use peer_chess::relay::{Relay, RelayConfig};

/// Rendezvous server that pairs peer-chess clients.
#[derive(Parser, Debug)]
#[command(name = "relay")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value_t = format!("0.0.0.0:{RELAY_PORT}"))]
    bind: String,
    /// Seconds of silence before a client counts as disconnected.
    #[arg(long, default_value_t = 5)]
    timeout: u64,
}

/// Receive wait per loop turn; also bounds how late a heartbeat sweep can run.
const POLL: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut transport = match UdpTransport::bind(&args.bind) {
        Ok(transport) => transport,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut relay = Relay::new(RelayConfig {
        heartbeat_timeout: Duration::from_secs(args.timeout),
    });
    let mut buf = [0u8; 1024];
    loop {
        if let Err(e) = relay.step(&mut transport, &mut buf, POLL) {
            log::warn!("relay socket error: {e}");
        }
    }
}
