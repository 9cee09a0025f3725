//! UDP socket transport.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use thiserror::Error;

use crate::Transport;

#[derive(Debug, Error)]
pub enum UdpError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// [`Transport`] over a std UDP socket with a per-call read timeout.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    timeout: Option<Duration>,
}

impl UdpTransport {
    /// Bind to `addr`; use port 0 for an ephemeral port.
    pub fn bind(addr: &str) -> Result<Self, UdpError> {
        let socket = UdpSocket::bind(addr).map_err(|source| UdpError::Bind {
            addr: addr.to_owned(),
            source,
        })?;
        log::info!("listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            timeout: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, UdpError> {
        Ok(self.socket.local_addr()?)
    }
}

/// Resolve `host:port` to the first socket address.
pub fn resolve(addr: &str) -> Result<SocketAddr, UdpError> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| UdpError::Resolve(addr.to_owned()))
}

impl Transport for UdpTransport {
    type Error = UdpError;

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<(), Self::Error> {
        self.socket.send_to(buf, addr)?;
        Ok(())
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, Self::Error> {
        // A zero read timeout is rejected by the OS.
        let timeout = timeout.max(Duration::from_millis(1));
        if self.timeout != Some(timeout) {
            self.socket.set_read_timeout(Some(timeout))?;
            self.timeout = Some(timeout);
        }
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            // Windows reports an ICMP port-unreachable from an earlier send here.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
