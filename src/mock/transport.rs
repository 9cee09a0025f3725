use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use crate::Transport;
use crate::protocol::codec::{ACK, decode};

type Datagram = (Vec<u8>, SocketAddr);

#[derive(Debug, Default)]
struct Wire {
    inboxes: HashMap<SocketAddr, VecDeque<Datagram>>,
    blocked: HashSet<SocketAddr>,
}

/// In-memory datagram network shared by several [`MockTransport`]s.
///
/// Delivery is instant and ordered. Blocking an address drops everything it sends or should
/// receive, which stands in for a dropped connection.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    wire: Rc<RefCell<Wire>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport bound to `addr` on this network.
    pub fn endpoint(&self, addr: SocketAddr) -> MockTransport {
        self.wire.borrow_mut().inboxes.entry(addr).or_default();
        MockTransport {
            network: Some(self.clone()),
            ..MockTransport::new(addr)
        }
    }

    pub fn block(&self, addr: SocketAddr) {
        self.wire.borrow_mut().blocked.insert(addr);
    }

    pub fn unblock(&self, addr: SocketAddr) {
        self.wire.borrow_mut().blocked.remove(&addr);
    }

    /// Datagrams queued for `addr`.
    pub fn queued(&self, addr: SocketAddr) -> usize {
        self.wire
            .borrow()
            .inboxes
            .get(&addr)
            .map_or(0, VecDeque::len)
    }

    fn route(&self, from: SocketAddr, to: SocketAddr, bytes: &[u8]) {
        let mut wire = self.wire.borrow_mut();
        if wire.blocked.contains(&from) || wire.blocked.contains(&to) {
            log::debug!("dropping {} bytes {from} -> {to}", bytes.len());
            return;
        }
        match wire.inboxes.get_mut(&to) {
            Some(inbox) => inbox.push_back((bytes.to_vec(), from)),
            None => log::debug!("no endpoint at {to}"),
        }
    }

    fn take(&self, addr: SocketAddr) -> Option<Datagram> {
        self.wire.borrow_mut().inboxes.get_mut(&addr)?.pop_front()
    }
}

/// Scriptable [`Transport`] for tests.
///
/// Records everything sent, serves datagrams queued with [`MockTransport::deliver`], and can
/// play a peer that acknowledges the n-th game message. When created from a [`MockNetwork`],
/// datagrams also travel over that network.
#[derive(Debug)]
pub struct MockTransport {
    local: SocketAddr,
    inbox: VecDeque<Datagram>,
    sent: Vec<Datagram>,
    ack_after: Option<(SocketAddr, u32)>,
    network: Option<MockNetwork>,
}

impl MockTransport {
    /// A standalone transport that only talks to the test.
    pub fn new(local: SocketAddr) -> Self {
        Self {
            local,
            inbox: VecDeque::new(),
            sent: Vec::new(),
            ack_after: None,
            network: None,
        }
    }

    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Queue a datagram as if `from` had sent it.
    pub fn deliver(&mut self, from: SocketAddr, bytes: &[u8]) {
        self.inbox.push_back((bytes.to_vec(), from));
    }

    /// Acknowledge the `n`-th game message sent to `peer` from now on.
    pub fn ack_after(&mut self, peer: SocketAddr, n: u32) {
        self.ack_after = Some((peer, n));
    }

    pub fn sent(&self) -> &[Datagram] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Datagram> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MockTransport {
    type Error = Infallible;

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<(), Self::Error> {
        self.sent.push((buf.to_vec(), addr));

        if let Some((peer, remaining)) = self.ack_after
            && peer == addr
            && decode(buf).is_ok_and(|m| m.is_game_message())
        {
            if remaining <= 1 {
                self.ack_after = None;
                self.inbox.push_back((ACK.to_vec(), peer));
            } else {
                self.ack_after = Some((peer, remaining - 1));
            }
        }

        if let Some(network) = &self.network {
            network.route(self.local, addr, buf);
        }
        Ok(())
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>, Self::Error> {
        let next = self
            .inbox
            .pop_front()
            .or_else(|| self.network.as_ref()?.take(self.local));
        Ok(next.map(|(bytes, from)| {
            let len = bytes.len().min(buf.len());
            buf[..len].copy_from_slice(&bytes[..len]);
            (len, from)
        }))
    }
}
