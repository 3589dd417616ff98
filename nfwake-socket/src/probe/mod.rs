use std::{
    io,
    net::{Ipv4Addr, SocketAddr, ToSocketAddrs},
    time::{Duration, Instant},
};

use thiserror::Error;

use nfwake_wire::icmp;

mod socket;
pub use socket::*;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed creating ICMP socket: {0}")]
    Socket(#[source] io::Error),
    #[error("Failed getting destination address for {0:?}")]
    Resolve(String),
}

/// Something that can tell whether a host is up right now.
pub trait Probe {
    /// A single, bounded attempt.
    fn probe(&mut self) -> bool;
}

impl<P: Probe + ?Sized> Probe for Box<P> {
    fn probe(&mut self) -> bool {
        (**self).probe()
    }
}

/// Resolves the host to wait for: a dotted quad or a host name with an IPv4 address.
pub fn resolve_target(host: &str) -> Result<Ipv4Addr, ProbeError> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    (host, 0)
        .to_socket_addrs()
        .map_err(|e| {
            tracing::debug!(?e, host, "lookup failed");
            ProbeError::Resolve(host.to_owned())
        })?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| ProbeError::Resolve(host.to_owned()))
}

/// The identifier we put in our echo requests: the low 16 bits of the process id.
pub fn process_identifier() -> u16 {
    std::process::id() as u16
}

/// ICMP echo round-trip to one destination.
///
/// Created once and reused for every attempt, the socket stays open in between.
#[derive(Debug)]
pub struct ReachabilityProbe<S = IcmpSocket> {
    socket: S,
    destination: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    timeout: Duration,
    buf: Vec<u8>,
}

impl ReachabilityProbe<IcmpSocket> {
    /// Resolves `target` and opens a raw ICMP socket. Failures here abort the hold setup.
    pub fn open(target: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let destination = resolve_target(target)?;
        let socket = IcmpSocket::open()?;

        tracing::debug!(target, %destination, "reachability probe ready");

        Ok(Self::new(socket, destination, timeout))
    }
}

impl<S: EchoSocket> ReachabilityProbe<S> {
    pub fn new(socket: S, destination: Ipv4Addr, timeout: Duration) -> Self {
        Self {
            socket,
            destination,
            identifier: process_identifier(),
            sequence: 0,
            timeout,
            buf: vec![0u8; icmp::MAX_REPLY_LEN],
        }
    }

    /// Overrides the echo identifier.
    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn destination(&self) -> Ipv4Addr {
        self.destination
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Sends one echo request and waits up to the timeout for the matching reply.
    ///
    /// Returns as soon as a reply carrying our identifier arrives. Unrelated ICMP traffic and
    /// garbage are ignored.
    pub fn probe(&mut self) -> bool {
        let request = icmp::echo_request(self.identifier, self.sequence);
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        if let Err(e) = self.socket.send_to(&request, self.destination) {
            // Keep waiting out the deadline, the caller retries anyway.
            tracing::warn!(?e, destination = %self.destination, "failed to send echo request");
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(destination = %self.destination, sequence, "no echo reply");
                return false;
            }

            match self.socket.recv_timeout(&mut self.buf, remaining) {
                Ok(Some(len)) if icmp::is_echo_reply(&self.buf[..len], self.identifier) => {
                    let destination = self.destination;
                    tracing::debug!(%destination, sequence, "echo reply received");
                    return true;
                }
                Ok(Some(len)) => tracing::trace!(len, "ignoring unrelated ICMP datagram"),
                Ok(None) => {}
                Err(e) => tracing::warn!(?e, "failed to receive from ICMP socket"),
            }
        }
    }
}

impl<S: EchoSocket> Probe for ReachabilityProbe<S> {
    fn probe(&mut self) -> bool {
        Self::probe(self)
    }
}
