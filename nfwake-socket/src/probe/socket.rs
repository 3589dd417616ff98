use std::{
    fmt, io,
    net::{Ipv4Addr, SocketAddrV4},
    os::fd::{AsFd, AsRawFd, OwnedFd},
    time::Duration,
};

use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags, PollTimeout},
    sys::socket::{
        recv, sendto, socket, AddressFamily, MsgFlags, SockFlag, SockProtocol, SockType, SockaddrIn,
    },
};

use super::ProbeError;

/// Datagram I/O for echo requests. Implemented by [`IcmpSocket`], and by fakes in tests.
pub trait EchoSocket {
    fn send_to(&mut self, buf: &[u8], destination: Ipv4Addr) -> io::Result<usize>;

    /// Waits at most `timeout` for a datagram. Returns `Ok(None)` if nothing was read.
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;
}

/// A non-blocking raw `IPPROTO_ICMP` socket. Requires `CAP_NET_RAW`.
///
/// Reads return whole IPv4 datagrams, header included.
pub struct IcmpSocket {
    fd: OwnedFd,
}

impl IcmpSocket {
    pub fn open() -> Result<Self, ProbeError> {
        let fd = socket(
            AddressFamily::Inet,
            SockType::Raw,
            SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
            SockProtocol::Icmp,
        )
        .map_err(|e| {
            if e == Errno::EPERM {
                tracing::error!("failed creating ICMP socket, are you root?");
            }
            ProbeError::Socket(e.into())
        })?;

        Ok(Self { fd })
    }
}

impl fmt::Debug for IcmpSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcmpSocket").field("fd", &self.fd.as_fd().as_raw_fd()).finish()
    }
}

impl EchoSocket for IcmpSocket {
    fn send_to(&mut self, buf: &[u8], destination: Ipv4Addr) -> io::Result<usize> {
        let addr = SockaddrIn::from(SocketAddrV4::new(destination, 0));
        Ok(sendto(self.fd.as_raw_fd(), buf, &addr, MsgFlags::empty())?)
    }

    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        // Round up so a sub-millisecond remainder still waits instead of spinning.
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        let timeout = PollTimeout::from(u16::try_from(millis).unwrap_or(u16::MAX));

        let mut fds = [PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) | Err(Errno::EINTR) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }

        match recv(self.fd.as_raw_fd(), buf, MsgFlags::empty()) {
            Ok(len) => Ok(Some(len)),
            Err(Errno::EAGAIN | Errno::EINTR) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
