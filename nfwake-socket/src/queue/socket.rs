use std::{
    fmt, io,
    os::fd::{AsFd, AsRawFd, OwnedFd},
};

use nix::sys::socket::{
    bind, getsockname, recv, sendto, setsockopt, socket, sockopt, AddressFamily, MsgFlags,
    NetlinkAddr, SockFlag, SockProtocol, SockType,
};

use super::QueueError;

/// Datagram I/O with the kernel's netfilter subsystem.
///
/// Every call moves exactly one datagram. Implemented by [`NetlinkSocket`], and by fakes in
/// tests.
pub trait NetlinkIo {
    fn send(&mut self, msg: &[u8]) -> io::Result<usize>;

    /// Blocks until a datagram arrives.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: NetlinkIo + ?Sized> NetlinkIo for &mut T {
    fn send(&mut self, msg: &[u8]) -> io::Result<usize> {
        (**self).send(msg)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }
}

/// A `NETLINK_NETFILTER` socket bound to a kernel-assigned port id.
pub struct NetlinkSocket {
    fd: OwnedFd,
    port_id: u32,
}

impl NetlinkSocket {
    pub fn open() -> Result<Self, QueueError> {
        let fd = socket(
            AddressFamily::Netlink,
            SockType::Raw,
            SockFlag::SOCK_CLOEXEC,
            SockProtocol::NetlinkNetFilter,
        )?;

        // Port id 0 lets the kernel pick one for us.
        bind(fd.as_raw_fd(), &NetlinkAddr::new(0, 0))?;
        let local: NetlinkAddr = getsockname(fd.as_raw_fd())?;

        tracing::debug!(port_id = local.pid(), "bound netlink socket");

        Ok(Self { fd, port_id: local.pid() })
    }

    /// Sets `SO_RCVBUF`.
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), QueueError> {
        setsockopt(&self.fd, sockopt::RcvBuf, &size)?;
        Ok(())
    }

    pub fn port_id(&self) -> u32 {
        self.port_id
    }
}

impl fmt::Debug for NetlinkSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetlinkSocket")
            .field("fd", &self.fd.as_fd().as_raw_fd())
            .field("port_id", &self.port_id)
            .finish()
    }
}

impl NetlinkIo for NetlinkSocket {
    fn send(&mut self, msg: &[u8]) -> io::Result<usize> {
        // Destination port id 0 is the kernel.
        Ok(sendto(self.fd.as_raw_fd(), msg, &NetlinkAddr::new(0, 0), MsgFlags::empty())?)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(recv(self.fd.as_raw_fd(), buf, MsgFlags::empty())?)
    }
}
