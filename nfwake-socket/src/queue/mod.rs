use std::io;

use thiserror::Error;

use nfwake_wire::nfqueue::QueueParams;
pub use nfwake_wire::InterceptedEvent;

mod session;
mod socket;
mod stats;

pub use session::*;
pub use socket::*;
pub use stats::QueueStats;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to open netlink socket: {0}")]
    Open(#[source] io::Error),
    #[error("Failed to send {request} request: {source}")]
    Setup {
        request: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("Kernel rejected {request} request (errno {errno})")]
    Rejected { request: &'static str, errno: i32 },
    #[error("Failed to receive from queue socket: {0}")]
    Recv(#[source] io::Error),
    #[error("Failed to send verdict: {0}")]
    Verdict(#[source] io::Error),
}

impl From<nix::Error> for QueueError {
    fn from(e: nix::Error) -> Self {
        Self::Open(e.into())
    }
}

/// Invoked once per intercepted packet, before its verdict is issued.
///
/// The handler only learns *that* a packet was queued. Its runtime delays the packet.
pub trait EventHandler {
    fn on_event(&mut self, event: &InterceptedEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&InterceptedEvent),
{
    fn on_event(&mut self, event: &InterceptedEvent) {
        self(event)
    }
}

#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Maximum number of packet bytes the kernel copies per notification.
    pub copy_range: u32,
    /// Accept packets instead of dropping them when the queue overflows.
    pub fail_open: bool,
    /// Size of the socket receive buffer (`SO_RCVBUF`). `None` keeps the system default.
    ///
    /// Larger buffers absorb bursts of notifications.
    pub recv_buffer_size: Option<usize>,
    /// Size of the buffer a single datagram is read into.
    pub read_buffer_len: usize,
}

impl QueueOptions {
    /// Sets the copy range.
    pub fn with_copy_range(mut self, copy_range: u32) -> Self {
        self.copy_range = copy_range;
        self
    }

    /// Sets the socket receive buffer size. `None` keeps the system default.
    pub fn with_recv_buffer_size(mut self, size: Option<usize>) -> Self {
        self.recv_buffer_size = size;
        self
    }

    pub(crate) fn params(&self) -> QueueParams {
        QueueParams { copy_range: self.copy_range, fail_open: self.fail_open }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            copy_range: 1024,
            fail_open: true,
            recv_buffer_size: Some(64 * 1024),
            read_buffer_len: 8192,
        }
    }
}
