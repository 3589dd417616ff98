//! The queue listener lifecycle.
//!
//! ```text
//!  QueueSocket::open       configure(queue)           run(handler)
//! ─────────────────▶ Bound ────────────────▶ Listening ─────────────▶ Fatal (QueueError)
//!                      │                                                  ▲
//!                      └──────────────── setup error ─────────────────────┘
//! ```
//!
//! Dropping a [`QueueSession`] unbinds the queue and closes the socket.

use std::{collections::VecDeque, convert::Infallible, io};

use bytes::Bytes;
use nfwake_wire::nfqueue::{self, Inbound, InterceptedEvent, Verdict};

use super::{EventHandler, NetlinkIo, NetlinkSocket, QueueError, QueueOptions, QueueStats};

/// A netlink socket that can be attached to a queue ("Bound").
#[derive(Debug)]
pub struct QueueSocket<S = NetlinkSocket> {
    io: S,
    seq: u32,
    buf: Vec<u8>,
    /// Packets queued while we were still waiting for configuration acks.
    pending: VecDeque<InterceptedEvent>,
}

impl QueueSocket<NetlinkSocket> {
    /// Opens and binds a `NETLINK_NETFILTER` socket.
    pub fn open(options: &QueueOptions) -> Result<Self, QueueError> {
        let socket = NetlinkSocket::open()?;
        if let Some(size) = options.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }

        Ok(Self::with_io(socket, options))
    }
}

impl<S: NetlinkIo> QueueSocket<S> {
    pub fn with_io(io: S, options: &QueueOptions) -> Self {
        Self { io, seq: 0, buf: vec![0u8; options.read_buffer_len], pending: VecDeque::new() }
    }

    /// Attaches to `queue` in metadata-only copy mode and moves to "Listening".
    ///
    /// Any request that cannot be sent or that the kernel rejects is fatal.
    pub fn configure(
        mut self,
        queue: u16,
        options: &QueueOptions,
    ) -> Result<QueueSession<S>, QueueError> {
        let seq = self.next_seq();
        self.request("bind", seq, nfqueue::bind_request(queue, seq))?;

        let seq = self.next_seq();
        self.request("params", seq, nfqueue::params_request(queue, &options.params(), seq))?;

        tracing::debug!(
            queue,
            copy_range = options.copy_range,
            fail_open = options.fail_open,
            "queue configured"
        );

        Ok(QueueSession {
            io: self.io,
            queue,
            seq: self.seq,
            buf: self.buf,
            pending: self.pending,
            stats: QueueStats::default(),
        })
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    fn request(&mut self, request: &'static str, seq: u32, msg: Bytes) -> Result<(), QueueError> {
        self.io.send(&msg).map_err(|source| QueueError::Setup { request, source })?;

        loop {
            let len = match self.io.recv(&mut self.buf) {
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(QueueError::Setup { request, source }),
            };

            for msg in nfqueue::decode(&self.buf[..len]) {
                match msg {
                    Ok(Inbound::Ack(ack)) if ack.seq == seq => {
                        if ack.is_success() {
                            tracing::trace!(request, seq, "request acknowledged");
                            return Ok(());
                        }
                        return Err(QueueError::Rejected { request, errno: ack.errno });
                    }
                    Ok(Inbound::Notification(notification)) => {
                        self.pending.extend(notification.event());
                    }
                    Ok(other) => tracing::trace!(?other, "ignoring message while configuring"),
                    Err(e) => tracing::warn!(?e, "skipping malformed message while configuring"),
                }
            }
        }
    }
}

/// A socket attached to one queue ("Listening").
#[derive(Debug)]
pub struct QueueSession<S: NetlinkIo = NetlinkSocket> {
    io: S,
    queue: u16,
    seq: u32,
    buf: Vec<u8>,
    pending: VecDeque<InterceptedEvent>,
    stats: QueueStats,
}

impl<S: NetlinkIo> QueueSession<S> {
    pub fn queue(&self) -> u16 {
        self.queue
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Receives queued packets forever. For each one, `handler` runs and then an accept
    /// verdict is sent, strictly in delivery order.
    ///
    /// Malformed messages are skipped. Only socket errors end the loop.
    pub fn run<H: EventHandler>(&mut self, mut handler: H) -> Result<Infallible, QueueError> {
        let _span = tracing::info_span!("queue", queue = self.queue).entered();

        loop {
            while let Some(event) = self.pending.pop_front() {
                self.dispatch(&mut handler, event)?;
            }

            let len = match self.io.recv(&mut self.buf) {
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!(?e, "failed to receive from queue socket");
                    return Err(QueueError::Recv(e));
                }
            };

            self.stats.increment_rx(len);
            tracing::trace!(len, "read from queue socket");

            for msg in nfqueue::decode(&self.buf[..len]) {
                match msg {
                    Ok(Inbound::Notification(notification)) => match notification.event() {
                        Some(event) => self.pending.push_back(event),
                        None => {
                            self.stats.increment_malformed();
                            tracing::warn!(
                                queue = notification.queue,
                                "notification without packet header, skipping"
                            );
                        }
                    },
                    Ok(Inbound::Ack(ack)) if !ack.is_success() => {
                        let (seq, errno) = (ack.seq, ack.errno);
                        tracing::warn!(seq, errno, "kernel reported an error");
                    }
                    Ok(other) => tracing::trace!(?other, "ignoring message"),
                    Err(e) => {
                        self.stats.increment_malformed();
                        tracing::warn!(?e, "skipping malformed queue message");
                    }
                }
            }
        }
    }

    fn dispatch<H: EventHandler>(
        &mut self,
        handler: &mut H,
        event: InterceptedEvent,
    ) -> Result<(), QueueError> {
        tracing::debug!(id = event.id, hook = event.hook, "received queued packet");

        self.stats.increment_events();
        handler.on_event(&event);

        self.seq = self.seq.wrapping_add(1);
        let verdict = nfqueue::verdict(&Verdict::accept(&event), self.seq);
        self.io.send(&verdict).map_err(|e| {
            tracing::error!(?e, id = event.id, "failed to send verdict");
            QueueError::Verdict(e)
        })?;

        self.stats.increment_verdicts();
        tracing::debug!(id = event.id, "issued accept verdict");

        Ok(())
    }
}

impl<S: NetlinkIo> Drop for QueueSession<S> {
    fn drop(&mut self) {
        self.seq = self.seq.wrapping_add(1);
        // Not waiting for the ack: the socket is about to go away anyway.
        if let Err(e) = self.io.send(&nfqueue::unbind_request(self.queue, self.seq)) {
            tracing::debug!(?e, queue = self.queue, "failed to unbind queue");
        }
    }
}
