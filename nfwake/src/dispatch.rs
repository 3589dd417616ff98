use std::{convert::Infallible, fmt};

use nfwake_socket::{HoldGate, HoldOutcome, NetlinkIo, Probe, QueueError, QueueSession};
use nfwake_transport::{Transmit, TransportError};
use nfwake_wire::{InterceptedEvent, MagicPacket};

/// Sends the magic packet, once or for every queued packet, and optionally holds afterwards.
pub struct Dispatcher<T, P> {
    packet: MagicPacket,
    transmitter: T,
    hold: Option<HoldGate<P>>,
    sent: usize,
}

impl<T: Transmit, P: Probe> Dispatcher<T, P> {
    pub fn new(packet: MagicPacket, transmitter: T) -> Self {
        Self { packet, transmitter, hold: None, sent: 0 }
    }

    /// Holds after every packet sent.
    pub fn with_hold(mut self, gate: HoldGate<P>) -> Self {
        self.hold = Some(gate);
        self
    }

    pub fn packet(&self) -> &MagicPacket {
        &self.packet
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    pub fn hold_gate(&self) -> Option<&HoldGate<P>> {
        self.hold.as_ref()
    }

    /// Number of packets successfully handed to the transmitter.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Transmits the packet, then holds if configured.
    ///
    /// There is nothing to wait for if the packet didn't go out, so a transmit error skips the
    /// hold.
    pub fn fire(&mut self) -> Result<Option<HoldOutcome>, TransportError> {
        let len = self.transmitter.transmit(self.packet.as_bytes())?;
        self.sent += 1;
        tracing::info!(destination = %self.packet.destination(), len, "sent magic packet");

        Ok(self.hold.as_mut().map(HoldGate::hold))
    }

    /// Single shot mode. A transmit error is fatal.
    pub fn run_once(&mut self) -> Result<Option<HoldOutcome>, TransportError> {
        self.fire().map_err(|e| {
            tracing::error!(?e, "failed to send magic packet");
            e
        })
    }

    /// Fires for every packet delivered on `session`, until the session fails.
    ///
    /// Transmit errors are logged and the loop goes on.
    pub fn run_queue<S: NetlinkIo>(
        &mut self,
        session: &mut QueueSession<S>,
    ) -> Result<Infallible, QueueError> {
        tracing::info!(queue = session.queue(), "waiting for queued packets");

        session.run(|event: &InterceptedEvent| {
            tracing::debug!(id = event.id, queue = event.queue, "packet queued, waking station");
            if let Err(e) = self.fire() {
                tracing::error!(?e, id = event.id, "failed to send magic packet");
            }
        })
    }
}

impl<T, P> fmt::Debug for Dispatcher<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("destination", &self.packet.destination())
            .field("len", &self.packet.len())
            .field("hold", &self.hold.is_some())
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}
