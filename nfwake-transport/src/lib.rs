#![doc(issue_tracker_base_url = "https://github.com/mister-benjamin/etherwake-nfqueue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Sending finished frames out of a network interface.

use std::io;

use thiserror::Error;

use nfwake_wire::StationAddress;

mod datalink;
pub use datalink::*;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("No such interface: {0}")]
    InterfaceNotFound(String),
    #[error("Interface {0} has no hardware address")]
    NoHardwareAddress(String),
    #[error("Interface {0} does not provide an ethernet channel")]
    UnsupportedChannel(String),
}

impl TransportError {
    /// Whether the error stems from missing privileges (raw sockets need `CAP_NET_RAW`).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::PermissionDenied)
    }
}

/// A link-layer sink for complete frames. Fire and forget: nothing comes back.
pub trait Transmit {
    /// Sends `frame` as is, returning the number of bytes handed to the kernel.
    fn transmit(&mut self, frame: &[u8]) -> Result<usize, TransportError>;
}

impl<T: Transmit + ?Sized> Transmit for Box<T> {
    fn transmit(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        (**self).transmit(frame)
    }
}

impl<T: Transmit + ?Sized> Transmit for &mut T {
    fn transmit(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        (**self).transmit(frame)
    }
}

/// Logs frames instead of sending them. Used in debug mode when the raw socket could not be
/// opened.
#[derive(Debug, Default)]
pub struct DryRun {
    frames: usize,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames that would have been sent.
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Transmit for DryRun {
    fn transmit(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        self.frames += 1;
        let destination = frame.get(..6).map(|dst| {
            let mut octets = [0u8; 6];
            octets.copy_from_slice(dst);
            StationAddress::new(octets)
        });

        let (len, frames) = (frame.len(), self.frames);
        tracing::info!(?destination, len, frames, "dry run, frame not sent");
        Ok(frame.len())
    }
}
