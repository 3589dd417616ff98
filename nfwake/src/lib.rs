#![doc(issue_tracker_base_url = "https://github.com/mister-benjamin/etherwake-nfqueue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Wake-on-LAN on demand.
//!
//! Sends a magic packet to a station, either once or every time a packet shows up in a
//! netfilter queue. Put an `NFQUEUE` rule in front of traffic headed for a sleeping machine and
//! it gets woken up by whoever tries to reach it. Optionally waits for the station to answer
//! pings before carrying on, which in queue mode delays the triggering packet until the
//! machine is up.

use thiserror::Error;

pub mod config;
pub mod dispatch;
pub mod ethers;

pub use config::{Cli, Config, ConfigError};
pub use dispatch::Dispatcher;

pub use nfwake_socket as socket;
pub use nfwake_transport as transport;
pub use nfwake_wire as wire;

use nfwake_socket::{ProbeError, QueueError};
use nfwake_transport::TransportError;

/// Exit status for success.
pub const EXIT_OK: u8 = 0;
/// Exit status for local setup failures.
pub const EXIT_SETUP: u8 = 1;
/// Exit status when running without the required privileges.
pub const EXIT_PERMISSION: u8 = 2;
/// Exit status for bad usage.
pub const EXIT_USAGE: u8 = 3;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Permission denied, raw sockets need root: {0}")]
    Permission(#[source] TransportError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed setting up hold: {0}")]
    Hold(#[from] ProbeError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("Failed dropping privileges: {0}")]
    Privileges(#[from] nix::Error),
}

impl Error {
    /// The process exit status this error maps to.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_USAGE,
            Self::Permission(_) => EXIT_PERMISSION,
            Self::Transport(_) | Self::Hold(_) | Self::Queue(_) | Self::Privileges(_) => EXIT_SETUP,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn exit_codes() {
        let unknown = Error::from(ConfigError::UnknownStation("nas".into()));
        assert_eq!(unknown.exit_code(), EXIT_USAGE);

        let denied = TransportError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(Error::Permission(denied).exit_code(), EXIT_PERMISSION);

        let missing = TransportError::NoHardwareAddress("eth0".into());
        assert_eq!(Error::from(missing).exit_code(), EXIT_SETUP);

        let queue = QueueError::Rejected { request: "bind", errno: 1 };
        assert_eq!(Error::from(queue).exit_code(), EXIT_SETUP);
        assert_eq!(Error::from(ProbeError::Resolve("nas".into())).exit_code(), EXIT_SETUP);
    }
}
