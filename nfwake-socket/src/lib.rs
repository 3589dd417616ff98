#![doc(issue_tracker_base_url = "https://github.com/mister-benjamin/etherwake-nfqueue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! The blocking sockets behind nfwake.
//!
//! * [`queue`]: listens on a netfilter queue and accepts every packet after notifying a handler.
//! * [`probe`]: single ICMP echo round-trip with a deadline.
//! * [`hold`]: bounded, debounced waiting for a host to come up.
//!
//! Everything runs on the calling thread. There are no background tasks.

pub mod hold;
pub mod probe;
pub mod queue;

pub use hold::{HoldGate, HoldOptions, HoldOutcome};
pub use probe::{EchoSocket, IcmpSocket, Probe, ProbeError, ReachabilityProbe};
pub use queue::{
    EventHandler, NetlinkIo, NetlinkSocket, QueueError, QueueOptions, QueueSession, QueueSocket,
    QueueStats,
};
