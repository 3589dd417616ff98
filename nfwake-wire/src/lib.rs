#![doc(issue_tracker_base_url = "https://github.com/mister-benjamin/etherwake-nfqueue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Byte formats spoken by nfwake. Nothing in here performs I/O.

pub mod icmp;
pub mod magic;
pub mod nfqueue;

mod nla;

pub use magic::{MagicPacket, ParseError, StationAddress, WolPassword};
pub use nfqueue::{DecodeError, InterceptedEvent, Verdict};
