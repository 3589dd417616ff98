//! nfnetlink queue (`NFQUEUE`) messages.
//!
//! Every message is a netlink header followed by an `nfgenmsg` and a list of attributes:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ nlmsghdr (16): len | type | flags | seq | pid   host byte order
//! ├────────────────────────────────────────────┤
//! │ nfgenmsg (4): family | version | res_id    res_id = queue number, big endian
//! ├────────────────────────────────────────────┤
//! │ attributes (TLV, 4-byte aligned)           │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Attribute payloads defined by nfnetlink are big endian.
//!
//! Reference: <linux/netfilter/nfnetlink_queue.h>

use bytes::{BufMut, Bytes, BytesMut};
use netlink_packet_core::{
    DefaultNla, Emitable, ErrorBuffer, ErrorMessage, NetlinkBuffer, NetlinkHeader, Parseable,
    NLMSG_DONE, NLMSG_ERROR, NLMSG_NOOP, NLMSG_OVERRUN, NLM_F_ACK,
    NLM_F_REQUEST,
};
use thiserror::Error;

use crate::nla::{attributes, emit_nlas};

/// Length of `struct nlmsghdr` (not re-exported by `netlink-packet-core`).
const NETLINK_HEADER_LEN: usize = 16;

/// Length of `struct nfgenmsg`.
pub const NFGENMSG_LEN: usize = 4;

const NFNL_SUBSYS_QUEUE: u16 = 3;
const NFNETLINK_V0: u8 = 0;
const AF_UNSPEC: u8 = 0;

const NFQNL_MSG_PACKET: u16 = 0;
const NFQNL_MSG_VERDICT: u16 = 1;
const NFQNL_MSG_CONFIG: u16 = 2;

const NFQNL_CFG_CMD_BIND: u8 = 1;
const NFQNL_CFG_CMD_UNBIND: u8 = 2;

/// Only packet metadata, no payload.
const NFQNL_COPY_META: u8 = 1;

const NFQA_PACKET_HDR: u16 = 1;
const NFQA_VERDICT_HDR: u16 = 2;

const NFQA_CFG_CMD: u16 = 1;
const NFQA_CFG_PARAMS: u16 = 2;
const NFQA_CFG_MASK: u16 = 4;
const NFQA_CFG_FLAGS: u16 = 5;

const NFQA_CFG_F_FAIL_OPEN: u32 = 1;

/// `struct nfqnl_msg_packet_hdr` is packed: id (4) + hw_protocol (2) + hook (1).
const PACKET_HDR_LEN: usize = 7;

const NF_ACCEPT: u32 = 1;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid netlink message: {0}")]
    Framing(String),
    #[error("message type {ty:#06x} too short for nfgenmsg")]
    NfGenMsg { ty: u16 },
    #[error("malformed attribute: {0}")]
    Attribute(String),
    #[error("packet header attribute too short ({len} bytes)")]
    PacketHeader { len: usize },
    #[error("malformed error message: {0}")]
    Ack(String),
}

impl DecodeError {
    /// Whether the rest of the datagram can still be decoded after this error.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Framing(_))
    }
}

/// Queue configuration sent after binding. Packets are always copied in meta mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueParams {
    /// Maximum number of packet bytes copied per notification.
    pub copy_range: u32,
    /// Let packets through instead of dropping them when the queue is full.
    pub fail_open: bool,
}

impl Default for QueueParams {
    fn default() -> Self {
        Self { copy_range: 1024, fail_open: true }
    }
}

/// One queued packet, reduced to what is needed to issue a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptedEvent {
    /// Kernel-assigned packet id. Opaque, only echoed back in the verdict.
    pub id: u32,
    /// The queue the packet was delivered on.
    pub queue: u16,
    pub hw_protocol: u16,
    pub hook: u8,
}

/// Accept decision for one queued packet. Nothing else is ever sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub id: u32,
    pub queue: u16,
}

impl Verdict {
    pub const fn accept(event: &InterceptedEvent) -> Self {
        Self { id: event.id, queue: event.queue }
    }
}

/// A decoded `NFQNL_MSG_PACKET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub queue: u16,
    pub header: Option<PacketHeader>,
}

impl Notification {
    /// The event to act upon, if the packet header attribute was present.
    pub fn event(&self) -> Option<InterceptedEvent> {
        self.header.map(|header| InterceptedEvent {
            id: header.packet_id,
            queue: self.queue,
            hw_protocol: header.hw_protocol,
            hook: header.hook,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_id: u32,
    pub hw_protocol: u16,
    pub hook: u8,
}

/// A netlink acknowledgement. `errno == 0` means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: u32,
    pub errno: i32,
}

impl Ack {
    pub const fn is_success(&self) -> bool {
        self.errno == 0
    }
}

/// Anything the kernel may send on a queue socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Notification(Notification),
    Ack(Ack),
    /// `NLMSG_NOOP`, `NLMSG_DONE` or `NLMSG_OVERRUN`.
    Control(u16),
    Unknown(u16),
}

const fn queue_msg_type(msg: u16) -> u16 {
    (NFNL_SUBSYS_QUEUE << 8) | msg
}

/// Frames a queue message around already encoded attributes.
fn encode(msg: u16, flags: u16, seq: u32, queue: u16, attrs: &[u8]) -> Bytes {
    let mut header = NetlinkHeader::default();
    header.length = (NETLINK_HEADER_LEN + NFGENMSG_LEN + attrs.len()) as u32;
    header.message_type = queue_msg_type(msg);
    header.flags = flags;
    header.sequence_number = seq;

    let mut buf = BytesMut::zeroed(NETLINK_HEADER_LEN);
    header.emit(&mut buf);

    buf.put_u8(AF_UNSPEC);
    buf.put_u8(NFNETLINK_V0);
    buf.put_u16(queue);
    buf.put_slice(attrs);

    buf.freeze()
}

fn config_command(queue: u16, command: u8, seq: u32) -> Bytes {
    // struct nfqnl_msg_config_cmd { u8 command; u8 _pad; __be16 pf; }
    let attrs = emit_nlas(&[DefaultNla::new(NFQA_CFG_CMD, vec![command, 0, 0, 0])]);

    encode(NFQNL_MSG_CONFIG, NLM_F_REQUEST | NLM_F_ACK, seq, queue, &attrs)
}

/// Binds the socket to `queue`. Acknowledged.
pub fn bind_request(queue: u16, seq: u32) -> Bytes {
    config_command(queue, NFQNL_CFG_CMD_BIND, seq)
}

/// Releases `queue`. Acknowledged.
pub fn unbind_request(queue: u16, seq: u32) -> Bytes {
    config_command(queue, NFQNL_CFG_CMD_UNBIND, seq)
}

/// Sets meta copy mode and queue flags. Acknowledged.
pub fn params_request(queue: u16, params: &QueueParams, seq: u32) -> Bytes {
    // struct nfqnl_msg_config_params { __be32 copy_range; u8 copy_mode; } (packed)
    let mut value = params.copy_range.to_be_bytes().to_vec();
    value.push(NFQNL_COPY_META);

    let flags = if params.fail_open { NFQA_CFG_F_FAIL_OPEN } else { 0 };
    let attrs = emit_nlas(&[
        DefaultNla::new(NFQA_CFG_PARAMS, value),
        DefaultNla::new(NFQA_CFG_MASK, NFQA_CFG_F_FAIL_OPEN.to_be_bytes().to_vec()),
        DefaultNla::new(NFQA_CFG_FLAGS, flags.to_be_bytes().to_vec()),
    ]);

    encode(NFQNL_MSG_CONFIG, NLM_F_REQUEST | NLM_F_ACK, seq, queue, &attrs)
}

/// Encodes `verdict` for the kernel. Not acknowledged.
pub fn verdict(verdict: &Verdict, seq: u32) -> Bytes {
    // struct nfqnl_msg_verdict_hdr { __be32 verdict; __be32 id; }
    let mut value = NF_ACCEPT.to_be_bytes().to_vec();
    value.extend_from_slice(&verdict.id.to_be_bytes());
    let attrs = emit_nlas(&[DefaultNla::new(NFQA_VERDICT_HDR, value)]);

    encode(NFQNL_MSG_VERDICT, NLM_F_REQUEST, seq, verdict.queue, &attrs)
}

/// Splits a received datagram into its netlink messages.
pub fn decode(datagram: &[u8]) -> Messages<'_> {
    Messages { buf: datagram }
}

/// Netlink messages in a datagram start on 4-byte boundaries.
const NLMSG_ALIGNTO: usize = 4;

const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Iterator returned by [`decode`].
///
/// Malformed messages are reported individually. A corrupt length field makes the rest of
/// the datagram unreadable, in which case the error is the last item.
#[derive(Debug)]
pub struct Messages<'a> {
    buf: &'a [u8],
}

impl<'a> Iterator for Messages<'a> {
    type Item = Result<Inbound, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }

        let buffer = match NetlinkBuffer::new_checked(self.buf) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.buf = &[];
                return Some(Err(DecodeError::Framing(e.to_string())));
            }
        };

        let ty = buffer.message_type();
        let seq = buffer.sequence_number();
        let payload = buffer.payload();
        let next = nlmsg_align(buffer.length() as usize).min(self.buf.len());
        self.buf = &self.buf[next..];

        Some(decode_message(ty, seq, payload))
    }
}

fn decode_message(ty: u16, seq: u32, payload: &[u8]) -> Result<Inbound, DecodeError> {
    match ty {
        NLMSG_ERROR => decode_ack(seq, payload).map(Inbound::Ack),
        NLMSG_NOOP | NLMSG_DONE | NLMSG_OVERRUN => Ok(Inbound::Control(ty)),
        ty if ty == queue_msg_type(NFQNL_MSG_PACKET) => {
            decode_notification(ty, payload).map(Inbound::Notification)
        }
        ty => Ok(Inbound::Unknown(ty)),
    }
}

/// The kernel echoes the request's sequence number in the ack's own header.
fn decode_ack(seq: u32, payload: &[u8]) -> Result<Ack, DecodeError> {
    let message = ErrorBuffer::new_checked(&payload)
        .and_then(|buffer| ErrorMessage::parse(&buffer))
        .map_err(|e| DecodeError::Ack(e.to_string()))?;

    // Negative errno on failure, absent on success.
    let errno = message.code.map_or(0, |code| code.get().wrapping_neg());

    Ok(Ack { seq, errno })
}

fn decode_notification(ty: u16, payload: &[u8]) -> Result<Notification, DecodeError> {
    if payload.len() < NFGENMSG_LEN {
        return Err(DecodeError::NfGenMsg { ty });
    }

    let queue = u16::from_be_bytes([payload[2], payload[3]]);
    let mut header = None;

    for attr in attributes(&payload[NFGENMSG_LEN..]) {
        let (nla_type, value) = attr?;
        if nla_type != NFQA_PACKET_HDR {
            continue;
        }

        if value.len() < PACKET_HDR_LEN {
            return Err(DecodeError::PacketHeader { len: value.len() });
        }

        header = Some(PacketHeader {
            packet_id: u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
            hw_protocol: u16::from_be_bytes([value[4], value[5]]),
            hook: value[6],
        });
    }

    Ok(Notification { queue, header })
}

/// Helpers to fabricate kernel messages, for tests and benchmarks.
pub mod testing {
    use super::*;

    /// A `NFQNL_MSG_PACKET` notification as the kernel would deliver it in meta copy mode.
    pub fn notification(queue: u16, packet_id: u32, seq: u32) -> Bytes {
        let mut value = packet_id.to_be_bytes().to_vec();
        // ETH_P_IP, NF_INET_LOCAL_OUT
        value.extend_from_slice(&0x0800u16.to_be_bytes());
        value.push(3);

        let attrs = emit_nlas(&[DefaultNla::new(NFQA_PACKET_HDR, value)]);
        encode(NFQNL_MSG_PACKET, 0, seq, queue, &attrs)
    }

    /// A notification that carries no packet header attribute at all.
    pub fn bare_notification(queue: u16, seq: u32) -> Bytes {
        encode(NFQNL_MSG_PACKET, 0, seq, queue, &[])
    }

    /// A notification whose packet header attribute is cut short.
    pub fn malformed_notification(queue: u16, seq: u32) -> Bytes {
        let attrs = emit_nlas(&[DefaultNla::new(NFQA_PACKET_HDR, vec![0xde, 0xad])]);
        encode(NFQNL_MSG_PACKET, 0, seq, queue, &attrs)
    }

    /// The kernel's answer to a request with `NLM_F_ACK`. `errno == 0` acknowledges.
    pub fn ack(seq: u32, errno: i32) -> Bytes {
        // struct nlmsgerr { int error; struct nlmsghdr msg; }
        let mut outer = NetlinkHeader::default();
        outer.length = (NETLINK_HEADER_LEN + 4 + NETLINK_HEADER_LEN) as u32;
        outer.message_type = NLMSG_ERROR;
        outer.sequence_number = seq;

        let mut request = NetlinkHeader::default();
        request.length = (NETLINK_HEADER_LEN + NFGENMSG_LEN) as u32;
        request.message_type = queue_msg_type(NFQNL_MSG_CONFIG);
        request.flags = NLM_F_REQUEST | NLM_F_ACK;
        request.sequence_number = seq;

        let mut buf = BytesMut::zeroed(outer.length as usize);
        outer.emit(&mut buf[..NETLINK_HEADER_LEN]);
        buf[NETLINK_HEADER_LEN..NETLINK_HEADER_LEN + 4].copy_from_slice(&(-errno).to_ne_bytes());
        request.emit(&mut buf[NETLINK_HEADER_LEN + 4..]);

        buf.freeze()
    }

    /// Reads back an encoded accept verdict.
    pub fn parse_verdict(msg: &[u8]) -> Option<Verdict> {
        let buffer = NetlinkBuffer::new_checked(msg).ok()?;
        if buffer.message_type() != queue_msg_type(NFQNL_MSG_VERDICT) {
            return None;
        }

        let payload = buffer.payload();
        if payload.len() < NFGENMSG_LEN {
            return None;
        }
        let queue = u16::from_be_bytes([payload[2], payload[3]]);

        attributes(&payload[NFGENMSG_LEN..]).find_map(|attr| match attr {
            Ok((NFQA_VERDICT_HDR, value)) if value.len() == 8 => {
                let code = u32::from_be_bytes([value[0], value[1], value[2], value[3]]);
                let id = u32::from_be_bytes([value[4], value[5], value[6], value[7]]);
                (code == NF_ACCEPT).then_some(Verdict { id, queue })
            }
            _ => None,
        })
    }
}
