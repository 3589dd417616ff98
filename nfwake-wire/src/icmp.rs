//! ICMP echo request/reply, just enough to ask a single host whether it is up.

use bytes::{BufMut, Bytes, BytesMut};
use pnet::packet::{
    icmp::{echo_reply::EchoReplyPacket, IcmpTypes},
    ipv4::Ipv4Packet,
};

/// Size of the ICMP echo header.
pub const ECHO_HEADER_LEN: usize = 8;
/// Size of the zero-filled echo payload.
pub const ECHO_PAYLOAD_LEN: usize = 56;

/// Largest datagram we expect back: maximal IP header, ICMP header and payload.
pub const MAX_REPLY_LEN: usize = 60 + ECHO_HEADER_LEN + ECHO_PAYLOAD_LEN + 68;

/// Builds an echo request carrying `identifier`, with a valid checksum.
pub fn echo_request(identifier: u16, sequence: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(ECHO_HEADER_LEN + ECHO_PAYLOAD_LEN);
    buf.put_u8(IcmpTypes::EchoRequest.0);
    buf.put_u8(0);
    // checksum, filled in below
    buf.put_u16(0);
    buf.put_u16(identifier);
    buf.put_u16(sequence);
    buf.put_bytes(0, ECHO_PAYLOAD_LEN);

    let checksum = pnet::util::checksum(&buf, 1);
    buf[2..4].copy_from_slice(&checksum.to_be_bytes());

    buf.freeze()
}

/// Whether `datagram`, as read from a raw ICMP socket (IPv4 header included), is an echo
/// reply to one of our requests.
///
/// Anything else, including truncated garbage, is not.
pub fn is_echo_reply(datagram: &[u8], identifier: u16) -> bool {
    let Some(ip) = Ipv4Packet::new(datagram) else {
        return false;
    };

    let ihl = ip.get_header_length() as usize * 4;
    if ihl < Ipv4Packet::minimum_packet_size() || datagram.len() < ihl + ECHO_HEADER_LEN {
        return false;
    }

    EchoReplyPacket::new(&datagram[ihl..]).is_some_and(|reply| {
        reply.get_icmp_type() == IcmpTypes::EchoReply && reply.get_identifier() == identifier
    })
}
