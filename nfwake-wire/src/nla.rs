//! Netlink attribute helpers.
//!
//! Thin wrappers around the `netlink-packet-core` attribute types, so the nfqueue code can deal
//! in `(type, value)` pairs.

use netlink_packet_core::{DefaultNla, Emitable, NlasIterator, NLA_HEADER_SIZE};

use crate::nfqueue::DecodeError;

/// Encodes attributes back to back, each padded to 4 bytes.
pub(crate) fn emit_nlas(nlas: &[DefaultNla]) -> Vec<u8> {
    let mut buf = vec![0u8; nlas.buffer_len()];
    nlas.emit(&mut buf);
    buf
}

/// Walks the attributes in `buf`. Flag bits are masked off the type.
///
/// A truncated or corrupt attribute ends the walk with an error.
pub(crate) fn attributes(
    buf: &[u8],
) -> impl Iterator<Item = Result<(u16, &[u8]), DecodeError>> + '_ {
    NlasIterator::new(buf).map(|nla| {
        nla.map(|nla| {
            let kind = nla.kind();
            let len = nla.value_length();
            (kind, &nla.into_inner()[NLA_HEADER_SIZE..NLA_HEADER_SIZE + len])
        })
        .map_err(|e| DecodeError::Attribute(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_four_bytes() {
        let buf = emit_nlas(&[DefaultNla::new(1, vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee])]);

        assert_eq!(buf.len(), 12);
        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 9);
        assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), 1);
        assert_eq!(&buf[9..], &[0, 0, 0]);
    }

    #[test]
    fn walks_attributes_and_masks_flags() {
        let mut buf =
            emit_nlas(&[DefaultNla::new(2, vec![1, 2]), DefaultNla::new(3, vec![3, 4, 5, 6])]);
        // NLA_F_NET_BYTEORDER on the second attribute
        buf[10..12].copy_from_slice(&(3u16 | 0x4000).to_ne_bytes());

        let attrs = attributes(&buf).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(attrs, vec![(2, &[1, 2][..]), (3, &[3, 4, 5, 6][..])]);
    }

    #[test]
    fn truncated_attribute_is_an_error() {
        let mut buf = emit_nlas(&[DefaultNla::new(1, vec![0; 4])]);
        // Claims 16 bytes, only 8 are there.
        buf[0..2].copy_from_slice(&16u16.to_ne_bytes());

        let mut attrs = attributes(&buf);
        assert!(matches!(attrs.next(), Some(Err(DecodeError::Attribute(_)))));
        assert!(attrs.next().is_none());
    }
}
