//! The Wake-on-LAN "magic packet" frame.
//!
//! ```text
//! ┌──────────────┬──────────────┬───────────┬────────────┬───────────────────┬──────────────┐
//! │ dst (6)      │ src (6)      │ type (2)  │ FF x 6     │ station x 16 (96) │ password     │
//! │ bcast|station│ local hwaddr │ 0x0842    │ sync       │                   │ 0, 4 or 6    │
//! └──────────────┴──────────────┴───────────┴────────────┴───────────────────┴──────────────┘
//! ```
//!
//! The sync pattern and the 16-fold repetition are what adapters look for. Any deviation
//! and the target will not wake up.

use std::{fmt, str::FromStr};

use bytes::{BufMut, Bytes, BytesMut};
use pnet::util::MacAddr;
use thiserror::Error;

/// Ethertype of raw Wake-on-LAN frames.
pub const ETHERTYPE_WOL: u16 = 0x0842;

/// Length of the Ethernet header in front of the payload.
pub const HEADER_LEN: usize = 14;

const SYNC: [u8; 6] = [0xFF; 6];
const REPETITIONS: usize = 16;

/// Length of the magic payload (sync pattern + repeated station address), without password.
pub const PAYLOAD_LEN: usize = SYNC.len() + REPETITIONS * 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid station address {0:?}, expected 00:11:22:33:44:55")]
    Station(String),
    #[error("unable to read the Wake-On-LAN password {0:?}, expected 4 or 6 bytes")]
    Password(String),
}

/// The 6-byte hardware address of an Ethernet station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationAddress([u8; 6]);

impl StationAddress {
    /// The link-layer broadcast address.
    pub const BROADCAST: Self = Self([0xFF; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl FromStr for StationAddress {
    type Err = ParseError;

    /// Parses `aa:bb:cc:dd:ee:ff`. Like `ether_aton`, each group may have one or two digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_hex_groups(s) {
            Some(groups) if groups.len() == 6 => {
                let mut octets = [0u8; 6];
                octets.copy_from_slice(&groups);
                Ok(Self(octets))
            }
            _ => Err(ParseError::Station(s.to_owned())),
        }
    }
}

impl fmt::Display for StationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl From<MacAddr> for StationAddress {
    fn from(mac: MacAddr) -> Self {
        let MacAddr(a, b, c, d, e, f) = mac;
        Self([a, b, c, d, e, f])
    }
}

impl From<StationAddress> for MacAddr {
    fn from(station: StationAddress) -> Self {
        let [a, b, c, d, e, f] = station.0;
        Self::new(a, b, c, d, e, f)
    }
}

/// Optional password some adapters require after the repeated station address.
///
/// Always 0, 4 or 6 bytes long. Other lengths are rejected when parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WolPassword {
    bytes: [u8; 6],
    len: usize,
}

impl WolPassword {
    /// The empty password.
    pub const fn none() -> Self {
        Self { bytes: [0; 6], len: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        if !matches!(bytes.len(), 0 | 4 | 6) {
            return None;
        }

        let mut password = Self::none();
        password.bytes[..bytes.len()].copy_from_slice(bytes);
        password.len = bytes.len();
        Some(password)
    }
}

impl FromStr for WolPassword {
    type Err = ParseError;

    /// Accepts either ethernet hex notation (`00:22:44:66:88:aa`, 4 or 6 groups) or
    /// dotted decimal (`192.168.1.1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = parse_hex_groups(s)
            .filter(|groups| matches!(groups.len(), 4 | 6))
            .or_else(|| parse_dotted(s));

        bytes
            .as_deref()
            .and_then(Self::from_slice)
            .ok_or_else(|| ParseError::Password(s.to_owned()))
    }
}

impl TryFrom<&[u8]> for WolPassword {
    type Error = ParseError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes).ok_or_else(|| ParseError::Password(format!("{bytes:02x?}")))
    }
}

fn parse_hex_groups(s: &str) -> Option<Vec<u8>> {
    s.split(':')
        .map(|group| {
            if group.is_empty() || group.len() > 2 {
                return None;
            }
            u8::from_str_radix(group, 16).ok()
        })
        .collect()
}

fn parse_dotted(s: &str) -> Option<Vec<u8>> {
    let groups = s.split('.').map(|group| group.parse::<u8>().ok()).collect::<Option<Vec<_>>>()?;
    (groups.len() == 4).then_some(groups)
}

/// An immutable, fully framed magic packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicPacket(Bytes);

impl MagicPacket {
    /// Builds the frame. `broadcast` selects the link-layer broadcast address as destination,
    /// otherwise the frame is addressed to `station` itself.
    pub fn build(
        station: StationAddress,
        source: StationAddress,
        broadcast: bool,
        password: WolPassword,
    ) -> Self {
        let destination = if broadcast { StationAddress::BROADCAST } else { station };

        let mut buf = BytesMut::with_capacity(HEADER_LEN + PAYLOAD_LEN + password.len());
        buf.put_slice(&destination.octets());
        buf.put_slice(&source.octets());
        buf.put_u16(ETHERTYPE_WOL);

        buf.put_slice(&SYNC);
        for _ in 0..REPETITIONS {
            buf.put_slice(&station.octets());
        }
        buf.put_slice(password.as_bytes());

        let packet = Self(buf.freeze());
        tracing::trace!(%destination, %source, len = packet.len(), "built magic packet");

        packet
    }

    /// The link-layer destination the frame is addressed to.
    pub fn destination(&self) -> StationAddress {
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&self.0[..6]);
        StationAddress::new(octets)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for MagicPacket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Space separated hex dump, used for verbose output.
impl fmt::Display for MagicPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pnet::packet::{ethernet::EthernetPacket, Packet};

    use super::*;

    const STATION: StationAddress = StationAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const SOURCE: StationAddress = StationAddress::new([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);

    #[test]
    fn frame_layout() {
        let packet = MagicPacket::build(STATION, SOURCE, false, WolPassword::none());
        let bytes = packet.as_bytes();

        assert_eq!(bytes.len(), HEADER_LEN + PAYLOAD_LEN);
        assert_eq!(&bytes[0..6], &STATION.octets());
        assert_eq!(&bytes[6..12], &SOURCE.octets());
        assert_eq!(&bytes[12..14], &[0x08, 0x42]);
        assert_eq!(&bytes[14..20], &[0xFF; 6]);
        for chunk in bytes[20..].chunks(6) {
            assert_eq!(chunk, &STATION.octets());
        }
        assert_eq!(bytes[20..].chunks(6).count(), 16);
    }

    #[test]
    fn pnet_sees_a_wol_frame() {
        let packet = MagicPacket::build(STATION, SOURCE, true, WolPassword::none());
        let frame = EthernetPacket::new(packet.as_bytes()).unwrap();

        assert_eq!(frame.get_destination(), MacAddr::broadcast());
        assert_eq!(StationAddress::from(frame.get_source()), SOURCE);
        assert_eq!(frame.get_ethertype().0, ETHERTYPE_WOL);
        assert_eq!(frame.payload().len(), PAYLOAD_LEN);
    }

    #[test]
    fn broadcast_selects_destination() {
        let unicast = MagicPacket::build(STATION, SOURCE, false, WolPassword::none());
        let broadcast = MagicPacket::build(STATION, SOURCE, true, WolPassword::none());

        assert_eq!(unicast.destination(), STATION);
        assert!(broadcast.destination().is_broadcast());
        // Only the destination differs.
        assert_eq!(unicast.as_bytes()[6..], broadcast.as_bytes()[6..]);
    }

    #[test]
    fn password_is_appended() {
        for (input, expected) in [
            ("192.168.1.1", vec![0xc0, 0xa8, 0x01, 0x01]),
            ("00:22:44:66:88:aa", vec![0x00, 0x22, 0x44, 0x66, 0x88, 0xaa]),
            ("de:ad:be:ef", vec![0xde, 0xad, 0xbe, 0xef]),
        ] {
            let password: WolPassword = input.parse().unwrap();
            let packet = MagicPacket::build(STATION, SOURCE, false, password);

            assert_eq!(packet.len(), HEADER_LEN + PAYLOAD_LEN + expected.len());
            assert_eq!(&packet.as_bytes()[HEADER_LEN + PAYLOAD_LEN..], expected.as_slice());
        }
    }

    #[test]
    fn build_is_deterministic() {
        let password = "1.2.3.4".parse().unwrap();
        let a = MagicPacket::build(STATION, SOURCE, true, password);
        let b = MagicPacket::build(STATION, SOURCE, true, password);
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_passwords() {
        let inputs =
            ["", "aa:bb:cc", "aa:bb:cc:dd:ee", "1.2.3", "1.2.3.256", "aa:bb:cc:dd:ee:ff:00", "x"];
        for input in inputs {
            assert!(input.parse::<WolPassword>().is_err(), "{input:?} should be rejected");
        }
        assert!(WolPassword::try_from(&[1u8, 2, 3][..]).is_err());
        assert_eq!(WolPassword::try_from(&[][..]).unwrap(), WolPassword::none());
    }

    #[test]
    fn station_parsing() {
        assert_eq!("0:11:22:33:44:55".parse::<StationAddress>().unwrap(), STATION);
        let station = "00:11:22:33:44:55".parse::<StationAddress>().unwrap();
        assert_eq!(station.to_string(), "00:11:22:33:44:55");
        assert!("ff:ff:ff:ff:ff:ff".parse::<StationAddress>().unwrap().is_broadcast());

        let inputs = [
            "00:11:22:33:44",
            "00:11:22:33:44:55:66",
            "001:11:22:33:44:55",
            "zz:11:22:33:44:55",
            "host",
        ];
        for input in inputs {
            assert!(input.parse::<StationAddress>().is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn hex_dump() {
        let packet = MagicPacket::build(STATION, SOURCE, false, WolPassword::none());
        let dump = packet.to_string();
        assert!(dump.starts_with("00 11 22 33 44 55 02 aa"));
        assert_eq!(dump.split(' ').count(), packet.len());
    }
}
