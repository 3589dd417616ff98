use std::{fmt, io};

use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};
use pnet::datalink::{self, Channel, DataLinkSender, NetworkInterface};

use nfwake_wire::StationAddress;

use crate::{Transmit, TransportError};

/// Looks up a network interface by name.
pub fn interface_by_name(name: &str) -> Result<NetworkInterface, TransportError> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| TransportError::InterfaceNotFound(name.to_owned()))
}

/// The hardware address of the interface called `name`. Needs no privileges.
pub fn hardware_address(name: &str) -> Result<StationAddress, TransportError> {
    mac_of(&interface_by_name(name)?)
}

fn mac_of(interface: &NetworkInterface) -> Result<StationAddress, TransportError> {
    interface
        .mac
        .map(StationAddress::from)
        .ok_or_else(|| TransportError::NoHardwareAddress(interface.name.clone()))
}

/// Checks that raw packet sockets may be opened, by opening one and closing it again.
///
/// Fails with [`io::ErrorKind::PermissionDenied`] without `CAP_NET_RAW`.
pub fn check_raw_access() -> Result<(), TransportError> {
    socket(AddressFamily::Packet, SockType::Raw, SockFlag::SOCK_CLOEXEC, None)
        .map(drop)
        .map_err(|e| TransportError::Io(e.into()))
}

/// Write-only channel settings: no promiscuous mode, a token read buffer.
fn channel_config() -> datalink::Config {
    datalink::Config { promiscuous: false, read_buffer_size: 64, ..Default::default() }
}

/// Raw ethernet transmitter bound to one interface (`AF_PACKET`/`SOCK_RAW`).
pub struct Datalink {
    interface: NetworkInterface,
    tx: Box<dyn DataLinkSender>,
}

impl Datalink {
    /// Opens a raw channel on the interface called `name`. Requires `CAP_NET_RAW`.
    ///
    /// Missing privileges are reported before the interface is looked up.
    pub fn open(name: &str) -> Result<Self, TransportError> {
        check_raw_access()?;
        let interface = interface_by_name(name)?;
        Self::open_interface(interface)
    }

    pub fn open_interface(interface: NetworkInterface) -> Result<Self, TransportError> {
        // We only ever write. The receiving half is dropped right away.
        match datalink::channel(&interface, channel_config())? {
            Channel::Ethernet(tx, _rx) => {
                let index = interface.index;
                tracing::debug!(interface = interface.name, index, "opened raw channel");
                Ok(Self { interface, tx })
            }
            _ => Err(TransportError::UnsupportedChannel(interface.name)),
        }
    }

    /// The hardware address of the interface, used as the frame's source address.
    pub fn hardware_address(&self) -> Result<StationAddress, TransportError> {
        mac_of(&self.interface)
    }

    pub fn interface(&self) -> &NetworkInterface {
        &self.interface
    }
}

impl fmt::Debug for Datalink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datalink").field("interface", &self.interface.name).finish_non_exhaustive()
    }
}

impl Transmit for Datalink {
    fn transmit(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        match self.tx.send_to(frame, None) {
            Some(Ok(())) => {
                tracing::debug!(interface = self.interface.name, len = frame.len(), "frame sent");
                Ok(frame.len())
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                let e = io::Error::new(io::ErrorKind::WouldBlock, "no transmit buffer available");
                Err(e.into())
            }
        }
    }
}
