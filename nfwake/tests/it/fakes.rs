use std::{collections::VecDeque, io, net::Ipv4Addr, time::Duration};

use nfwake::{
    socket::{EchoSocket, NetlinkIo},
    transport::{Transmit, TransportError},
    wire::{
        nfqueue::{testing, Verdict},
        MagicPacket, StationAddress, WolPassword,
    },
};

pub const STATION: StationAddress = StationAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
pub const SOURCE: StationAddress = StationAddress::new([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);

pub fn packet(password: WolPassword) -> MagicPacket {
    MagicPacket::build(STATION, SOURCE, false, password)
}

/// Records every frame.
#[derive(Debug, Default)]
pub struct Recorder {
    pub frames: Vec<Vec<u8>>,
    /// Fail this many transmits before succeeding.
    pub failures: usize,
}

impl Transmit for Recorder {
    fn transmit(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        self.frames.push(frame.to_vec());
        Ok(frame.len())
    }
}

/// A kernel that acknowledges configuration requests and then delivers the scripted
/// notifications. Once they are used up, receiving fails.
#[derive(Debug, Default)]
pub struct Kernel {
    inbound: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
}

impl Kernel {
    pub fn delivering(queue: u16, ids: &[u32]) -> Self {
        let inbound = ids
            .iter()
            .enumerate()
            .map(|(seq, id)| testing::notification(queue, *id, seq as u32 + 100).to_vec())
            .collect();
        Self { inbound, sent: Vec::new() }
    }

    pub fn verdicts(&self) -> Vec<Verdict> {
        self.sent.iter().filter_map(|msg| testing::parse_verdict(msg)).collect()
    }
}

impl NetlinkIo for Kernel {
    fn send(&mut self, msg: &[u8]) -> io::Result<usize> {
        self.sent.push(msg.to_vec());

        // NLM_F_ACK
        if u16::from_ne_bytes([msg[6], msg[7]]) & 0x4 != 0 {
            let seq = u32::from_ne_bytes([msg[8], msg[9], msg[10], msg[11]]);
            self.inbound.push_front(testing::ack(seq, 0).to_vec());
        }
        Ok(msg.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let datagram = self.inbound.pop_front().ok_or(io::ErrorKind::ConnectionAborted)?;
        buf[..datagram.len()].copy_from_slice(&datagram);
        Ok(datagram.len())
    }
}

/// A host that answers the `answer_on`-th echo request (1-based), or never.
#[derive(Debug, Default)]
pub struct Host {
    pub requests: usize,
    pub answer_on: Option<usize>,
    pending: Option<Vec<u8>>,
}

impl Host {
    pub fn answering_on(attempt: usize) -> Self {
        Self { answer_on: Some(attempt), ..Default::default() }
    }
}

impl EchoSocket for Host {
    fn send_to(&mut self, buf: &[u8], _destination: Ipv4Addr) -> io::Result<usize> {
        self.requests += 1;
        if self.answer_on.is_some_and(|n| self.requests >= n) {
            let mut reply =
                vec![0x45, 0, 0, 84, 0, 0, 0, 0, 64, 1, 0, 0, 192, 0, 2, 1, 192, 0, 2, 2];
            reply.extend_from_slice(buf);
            // echo reply
            reply[20] = 0;
            self.pending = Some(reply);
        }
        Ok(buf.len())
    }

    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        match self.pending.take() {
            Some(reply) => {
                buf[..reply.len()].copy_from_slice(&reply);
                Ok(Some(reply.len()))
            }
            None => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}
