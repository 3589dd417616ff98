use nfwake::{
    socket::ReachabilityProbe,
    wire::{magic::HEADER_LEN, StationAddress, WolPassword},
    Dispatcher,
};

use crate::fakes::{packet, Host, Recorder, SOURCE, STATION};

type NoHold = ReachabilityProbe<Host>;

#[test]
fn sends_exactly_once() {
    let mut dispatcher =
        Dispatcher::<_, NoHold>::new(packet(WolPassword::none()), Recorder::default());

    assert_eq!(dispatcher.run_once().unwrap(), None);

    let frames = &dispatcher.transmitter().frames;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].len(), 116);
    assert_eq!(&frames[0][..6], &STATION.octets());
    assert_eq!(&frames[0][6..12], &SOURCE.octets());
}

#[test]
fn password_is_appended() {
    let password = "192.168.1.1".parse::<WolPassword>().unwrap();
    let mut dispatcher = Dispatcher::<_, NoHold>::new(packet(password), Recorder::default());
    dispatcher.run_once().unwrap();

    let frame = &dispatcher.transmitter().frames[0];
    assert_eq!(frame.len(), 120);
    // sync pattern, then 16 copies of the station
    assert_eq!(&frame[HEADER_LEN..HEADER_LEN + 6], &[0xff; 6]);
    for copy in frame[HEADER_LEN + 6..116].chunks(6) {
        assert_eq!(copy, &STATION.octets());
    }
    assert_eq!(&frame[116..], &[0xc0, 0xa8, 0x01, 0x01]);
}

#[test]
fn broadcast_destination() {
    let packet = nfwake::wire::MagicPacket::build(STATION, SOURCE, true, WolPassword::none());
    let mut dispatcher = Dispatcher::<_, NoHold>::new(packet, Recorder::default());
    dispatcher.run_once().unwrap();

    let frame = &dispatcher.transmitter().frames[0];
    assert_eq!(&frame[..6], &StationAddress::BROADCAST.octets());
    assert_eq!(&frame[20..26], &STATION.octets());
}

#[test]
fn transmit_failure_is_reported() {
    let recorder = Recorder { failures: 1, ..Default::default() };
    let mut dispatcher = Dispatcher::<_, NoHold>::new(packet(WolPassword::none()), recorder);

    assert!(dispatcher.run_once().is_err());
    assert_eq!(dispatcher.sent(), 0);
}
