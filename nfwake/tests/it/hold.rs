use std::{net::Ipv4Addr, time::Duration};

use nfwake::{
    socket::{HoldGate, HoldOptions, HoldOutcome, QueueOptions, QueueSocket, ReachabilityProbe},
    wire::WolPassword,
    Dispatcher,
};

use crate::fakes::{packet, Host, Kernel, Recorder};

fn gate(host: Host, options: HoldOptions) -> HoldGate<ReachabilityProbe<Host>> {
    let probe = ReachabilityProbe::new(host, Ipv4Addr::new(192, 0, 2, 1), options.probe_timeout)
        .with_identifier(0x4242);
    HoldGate::new(probe, options)
}

fn fast() -> HoldOptions {
    HoldOptions::default().with_probe_timeout(Duration::from_millis(10))
}

#[test]
fn waits_for_the_host_after_sending() {
    let mut dispatcher = Dispatcher::new(packet(WolPassword::none()), Recorder::default())
        .with_hold(gate(Host::answering_on(3), fast()));

    assert_eq!(dispatcher.run_once().unwrap(), Some(HoldOutcome::Reachable { attempts: 3 }));
    assert_eq!(dispatcher.transmitter().frames.len(), 1);
    assert_eq!(dispatcher.hold_gate().unwrap().probe().socket().requests, 3);
}

#[test]
fn gives_up_on_a_silent_host() {
    let mut dispatcher = Dispatcher::new(packet(WolPassword::none()), Recorder::default())
        .with_hold(gate(Host::default(), fast().with_max_attempts(3)));

    assert_eq!(dispatcher.run_once().unwrap(), Some(HoldOutcome::Exhausted { attempts: 3 }));
}

#[test]
fn queued_bursts_probe_once() {
    let mut kernel = Kernel::delivering(0, &[1, 2, 3]);
    let options = QueueOptions::default();
    let mut session = QueueSocket::with_io(&mut kernel, &options).configure(0, &options).unwrap();

    let mut dispatcher = Dispatcher::new(packet(WolPassword::none()), Recorder::default())
        .with_hold(gate(Host::answering_on(1), fast()));
    dispatcher.run_queue(&mut session).unwrap_err();
    drop(session);

    assert_eq!(dispatcher.sent(), 3);
    // Later packets fall into the debounce window.
    let host = dispatcher.hold_gate().unwrap().probe().socket();
    assert_eq!(host.requests, 1);
    assert_eq!(kernel.verdicts().len(), 3);
}
