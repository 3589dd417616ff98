use std::io;

use nfwake::{
    socket::{QueueError, QueueOptions, QueueSocket, ReachabilityProbe},
    wire::{nfqueue::Verdict, WolPassword},
    Dispatcher,
};

use crate::fakes::{packet, Host, Kernel, Recorder};

type NoHold = ReachabilityProbe<Host>;

#[test]
fn fires_once_per_queued_packet() {
    let mut kernel = Kernel::delivering(0, &[41, 42, 43]);
    let options = QueueOptions::default();
    let mut session = QueueSocket::with_io(&mut kernel, &options).configure(0, &options).unwrap();

    let mut dispatcher =
        Dispatcher::<_, NoHold>::new(packet(WolPassword::none()), Recorder::default());
    // Only returns once the socket fails.
    let err = dispatcher.run_queue(&mut session).unwrap_err();
    assert!(matches!(err, QueueError::Recv(e) if e.kind() == io::ErrorKind::ConnectionAborted));

    assert_eq!(session.stats().events(), 3);
    drop(session);

    assert_eq!(dispatcher.sent(), 3);
    assert_eq!(dispatcher.transmitter().frames.len(), 3);
    assert_eq!(
        kernel.verdicts(),
        vec![
            Verdict { id: 41, queue: 0 },
            Verdict { id: 42, queue: 0 },
            Verdict { id: 43, queue: 0 },
        ]
    );
}

#[test]
fn transmit_failures_do_not_stop_the_listener() {
    let mut kernel = Kernel::delivering(7, &[1, 2]);
    let options = QueueOptions::default();
    let mut session = QueueSocket::with_io(&mut kernel, &options).configure(7, &options).unwrap();

    let recorder = Recorder { failures: 1, ..Default::default() };
    let mut dispatcher = Dispatcher::<_, NoHold>::new(packet(WolPassword::none()), recorder);
    dispatcher.run_queue(&mut session).unwrap_err();
    drop(session);

    assert_eq!(dispatcher.sent(), 1);
    // The packet is accepted whether or not the wake-up went out.
    assert_eq!(kernel.verdicts(), vec![Verdict { id: 1, queue: 7 }, Verdict { id: 2, queue: 7 }]);
}
