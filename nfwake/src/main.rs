use std::process::ExitCode;

use clap::Parser;
use nix::unistd::{getuid, setuid};

use nfwake::{
    ethers,
    socket::{HoldGate, QueueSocket, ReachabilityProbe},
    transport::{self, Datalink, DryRun, Transmit},
    wire::MagicPacket,
    Cli, Config, Dispatcher, Error, EXIT_OK, EXIT_USAGE,
};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version end up here too.
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let config = Config::from(cli);
    tracing_subscriber::fmt()
        .with_max_level(config.log_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(config: Config) -> Result<(), Error> {
    // Raw sockets first, while we still have the privileges. Missing privileges beat every
    // other setup error.
    let (transmitter, source): (Box<dyn Transmit>, _) = match Datalink::open(&config.interface) {
        Ok(datalink) => {
            let source = datalink.hardware_address()?;
            (Box::new(datalink), source)
        }
        Err(e) if e.is_permission_denied() && config.is_debug() => {
            tracing::warn!(?e, "no raw socket, packets will only be logged");
            (Box::new(DryRun::new()), transport::hardware_address(&config.interface)?)
        }
        Err(e) if e.is_permission_denied() => return Err(Error::Permission(e)),
        Err(e) => return Err(e.into()),
    };

    let station = ethers::resolve_station(&config.station)?;

    let packet = MagicPacket::build(station, source, config.broadcast, config.password);
    tracing::info!(%station, %source, broadcast = config.broadcast, "built magic packet");
    tracing::debug!(len = packet.len(), "packet: {packet}");

    let mut dispatcher = Dispatcher::new(packet, transmitter);
    if let Some(target) = config.hold_target.as_deref() {
        let probe = ReachabilityProbe::open(target, config.hold_options.probe_timeout)?;
        dispatcher = dispatcher.with_hold(HoldGate::new(probe, config.hold_options.clone()));
    }

    let session = match config.queue {
        Some(queue) => {
            let options = &config.queue_options;
            Some(QueueSocket::open(options)?.configure(queue, options)?)
        }
        None => None,
    };

    // Everything privileged is open now.
    setuid(getuid())?;

    match session {
        None => {
            dispatcher.run_once()?;
            Ok(())
        }
        Some(mut session) => match dispatcher.run_queue(&mut session) {
            Ok(never) => match never {},
            Err(e) => Err(e.into()),
        },
    }
}
