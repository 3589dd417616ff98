use std::{io, time::Duration};

use clap::{ArgAction, Parser};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use nfwake_socket::{HoldOptions, QueueOptions};
use nfwake_wire::{ParseError, WolPassword};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unknown station {0:?}, not a hardware address and not listed in /etc/ethers")]
    UnknownStation(String),
    #[error("Failed reading /etc/ethers: {0}")]
    Ethers(#[from] io::Error),
}

/// Send a Wake-on-LAN magic packet, once or whenever a netfilter queue sees traffic.
#[derive(Debug, Parser)]
#[command(name = "nfwake", version)]
pub struct Cli {
    /// Send the packet to the broadcast address instead of the station itself.
    #[arg(short = 'b')]
    pub broadcast: bool,

    /// Increase debug output. Without root, packets are logged instead of sent.
    #[arg(short = 'D', action = ArgAction::Count)]
    pub debug: u8,

    /// Verbose output.
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Interface to send the packet from.
    #[arg(short = 'i', value_name = "IFNAME", default_value = "eth0")]
    pub interface: String,

    /// After sending, wait until HOST answers pings.
    #[arg(short = 'd', value_name = "HOST")]
    pub hold: Option<String>,

    /// Password appended to the packet, `00:22:44:66:88:aa` or `192.168.1.1`.
    #[arg(short = 'p', value_name = "PASSWORD")]
    pub password: Option<WolPassword>,

    /// Send a packet for every packet queued on this netfilter queue.
    #[arg(short = 'q', value_name = "QUEUE")]
    pub queue: Option<u16>,

    /// Seconds after a hold during which further holds are skipped.
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub hold_debounce: u64,

    /// Maximum pings per hold.
    #[arg(
        long,
        value_name = "N",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    pub hold_attempts: u32,

    /// How long to wait for each ping reply, in milliseconds.
    #[arg(
        long,
        value_name = "MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub probe_timeout: u64,

    /// Hardware address of the station to wake, or its name in /etc/ethers.
    #[arg(value_name = "STATION")]
    pub station: String,
}

/// Everything needed to start, after argument parsing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hardware address or host name, resolved at startup.
    pub station: String,
    pub interface: String,
    pub broadcast: bool,
    pub password: WolPassword,
    pub queue: Option<u16>,
    pub queue_options: QueueOptions,
    pub hold_target: Option<String>,
    pub hold_options: HoldOptions,
    pub debug: u8,
    pub verbose: u8,
}

impl Config {
    /// Debug mode relaxes the permission check.
    pub fn is_debug(&self) -> bool {
        self.debug > 0
    }

    /// Log level for the given `-D` / `-v` counts.
    pub fn log_filter(&self) -> LevelFilter {
        match (self.debug, self.verbose) {
            (0, 0) => LevelFilter::WARN,
            (0, _) => LevelFilter::INFO,
            (1, _) => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let hold_options = HoldOptions::default()
            .with_debounce(Duration::from_secs(cli.hold_debounce))
            .with_max_attempts(cli.hold_attempts as usize)
            .with_probe_timeout(Duration::from_millis(cli.probe_timeout));

        Self {
            station: cli.station,
            interface: cli.interface,
            broadcast: cli.broadcast,
            password: cli.password.unwrap_or_default(),
            queue: cli.queue,
            queue_options: QueueOptions::default(),
            hold_target: cli.hold,
            hold_options,
            debug: cli.debug,
            verbose: cli.verbose,
        }
    }
}
