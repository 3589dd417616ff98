//! Waiting for a freshly woken host to come up.

use std::time::{Duration, Instant};

use crate::probe::Probe;

#[derive(Debug, Clone)]
pub struct HoldOptions {
    /// Holds starting within this window after the last probe run return immediately.
    pub debounce: Duration,
    /// Maximum number of probes per hold.
    pub max_attempts: usize,
    /// How long a single probe waits for its reply.
    pub probe_timeout: Duration,
}

impl HoldOptions {
    /// Sets the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the maximum number of probes per hold.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the per-probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Default for HoldOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(60),
            max_attempts: 10,
            probe_timeout: Duration::from_secs(1),
        }
    }
}

/// How a hold ended. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// The last probe run was too recent, nothing was sent.
    Debounced,
    /// The host answered on attempt number `attempts`.
    Reachable { attempts: usize },
    /// The host never answered.
    Exhausted { attempts: usize },
}

/// Blocks until a host answers pings or the attempt budget runs out.
///
/// Repeated holds within the debounce window are skipped, so a burst of queued packets
/// doesn't turn into a burst of ping rounds.
///
/// The window starts when the last probing hold finished. Debounced holds leave it where it
/// is, so a steady trickle of holds still probes once per window.
#[derive(Debug)]
pub struct HoldGate<P> {
    probe: P,
    options: HoldOptions,
    /// Completion time of the last hold that actually probed.
    last_probe: Option<Instant>,
}

impl<P: Probe> HoldGate<P> {
    pub fn new(probe: P, options: HoldOptions) -> Self {
        Self { probe, options, last_probe: None }
    }

    pub fn options(&self) -> &HoldOptions {
        &self.options
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn hold(&mut self) -> HoldOutcome {
        self.hold_at(Instant::now())
    }

    /// Like [`hold`](Self::hold), with `now` as the start time of the hold.
    pub fn hold_at(&mut self, now: Instant) -> HoldOutcome {
        if let Some(last) = self.last_probe {
            let since = now.saturating_duration_since(last);
            if since < self.options.debounce {
                tracing::debug!(?since, "host probed recently, not holding");
                return HoldOutcome::Debounced;
            }
        }

        let outcome = self.run_probes();
        // Time spent probing counts towards the debounce window.
        self.last_probe = Some(now.max(Instant::now()));

        match outcome {
            HoldOutcome::Reachable { attempts } => {
                tracing::info!(attempts, "host is reachable")
            }
            HoldOutcome::Exhausted { attempts } => {
                tracing::warn!(attempts, "host did not answer, giving up")
            }
            HoldOutcome::Debounced => {}
        }

        outcome
    }

    fn run_probes(&mut self) -> HoldOutcome {
        for attempt in 1..=self.options.max_attempts {
            tracing::debug!(attempt, max_attempts = self.options.max_attempts, "probing host");
            if self.probe.probe() {
                return HoldOutcome::Reachable { attempts: attempt };
            }
        }

        HoldOutcome::Exhausted { attempts: self.options.max_attempts }
    }
}
