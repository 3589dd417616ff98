/// Statistics for a queue session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Total bytes received
    bytes_rx: usize,
    /// Number of intercepted packets the handler was invoked for
    events: usize,
    /// Number of verdicts sent
    verdicts: usize,
    /// Number of messages that could not be decoded and were skipped
    malformed: usize,
}

impl QueueStats {
    #[inline]
    pub(crate) fn increment_rx(&mut self, bytes: usize) {
        self.bytes_rx += bytes;
    }

    #[inline]
    pub(crate) fn increment_events(&mut self) {
        self.events += 1;
    }

    #[inline]
    pub(crate) fn increment_verdicts(&mut self) {
        self.verdicts += 1;
    }

    #[inline]
    pub(crate) fn increment_malformed(&mut self) {
        self.malformed += 1;
    }

    #[inline]
    pub fn bytes_rx(&self) -> usize {
        self.bytes_rx
    }

    #[inline]
    pub fn events(&self) -> usize {
        self.events
    }

    #[inline]
    pub fn verdicts(&self) -> usize {
        self.verdicts
    }

    #[inline]
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}
