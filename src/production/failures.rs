use std::collections::BTreeMap;

/// Consecutive failure counts per destination.
///
/// Only destinations with a nonzero count are stored, so an empty tracker
/// means every destination is currently healthy.
#[derive(Debug, Default, Clone)]
pub struct FailureTracker {
    counts: BTreeMap<String, u64>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the destination's count after incrementing.
    pub fn record_failure(&mut self, destination: &str) -> u64 {
        let count = self.counts.entry(destination.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Resets the destination to zero; returns true if it had been failing.
    pub fn record_success(&mut self, destination: &str) -> bool {
        self.counts.remove(destination).is_some()
    }

    pub fn count(&self, destination: &str) -> u64 {
        self.counts.get(destination).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.clone()
    }
}

/// Failure logging is rate-limited to counts 1, 11, 21, ...
pub fn should_log(count: u64) -> bool {
    count % 10 == 1
}
