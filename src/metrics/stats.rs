use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::watch;

/// Point-in-time view of the production loop, published after every tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionStats {
    /// Ticks that produced an event.
    pub produced: u64,
    /// Ticks skipped because the synthesizer returned nothing.
    pub skipped: u64,
    pub sends_ok: u64,
    pub send_failures: u64,
    pub flush_failures: u64,
    /// Produced count at the most recent flush checkpoint.
    pub last_flush: u64,
    pub destinations: usize,
    /// Destinations with a nonzero consecutive-failure count.
    pub failing: BTreeMap<String, u64>,
    pub elapsed: Duration,
}

impl ProductionStats {
    /// Events produced per second over the whole run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.produced as f64 / secs
        } else {
            0.0
        }
    }

    pub fn total_failures(&self) -> u64 {
        self.send_failures + self.flush_failures
    }
}

/// Sending half owned by the loop; readers hold [`StatsReceiver`].
pub type StatsSender = watch::Sender<ProductionStats>;
pub type StatsReceiver = watch::Receiver<ProductionStats>;

pub fn channel(destinations: usize) -> (StatsSender, StatsReceiver) {
    watch::channel(ProductionStats {
        destinations,
        ..ProductionStats::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_handles_zero_elapsed() {
        let stats = ProductionStats {
            produced: 10,
            ..ProductionStats::default()
        };
        assert_eq!(stats.throughput(), 0.0);

        let stats = ProductionStats {
            produced: 10,
            elapsed: Duration::from_secs(2),
            ..ProductionStats::default()
        };
        assert!((stats.throughput() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn channel_seeds_destination_count() {
        let (_tx, rx) = channel(3);
        assert_eq!(rx.borrow().destinations, 3);
        assert_eq!(rx.borrow().produced, 0);
    }
}
