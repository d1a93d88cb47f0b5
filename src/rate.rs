use std::time::Duration;

/// Lower bound applied to the configured rate before inverting it.
pub const MIN_RATE: f64 = 0.001;

/// Fixed-interval pacing for the production loop.
///
/// The interval is computed once from the global rate. The per-destination
/// mode is carried for reporting only; it does not scale the interval.
#[derive(Debug, Clone)]
pub struct RateController {
    rate: f64,
    per_destination: bool,
    interval: Duration,
}

impl RateController {
    /// Create new rate controller for target events per second
    pub fn new(events_per_second: f64, per_destination: bool) -> Self {
        let interval = Duration::from_secs_f64(1.0 / events_per_second.max(MIN_RATE));
        Self {
            rate: events_per_second,
            per_destination,
            interval,
        }
    }

    /// Get configured interval between ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Human-readable rate for startup logging.
    pub fn describe(&self, destinations: usize) -> String {
        if self.per_destination && destinations > 1 {
            format!("{} events/sec per team", self.rate)
        } else {
            format!("{} events/sec", self.rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_inverse_of_rate() {
        for rate in [0.5, 1.0, 5.0, 10.0, 250.0, 1000.0] {
            let rc = RateController::new(rate, false);
            assert!((rc.interval().as_secs_f64() - 1.0 / rate).abs() < 1e-9);
        }
    }

    #[test]
    fn per_destination_mode_does_not_change_pacing() {
        let global = RateController::new(5.0, false);
        let per_team = RateController::new(5.0, true);
        assert_eq!(global.interval(), per_team.interval());
        assert_eq!(per_team.describe(3), "5 events/sec per team");
        assert_eq!(per_team.describe(1), "5 events/sec");
        assert_eq!(global.describe(3), "5 events/sec");
    }

    #[test]
    fn zero_and_negative_rates_clamp() {
        assert_eq!(RateController::new(0.0, false).interval(), Duration::from_secs(1000));
        assert_eq!(RateController::new(-3.0, false).interval(), Duration::from_secs(1000));
    }
}
