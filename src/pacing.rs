//! Send cadence: per-run quota and randomized gaps between sends.

use rand::Rng;
use std::time::Duration;

use crate::config::SendingConfig;

#[derive(Debug, Clone)]
pub struct Pacing {
    daily_limit: usize,
    min_delay: Duration,
    max_delay: Duration,
}

impl Pacing {
    pub fn new(daily_limit: usize, min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self {
            daily_limit: daily_limit.max(1),
            min_delay,
            max_delay,
        }
    }

    pub fn from_config(sending: &SendingConfig) -> Self {
        Self::new(sending.daily_limit, sending.min_delay(), sending.max_delay())
    }

    pub fn daily_limit(&self) -> usize {
        self.daily_limit
    }

    /// Uniform whole-second delay within `[min_delay, max_delay]`.
    pub fn next_delay(&self) -> Duration {
        let secs = rand::thread_rng().gen_range(self.min_delay.as_secs()..=self.max_delay.as_secs());
        Duration::from_secs(secs)
    }

    /// Hard stop once `sent_count` successful sends happened this run.
    pub fn quota_reached(&self, sent_count: usize) -> bool {
        sent_count >= self.daily_limit
    }
}

/// "3 min 07s" style rendering for progress output
pub fn format_delay(delay: Duration) -> String {
    let secs = delay.as_secs();
    format!("{} min {:02}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_pacing() -> Pacing {
        Pacing::new(10, Duration::from_secs(120), Duration::from_secs(480))
    }

    #[test]
    fn test_next_delay_within_bounds() {
        let pacing = default_pacing();
        for _ in 0..1_000 {
            let delay = pacing.next_delay();
            assert!(delay >= Duration::from_secs(120), "too short: {:?}", delay);
            assert!(delay <= Duration::from_secs(480), "too long: {:?}", delay);
        }
    }

    #[test]
    fn test_degenerate_range_is_fixed() {
        let pacing = Pacing::new(10, Duration::from_secs(5), Duration::from_secs(5));
        assert_eq!(pacing.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_inverted_bounds_are_swapped() {
        let pacing = Pacing::new(10, Duration::from_secs(9), Duration::from_secs(3));
        let delay = pacing.next_delay();
        assert!(delay >= Duration::from_secs(3) && delay <= Duration::from_secs(9));
    }

    #[test]
    fn test_quota_reached() {
        let pacing = default_pacing();
        assert!(!pacing.quota_reached(0));
        assert!(!pacing.quota_reached(9));
        assert!(pacing.quota_reached(10));
        assert!(pacing.quota_reached(11));
    }

    #[test]
    fn test_zero_limit_clamped() {
        let pacing = Pacing::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(pacing.daily_limit(), 1);
        assert!(pacing.quota_reached(1));
    }

    #[test]
    fn test_format_delay() {
        assert_eq!(format_delay(Duration::from_secs(187)), "3 min 07s");
        assert_eq!(format_delay(Duration::from_secs(120)), "2 min 00s");
    }
}
