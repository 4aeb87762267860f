//! Duration helpers shared by the synchronizer and the scheduler.

use std::time::Duration;

/// Extension trait for saturating Duration conversions and comparisons.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;

    /// Absolute difference between two durations.
    fn distance(&self, other: Duration) -> Duration;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }

    fn distance(&self, other: Duration) -> Duration {
        if *self > other {
            *self - other
        } else {
            other - *self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_millis_u64() {
        let duration = Duration::from_millis(1234);
        assert_eq!(duration.as_millis_u64(), 1234);
    }

    #[test]
    fn test_as_millis_u64_zero() {
        assert_eq!(Duration::ZERO.as_millis_u64(), 0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Duration::from_millis(2500);
        let b = Duration::from_millis(1000);
        assert_eq!(a.distance(b), Duration::from_millis(1500));
        assert_eq!(b.distance(a), Duration::from_millis(1500));
        assert_eq!(a.distance(a), Duration::ZERO);
    }
}
