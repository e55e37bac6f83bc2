use chrono::{DateTime, Utc};
use smart_parking_core::environment::Clock;

/// 2025-01-01T00:00:00Z
const TEST_EPOCH_SECS: i64 = 1_735_689_600;

/// A clock pinned to one instant, so `accepted_at` and `last_updated`
/// stamps can be compared exactly.
///
/// ```
/// use smart_parking_core::environment::Clock;
/// use smart_parking_testing::FixedClock;
///
/// let clock = FixedClock::new(chrono::Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// Pin the clock at `at`.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Clock stuck at midnight UTC on 2025-01-01.
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(DateTime::from_timestamp(TEST_EPOCH_SECS, 0).unwrap_or_default())
}
