use std::ops::{Add, AddAssign, Sub};
use std::time::{SystemTime, UNIX_EPOCH};

/// A wall-clock instant as a 64-bit fixed-point value: the high 32 bits are
/// whole seconds since the Unix epoch, the low 32 bits are the sub-second
/// fraction scaled to 2^32.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time(u64);

impl Time {
    /// Samples the system wall clock.
    ///
    /// Panics if the clock reads before the Unix epoch; the clock source is
    /// assumed always available and a failure here is unrecoverable.
    pub fn now() -> Time {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock reads before the Unix epoch");

        let fraction = (u64::from(elapsed.subsec_nanos()) << 32) / 1_000_000_000;
        Time((elapsed.as_secs() << 32) | fraction)
    }

    pub const fn from_raw(raw: u64) -> Time {
        Time(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn seconds(&self) -> u64 {
        self.0 >> 32
    }

    /// The sub-second fraction scaled to `multiplier` parts per second.
    pub const fn fraction(&self, multiplier: u32) -> u32 {
        (((self.0 & 0xffff_ffff) * multiplier as u64) >> 32) as u32
    }
}

impl Sub for Time {
    type Output = Interval;

    fn sub(self, rhs: Time) -> Interval {
        Interval(self.0.wrapping_sub(rhs.0) as i64)
    }
}

impl Add<Interval> for Time {
    type Output = Time;

    fn add(self, rhs: Interval) -> Time {
        Time(self.0.wrapping_add(rhs.0 as u64))
    }
}

impl AddAssign<Interval> for Time {
    fn add_assign(&mut self, rhs: Interval) {
        self.0 = self.0.wrapping_add(rhs.0 as u64);
    }
}

impl Sub<Interval> for Time {
    type Output = Time;

    fn sub(self, rhs: Interval) -> Time {
        Time(self.0.wrapping_sub(rhs.0 as u64))
    }
}

/// A signed time delta in the same 32.32 fixed-point representation as
/// [`Time`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval(i64);

impl Interval {
    pub const ZERO: Interval = Interval(0);

    pub const fn from_raw(raw: i64) -> Interval {
        Interval(raw)
    }

    pub const fn raw(&self) -> i64 {
        self.0
    }

    pub fn from_millis(millis: i64) -> Interval {
        Interval((((millis as i128) << 32) / 1000) as i64)
    }

    pub fn from_secs(secs: i64) -> Interval {
        Interval(((secs as i128) << 32) as i64)
    }

    /// Strictly greater than zero.
    pub const fn positive(&self) -> bool {
        self.0 > 0
    }

    /// Whole milliseconds, rounded up so a wait of this length never wakes
    /// before the deadline the interval was measured against. Non-positive
    /// intervals yield zero.
    pub fn as_millis_ceil(&self) -> i64 {
        if self.0 <= 0 {
            return 0;
        }
        ((self.0 as i128 * 1000 + ((1i128 << 32) - 1)) >> 32) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ordering_and_arithmetic() {
        let base = Time::from_raw(10);
        let later = base + Interval::from_raw(5);

        assert!(base < later);
        assert_eq!((later - base).raw(), 5);
        assert_eq!((base - later).raw(), -5);
        assert_eq!((later - Interval::from_raw(5)), base);

        let mut cursor = base;
        cursor += Interval::from_raw(7);
        assert_eq!(cursor.raw(), 17);
    }

    #[test]
    fn seconds_and_fraction_split() {
        let half = 1u64 << 31;
        let t = Time::from_raw((3 << 32) | half);

        assert_eq!(t.seconds(), 3);
        assert_eq!(t.fraction(1000), 500);
        assert_eq!(t.fraction(1_000_000), 500_000);
    }

    #[test]
    fn positive_is_strict() {
        assert!(Interval::from_raw(1).positive());
        assert!(!Interval::ZERO.positive());
        assert!(!Interval::from_raw(-1).positive());
    }

    #[test]
    fn millis_round_up_never_undershoots() {
        // One raw tick is far below a millisecond but must still wait 1ms,
        // otherwise a pending timer busy-loops on a zero timeout.
        assert_eq!(Interval::from_raw(1).as_millis_ceil(), 1);
        assert_eq!(Interval::ZERO.as_millis_ceil(), 0);
        assert_eq!(Interval::from_raw(-42).as_millis_ceil(), 0);
        assert_eq!(Interval::from_secs(2).as_millis_ceil(), 2000);
    }

    proptest! {
        #[test]
        fn millis_roundtrip_is_exact(millis in 0i64..1_000_000_000) {
            prop_assert_eq!(Interval::from_millis(millis).as_millis_ceil(), millis);
        }

        #[test]
        fn ceil_covers_the_true_deadline(raw in 1i64..i64::MAX / 2000) {
            let interval = Interval::from_raw(raw);
            let millis = interval.as_millis_ceil();
            // Waiting `millis` must reach or pass the deadline.
            prop_assert!(Interval::from_millis(millis) >= interval);
        }
    }
}
