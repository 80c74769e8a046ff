//! Timing primitives for SeqFuse
//!
//! Microseconds are the canonical precision throughout the crate; anything
//! finer is rounded to the nearest microsecond on entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Absolute point in time, microseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch itself.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Construct from microseconds since the epoch.
    pub const fn from_epoch_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    /// Construct from milliseconds since the epoch.
    pub const fn from_epoch_millis(millis: i64) -> Self {
        Timestamp(millis * 1_000)
    }

    /// Construct from fractional milliseconds, rounding to the nearest microsecond.
    pub fn from_epoch_millis_f64(millis: f64) -> Self {
        Timestamp((millis * 1_000.0).round() as i64)
    }

    /// Microseconds since the epoch.
    pub const fn as_epoch_micros(&self) -> i64 {
        self.0
    }

    /// Milliseconds since the epoch (fractional).
    pub fn as_epoch_millis_f64(&self) -> f64 {
        self.0 as f64 / 1_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_epoch_millis_f64())
    }
}

/// Signed difference of two [`Timestamp`]s, microsecond precision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Duration(i64);

impl Duration {
    /// The zero duration.
    pub const ZERO: Duration = Duration(0);

    /// Construct from microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        Duration(micros)
    }

    /// Construct from milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Duration(millis * 1_000)
    }

    /// Construct from seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Duration(secs * 1_000_000)
    }

    /// Construct from fractional milliseconds, rounding to the nearest microsecond.
    pub fn from_millis_f64(millis: f64) -> Self {
        Duration((millis * 1_000.0).round() as i64)
    }

    /// Microseconds.
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Milliseconds (fractional).
    pub fn as_millis_f64(&self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Seconds (fractional).
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// True for durations strictly below zero.
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Scale by an integer factor, saturating at the representable range.
    pub const fn saturating_mul(&self, factor: i64) -> Self {
        Duration(self.0.saturating_mul(factor))
    }

    /// Scale by a float factor, rounding to the nearest microsecond.
    pub fn mul_f64(&self, factor: f64) -> Self {
        Duration((self.0 as f64 * factor).round() as i64)
    }

    /// Clamp negative durations to zero.
    pub fn clamp_min_zero(&self) -> Self {
        if self.0 < 0 {
            Duration::ZERO
        } else {
            *self
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_millis_f64())
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        self.0 -= rhs.0;
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_arithmetic() {
        let t = Timestamp::from_epoch_millis(100);
        assert_eq!(t + Duration::from_millis(50), Timestamp::from_epoch_millis(150));
        assert_eq!(t - Duration::from_millis(50), Timestamp::from_epoch_millis(50));
        assert_eq!(
            Timestamp::from_epoch_millis(150) - t,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn negative_differences() {
        let early = Timestamp::from_epoch_millis(10);
        let late = Timestamp::from_epoch_millis(20);
        let d = early - late;
        assert!(d.is_negative());
        assert_eq!(d.clamp_min_zero(), Duration::ZERO);
        assert_eq!(-d, Duration::from_millis(10));
    }

    #[test]
    fn sub_microsecond_inputs_round() {
        assert_eq!(Duration::from_millis_f64(0.0004), Duration::ZERO);
        assert_eq!(
            Duration::from_millis_f64(0.0006),
            Duration::from_micros(1)
        );
        assert_eq!(
            Timestamp::from_epoch_millis_f64(123.38),
            Timestamp::from_epoch_micros(123_380)
        );
    }

    #[test]
    fn display_in_milliseconds() {
        assert_eq!(Duration::from_micros(97_500).to_string(), "97.5ms");
        assert_eq!(Timestamp::from_epoch_millis(100).to_string(), "100ms");
    }

    #[test]
    fn ordering() {
        assert!(Timestamp::from_epoch_millis(1) < Timestamp::from_epoch_millis(2));
        assert!(Duration::from_micros(-1) < Duration::ZERO);
        assert_eq!(
            Duration::from_millis(5).max(Duration::from_millis(3)),
            Duration::from_millis(5)
        );
    }
}
