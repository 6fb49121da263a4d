//! Nullable high-resolution duration value.
//!
//! [`Extent`] is the single duration type the crate speaks. It keeps all
//! timing math on signed integer nanosecond ticks and converts to floating
//! seconds only for derived statistics, mixed-operand arithmetic, and
//! display. A distinguished NaN absorbs through arithmetic and makes every
//! comparison answer "not comparable", so an undefined measurement can flow
//! through the drift-correction math without poisoning control flow.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};
use std::time::{Duration, Instant};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;
const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Tick value reserved for the NaN sentinel.
const NAN_TICKS: i64 = i64::MIN;
const MIN_TICKS: i64 = i64::MIN + 1;
const MAX_TICKS: i64 = i64::MAX;

/// A duration with three possible states: a finite signed tick count
/// (nanoseconds), saturated minimum/maximum, or NaN.
///
/// Arithmetic is closed under `Extent` and accepts plain `f64` operands
/// interpreted as seconds. Any operation with NaN yields NaN; any comparison
/// with NaN is false. Overflow saturates to [`Extent::MIN`] / [`Extent::MAX`].
///
/// `Extent` is immutable and `Copy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extent {
    ticks: i64,
}

impl Extent {
    /// Zero-length extent.
    pub const ZERO: Extent = Extent { ticks: 0 };

    /// Exactly one second.
    pub const ONE: Extent = Extent {
        ticks: 1_000_000_000,
    };

    /// The not-a-duration sentinel.
    pub const NAN: Extent = Extent { ticks: NAN_TICKS };

    /// Most negative representable extent.
    pub const MIN: Extent = Extent { ticks: MIN_TICKS };

    /// Most positive representable extent.
    pub const MAX: Extent = Extent { ticks: MAX_TICKS };

    /// Creates an extent from a tick (nanosecond) count.
    ///
    /// The tick value reserved for the NaN sentinel maps to [`Extent::NAN`].
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self { ticks }
    }

    /// Creates an extent from seconds. Non-finite input yields NaN.
    pub fn from_seconds(seconds: f64) -> Self {
        if !seconds.is_finite() {
            return Self::NAN;
        }
        Self::from_f64_ticks(seconds * NANOS_PER_SEC)
    }

    /// Creates an extent from milliseconds. Non-finite input yields NaN.
    pub fn from_millis(millis: f64) -> Self {
        if !millis.is_finite() {
            return Self::NAN;
        }
        Self::from_f64_ticks(millis * NANOS_PER_MILLI)
    }

    /// Creates the period of a frequency given in cycles per second.
    ///
    /// A zero or non-finite frequency has no period and yields NaN.
    pub fn from_hertz(cycles_per_second: f64) -> Self {
        if !cycles_per_second.is_finite() || cycles_per_second == 0.0 {
            return Self::NAN;
        }
        Self::from_seconds(cycles_per_second.recip())
    }

    /// Creates an extent covering the time elapsed since `since`.
    pub fn from_elapsed(since: Instant) -> Self {
        crate::clock::elapsed(since)
    }

    /// Raw tick (nanosecond) count. The NaN sentinel is observable here.
    #[inline]
    pub const fn ticks(self) -> i64 {
        self.ticks
    }

    /// Value in seconds; NaN for the NaN extent.
    #[inline]
    pub fn as_seconds(self) -> f64 {
        if self.is_nan() {
            f64::NAN
        } else {
            self.ticks as f64 / NANOS_PER_SEC
        }
    }

    /// Value in milliseconds; NaN for the NaN extent.
    #[inline]
    pub fn as_millis(self) -> f64 {
        if self.is_nan() {
            f64::NAN
        } else {
            self.ticks as f64 / NANOS_PER_MILLI
        }
    }

    /// Whether this is the NaN extent.
    #[inline]
    pub const fn is_nan(self) -> bool {
        self.ticks == NAN_TICKS
    }

    /// Whether this extent is exactly zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.ticks == 0
    }

    /// Whether this extent is strictly negative (false for NaN).
    #[inline]
    pub const fn is_negative(self) -> bool {
        !self.is_nan() && self.ticks < 0
    }

    /// Whether this extent is strictly positive (false for NaN).
    #[inline]
    pub const fn is_positive(self) -> bool {
        !self.is_nan() && self.ticks > 0
    }

    /// Converts to the platform duration type.
    ///
    /// `Duration` is unsigned, so NaN and negative extents have no image and
    /// map to `None`.
    pub fn to_duration(self) -> Option<Duration> {
        if self.is_nan() || self.ticks < 0 {
            return None;
        }
        Some(Duration::from_nanos(self.ticks as u64))
    }

    /// Re-wraps a floating tick count, saturating out-of-range values.
    fn from_f64_ticks(ticks: f64) -> Self {
        if ticks.is_nan() {
            Self::NAN
        } else if ticks <= MIN_TICKS as f64 {
            Self::MIN
        } else if ticks >= MAX_TICKS as f64 {
            Self::MAX
        } else {
            Self { ticks: ticks as i64 }
        }
    }

    /// Keeps saturating integer results out of the NaN sentinel.
    #[inline]
    fn from_saturated(ticks: i64) -> Self {
        Self {
            ticks: ticks.max(MIN_TICKS),
        }
    }
}

impl Add for Extent {
    type Output = Extent;

    fn add(self, rhs: Extent) -> Extent {
        if self.is_nan() || rhs.is_nan() {
            return Extent::NAN;
        }
        Extent::from_saturated(self.ticks.saturating_add(rhs.ticks))
    }
}

impl Sub for Extent {
    type Output = Extent;

    fn sub(self, rhs: Extent) -> Extent {
        if self.is_nan() || rhs.is_nan() {
            return Extent::NAN;
        }
        Extent::from_saturated(self.ticks.saturating_sub(rhs.ticks))
    }
}

impl Rem for Extent {
    type Output = Extent;

    /// Tick remainder; the authoritative `mod` of the drift-correction math.
    ///
    /// The result carries the sign of the dividend and its magnitude is
    /// strictly below the divisor's. A zero divisor yields NaN.
    fn rem(self, rhs: Extent) -> Extent {
        if self.is_nan() || rhs.is_nan() || rhs.ticks == 0 {
            return Extent::NAN;
        }
        Extent::from_saturated(self.ticks % rhs.ticks)
    }
}

impl Neg for Extent {
    type Output = Extent;

    fn neg(self) -> Extent {
        if self.is_nan() {
            return Extent::NAN;
        }
        Extent { ticks: -self.ticks }
    }
}

impl Add<f64> for Extent {
    type Output = Extent;

    /// Adds plain seconds.
    fn add(self, seconds: f64) -> Extent {
        self + Extent::from_seconds(seconds)
    }
}

impl Sub<f64> for Extent {
    type Output = Extent;

    /// Subtracts plain seconds.
    fn sub(self, seconds: f64) -> Extent {
        self - Extent::from_seconds(seconds)
    }
}

impl Rem<f64> for Extent {
    type Output = Extent;

    fn rem(self, seconds: f64) -> Extent {
        self % Extent::from_seconds(seconds)
    }
}

impl Mul<f64> for Extent {
    type Output = Extent;

    fn mul(self, factor: f64) -> Extent {
        if self.is_nan() {
            return Extent::NAN;
        }
        Extent::from_f64_ticks(self.ticks as f64 * factor)
    }
}

impl Div<f64> for Extent {
    type Output = Extent;

    fn div(self, divisor: f64) -> Extent {
        if self.is_nan() || divisor == 0.0 {
            return Extent::NAN;
        }
        Extent::from_f64_ticks(self.ticks as f64 / divisor)
    }
}

impl Add<Extent> for f64 {
    type Output = Extent;

    fn add(self, rhs: Extent) -> Extent {
        Extent::from_seconds(self) + rhs
    }
}

impl Sub<Extent> for f64 {
    type Output = Extent;

    fn sub(self, rhs: Extent) -> Extent {
        Extent::from_seconds(self) - rhs
    }
}

impl Mul<Extent> for f64 {
    type Output = Extent;

    fn mul(self, rhs: Extent) -> Extent {
        rhs * self
    }
}

impl PartialEq for Extent {
    fn eq(&self, other: &Extent) -> bool {
        !self.is_nan() && !other.is_nan() && self.ticks == other.ticks
    }
}

impl PartialOrd for Extent {
    fn partial_cmp(&self, other: &Extent) -> Option<Ordering> {
        if self.is_nan() || other.is_nan() {
            return None;
        }
        Some(self.ticks.cmp(&other.ticks))
    }
}

impl fmt::Display for Extent {
    /// Seconds with four decimal places; `NaN` for the NaN extent.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            f.write_str("NaN")
        } else {
            write!(f, "{:.4}", self.as_seconds())
        }
    }
}

impl From<Duration> for Extent {
    fn from(duration: Duration) -> Extent {
        let nanos = duration.as_nanos().min(MAX_TICKS as u128);
        Extent { ticks: nanos as i64 }
    }
}
