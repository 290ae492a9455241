// SPDX-License-Identifier: GPL-2.0

//! Time keeping.
//!
//! C header: [`include/linux/ktime.h`](srctree/include/linux/ktime.h)
//!
//! The hosted monotonic clock starts at the first read in the process, the
//! way `CLOCK_MONOTONIC` starts at boot.

use std::sync::OnceLock;
use std::time::Instant;

/// The number of nanoseconds per microsecond.
pub const NSEC_PER_USEC: i64 = 1_000;
/// The number of nanoseconds per millisecond.
pub const NSEC_PER_MSEC: i64 = 1_000_000;

/// A Rust wrapper around a `ktime_t`.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Ktime {
    inner: i64,
}

impl Ktime {
    /// Create a `Ktime` from a raw nanosecond count.
    #[inline]
    pub const fn from_ns(ns: i64) -> Self {
        Self { inner: ns }
    }

    /// Returns the number of nanoseconds.
    #[inline]
    pub const fn to_ns(self) -> i64 {
        self.inner
    }

    /// Returns the number of microseconds, rounded down.
    #[inline]
    pub const fn to_us(self) -> i64 {
        self.inner / NSEC_PER_USEC
    }

    /// Returns the number of milliseconds, rounded down.
    #[inline]
    pub const fn to_ms(self) -> i64 {
        self.inner / NSEC_PER_MSEC
    }
}

impl core::ops::Sub for Ktime {
    type Output = Ktime;

    #[inline]
    fn sub(self, other: Ktime) -> Ktime {
        Self {
            inner: self.inner.saturating_sub(other.inner),
        }
    }
}

static BOOT: OnceLock<Instant> = OnceLock::new();

/// Get the current time using `CLOCK_MONOTONIC`.
///
/// Successive calls never go backwards, on any thread.
pub fn ktime_get() -> Ktime {
    let boot = BOOT.get_or_init(Instant::now);
    let ns = boot.elapsed().as_nanos();
    Ktime::from_ns(i64::try_from(ns).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_goes_backwards() {
        let mut last = ktime_get();
        for _ in 0..1000 {
            let now = ktime_get();
            assert!(now >= last);
            last = now;
        }
        assert!(last.to_ns() >= 0);
    }

    #[test]
    fn unit_conversions_round_down() {
        let t = Ktime::from_ns(3_999_999);
        assert_eq!(t.to_ns(), 3_999_999);
        assert_eq!(t.to_us(), 3_999);
        assert_eq!(t.to_ms(), 3);
        assert_eq!((t - Ktime::from_ns(999_999)).to_ms(), 3);
    }
}
