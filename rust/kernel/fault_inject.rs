// SPDX-License-Identifier: GPL-2.0

//! Fault injection for fallible allocations.
//!
//! Reference: <https://www.kernel.org/doc/html/latest/fault-injection/fault-injection.html>
//!
//! This is the hosted counterpart of `/proc/thread-self/fail-nth`: writing
//! `n` there makes the n-th following fault-injectable call of the writing
//! task fail. The state is per thread, so tests running in parallel do not
//! see each other's faults.

use core::cell::Cell;
use core::marker::PhantomData;

thread_local! {
    static FAIL_NTH: Cell<usize> = const { Cell::new(0) };
}

/// Armed `fail-nth` state of the current thread.
///
/// Dropping it disarms fault injection.
#[must_use = "dropping `FailNth` disarms fault injection"]
pub struct FailNth {
    _not_send: PhantomData<*const ()>,
}

impl FailNth {
    /// Makes the `nth` (1-based) following allocation on this thread fail.
    ///
    /// `0` disarms.
    pub fn arm(nth: usize) -> Self {
        FAIL_NTH.with(|c| c.set(nth));
        FailNth {
            _not_send: PhantomData,
        }
    }

    /// Returns how many allocations remain until the fault fires.
    pub fn remaining(&self) -> usize {
        FAIL_NTH.with(Cell::get)
    }

    /// Returns `true` once the injected fault has fired.
    pub fn fired(&self) -> bool {
        self.remaining() == 0
    }
}

impl Drop for FailNth {
    fn drop(&mut self) {
        FAIL_NTH.with(|c| c.set(0));
    }
}

/// Consumes one step of the countdown; `true` means this allocation fails.
pub(crate) fn should_fail() -> bool {
    FAIL_NTH.with(|c| match c.get() {
        0 => false,
        1 => {
            c.set(0);
            true
        }
        n => {
            c.set(n - 1);
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_to_a_single_failure() {
        let fail = FailNth::arm(3);
        assert!(!should_fail());
        assert_eq!(fail.remaining(), 2);
        assert!(!should_fail());
        assert!(should_fail());
        assert!(fail.fired());
        assert!(!should_fail());
    }

    #[test]
    fn drop_disarms() {
        drop(FailNth::arm(1));
        assert!(!should_fail());
    }

    #[test]
    fn state_is_per_thread() {
        let _fail = FailNth::arm(1);
        let other = std::thread::spawn(should_fail).join().unwrap();
        assert!(!other);
        assert!(should_fail());
    }
}
