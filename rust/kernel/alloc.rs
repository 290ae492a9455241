// SPDX-License-Identifier: GPL-2.0

//! Fallible memory allocation.
//!
//! Unlike `std`'s `Box::new`, allocating here never aborts: running out of
//! memory is reported to the caller as an [`AllocError`].

use core::fmt;
use core::ops::{BitOr, Deref, DerefMut};
use core::ptr::NonNull;
use std::alloc::{alloc, alloc_zeroed, handle_alloc_error, Layout};

/// Indicates an allocation failure.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl std::error::Error for AllocError {}

/// Flags to be used when allocating memory.
///
/// They can be combined with the operator `|`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Flags(u32);

impl Flags {
    /// Get the raw representation of this flag.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Check whether `flags` is contained in `self`.
    pub fn contains(self, flags: Flags) -> bool {
        (self & flags) == flags
    }
}

impl BitOr for Flags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitAnd for Flags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

/// Allocation flags.
///
/// These are meant to be used in functions that can allocate memory.
pub mod flags {
    use super::Flags;

    const ___GFP_HIGH: u32 = 1 << 0;
    const ___GFP_IO: u32 = 1 << 1;
    const ___GFP_FS: u32 = 1 << 2;
    const ___GFP_DIRECT_RECLAIM: u32 = 1 << 3;
    const ___GFP_KSWAPD_RECLAIM: u32 = 1 << 4;

    /// Zeroes out the allocated memory before the value is written.
    pub const __GFP_ZERO: Flags = Flags(1 << 8);

    /// The allocation must not fail. Callers never see an error; the
    /// allocator aborts instead, and fault injection skips it.
    pub const __GFP_NOFAIL: Flags = Flags(1 << 15);

    /// Users can not sleep and need the allocation to succeed.
    pub const GFP_ATOMIC: Flags = Flags(___GFP_HIGH | ___GFP_KSWAPD_RECLAIM);

    /// Typical for kernel-internal allocations. The caller requires `ZONE_NORMAL` or a lower zone
    /// for direct access but can direct reclaim.
    pub const GFP_KERNEL: Flags =
        Flags(___GFP_DIRECT_RECLAIM | ___GFP_KSWAPD_RECLAIM | ___GFP_IO | ___GFP_FS);

    /// For kernel allocations that should not stall for direct reclaim, start physical IO or
    /// use any filesystem callback.
    pub const GFP_NOWAIT: Flags = Flags(___GFP_KSWAPD_RECLAIM);
}

#[cfg(any(test, feature = "testlib"))]
fn should_fail(flags: Flags) -> bool {
    !flags.contains(flags::__GFP_NOFAIL) && crate::fault_inject::should_fail()
}

#[cfg(not(any(test, feature = "testlib")))]
fn should_fail(_flags: Flags) -> bool {
    false
}

/// A pointer type for heap allocations whose allocation can fail.
///
/// Dropping a `KBox` drops the value and frees its memory; freeing cannot
/// fail.
pub struct KBox<T>(Box<T>);

impl<T> KBox<T> {
    /// Allocates memory with `flags` and moves `value` into it.
    pub fn new(value: T, flags: Flags) -> Result<Self, AllocError> {
        let layout = Layout::new::<T>();
        if layout.size() == 0 {
            return Ok(Self(Box::new(value)));
        }

        if should_fail(flags) {
            return Err(AllocError);
        }

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe {
            if flags.contains(flags::__GFP_ZERO) {
                alloc_zeroed(layout)
            } else {
                alloc(layout)
            }
        };

        let ptr = match NonNull::new(ptr.cast::<T>()) {
            Some(ptr) => ptr,
            None if flags.contains(flags::__GFP_NOFAIL) => handle_alloc_error(layout),
            None => return Err(AllocError),
        };

        // SAFETY: `ptr` is non-null, properly aligned and valid for writes of a `T`. It was
        // allocated by the global allocator with `Layout::new::<T>()`, which is the layout `Box`
        // uses to free it.
        unsafe {
            ptr.as_ptr().write(value);
            Ok(Self(Box::from_raw(ptr.as_ptr())))
        }
    }

    /// Consumes the `KBox`, returning a raw pointer to its value.
    ///
    /// The memory stays allocated until the pointer is given back to
    /// [`KBox::from_raw`].
    pub fn into_raw(this: Self) -> *mut T {
        Box::into_raw(this.0)
    }

    /// Reconstructs a `KBox` from a pointer returned by [`KBox::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`KBox::into_raw`] and must not have been passed to this function
    /// before.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        // SAFETY: By the safety requirements, `ptr` owns a live allocation made by `KBox::new`.
        Self(unsafe { Box::from_raw(ptr) })
    }

    /// Moves the value out and frees the allocation.
    pub fn into_inner(this: Self) -> T {
        *this.0
    }
}

impl<T> Deref for KBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for KBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for KBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
