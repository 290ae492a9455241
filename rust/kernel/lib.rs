// SPDX-License-Identifier: GPL-2.0

//! The `kernel` crate.
//!
//! This crate contains the kernel APIs that have been ported or wrapped for
//! usage by Rust code in the kernel and is shared by all of them.
//!
//! This is the hosted build of those APIs: it runs on `std`, prints through
//! the [`log`] crate and loads modules with [`module::load_module`], so a
//! module's logic can be exercised with plain `cargo test`.
//!
//! In order to use functions from other crates, a module should import
//! [`prelude`] and declare itself with [`module!`](macros::module).

pub mod alloc;
pub mod c_types;
pub mod error;
#[cfg(any(test, feature = "testlib"))]
pub mod fault_inject;
pub mod ktime;
pub mod list;
pub mod module;
pub mod module_param;
pub mod prelude;
pub mod print;

#[doc(hidden)]
pub use macros;

pub use crate::error::{Error, Result};
pub use crate::module::{KParamGuard, ThisModule};

/// Prefix of the messages printed by this crate itself.
const __LOG_PREFIX: &str = "kernel";

/// The top level entrypoint to implementing a kernel module.
///
/// For any teardown or cleanup operations, your type may implement [`Drop`].
pub trait Module: Sized + Send {
    /// Called at module initialization time.
    ///
    /// Use this method to perform whatever setup or registration your module
    /// should do.
    ///
    /// Equivalent to the `module_init` macro in the C API.
    fn init(module: &'static ThisModule) -> Result<Self>;
}
