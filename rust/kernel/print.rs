// SPDX-License-Identifier: GPL-2.0

//! Printing facilities.
//!
//! C header: [`include/linux/printk.h`](../../../../include/linux/printk.h)
//!
//! Reference: <https://www.kernel.org/doc/html/latest/core-api/printk-basics.html>
//!
//! Messages are handed to the [`log`] crate with the module name as the
//! target, so whichever `log` backend the host installs plays the part of the
//! kernel log buffer.

use std::fmt;

/// Log level of the kernel's [`printk`].
///
/// [`printk`]: ../../../../include/linux/printk.h
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(&'static [u8]);

impl LogLevel {
    /// Correspond to kernel's `KERN_EMERG` log level.
    pub const EMERG: Self = Self(b"\x010\0");

    /// Correspond to kernel's `KERN_ALERT` log level.
    pub const ALERT: Self = Self(b"\x011\0");

    /// Correspond to kernel's `KERN_CRIT` log level.
    pub const CRIT: Self = Self(b"\x012\0");

    /// Correspond to kernel's `KERN_ERR` log level.
    pub const ERR: Self = Self(b"\x013\0");

    /// Correspond to kernel's `KERN_WARNING` log level.
    pub const WARNING: Self = Self(b"\x014\0");

    /// Correspond to kernel's `KERN_NOTICE` log level.
    pub const NOTICE: Self = Self(b"\x015\0");

    /// Correspond to kernel's `KERN_INFO` log level.
    pub const INFO: Self = Self(b"\x016\0");

    /// Correspond to kernel's `KERN_DEBUG` log level.
    pub const DEBUG: Self = Self(b"\x017\0");

    /// Correspond to kernel's `KERN_CONT` log level.
    pub const CONT: Self = Self(b"\x01c\0");

    /// Returns the `KERN_*` prefix, including the trailing `NUL`.
    pub fn as_bytes(&self) -> &'static [u8] {
        self.0
    }

    fn name(self) -> &'static str {
        match self.0[1] {
            b'0' => "EMERG",
            b'1' => "ALERT",
            b'2' => "CRIT",
            b'3' => "ERR",
            b'4' => "WARNING",
            b'5' => "NOTICE",
            b'6' => "INFO",
            b'7' => "DEBUG",
            _ => "CONT",
        }
    }

    fn to_log_level(self) -> log::Level {
        match self.0[1] {
            b'0'..=b'3' => log::Level::Error,
            b'4' => log::Level::Warn,
            b'7' => log::Level::Debug,
            _ => log::Level::Info,
        }
    }
}

impl fmt::Debug for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Prints an [`Arguments`] via the kernel's [`printk`] with prefix.
///
/// [`printk`]: ../../../../include/linux/printk.h
/// [`Arguments`]: fmt::Arguments
#[doc(hidden)]
pub fn call_printk(lvl: LogLevel, prefix: &str, args: fmt::Arguments<'_>) {
    let message = fmt::format(args);
    let message = message.strip_suffix('\n').unwrap_or(&message);

    #[cfg(any(test, feature = "testlib"))]
    capture::record(lvl, prefix, message);

    log::log!(target: prefix, lvl.to_log_level(), "{}", message);
}

/// Prints an [`Arguments`] via the kernel's [`printk`] without prefix.
///
/// [`printk`]: ../../../../include/linux/printk.h
/// [`Arguments`]: fmt::Arguments
#[doc(hidden)]
pub fn call_printk_cont(lvl: LogLevel, args: fmt::Arguments<'_>) {
    let message = fmt::format(args);
    let message = message.strip_suffix('\n').unwrap_or(&message);

    #[cfg(any(test, feature = "testlib"))]
    capture::append(message);

    log::log!(lvl.to_log_level(), "{}", message);
}

#[cfg(any(test, feature = "testlib"))]
pub use capture::{capture, Record};

#[cfg(any(test, feature = "testlib"))]
mod capture {
    use super::LogLevel;
    use std::cell::RefCell;

    /// A message printed while a [`capture`] was active.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Record {
        /// Level the message was printed at.
        pub level: LogLevel,
        /// Name of the module that printed it.
        pub prefix: String,
        /// Message text, without the trailing newline.
        pub message: String,
    }

    thread_local! {
        static CAPTURED: RefCell<Option<Vec<Record>>> = const { RefCell::new(None) };
    }

    /// Runs `f` and returns what it printed on the current thread.
    ///
    /// Messages printed inside a nested `capture` are only returned by the
    /// innermost one.
    pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Record>) {
        struct Restore(Option<Vec<Record>>);

        impl Drop for Restore {
            fn drop(&mut self) {
                let outer = self.0.take();
                CAPTURED.with(|c| *c.borrow_mut() = outer);
            }
        }

        let restore = Restore(CAPTURED.with(|c| c.borrow_mut().replace(Vec::new())));
        let result = f();
        let records = CAPTURED
            .with(|c| c.borrow_mut().take())
            .unwrap_or_default();
        drop(restore);
        (result, records)
    }

    pub(super) fn record(level: LogLevel, prefix: &str, message: &str) {
        CAPTURED.with(|c| {
            if let Some(records) = c.borrow_mut().as_mut() {
                records.push(Record {
                    level,
                    prefix: prefix.to_owned(),
                    message: message.to_owned(),
                });
            }
        });
    }

    pub(super) fn append(message: &str) {
        CAPTURED.with(|c| {
            if let Some(last) = c.borrow_mut().as_mut().and_then(|r| r.last_mut()) {
                last.message.push_str(message);
            }
        });
    }
}

/// Prints a message with the specified log level.
///
/// Equivalent to the kernel's [`printk`].
///
/// Use the [`format!`] syntax. See [`std::fmt`] for more information.
///
/// [`printk`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.printk
///
/// # Examples
///
/// ```
/// # use kernel::print::*;
/// # use kernel::printk;
/// # const __LOG_PREFIX: &str = "doc";
/// # fn main() {
/// printk!(LogLevel::NOTICE, "hello {}\n", "there");
/// # }
/// ```
#[macro_export]
macro_rules! printk (
    (target: $target:expr, $lvl:expr, $($arg:tt)+) => {{
        $crate::print::call_printk(
            $lvl,
            $target,
            format_args!($($arg)*)
        )
    }};
    ($lvl:expr, $($arg:tt)+) => {{
        $crate::printk!(target: crate::__LOG_PREFIX, $lvl, $($arg)*)
    }}
);

// We could use a macro to generate these macros. However, doing so ends
// up being a bit ugly: it requires the dollar token trick to escape `$` as
// well as playing with the `doc` attribute. Furthermore, they cannot be easily
// imported in the prelude due to [1]. So, for the moment, we just write them
// manually, like in the C side; while keeping most of the logic in another
// macro, i.e. [`printk`].
//
// [1]: https://github.com/rust-lang/rust/issues/52234

/// Prints an emergency-level message (level 0).
///
/// Use this level if the system is unusable.
///
/// Equivalent to the kernel's [`pr_emerg`] macro.
///
/// [`pr_emerg`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_emerg
#[macro_export]
macro_rules! pr_emerg (
    (target: $target:expr, $($arg:tt)+) => (
        $crate::printk!(target: $target, $crate::print::LogLevel::EMERG, $($arg)+)
    );
    ($($arg:tt)+) => (
        $crate::printk!($crate::print::LogLevel::EMERG, $($arg)+)
    )
);

/// Prints an alert-level message (level 1).
///
/// Use this level if action must be taken immediately.
///
/// Equivalent to the kernel's [`pr_alert`] macro.
///
/// [`pr_alert`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_alert
#[macro_export]
macro_rules! pr_alert (
    (target: $target:expr, $($arg:tt)+) => (
        $crate::printk!(target: $target, $crate::print::LogLevel::ALERT, $($arg)+)
    );
    ($($arg:tt)+) => (
        $crate::printk!($crate::print::LogLevel::ALERT, $($arg)+)
    )
);

/// Prints a critical-level message (level 2).
///
/// Use this level for critical conditions.
///
/// Equivalent to the kernel's [`pr_crit`] macro.
///
/// [`pr_crit`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_crit
#[macro_export]
macro_rules! pr_crit (
    (target: $target:expr, $($arg:tt)+) => (
        $crate::printk!(target: $target, $crate::print::LogLevel::CRIT, $($arg)+)
    );
    ($($arg:tt)+) => (
        $crate::printk!($crate::print::LogLevel::CRIT, $($arg)+)
    )
);

/// Prints an error-level message (level 3).
///
/// Use this level for error conditions.
///
/// Equivalent to the kernel's [`pr_err`] macro.
///
/// Use the [`format!`] syntax. See [`std::fmt`] for more information.
///
/// [`pr_err`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_err
///
/// # Examples
///
/// ```
/// # use kernel::prelude::*;
/// # const __LOG_PREFIX: &str = "doc";
/// # fn main() {
/// pr_err!("hello {}\n", "there");
/// # }
/// ```
#[macro_export]
macro_rules! pr_err (
    (target: $target:expr, $($arg:tt)+) => (
        $crate::printk!(target: $target, $crate::print::LogLevel::ERR, $($arg)+)
    );
    ($($arg:tt)+) => (
        $crate::printk!($crate::print::LogLevel::ERR, $($arg)+)
    )
);

/// Prints a warning-level message (level 4).
///
/// Use this level for warning conditions.
///
/// Equivalent to the kernel's [`pr_warn`] macro.
///
/// [`pr_warn`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_warn
#[macro_export]
macro_rules! pr_warn (
    (target: $target:expr, $($arg:tt)+) => (
        $crate::printk!(target: $target, $crate::print::LogLevel::WARNING, $($arg)+)
    );
    ($($arg:tt)+) => (
        $crate::printk!($crate::print::LogLevel::WARNING, $($arg)+)
    )
);

/// Prints a notice-level message (level 5).
///
/// Use this level for normal but significant conditions.
///
/// Equivalent to the kernel's [`pr_notice`] macro.
///
/// [`pr_notice`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_notice
#[macro_export]
macro_rules! pr_notice (
    (target: $target:expr, $($arg:tt)+) => (
        $crate::printk!(target: $target, $crate::print::LogLevel::NOTICE, $($arg)+)
    );
    ($($arg:tt)+) => (
        $crate::printk!($crate::print::LogLevel::NOTICE, $($arg)+)
    )
);

/// Prints an info-level message (level 6).
///
/// Use this level for informational messages.
///
/// Equivalent to the kernel's [`pr_info`] macro.
///
/// Use the [`format!`] syntax. See [`std::fmt`] for more information.
///
/// [`pr_info`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_info
///
/// # Examples
///
/// ```
/// # use kernel::prelude::*;
/// # const __LOG_PREFIX: &str = "doc";
/// # fn main() {
/// pr_info!("hello {}\n", "there");
/// # }
/// ```
#[macro_export]
#[doc(alias = "print")]
macro_rules! pr_info (
    (target: $target:expr, $($arg:tt)+) => (
        $crate::printk!(target: $target, $crate::print::LogLevel::INFO, $($arg)+)
    );
    ($($arg:tt)+) => (
        $crate::printk!($crate::print::LogLevel::INFO, $($arg)+)
    )
);

/// Prints a debug-level message (level 7).
///
/// Use this level for debug messages.
///
/// Equivalent to the kernel's [`pr_debug`] macro, except that it doesn't support dynamic debug
/// yet. Compiled out unless `debug_assertions` are enabled.
///
/// [`pr_debug`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_debug
#[macro_export]
#[doc(alias = "print")]
macro_rules! pr_debug (
    (target: $target:expr, $($arg:tt)+) => (
        if cfg!(debug_assertions) {
            $crate::printk!(target: $target, $crate::print::LogLevel::DEBUG, $($arg)+)
        }
    );
    ($($arg:tt)+) => (
        if cfg!(debug_assertions) {
            $crate::printk!($crate::print::LogLevel::DEBUG, $($arg)+)
        }
    )
);

/// Continues a previous log message in the same line.
///
/// Use only when continuing a previous `pr_*!` macro (e.g. [`pr_info!`]).
///
/// Equivalent to the kernel's [`pr_cont`] macro.
///
/// [`pr_cont`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_cont
#[macro_export]
macro_rules! pr_cont (
    ($($arg:tt)*) => {{
        $crate::print::call_printk_cont($crate::print::LogLevel::CONT, format_args!($($arg)*))
    }}
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_level_prefix_and_strips_newline() {
        let ((), records) = capture(|| {
            crate::pr_info!("hello {}\n", "there");
            crate::pr_warn!(target: "other", "careful\n");
        });

        assert_eq!(
            records,
            [
                Record {
                    level: LogLevel::INFO,
                    prefix: "kernel".into(),
                    message: "hello there".into(),
                },
                Record {
                    level: LogLevel::WARNING,
                    prefix: "other".into(),
                    message: "careful".into(),
                },
            ]
        );
    }

    #[test]
    fn cont_extends_previous_record() {
        let ((), records) = capture(|| {
            crate::pr_info!("hello");
            crate::pr_cont!(" {}\n", "there");
        });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "hello there");
    }

    #[test]
    fn nested_capture_keeps_records_apart() {
        let (inner, outer) = capture(|| {
            crate::pr_err!("outer\n");
            let ((), inner) = capture(|| crate::pr_err!("inner\n"));
            crate::pr_err!("outer again\n");
            inner
        });

        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].message, "inner");
        let outer: Vec<_> = outer.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(outer, ["outer", "outer again"]);
    }

    #[test]
    fn nothing_is_recorded_outside_capture() {
        crate::pr_info!("not captured\n");
        let ((), records) = capture(|| {});
        assert!(records.is_empty());
    }

    #[test]
    fn levels_map_onto_log_levels() {
        assert_eq!(LogLevel::EMERG.to_log_level(), log::Level::Error);
        assert_eq!(LogLevel::ERR.to_log_level(), log::Level::Error);
        assert_eq!(LogLevel::WARNING.to_log_level(), log::Level::Warn);
        assert_eq!(LogLevel::NOTICE.to_log_level(), log::Level::Info);
        assert_eq!(LogLevel::INFO.to_log_level(), log::Level::Info);
        assert_eq!(LogLevel::DEBUG.to_log_level(), log::Level::Debug);
        assert_eq!(format!("{:?}", LogLevel::WARNING), "WARNING");
    }
}
