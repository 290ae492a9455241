// SPDX-License-Identifier: GPL-2.0 OR BSD-2-Clause

//! Rust hello sample.
//!
//! Greets `print_count` times at load time, keeping a timestamped entry per
//! greeting until the module is unloaded.

use kernel::ktime::{ktime_get, Ktime};
use kernel::list::{Iter, List, ListEntry};
use kernel::prelude::*;

module! {
    type: RustHello,
    name: "rust_hello",
    author: "Rust for Linux Contributors",
    description: "Hello, World in Linux Kernel Module",
    license: "Dual BSD/GPL",
    params: {
        print_count: u32 {
            default: 1,
            permissions: 0o444,
            description: "Number of 'Hello, world!' messages to print",
        },
    },
}

/// Largest accepted `print_count`.
pub const MAX_PRINT_COUNT: u32 = 10;

/// From this `print_count` on, loading warns.
pub const WARN_PRINT_COUNT: u32 = 5;

/// Reason a load was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// `print_count` is above [`MAX_PRINT_COUNT`].
    InvalidConfiguration,
    /// An entry could not be allocated.
    ResourceExhausted,
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Error {
        match e {
            LoadError::InvalidConfiguration => Error::EINVAL,
            LoadError::ResourceExhausted => Error::ENOMEM,
        }
    }
}

/// One greeting.
pub struct HelloEntry {
    timestamp: Ktime,
}

impl HelloEntry {
    /// When the greeting was printed.
    pub fn timestamp(&self) -> Ktime {
        self.timestamp
    }
}

/// The greetings printed since load, oldest first.
#[derive(Default)]
pub struct HelloRegistry {
    entries: List<HelloEntry>,
}

impl HelloRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: List::new(),
        }
    }

    /// Returns the number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries, oldest first.
    pub fn iter(&self) -> Iter<'_, HelloEntry> {
        self.entries.iter()
    }

    /// Validates `count`, then greets `count` times, recording an entry for each greeting.
    ///
    /// `count` is checked before anything is allocated. If an allocation fails part way, the
    /// entries created so far are released before returning, so a failed call leaves the
    /// registry empty.
    pub fn populate(&mut self, count: u32) -> Result<(), LoadError> {
        if count == 0 {
            pr_warn!("print_count is set to 0. Skipping message printing.\n");
            return Ok(());
        }

        if count > MAX_PRINT_COUNT {
            pr_err!(
                "print_count exceeds {}. Aborting module load.\n",
                MAX_PRINT_COUNT
            );
            return Err(LoadError::InvalidConfiguration);
        }

        if count >= WARN_PRINT_COUNT {
            pr_warn!("print_count is {}. Consider lowering this value.\n", count);
        }

        for i in 0..count {
            let mut entry = match ListEntry::new(
                HelloEntry {
                    timestamp: Ktime::default(),
                },
                GFP_KERNEL,
            ) {
                Ok(entry) => entry,
                Err(_) => {
                    self.drain();
                    return Err(LoadError::ResourceExhausted);
                }
            };

            entry.timestamp = ktime_get();
            self.entries.push_back(entry);
            pr_info!("Hello, world! ({}/{})\n", i + 1, count);
        }

        pr_info!(
            "Module initialized successfully with {} messages.\n",
            count
        );
        Ok(())
    }

    /// Releases every entry, oldest first.
    ///
    /// Does nothing on an empty registry.
    pub fn drain(&mut self) {
        while let Some(entry) = self.entries.pop_front() {
            pr_info!(
                "Releasing entry with timestamp: {} ns\n",
                entry.timestamp.to_ns()
            );
        }
    }
}

impl Drop for HelloRegistry {
    fn drop(&mut self) {
        self.drain();
    }
}

/// The module instance.
///
/// Created by [`RustHello::load`] at load time; dropping it is the unload.
pub struct RustHello {
    entries: HelloRegistry,
}

impl RustHello {
    /// Loads with `count` as the `print_count`.
    pub fn load(count: u32) -> Result<Self, LoadError> {
        let mut entries = HelloRegistry::new();
        entries.populate(count)?;
        Ok(RustHello { entries })
    }

    /// The greetings recorded at load time.
    pub fn entries(&self) -> &HelloRegistry {
        &self.entries
    }
}

impl kernel::Module for RustHello {
    fn init(_module: &'static ThisModule) -> Result<Self> {
        Ok(Self::load(print_count.read())?)
    }
}

impl Drop for RustHello {
    fn drop(&mut self) {
        pr_info!("Cleaning up and unloading module...\n");
        self.entries.drain();
        pr_info!("Module unloaded cleanly.\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::fault_inject::FailNth;
    use kernel::print::{capture, LogLevel, Record};

    fn at(records: &[Record], level: LogLevel) -> Vec<&str> {
        records
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.as_str())
            .collect()
    }

    fn released_ns(records: &[Record]) -> Vec<i64> {
        records
            .iter()
            .filter_map(|r| r.message.strip_prefix("Releasing entry with timestamp: "))
            .map(|rest| rest.trim_end_matches(" ns").parse().unwrap())
            .collect()
    }

    fn timestamps(registry: &HelloRegistry) -> Vec<i64> {
        registry.iter().map(|e| e.timestamp().to_ns()).collect()
    }

    #[test]
    fn populate_then_drain_releases_in_creation_order() {
        for count in 1..=MAX_PRINT_COUNT {
            let mut registry = HelloRegistry::new();
            let (result, records) = capture(|| registry.populate(count));
            assert_eq!(result, Ok(()));
            assert_eq!(registry.len(), count as usize);

            let greetings: Vec<String> = (1..=count)
                .map(|i| format!("Hello, world! ({}/{})", i, count))
                .collect();
            let mut expected: Vec<&str> = greetings.iter().map(String::as_str).collect();
            let done = format!("Module initialized successfully with {} messages.", count);
            expected.push(&done);
            assert_eq!(at(&records, LogLevel::INFO), expected);
            assert!(records.iter().all(|r| r.prefix == "rust_hello"));

            let created = timestamps(&registry);
            let ((), records) = capture(|| registry.drain());
            assert!(registry.is_empty());
            assert_eq!(released_ns(&records), created);
            assert_eq!(records.len(), count as usize);
        }
    }

    #[test]
    fn zero_count_warns_and_creates_nothing() {
        let mut registry = HelloRegistry::new();
        let (result, records) = capture(|| registry.populate(0));
        assert_eq!(result, Ok(()));
        assert!(registry.is_empty());
        assert_eq!(
            at(&records, LogLevel::WARNING),
            ["print_count is set to 0. Skipping message printing."]
        );
        assert_eq!(records.len(), 1);

        let ((), records) = capture(|| registry.drain());
        assert!(records.is_empty());
    }

    #[test]
    fn count_above_limit_is_rejected_before_allocating() {
        for count in [MAX_PRINT_COUNT + 1, 100, u32::MAX] {
            let mut registry = HelloRegistry::new();
            // Any allocation would trip this.
            let fail = FailNth::arm(1);
            let (result, records) = capture(|| registry.populate(count));
            assert_eq!(result, Err(LoadError::InvalidConfiguration));
            assert!(!fail.fired());
            assert!(registry.is_empty());
            assert_eq!(
                at(&records, LogLevel::ERR),
                ["print_count exceeds 10. Aborting module load."]
            );
            assert_eq!(records.len(), 1);
        }
    }

    #[test]
    fn high_counts_warn_exactly_once() {
        for count in 1..=MAX_PRINT_COUNT {
            let mut registry = HelloRegistry::new();
            let (result, records) = capture(|| registry.populate(count));
            result.unwrap();

            let warnings = at(&records, LogLevel::WARNING);
            if count >= WARN_PRINT_COUNT {
                let expected = format!("print_count is {}. Consider lowering this value.", count);
                assert_eq!(warnings, [expected.as_str()]);
                assert_eq!(records.len(), count as usize + 2);
            } else {
                assert!(warnings.is_empty());
                assert_eq!(records.len(), count as usize + 1);
            }

            // Keep the drop's release notices out of the next round.
            capture(|| registry.drain());
        }
    }

    #[test]
    fn allocation_failure_rolls_back_every_entry() {
        for count in 1..=MAX_PRINT_COUNT {
            for k in 1..=count {
                let mut registry = HelloRegistry::new();
                let fail = FailNth::arm(k as usize);
                let (result, records) = capture(|| registry.populate(count));
                assert!(fail.fired());
                drop(fail);

                assert_eq!(result, Err(LoadError::ResourceExhausted));
                assert!(registry.is_empty());

                let greetings = records
                    .iter()
                    .filter(|r| r.message.starts_with("Hello, world!"))
                    .count();
                assert_eq!(greetings, k as usize - 1);
                assert_eq!(released_ns(&records).len(), k as usize - 1);
                assert!(!records
                    .iter()
                    .any(|r| r.message.starts_with("Module initialized")));
            }
        }
    }

    #[test]
    fn rollback_releases_oldest_first() {
        let mut registry = HelloRegistry::new();
        let _fail = FailNth::arm(4);
        let (_, records) = capture(|| registry.populate(6));

        let released = released_ns(&records);
        assert_eq!(released.len(), 3);
        assert!(released.windows(2).all(|w| w[0] <= w[1]));

        // Releases follow the three greetings, never interleave with them.
        let first_release = records
            .iter()
            .position(|r| r.message.starts_with("Releasing"))
            .unwrap();
        assert_eq!(first_release, 1 + 3);
    }

    #[test]
    fn drain_is_idempotent() {
        let mut registry = HelloRegistry::new();
        capture(|| registry.populate(3)).0.unwrap();

        let ((), first) = capture(|| registry.drain());
        let ((), second) = capture(|| registry.drain());
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|r| r.level == LogLevel::INFO));
        assert!(second.is_empty());
    }

    #[test]
    fn timestamps_never_decrease() {
        let mut registry = HelloRegistry::new();
        capture(|| registry.populate(MAX_PRINT_COUNT)).0.unwrap();
        let ts = timestamps(&registry);
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
        capture(|| registry.drain());
    }

    #[test]
    fn unload_drains_between_notices() {
        let (module, _) = capture(|| RustHello::load(2));
        let module = module.unwrap();
        assert_eq!(module.entries().len(), 2);
        let created = timestamps(module.entries());

        let ((), records) = capture(|| drop(module));
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages.first(), Some(&"Cleaning up and unloading module..."));
        assert_eq!(messages.last(), Some(&"Module unloaded cleanly."));
        assert_eq!(released_ns(&records), created);
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn load_uses_the_parameter_default() {
        assert_eq!(print_count.read(), 1);

        let (module, records) = capture(|| RustHello::load(print_count.read()));
        assert_eq!(module.unwrap().entries().len(), 1);
        assert_eq!(records[0].message, "Hello, world! (1/1)");
    }

    #[test]
    fn load_errors_map_to_errno() {
        assert_eq!(Error::from(LoadError::InvalidConfiguration), Error::EINVAL);
        assert_eq!(Error::from(LoadError::ResourceExhausted), Error::ENOMEM);

        let (result, _) = capture(|| RustHello::load(MAX_PRINT_COUNT + 1));
        assert_eq!(result.err(), Some(LoadError::InvalidConfiguration));
    }
}
