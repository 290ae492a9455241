// SPDX-License-Identifier: GPL-2.0

//! Module descriptors and the module loader.
//!
//! C header: [`include/linux/module.h`](srctree/include/linux/module.h)
//!
//! [`load_module`] and [`delete_module`] play the parts of `insmod` and
//! `rmmod`; [`param_get`] and [`param_set`] play the part of the files under
//! `/sys/module/<name>/parameters`.

use crate::c_types::c_int;
use crate::error::{Error, Result};
use crate::module_param::ParamInfo;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifecycle state of a module, as tracked by the loader.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum ModuleState {
    /// Not loaded: never loaded, load aborted or unloaded.
    Unformed = 0,
    /// `init` is running.
    Coming = 1,
    /// Loaded and running.
    Live = 2,
    /// `exit` is running.
    Going = 3,
}

impl ModuleState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ModuleState::Coming,
            2 => ModuleState::Live,
            3 => ModuleState::Going,
            _ => ModuleState::Unformed,
        }
    }
}

/// Metadata and entry points of a module, as generated by `module!`.
pub struct ModuleInfo {
    /// Module name; also the prefix of its messages.
    pub name: &'static str,
    /// Authors.
    pub author: &'static [&'static str],
    /// One-line description.
    pub description: Option<&'static str>,
    /// License string.
    pub license: &'static str,
    /// Aliases.
    pub alias: &'static [&'static str],
    /// Parameters, in declaration order.
    pub params: &'static [ParamInfo],
    /// Entry point run at load time; returns `0` or a negative errno.
    pub init: fn() -> c_int,
    /// Entry point run at unload time.
    pub exit: fn(),
}

impl ModuleInfo {
    /// Returns the `.modinfo` strings, as listed by `modinfo`.
    pub fn modinfo(&self) -> Vec<String> {
        let mut strings = Vec::new();
        for author in self.author {
            strings.push(format!("author={}", author));
        }
        if let Some(description) = self.description {
            strings.push(format!("description={}", description));
        }
        strings.push(format!("license={}", self.license));
        for alias in self.alias {
            strings.push(format!("alias={}", alias));
        }
        for param in self.params {
            strings.push(format!("parmtype={}:{}", param.name, param.type_name));
            strings.push(format!("parm={}:{}", param.name, param.description));
        }
        strings
    }
}

/// Equivalent to `THIS_MODULE` in the C API.
///
/// Generated by `module!`; the loader drives its state.
pub struct ThisModule {
    info: ModuleInfo,
    state: AtomicU8,
    param_lock: Mutex<()>,
}

impl ThisModule {
    /// Creates the descriptor of an unloaded module.
    pub const fn new(info: ModuleInfo) -> Self {
        Self {
            info,
            state: AtomicU8::new(ModuleState::Unformed as u8),
            param_lock: Mutex::new(()),
        }
    }

    /// Returns the module name.
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Returns the module metadata.
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ModuleState {
        ModuleState::from_raw(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ModuleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: ModuleState, to: ModuleState) -> Result<(), ModuleState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ModuleState::from_raw)
    }

    /// Locks the module parameters to allow reading them.
    pub fn kernel_param_lock(&self) -> KParamGuard<'_> {
        KParamGuard {
            _guard: self
                .param_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn find_param(&self, name: &str) -> Option<&'static ParamInfo> {
        let params: &'static [ParamInfo] = self.info.params;
        params.iter().find(|p| p.name == name)
    }
}

/// Scoped lock on the kernel parameters of [`ThisModule`].
///
/// Lock will be released when this struct is dropped.
pub struct KParamGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Holds a module's instance between `init` and `exit`.
pub struct ModuleSlot<T>(Mutex<Option<T>>);

impl<T> ModuleSlot<T> {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self(Mutex::new(None))
    }

    /// Stores the instance returned by `init`.
    pub fn set(&self, module: T) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(module);
    }

    /// Takes the instance back out, so that it can be dropped.
    pub fn take(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl<T> Default for ModuleSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_args(module: &ThisModule, args: &str) -> Result {
    let _lock = module.kernel_param_lock();

    for param in module.info.params {
        param.value.reset();
    }

    for arg in args.split_whitespace() {
        let (name, value) = arg.split_once('=').unwrap_or((arg, ""));
        // Dashes and underscores are interchangeable in parameter names.
        let name = name.replace('-', "_");

        match module.find_param(&name) {
            Some(param) => {
                if let Err(e) = param.value.set_from_arg(value) {
                    crate::pr_err!(
                        target: module.name(),
                        "`{}' invalid for parameter `{}'\n",
                        value,
                        name
                    );
                    return Err(e);
                }
            }
            None => {
                crate::pr_warn!(
                    target: module.name(),
                    "Unknown parameter `{}' ignored\n",
                    name
                );
            }
        }
    }

    Ok(())
}

/// Loads `module` with the command line `args`, as `insmod module args` would.
///
/// Parameters start from their defaults; `args` holds whitespace-separated
/// `name=value` pairs. If parsing an argument or `init` fails, the module is
/// left unloaded and the error is returned.
pub fn load_module(module: &'static ThisModule, args: &str) -> Result {
    if module
        .transition(ModuleState::Unformed, ModuleState::Coming)
        .is_err()
    {
        return Err(Error::EEXIST);
    }

    if let Err(e) = parse_args(module, args) {
        module.set_state(ModuleState::Unformed);
        return Err(e);
    }

    let ret = (module.info.init)();
    if ret != 0 {
        module.set_state(ModuleState::Unformed);
        return Err(Error::from_kernel_errno(ret));
    }

    module.set_state(ModuleState::Live);
    Ok(())
}

/// Unloads a live `module`, as `rmmod` would.
pub fn delete_module(module: &'static ThisModule) -> Result {
    match module.transition(ModuleState::Live, ModuleState::Going) {
        Ok(()) => {}
        Err(ModuleState::Unformed) => return Err(Error::ENOENT),
        Err(_) => return Err(Error::EBUSY),
    }

    (module.info.exit)();
    module.set_state(ModuleState::Unformed);
    Ok(())
}

fn sysfs_param(module: &ThisModule, name: &str) -> Result<&'static ParamInfo> {
    if module.state() != ModuleState::Live {
        return Err(Error::ENOENT);
    }
    module
        .find_param(name)
        .filter(|param| param.permissions != 0)
        .ok_or(Error::ENOENT)
}

/// Reads `/sys/module/<module>/parameters/<name>`.
pub fn param_get(module: &ThisModule, name: &str) -> Result<String> {
    let param = sysfs_param(module, name)?;
    if !param.is_readable() {
        return Err(Error::EACCES);
    }
    let _lock = module.kernel_param_lock();
    Ok(param.value.get_as_string())
}

/// Writes `value` to `/sys/module/<module>/parameters/<name>`.
pub fn param_set(module: &ThisModule, name: &str, value: &str) -> Result {
    let param = sysfs_param(module, name)?;
    if !param.is_writable() {
        return Err(Error::EACCES);
    }
    let _lock = module.kernel_param_lock();
    param.value.set_from_arg(value)
}
