// SPDX-License-Identifier: GPL-2.0

//! Types for module parameters.
//!
//! C header: [`include/linux/moduleparam.h`](srctree/include/linux/moduleparam.h)

use crate::error::{Error, Result};
use core::num::IntErrorKind;
use std::sync::{PoisonError, RwLock};

/// Types that can be used for module parameters.
///
/// Note that displaying the type in `sysfs` will fail if
/// [`ModuleParam::to_param_string`] would produce more than a page.
pub trait ModuleParam: Sized + Copy + Send + Sync + 'static {
    /// The `parmtype` reported in the module info.
    const TYPE_NAME: &'static str;

    /// Parses a parameter argument.
    ///
    /// Follows the kernel's `kstrto*` rules: an optional sign, a `0x` or `0`
    /// base prefix and an optional trailing newline.
    fn try_from_param_arg(arg: &str) -> Result<Self>;

    /// Formats the value the way reading the `sysfs` file shows it.
    fn to_param_string(&self) -> String;
}

fn strip_newline(arg: &str) -> &str {
    arg.strip_suffix('\n').unwrap_or(arg)
}

/// Parses an unsigned value like `kstrtoull` with base `0`.
fn parse_unsigned(arg: &str) -> Result<u64> {
    let arg = strip_newline(arg);
    parse_magnitude(arg.strip_prefix('+').unwrap_or(arg))
}

/// Parses digits with an optional base prefix but no sign, like `_kstrtoull`.
fn parse_magnitude(arg: &str) -> Result<u64> {
    let (digits, radix) = if let Some(hex) = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
    {
        (hex, 16)
    } else if arg.len() > 1 && arg.starts_with('0') {
        (&arg[1..], 8)
    } else {
        (arg, 10)
    };

    // `from_str_radix` would accept a sign here, `kstrto*` does not.
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(Error::EINVAL);
    }

    u64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => Error::ERANGE,
        _ => Error::EINVAL,
    })
}

/// Parses a signed value like `kstrtoll` with base `0`.
fn parse_signed(arg: &str) -> Result<i64> {
    match strip_newline(arg).strip_prefix('-') {
        Some(magnitude) => {
            let magnitude = parse_magnitude(magnitude)?;
            i64::try_from(-i128::from(magnitude)).map_err(|_| Error::ERANGE)
        }
        None => i64::try_from(parse_unsigned(arg)?).map_err(|_| Error::ERANGE),
    }
}

macro_rules! impl_int_module_param {
    ($($ty:ident => $type_name:literal, $parse:ident;)*) => {$(
        impl ModuleParam for $ty {
            const TYPE_NAME: &'static str = $type_name;

            fn try_from_param_arg(arg: &str) -> Result<Self> {
                <$ty>::try_from($parse(arg)?).map_err(|_| Error::ERANGE)
            }

            fn to_param_string(&self) -> String {
                self.to_string()
            }
        }
    )*};
}

impl_int_module_param! {
    i8 => "i8", parse_signed;
    u8 => "byte", parse_unsigned;
    i16 => "short", parse_signed;
    u16 => "ushort", parse_unsigned;
    i32 => "int", parse_signed;
    u32 => "uint", parse_unsigned;
    i64 => "llong", parse_signed;
    u64 => "ullong", parse_unsigned;
    isize => "long", parse_signed;
    usize => "ulong", parse_unsigned;
}

impl ModuleParam for bool {
    const TYPE_NAME: &'static str = "bool";

    fn try_from_param_arg(arg: &str) -> Result<Self> {
        // `param_set_bool` treats a bare `name` like `name=y`; the rest is `kstrtobool`.
        match strip_newline(arg).as_bytes() {
            [] => Ok(true),
            [b'y' | b'Y' | b'1', ..] => Ok(true),
            [b'n' | b'N' | b'0', ..] => Ok(false),
            [b'o' | b'O', b'n' | b'N', ..] => Ok(true),
            [b'o' | b'O', b'f' | b'F', ..] => Ok(false),
            _ => Err(Error::EINVAL),
        }
    }

    fn to_param_string(&self) -> String {
        String::from(if *self { "Y" } else { "N" })
    }
}

/// Storage of one module parameter.
///
/// Loading a module resets it to its default, as loading a fresh module image would.
pub struct ParamValue<T: ModuleParam> {
    default: T,
    value: RwLock<T>,
}

impl<T: ModuleParam> ParamValue<T> {
    /// Creates the storage holding `default`.
    pub const fn new(default: T) -> Self {
        Self {
            default,
            value: RwLock::new(default),
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> T {
        *self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, value: T) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

/// Type-erased access to a parameter, used by the loader and by `sysfs`.
pub trait ParamAccess: Send + Sync {
    /// Parses `arg` and stores it. The stored value is unchanged on error.
    fn set_from_arg(&self, arg: &str) -> Result;

    /// Formats the current value.
    fn get_as_string(&self) -> String;

    /// Restores the default value.
    fn reset(&self);
}

impl<T: ModuleParam> ParamAccess for ParamValue<T> {
    fn set_from_arg(&self, arg: &str) -> Result {
        self.set(T::try_from_param_arg(arg)?);
        Ok(())
    }

    fn get_as_string(&self) -> String {
        self.get().to_param_string()
    }

    fn reset(&self) {
        self.set(self.default);
    }
}

/// Description of one module parameter, as generated by `module!`.
pub struct ParamInfo {
    /// Parameter name.
    pub name: &'static str,
    /// The `parmtype` string.
    pub type_name: &'static str,
    /// `sysfs` permissions. `0` means the parameter has no `sysfs` file.
    pub permissions: u32,
    /// The `parm` description.
    pub description: &'static str,
    /// The parameter's storage.
    pub value: &'static dyn ParamAccess,
}

impl ParamInfo {
    /// Returns `true` if the `sysfs` file can be read.
    pub fn is_readable(&self) -> bool {
        self.permissions & 0o444 != 0
    }

    /// Returns `true` if the `sysfs` file can be written.
    pub fn is_writable(&self) -> bool {
        self.permissions & 0o222 != 0
    }
}
