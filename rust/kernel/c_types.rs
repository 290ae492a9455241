// SPDX-License-Identifier: GPL-2.0

//! C types for the module ABI.
//!
//! The loader talks to modules in these types, so a module's `init` status
//! looks the same here as it does to `insmod`.

macro_rules! alias {
    ($($name:ident = $ty:ty;)*) => {$(
        #[allow(non_camel_case_types, missing_docs)]
        pub type $name = $ty;

        // Check size compatibility with libcore.
        const _: () = assert!(
            core::mem::size_of::<$name>() == core::mem::size_of::<core::ffi::$name>()
        );
    )*}
}

alias! {
    c_int = i32;
}
