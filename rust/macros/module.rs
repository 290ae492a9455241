// SPDX-License-Identifier: GPL-2.0

#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::perf)]
#![deny(clippy::style)]

use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    braced, bracketed,
    ext::IdentExt,
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    Error, Expr, LitInt, LitStr, Result, Token,
};

/// Parameter types the hosted `module_param` layer knows how to parse.
const SUPPORTED_PARAM_TYPES: &[&str] = &[
    "bool", "i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64", "isize", "usize",
];

fn expect_string(it: ParseStream<'_>) -> Result<String> {
    let lit: LitStr = it.parse()?;
    if !lit.suffix().is_empty() {
        return Err(Error::new(lit.span(), "Unexpected suffix"));
    }
    Ok(lit.value())
}

fn expect_key(it: ParseStream<'_>, expected_name: &str) -> Result<()> {
    let key = Ident::parse_any(it)?;
    if key != expected_name {
        return Err(Error::new(
            key.span(),
            format!("Expected `{}`, found `{}`", expected_name, key),
        ));
    }
    it.parse::<Token![:]>()?;
    Ok(())
}

fn expect_end(it: ParseStream<'_>) -> Result<()> {
    if !it.is_empty() {
        return Err(it.error("Expected end"));
    }
    Ok(())
}

fn parse_item_or_list(it: ParseStream<'_>) -> Result<Vec<String>> {
    if it.peek(syn::token::Bracket) {
        let inner;
        bracketed!(inner in it);
        let items = Punctuated::<LitStr, Token![,]>::parse_terminated(&inner)?;
        Ok(items.iter().map(LitStr::value).collect())
    } else {
        Ok(vec![expect_string(it)?])
    }
}

fn permissions_are_readonly(perms: u32) -> bool {
    perms & 0o222 == 0
}

struct ParamInfo {
    name: Ident,
    type_: Ident,
    default: Expr,
    permission: u32,
    description: String,
}

impl Parse for ParamInfo {
    fn parse(it: ParseStream<'_>) -> Result<Self> {
        let name: Ident = it.parse()?;
        it.parse::<Token![:]>()?;

        let type_: Ident = it.parse()?;
        if !SUPPORTED_PARAM_TYPES.iter().any(|t| type_ == t) {
            return Err(Error::new(
                type_.span(),
                format!("Unrecognized type {}", type_),
            ));
        }

        let param_it;
        braced!(param_it in it);

        expect_key(&param_it, "default")?;
        let default: Expr = param_it.parse()?;
        param_it.parse::<Token![,]>()?;

        expect_key(&param_it, "permissions")?;
        let perms: LitInt = param_it.parse()?;
        let permission = perms.base10_parse::<u32>().map_err(|_| {
            Error::new(
                perms.span(),
                "Permission is expected to be an integer literal",
            )
        })?;
        param_it.parse::<Token![,]>()?;

        expect_key(&param_it, "description")?;
        let description = expect_string(&param_it)?;
        param_it.parse::<Token![,]>()?;
        expect_end(&param_it)?;

        Ok(ParamInfo {
            name,
            type_,
            default,
            permission,
            description,
        })
    }
}

struct ModuleInfo {
    type_: Ident,
    license: String,
    name: String,
    author: Vec<String>,
    description: Option<String>,
    alias: Vec<String>,
    params: Vec<ParamInfo>,
}

impl Parse for ModuleInfo {
    fn parse(it: ParseStream<'_>) -> Result<Self> {
        const EXPECTED_KEYS: &[&str] = &[
            "type",
            "name",
            "author",
            "description",
            "license",
            "alias",
            "params",
        ];
        const REQUIRED_KEYS: &[&str] = &["type", "name", "license"];

        let mut type_ = None;
        let mut name = String::new();
        let mut license = String::new();
        let mut author = Vec::new();
        let mut description = None;
        let mut alias = Vec::new();
        let mut params = Vec::new();
        let mut seen_keys: Vec<String> = Vec::new();

        while !it.is_empty() {
            let key = Ident::parse_any(it)?;
            let key_name = key.to_string();

            if seen_keys.contains(&key_name) {
                return Err(Error::new(
                    key.span(),
                    format!(
                        "Duplicated key \"{}\". Keys can only be specified once.",
                        key_name
                    ),
                ));
            }

            it.parse::<Token![:]>()?;

            match key_name.as_str() {
                "type" => type_ = Some(it.parse::<Ident>()?),
                "name" => name = expect_string(it)?,
                "author" => author = parse_item_or_list(it)?,
                "description" => description = Some(expect_string(it)?),
                "license" => license = expect_string(it)?,
                "alias" => alias = parse_item_or_list(it)?,
                "params" => {
                    let inner;
                    braced!(inner in it);
                    params = Punctuated::<ParamInfo, Token![,]>::parse_terminated(&inner)?
                        .into_iter()
                        .collect();
                }
                _ => {
                    return Err(Error::new(
                        key.span(),
                        format!(
                            "Unknown key \"{}\". Valid keys are: {:?}.",
                            key_name, EXPECTED_KEYS
                        ),
                    ))
                }
            }

            it.parse::<Token![,]>()?;

            seen_keys.push(key_name);
        }

        for key in REQUIRED_KEYS {
            if !seen_keys.iter().any(|e| e == key) {
                return Err(Error::new(
                    Span::call_site(),
                    format!("Missing required key \"{}\".", key),
                ));
            }
        }

        let ordered_keys: Vec<&str> = EXPECTED_KEYS
            .iter()
            .copied()
            .filter(|key| seen_keys.iter().any(|e| e == key))
            .collect();

        if seen_keys != ordered_keys {
            return Err(Error::new(
                Span::call_site(),
                format!(
                    "Keys are not ordered as expected. Order them like: {:?}.",
                    ordered_keys
                ),
            ));
        }

        Ok(ModuleInfo {
            // `REQUIRED_KEYS` guarantees the type was seen.
            type_: type_.ok_or_else(|| Error::new(Span::call_site(), "Missing type"))?,
            license,
            name,
            author,
            description,
            alias,
            params,
        })
    }
}

impl ModuleInfo {
    fn generate_param(&self, param: &ParamInfo) -> (TokenStream, TokenStream) {
        let param_name = &param.name;
        let param_type = &param.type_;
        let default = &param.default;
        let value = format_ident!("__{}_{}_value", self.name, param.name);
        let accessor = format_ident!("__{}_{}", self.name, param.name);

        let read_func = if permissions_are_readonly(param.permission) {
            quote! {
                fn read(&self) -> #param_type {
                    // Read-only parameters cannot change while the module is live.
                    #value.get()
                }
            }
        } else {
            quote! {
                fn read(&self, _lock: &kernel::KParamGuard<'_>) -> #param_type {
                    #value.get()
                }
            }
        };

        let item = quote! {
            #[allow(non_upper_case_globals)]
            static #value: kernel::module_param::ParamValue<#param_type> =
                kernel::module_param::ParamValue::new(#default);

            #[doc(hidden)]
            #[allow(non_camel_case_types)]
            struct #accessor;

            impl #accessor {
                #read_func
            }

            #[allow(non_upper_case_globals)]
            const #param_name: #accessor = #accessor;
        };

        let name = param_name.to_string();
        let permissions = param.permission;
        let description = &param.description;
        let info = quote! {
            kernel::module_param::ParamInfo {
                name: #name,
                type_name: <#param_type as kernel::module_param::ModuleParam>::TYPE_NAME,
                permissions: #permissions,
                description: #description,
                value: &#value,
            }
        };

        (item, info)
    }

    fn generate(&self) -> TokenStream {
        let type_ = &self.type_;
        let name = &self.name;
        let license = &self.license;
        let author = &self.author;
        let alias = &self.alias;
        let description = match &self.description {
            Some(description) => quote!(Some(#description)),
            None => quote!(None),
        };

        let (param_items, param_infos): (Vec<_>, Vec<_>) = self
            .params
            .iter()
            .map(|param| self.generate_param(param))
            .unzip();

        quote! {
            /// The module name.
            ///
            /// Used by the printing macros, e.g. [`pr_info!`].
            const __LOG_PREFIX: &str = #name;

            static __MOD: kernel::module::ModuleSlot<#type_> = kernel::module::ModuleSlot::new();

            /// Descriptor the host uses to load and unload this module.
            pub static THIS_MODULE: kernel::ThisModule =
                kernel::ThisModule::new(kernel::module::ModuleInfo {
                    name: #name,
                    author: &[#(#author),*],
                    description: #description,
                    license: #license,
                    alias: &[#(#alias),*],
                    params: &[#(#param_infos),*],
                    init: __init,
                    exit: __exit,
                });

            fn __init() -> kernel::c_types::c_int {
                match <#type_ as kernel::Module>::init(&THIS_MODULE) {
                    Ok(m) => {
                        __MOD.set(m);
                        0
                    }
                    Err(e) => e.to_kernel_errno(),
                }
            }

            fn __exit() {
                // Invokes `drop()` on the module instance, which should be used for cleanup.
                drop(__MOD.take());
            }

            #(#param_items)*
        }
    }
}

pub(crate) fn module(ts: TokenStream) -> Result<TokenStream> {
    let info: ModuleInfo = syn::parse2(ts)?;
    Ok(info.generate())
}
