mod flags;
mod derive;

use proc_macro::TokenStream;

/// Turn a fieldless enum into a transparent bit-flag struct.
///
/// Variants without a discriminant get the next power of two, integer discriminants are used as-is
/// and `A | B` discriminants combine earlier variants. An optional base type (`u8` .. `u64`) can be
/// passed as an argument, otherwise the smallest type fitting all flags is picked.
#[proc_macro_attribute]
pub fn flags(args: TokenStream, input: TokenStream) -> TokenStream {
    flags::flags(args.into(), input.into()).into()
}

#[proc_macro_derive(EnumCount)]
pub fn enum_count(item: TokenStream) -> TokenStream {
    derive::enum_count(item.into()).into()
}

#[proc_macro_derive(EnumFromIndex)]
pub fn enum_from_index(item: TokenStream) -> TokenStream {
    derive::enum_from_index(item.into()).into()
}

/// Implements `EnumNameT` and `Display`, using the `#[display("..")]` attribute when present and the variant identifier otherwise.
#[proc_macro_derive(EnumDisplay, attributes(display))]
pub fn enum_display(item: TokenStream) -> TokenStream {
    derive::enum_display(item.into()).into()
}

/// Implements `EnumFromNameT`, accepting the `#[parse_name("..")]` attribute (repeatable) or the variant identifier.
#[proc_macro_derive(EnumFromName, attributes(parse_name))]
pub fn enum_from_name(item: TokenStream) -> TokenStream {
    derive::enum_from_name(item.into()).into()
}
