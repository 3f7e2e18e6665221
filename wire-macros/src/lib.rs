use proc_macro::TokenStream;

mod wire_format;

/// Generates the implementation block for conforming to `WireFormat`.
///
/// Structs are laid out field by field in declaration order.
/// Enums must be field-less and carry a `#[repr(...)]` attribute,
/// the discriminant is written as the repr integer.
///
/// # Note
///
/// Requires `wire_codec` to be in scope with that name.
#[proc_macro_derive(WireFormat)]
pub fn wire_format(item: TokenStream) -> TokenStream {
    wire_format::derive(item)
}
