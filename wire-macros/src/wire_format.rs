use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DataEnum, DataStruct, DeriveInput, Fields, Generics, Ident, Index, Path, Type,
    Variant,
};

struct BodyInfo {
    ident: Ident,
    generics: Generics,
    path: Path,
}

fn get_repr<'a>(mut attrs: impl Iterator<Item = &'a Attribute>) -> Type {
    attrs
        .find(|&attr| attr.path().is_ident("repr"))
        .expect("Enum must have #[repr(...)] attribute.")
        .parse_args()
        .expect("#[repr(...)] can only have one type.")
}

/// Resolve the discriminant of every variant,
/// counting up from the last explicit one.
fn build_tags<'a>(variants: impl Iterator<Item = &'a Variant>) -> Vec<TokenStream2> {
    let mut tags = Vec::new();
    let mut i = 0;
    let mut last_anchor = quote! { 0 };

    for variant in variants {
        if let Some((_, tag)) = &variant.discriminant {
            let tokens = quote! { #tag };
            tags.push(tokens.clone());
            i = 0;
            last_anchor = tokens;
        } else {
            let rendered_offset = Index::from(i);
            tags.push(quote! { #last_anchor + #rendered_offset });
        }
        i += 1;
    }

    tags
}

fn derive_struct(s: DataStruct, info: &BodyInfo) -> TokenStream2 {
    let implementer = &info.ident;
    let path = &info.path;
    let (impl_generics, ty_generics, where_clause) = info.generics.split_for_impl();

    let types: Vec<_> = s.fields.iter().map(|field| &field.ty).collect();

    let size = if types.is_empty() {
        quote! { 0 }
    } else {
        quote! { #( <#types as #path::WireFormat>::SIZE )+* }
    };

    let (encode_body, decode_body) = match &s.fields {
        Fields::Unit => (quote! { Ok(()) }, quote! { Ok(Self) }),
        Fields::Unnamed(fields) => {
            let indices: Vec<_> = (0..fields.unnamed.len()).map(Index::from).collect();

            (
                quote! {
                    let mut dst = dst.into_iter();

                    #(
                        #path::WireFormat::encode_iter(&self.#indices, &mut dst)?;
                    )*

                    Ok(())
                },
                quote! {
                    let mut src = src.into_iter();

                    Ok(
                        Self(
                            #(
                                <#types as #path::WireFormat>::decode_iter(&mut src)?,
                            )*
                        )
                    )
                },
            )
        }
        Fields::Named(fields) => {
            let idents: Vec<_> = fields
                .named
                .iter()
                .map(|field| field.ident.as_ref().unwrap())
                .collect();

            (
                quote! {
                    let mut dst = dst.into_iter();

                    #(
                        #path::WireFormat::encode_iter(&self.#idents, &mut dst)?;
                    )*

                    Ok(())
                },
                quote! {
                    let mut src = src.into_iter();

                    Ok(
                        Self {
                            #(
                                #idents: <#types as #path::WireFormat>::decode_iter(&mut src)?,
                            )*
                        }
                    )
                },
            )
        }
    };

    quote! {
        impl #impl_generics #path::WireFormat for #implementer #ty_generics #where_clause {
            const SIZE: usize = #size;

            fn encode_iter<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), #path::error::EndOfInput> {
                #encode_body
            }

            fn decode_iter<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, #path::error::Error> {
                #decode_body
            }
        }
    }
}

fn derive_enum(e: DataEnum, info: &BodyInfo, repr: Type) -> TokenStream2 {
    let implementer = &info.ident;
    let path = &info.path;
    let (impl_generics, ty_generics, where_clause) = info.generics.split_for_impl();

    if e.variants.iter().any(|variant| !variant.fields.is_empty()) {
        panic!("WireFormat can only be derived for field-less enums.");
    }

    let idents: Vec<_> = e.variants.iter().map(|variant| &variant.ident).collect();
    let tags = build_tags(e.variants.iter());
    let tag_consts: Vec<_> = idents
        .iter()
        .map(|ident| {
            format_ident!(
                "{}_TAG",
                inflector::cases::screamingsnakecase::to_screaming_snake_case(&ident.to_string())
            )
        })
        .collect();

    quote! {
        impl #impl_generics #path::WireFormat for #implementer #ty_generics #where_clause {
            const SIZE: usize = <#repr as #path::WireFormat>::SIZE;

            fn encode_iter<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), #path::error::EndOfInput> {
                #(
                    const #tag_consts: #repr = #tags;
                )*

                let tag = match self {
                    #(
                        Self::#idents => #tag_consts,
                    )*
                };

                #path::WireFormat::encode_iter(&tag, dst)
            }

            fn decode_iter<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, #path::error::Error> {
                #(
                    const #tag_consts: #repr = #tags;
                )*

                match <#repr as #path::WireFormat>::decode_iter(src)? {
                    #(
                        #tag_consts => Ok(Self::#idents),
                    )*
                    _ => Err(#path::error::Error::Invalid),
                }
            }
        }
    }
}

pub fn derive(item: TokenStream) -> TokenStream {
    let item: DeriveInput = syn::parse2(item.into()).unwrap();

    let info = BodyInfo {
        ident: item.ident,
        generics: item.generics,
        path: syn::parse2(quote! { wire_codec }).unwrap(),
    };

    let implementation = match item.data {
        Data::Struct(s) => derive_struct(s, &info),
        Data::Enum(e) => derive_enum(e, &info, get_repr(item.attrs.iter())),
        _ => panic!("WireFormat is only implemented for structs and enums."),
    };

    implementation.into()
}
