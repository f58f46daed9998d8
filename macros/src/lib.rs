use darling::ast::NestedMeta;
use darling::FromMeta;
use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitInt};

/// Adds a `version: usize` field to a struct and implements `Versioned` for it.
///
/// `Versioned` itself lives in `dragonsync-common` since this crate can only
/// export macros.
#[proc_macro_attribute]
pub fn add_version(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = syn::parse::<LitInt>(args)
        .unwrap_or_else(|_| proc_macro2::Literal::usize_unsuffixed(1).into());
    let mut input = parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;

    let version_ident = Ident::new("version", ident.span());
    let version_type = quote! { usize };

    let output = match input.data {
        Data::Struct(ref mut data_struct) => {
            if let Fields::Named(fields) = &mut data_struct.fields {
                fields.named.push(
                    syn::Field::parse_named
                        .parse2(quote! { #version_ident: #version_type })
                        .unwrap(),
                )
            }

            quote! {
                #input

                impl Versioned for #ident {
                    fn version(&self) -> #version_type {
                        self.version
                    }
                }

                impl #ident {
                    pub fn new() -> Self {
                        Self {
                            version: #args,
                            ..Default::default()
                        }
                    }
                }
            }
        }
        _ => panic!("#[add_version] is only for structs with named fields"),
    };
    output.into()
}

#[derive(Debug, FromMeta)]
struct ConfigArgs {
    version: Option<usize>,
    filename: Option<String>,
}

impl Default for ConfigArgs {
    fn default() -> Self {
        Self {
            version: Some(1),
            filename: Some(String::from("config.hcl")),
        }
    }
}

/// Adds `version`/`filename` bookkeeping fields plus a `Versioned` impl and a
/// `new()`/`filename()` pair to a config root struct.
#[proc_macro_attribute]
pub fn into_configfile(args: TokenStream, input: TokenStream) -> TokenStream {
    let attr_args = NestedMeta::parse_meta_list(args.into()).unwrap_or_else(|_| vec![]);

    let mut input = parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;

    let args = if attr_args.is_empty() {
        ConfigArgs::default()
    } else {
        ConfigArgs::from_list(&attr_args).unwrap()
    };

    let version_value = args.version.unwrap();
    let filename = args.filename.unwrap();

    let version_ident = Ident::new("version", ident.span());
    let version_type = quote! { usize };
    let filename_ident = Ident::new("filename", ident.span());
    let filename_type = quote! { String };

    let output = match input.data {
        Data::Struct(ref mut data_struct) => {
            match &mut data_struct.fields {
                Fields::Named(fields) => {
                    fields.named.push(
                        syn::Field::parse_named
                            .parse2(quote! { #version_ident: #version_type })
                            .unwrap(),
                    );
                    fields.named.push(
                        syn::Field::parse_named
                            .parse2(quote! { #filename_ident: #filename_type })
                            .unwrap(),
                    );
                }
                _ => unimplemented!(),
            }

            quote! {
                #input

                impl Versioned for #ident {
                    fn version(&self) -> #version_type {
                        self.version
                    }
                }

                impl #ident {
                    pub fn new() -> Self {
                        Self {
                            version: #version_value,
                            filename: String::from(#filename),
                            ..Default::default()
                        }
                    }

                    pub fn filename(&self) -> #filename_type {
                        self.filename.clone()
                    }
                }
            }
        }
        _ => panic!("#[into_configfile] is only for structs with named fields"),
    };
    output.into()
}
