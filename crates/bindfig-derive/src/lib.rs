//! `#[derive(Record)]` for bindfig.
//!
//! Generates a `bindfig::Record` impl that presents each named field to the
//! visitor in declaration order, and a `bindfig::Slot` impl so the struct can
//! also be filled structurally (e.g. as an element of `Vec<T>`).
//!
//! Field attributes, all under `#[bind(...)]`:
//!
//! - `skip`: the field is not bound.
//! - `nested`: the field is a record whose fields are bound too. `Option<T>`
//!   is allocated with `T::default()` before being presented.
//! - `embed`: like `nested`, but the members take no key segment of their own.
//! - `required`, or `required = "true"`.
//! - `name = "value"`: any other tag, e.g. `default = "8080"`, `env = "PORT"`.
//!
//! `///` doc comments become the `usage` tag unless one is given.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, ExprLit, Fields, GenericArgument, Lit, LitStr, Meta,
    PathArguments, Type, parse_macro_input,
};

#[proc_macro_derive(Record, attributes(bind))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct BindField {
    ident: syn::Ident,
    name: String,
    nested: bool,
    embedded: bool,
    optional: bool,
    tags: Vec<(String, String)>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record requires named fields",
        ));
    };

    let mut fields = Vec::new();
    for field in &named.named {
        if let Some(parsed) = parse_field(field)? {
            fields.push(parsed);
        }
    }

    let ty = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let visits = fields.iter().map(visit_call);
    let members = fields.iter().map(|f| {
        let ident = &f.ident;
        let name = &f.name;
        quote! { ::bindfig::Member::new(#name, ::bindfig::Slot::kind(&self.#ident)) }
    });
    let stores = fields.iter().map(|f| {
        let ident = &f.ident;
        let name = &f.name;
        quote! {
            #name => ::bindfig::assign(&mut self.#ident, value).map_err(|source| {
                ::bindfig::CoerceError::Member {
                    field: #name.to_string(),
                    source: ::std::boxed::Box::new(source),
                }
            })?,
        }
    });

    Ok(quote! {
        impl #impl_generics ::bindfig::Record for #ty #ty_generics #where_clause {
            fn visit(
                &mut self,
                visitor: &mut dyn ::bindfig::Visitor,
            ) -> ::std::result::Result<(), ::bindfig::BindfigError> {
                #(#visits)*
                ::std::result::Result::Ok(())
            }
        }

        impl #impl_generics ::bindfig::Slot for #ty #ty_generics #where_clause {
            fn kind(&self) -> ::bindfig::Kind {
                ::bindfig::Kind::Record(::std::vec![#(#members),*])
            }

            fn store(
                &mut self,
                value: ::bindfig::Typed,
            ) -> ::std::result::Result<(), ::bindfig::CoerceError> {
                match value {
                    ::bindfig::Typed::Record(entries) => {
                        for (name, value) in entries {
                            match name {
                                #(#stores)*
                                other => {
                                    return ::std::result::Result::Err(
                                        ::bindfig::CoerceError::NoSuchField(other.to_string()),
                                    );
                                }
                            }
                        }
                        ::std::result::Result::Ok(())
                    }
                    other => ::std::result::Result::Err(
                        ::bindfig::CoerceError::unsupported("record", &other),
                    ),
                }
            }
        }
    })
}

fn visit_call(field: &BindField) -> TokenStream2 {
    let ident = &field.ident;
    let name = &field.name;
    let tags = field.tags.iter().map(|(ns, raw)| quote! { .tag(#ns, #raw) });
    let embedded = field.embedded.then(|| quote! { .embedded() });
    let decl = quote! { &::bindfig::Decl::new(#name) #(#tags)* #embedded };

    if !field.nested {
        return quote! { visitor.leaf(#decl, &mut self.#ident)?; };
    }
    if field.optional {
        quote! {
            visitor.record(
                #decl,
                self.#ident.get_or_insert_with(::std::default::Default::default),
            )?;
        }
    } else {
        quote! { visitor.record(#decl, &mut self.#ident)?; }
    }
}

fn parse_field(field: &syn::Field) -> syn::Result<Option<BindField>> {
    let Some(ident) = field.ident.clone() else {
        return Ok(None);
    };
    let name = ident.to_string();
    let name = name.strip_prefix("r#").unwrap_or(&name).to_string();

    let mut parsed = BindField {
        ident,
        name,
        nested: false,
        embedded: false,
        optional: option_inner(&field.ty).is_some(),
        tags: Vec::new(),
    };
    let mut skip = false;

    for attr in field.attrs.iter().filter(|a| a.path().is_ident("bind")) {
        attr.parse_nested_meta(|meta| {
            let Some(key) = meta.path.get_ident().map(|i| i.to_string()) else {
                return Err(meta.error("expected a bind attribute name"));
            };
            match key.as_str() {
                "skip" => skip = true,
                "nested" => parsed.nested = true,
                "embed" => {
                    parsed.nested = true;
                    parsed.embedded = true;
                }
                "required" if meta.input.is_empty() || meta.input.peek(syn::Token![,]) => {
                    parsed.tags.push((key, "true".to_string()));
                }
                _ => {
                    let value: LitStr = meta.value()?.parse()?;
                    parsed.tags.push((key, value.value()));
                }
            }
            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }
    if parsed.embedded && parsed.optional {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "embedded records cannot be optional",
        ));
    }
    if !parsed.tags.iter().any(|(ns, _)| ns == "usage")
        && let Some(doc) = doc_text(&field.attrs)
    {
        parsed.tags.push(("usage".to_string(), doc));
    }
    Ok(Some(parsed))
}

/// Doc comment lines, trimmed and joined with spaces.
fn doc_text(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();
    (!lines.is_empty()).then(|| lines.join(" "))
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else { return None };
    let last = path.path.segments.last()?;
    if last.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
