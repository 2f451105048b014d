use proc_macro::TokenStream;
use proc_macro2::TokenTree;
use quote::{ToTokens, quote};
use syn::{parse_macro_input, DeriveInput, LitStr};

mod descriptor;

use descriptor::{generate_descriptor, parse_container_attrs};

/// Attribute macro that derives all required traits for cacheable types.
///
/// This is syntax sugar that expands to:
/// ```ignore
/// #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Portable)]
/// ```
///
/// An optional `name` sets the type descriptor, the same as
/// `#[portable(name = "...")]`.
///
/// # Example
///
/// ```ignore
/// use flexcache_core::cacheable;
///
/// #[cacheable(name = "app::User")]
/// struct User {
///     name: String,
///     visits: u32,
/// }
/// ```
#[proc_macro_attribute]
pub fn cacheable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let mut name: Option<LitStr> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported cacheable argument, expected `name`"))
        }
    });
    parse_macro_input!(attr with parser);

    let name_attr = name.map(|name| quote! { #[portable(name = #name)] });

    let output = quote! {
        #[derive(
            ::std::fmt::Debug,
            ::std::clone::Clone,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::flexcache_core::Portable
        )]
        #name_attr
        #input
    };

    output.into()
}

/// Derive macro for the Portable trait.
///
/// Generates `descriptor()` and a `Members` implementation that visits every
/// field, so nested `DynValue`s are resolved on decode.
///
/// # Example
///
/// ```ignore
/// use flexcache_core::{DynValue, Portable};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Portable)]
/// struct Envelope {
///     topic: String,
///     body: DynValue,
/// }
/// ```
///
/// # Attributes
///
/// - `#[portable(name = "app::Name")]` - Use a custom descriptor instead of the module path
/// - `#[portable(skip)]` - Don't visit this field for dynamic members (it is still serialized).
///   Rejected on fields whose type names `DynValue`; a skipped field must not hold
///   dynamic members at all, or they stay unresolved after decode.
#[proc_macro_derive(Portable, attributes(portable))]
pub fn derive_portable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_portable_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_portable_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    if let Some(lifetime) = input.generics.lifetimes().next() {
        return Err(syn::Error::new_spanned(
            lifetime,
            "Portable cannot be derived for types with lifetime parameters",
        ));
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Build where clause with Portable bounds for type parameters
    let where_clause = build_where_clause(&input.generics, where_clause);

    let container_attrs = parse_container_attrs(&input.attrs)?;
    let descriptor_impl = generate_descriptor(input, &container_attrs)?;
    let visit_members_impl = generate_visit_members(input)?;

    Ok(quote! {
        impl #impl_generics ::flexcache_core::Members for #name #ty_generics #where_clause {
            #visit_members_impl
        }

        impl #impl_generics ::flexcache_core::Portable for #name #ty_generics #where_clause {
            #descriptor_impl
        }
    })
}

fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
) -> proc_macro2::TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let portable_bounds = type_params.iter().map(|p| {
        quote! { #p: ::flexcache_core::Portable }
    });

    let existing_predicates = existing
        .map(|w| {
            let predicates = &w.predicates;
            quote! { #predicates, }
        })
        .unwrap_or_default();

    quote! {
        where
            Self: ::serde::Serialize + ::serde::de::DeserializeOwned,
            #existing_predicates
            #(#portable_bounds),*
    }
}

fn generate_visit_members(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let body = match &input.data {
        syn::Data::Struct(data) => generate_field_visits(&data.fields)?,
        syn::Data::Enum(data) => generate_variant_visits(data)?,
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(input, "Portable cannot be derived for unions"));
        }
    };

    Ok(quote! {
        #[allow(unused_variables, unreachable_code)]
        fn visit_members(
            &mut self,
            visitor: &mut dyn ::flexcache_core::MemberVisitor,
        ) -> ::std::result::Result<(), ::flexcache_core::GraphError> {
            #body
            ::std::result::Result::Ok(())
        }
    })
}

fn visit(place: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
    quote! { ::flexcache_core::Members::visit_members(#place, visitor)?; }
}

fn generate_field_visits(fields: &syn::Fields) -> syn::Result<proc_macro2::TokenStream> {
    let mut visits = Vec::new();
    match fields {
        syn::Fields::Named(named) => {
            for f in &named.named {
                if is_skipped(f)? {
                    continue;
                }
                let ident = &f.ident;
                visits.push(visit(quote! { &mut self.#ident }));
            }
        }
        syn::Fields::Unnamed(unnamed) => {
            for (i, f) in unnamed.unnamed.iter().enumerate() {
                if is_skipped(f)? {
                    continue;
                }
                let idx = syn::Index::from(i);
                visits.push(visit(quote! { &mut self.#idx }));
            }
        }
        syn::Fields::Unit => {}
    }
    Ok(quote! { #(#visits)* })
}

fn generate_variant_visits(data: &syn::DataEnum) -> syn::Result<proc_macro2::TokenStream> {
    if data.variants.is_empty() {
        return Ok(quote! { match *self {} });
    }

    let mut arms = Vec::new();
    for variant in &data.variants {
        let variant_ident = &variant.ident;

        let arm = match &variant.fields {
            syn::Fields::Unit => quote! { Self::#variant_ident => {} },
            syn::Fields::Named(fields) => {
                let mut bound = Vec::new();
                for f in &fields.named {
                    if !is_skipped(f)? {
                        bound.push(f.ident.as_ref());
                    }
                }
                let visits = bound.iter().map(|ident| visit(quote! { #ident }));
                quote! {
                    Self::#variant_ident { #(#bound,)* .. } => {
                        #(#visits)*
                    }
                }
            }
            syn::Fields::Unnamed(fields) => {
                let mut bindings = Vec::new();
                let mut visits = Vec::new();
                for (i, f) in fields.unnamed.iter().enumerate() {
                    if is_skipped(f)? {
                        bindings.push(quote! { _ });
                    } else {
                        let binding = quote::format_ident!("f{}", i);
                        visits.push(visit(quote! { #binding }));
                        bindings.push(quote! { #binding });
                    }
                }
                quote! {
                    Self::#variant_ident(#(#bindings),*) => {
                        #(#visits)*
                    }
                }
            }
        };
        arms.push(arm);
    }

    Ok(quote! {
        match self {
            #(#arms)*
        }
    })
}

fn is_skipped(field: &syn::Field) -> syn::Result<bool> {
    if !parse_field_attrs(&field.attrs)?.skip {
        return Ok(false);
    }
    if mentions_dyn_value(field.ty.to_token_stream()) {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "`#[portable(skip)]` cannot be used on a field holding `DynValue`",
        ));
    }
    Ok(true)
}

fn mentions_dyn_value(tokens: proc_macro2::TokenStream) -> bool {
    tokens.into_iter().any(|token| match token {
        TokenTree::Ident(ident) => ident == "DynValue",
        TokenTree::Group(group) => mentions_dyn_value(group.stream()),
        _ => false,
    })
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("portable") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported field attribute, expected `skip`"))
            }
        })?;
    }

    Ok(result)
}
