use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, GenericParam, LitStr};

/// Container-level `#[portable(...)]` options.
#[derive(Default)]
pub(crate) struct ContainerAttrs {
    pub name: Option<LitStr>,
}

pub(crate) fn parse_container_attrs(attrs: &[syn::Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("portable") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("descriptor name must not be empty"));
                }
                result.name = Some(value);
                Ok(())
            } else {
                Err(meta.error("unsupported portable attribute, expected `name`"))
            }
        })?;
    }

    Ok(result)
}

/// Generates the `descriptor()` method.
///
/// Without an explicit name the descriptor is the module path plus the type
/// name. Type and const parameters are appended as `Name<A, B>`.
pub(crate) fn generate_descriptor(input: &DeriveInput, attrs: &ContainerAttrs) -> syn::Result<TokenStream> {
    let ident = &input.ident;

    let base = match &attrs.name {
        Some(name) => quote! { #name },
        None => quote! { ::std::concat!(::std::module_path!(), "::", ::std::stringify!(#ident)) },
    };

    let params: Vec<_> = input
        .generics
        .params
        .iter()
        .filter_map(|param| match param {
            GenericParam::Type(ty) => {
                let ty = &ty.ident;
                Some(quote! { <#ty as ::flexcache_core::Portable>::descriptor() })
            }
            GenericParam::Const(konst) => {
                let konst = &konst.ident;
                Some(quote! { ::flexcache_core::TypeDescriptor::new(::std::string::ToString::to_string(&#konst)) })
            }
            GenericParam::Lifetime(_) => None,
        })
        .collect();

    let body = if params.is_empty() {
        quote! { ::flexcache_core::TypeDescriptor::from_static(#base) }
    } else {
        quote! { ::flexcache_core::TypeDescriptor::generic(#base, [#(#params),*]) }
    };

    Ok(quote! {
        fn descriptor() -> ::flexcache_core::TypeDescriptor {
            #body
        }
    })
}
