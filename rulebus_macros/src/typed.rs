use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Index, Member, Result, Type};

#[derive(Clone, Copy)]
pub enum Role {
    Message,
    Handler,
}

impl Role {
    fn attribute(self) -> &'static str {
        match self {
            Role::Message => "message",
            Role::Handler => "handler",
        }
    }
}

/// `impl ::rulebus::Typed` for a struct, chaining to its base field if any.
pub fn typed_impl(input: &DeriveInput, role: Role) -> Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "rulebus derives do not support generic types",
        ));
    }

    let name = &input.ident;
    let base = extract_base_field(input, role)?;

    let (tag, fallback) = match &base {
        Some((member, ty)) => (
            quote! { ::rulebus::TypeTag::derived::<Self>(<#ty as ::rulebus::Typed>::tag) },
            quote! { ::rulebus::Typed::as_type(&self.#member, target) },
        ),
        None => (
            quote! { ::rulebus::TypeTag::of::<Self>() },
            quote! { ::core::option::Option::None },
        ),
    };

    Ok(quote! {
        impl ::rulebus::Typed for #name {
            fn tag() -> ::rulebus::TypeTag {
                #tag
            }

            fn type_tag(&self) -> ::rulebus::TypeTag {
                <Self as ::rulebus::Typed>::tag()
            }

            fn as_type(
                &self,
                target: ::std::any::TypeId,
            ) -> ::core::option::Option<&dyn ::std::any::Any> {
                if target == ::std::any::TypeId::of::<Self>() {
                    return ::core::option::Option::Some(self as &dyn ::std::any::Any);
                }
                #fallback
            }
        }
    })
}

/// Find the single field marked `#[message(base)]` / `#[handler(base)]`.
fn extract_base_field(input: &DeriveInput, role: Role) -> Result<Option<(Member, Type)>> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(Error::new(
                Span::call_site(),
                "rulebus derives only support structs",
            ))
        }
    };

    let iter: Box<dyn Iterator<Item = &syn::Field>> = match fields {
        Fields::Named(named) => Box::new(named.named.iter()),
        Fields::Unnamed(unnamed) => Box::new(unnamed.unnamed.iter()),
        Fields::Unit => return Ok(None),
    };

    let mut base = None;
    for (index, field) in iter.enumerate() {
        let mut is_base = false;
        for attr in &field.attrs {
            if !attr.path().is_ident(role.attribute()) {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("base") {
                    is_base = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `base`"))
                }
            })?;
        }
        if !is_base {
            continue;
        }
        if base.is_some() {
            return Err(Error::new_spanned(field, "only one base field is allowed"));
        }

        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        };
        base = Some((member, field.ty.clone()));
    }

    Ok(base)
}
