mod typed;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use typed::{typed_impl, Role};

// ============================================================================
// #[derive(Event)] / #[derive(Command)]
// ============================================================================

/// Derive `Typed`, `Message` and the `Event` marker.
///
/// A message extends another by embedding it in a field marked
/// `#[message(base)]`. The derived type then matches rules declared for the
/// base type (when they include derived messages) and can be viewed as it.
///
/// ```ignore
/// #[derive(Debug, Event)]
/// pub struct SomeMessage {
///     pub text: String,
/// }
///
/// #[derive(Debug, Event)]
/// pub struct SomeDerivedMessage {
///     #[message(base)]
///     pub base: SomeMessage,
/// }
/// ```
#[proc_macro_derive(Event, attributes(message))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_message(&input, quote!(Event)).into()
}

/// Derive `Typed`, `Message` and the `Command` marker.
///
/// Takes the same `#[message(base)]` field attribute as `#[derive(Event)]`.
#[proc_macro_derive(Command, attributes(message))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_message(&input, quote!(Command)).into()
}

fn expand_message(input: &DeriveInput, kind: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
    let typed = match typed_impl(input, Role::Message) {
        Ok(tokens) => tokens,
        Err(err) => return err.to_compile_error(),
    };
    let name = &input.ident;

    quote! {
        #typed

        impl ::rulebus::Message for #name {
            fn kind(&self) -> ::rulebus::MessageKind {
                ::rulebus::MessageKind::#kind
            }
        }

        impl ::rulebus::#kind for #name {}
    }
}

// ============================================================================
// #[derive(Handler)]
// ============================================================================

/// Derive `Typed` and `Handler`.
///
/// A handler extends another through a field marked `#[handler(base)]`.
///
/// ```ignore
/// #[derive(Handler)]
/// pub struct AuditHandler {
///     #[handler(base)]
///     inner: SomeMessageHandler,
/// }
/// ```
#[proc_macro_derive(Handler, attributes(handler))]
pub fn derive_handler(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let typed = match typed_impl(&input, Role::Handler) {
        Ok(tokens) => tokens,
        Err(err) => return err.to_compile_error().into(),
    };
    let name = &input.ident;

    quote! {
        #typed

        impl ::rulebus::Handler for #name {}
    }
    .into()
}
