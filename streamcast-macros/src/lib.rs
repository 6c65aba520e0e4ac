//! Procedural macros for streamcast.
//!
//! - `#[stream]` turns an object-safe trait into a stream trait and
//!   implements it for `DispatchHandle<dyn Trait>`.
//! - `#[derive(Stream)]` lists the stream traits a type realizes.
//!
//! Generated code refers to the `streamcast` facade crate.

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemTrait, parse_macro_input};

mod derive;
mod stream;

/// Declare a stream trait.
///
/// Adds `Send + Sync` supertraits when missing, implements `StreamKind` for
/// `dyn Trait` and implements the trait for `DispatchHandle<dyn Trait>` so a
/// handle can be called like any single implementation.
///
/// Every method must take `&self`. Arguments must implement `Debug`, and
/// arguments passed by value must implement `Clone` since each stream gets
/// its own copy. Results must be owned and implement `Default`; methods
/// returning `Result<T, E>` stop at the first error.
///
/// A `Result` is recognized by the last segment of the return type's path.
/// Mark methods returning an alias of `Result` with `#[fallible]` so they
/// stop at the first error too.
///
/// # Arguments
///
/// - `name = "..."`: trait name used in traces (defaults to the identifier)
///
/// # Example
///
/// ```rust,ignore
/// #[streamcast::stream]
/// pub trait Chat {
///     fn on_message(&self, room: &str, text: String);
///     fn is_muted(&self, user: u64) -> bool;
///
///     #[fallible]
///     fn history(&self, room: &str) -> Lines; // type Lines = Result<Vec<String>, ChatError>
/// }
///
/// let handle = streams.handle::<dyn Chat>();
/// handle.on_message("lobby", "hello".into());
/// ```
#[proc_macro_attribute]
pub fn stream(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as stream::StreamArgs);
    let item = parse_macro_input!(item as ItemTrait);

    stream::expand(args, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `Stream` for a type.
///
/// List the realized stream traits in a `#[facets(...)]` attribute; the
/// type must implement each of them.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(streamcast::Stream)]
/// #[facets(Chat, Presence)]
/// struct Bot;
/// ```
#[proc_macro_derive(Stream, attributes(facets))]
pub fn derive_stream(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    derive::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
