//! # streamcast-core
//!
//! Core contracts for the streamcast multicast dispatch registry.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! libraries that only declare stream traits or implement them, without
//! pulling in the registry from `streamcast-std`.
//!
//! # Vocabulary
//!
//! ## Stream trait ([`StreamKind`])
//!
//! An ordinary object-safe trait whose calls are fanned out to every
//! registered implementation. `dyn Trait` implements [`StreamKind`], which
//! gives the trait a runtime identity ([`StreamType`]).
//!
//! ## Stream ([`Stream`])
//!
//! A concrete object that realizes one or more stream traits. It lists its
//! facets statically through [`Stream::facets`] and may expose a [`Tag`] per
//! stream type. Identity is object identity ([`StreamId`]).
//!
//! ## Dispatch protocol ([`DispatchCallback`], [`ResultFilter`])
//!
//! Small hooks that let callers observe or stop a dispatch round and reduce
//! the per-stream results into one value.
//!
//! ## Fallback ([`DefaultStreamFactory`])
//!
//! Produces a default stream when a stream type has no registered member.
//!
//! # Error Types
//!
//! - [`StreamError`] - Misconfiguration detected by the registry
//! - [`BoxError`] - Convenience alias for boxed stream method errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod callback;
mod error;
mod factory;
mod method;
mod stream;
mod tag;

// Re-exports
pub use callback::{DispatchCallback, DispatchFlow, FilterOutcome, ResultFilter, Results};
pub use error::{BoxError, StreamError};
pub use factory::{CreateParam, DefaultBinding, DefaultStreamFactory, ImplType};
pub use method::{Args, Method};
pub use stream::{Facets, Stream, StreamId, StreamKind, StreamObject, StreamType, WeakStreamObject};
pub use tag::Tag;
