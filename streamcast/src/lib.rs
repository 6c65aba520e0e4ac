//! # streamcast - Process-Local Multicast Dispatch
//!
//! `streamcast` lets independent parts of a program publish and receive calls
//! on shared interfaces without knowing about each other. Producers call a
//! method once on a [`DispatchHandle`]; the registry fans the call out to
//! every registered implementation of that interface, in priority order, and
//! hands back one result.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use streamcast::prelude::*;
//!
//! #[streamcast::stream]
//! pub trait Chat {
//!     fn on_message(&self, text: String);
//!     fn unread(&self) -> usize;
//! }
//!
//! #[derive(Stream)]
//! #[facets(Chat)]
//! struct Inbox;
//!
//! impl Chat for Inbox {
//!     fn on_message(&self, text: String) { println!("{text}"); }
//!     fn unread(&self) -> usize { 0 }
//! }
//!
//! let streams = Streams::new();
//! streams.register(&Arc::new(Inbox))?;
//!
//! let chat = streams.handle::<dyn Chat>();
//! chat.on_message("hello".into());
//! ```
//!
//! ## Pieces
//!
//! - [`Streams`]: the registry, with a process-wide instance in [`Streams::global`]
//! - [`Connection`]: per-stream priority and round breaking
//! - [`HandleBuilder`]: tags, [`DispatchCallback`]s and [`ResultFilter`]s
//! - [`Lifecycle`]: registration that follows a host lifecycle
//! - Default streams: [`Streams::bind_default`] with a [`DefaultStreamFactory`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use streamcast_core::{
    // Dispatch protocol
    Args,
    // Error types
    BoxError,
    // Fallback
    CreateParam,
    DefaultBinding,
    DefaultStreamFactory,
    DispatchCallback,
    DispatchFlow,
    // Streams
    Facets,
    FilterOutcome,
    ImplType,
    Method,
    ResultFilter,
    Results,
    Stream,
    StreamError,
    StreamId,
    StreamKind,
    StreamObject,
    StreamType,
    Tag,
    WeakStreamObject,
};

pub use streamcast_std::{
    CachingDefaultFactory, Connection, DispatchHandle, FreshDefaultFactory, HandleBuilder,
    Lifecycle, Phase, Streams, StreamsBuilder, WeakDefaultFactory,
};

/// Ready-made result filters.
pub mod filters {
    #![allow(clippy::wildcard_imports)]
    pub use streamcast_std::filters::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use streamcast_std::testing::*;
}

/// Prelude module - common imports for streamcast.
///
/// # Usage
///
/// ```rust,ignore
/// use streamcast::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Args, Connection, DispatchCallback, DispatchFlow, DispatchHandle, Facets, Lifecycle,
        Method, ResultFilter, Stream, StreamError, StreamKind, StreamType, Streams, Tag,
    };

    #[cfg(feature = "macros")]
    pub use crate::stream;
}

#[cfg(feature = "macros")]
pub use streamcast_macros::{Stream, stream};
