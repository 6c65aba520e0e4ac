//! # streamcast-std
//!
//! Registry and dispatch engine for the streamcast multicast dispatch
//! registry.
//!
//! This crate provides:
//! - **Registry**: [`Streams`], membership, per-type priority ordering
//! - **Dispatch**: [`DispatchHandle`] with tags, callbacks and result filters
//! - **Fallback**: default-stream bindings and factories
//! - **Lifecycle binding**: [`Lifecycle`]-driven registration
//! - **Filters** and **testing** helpers

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

/// Emit a `DEBUG` event when the registry's debug flag is on.
macro_rules! trace_event {
    ($source:expr, $($arg:tt)+) => {
        if $source.is_debug() {
            ::tracing::debug!($($arg)+);
        }
    };
}

// Re-export core contracts
pub use streamcast_core;

// Modules
pub mod binder;
pub mod connection;
pub mod defaults;
pub mod dispatch;
pub mod filters;
pub mod registry;
pub mod testing;

pub use binder::{Lifecycle, Phase};
pub use connection::Connection;
pub use defaults::{CachingDefaultFactory, FreshDefaultFactory, WeakDefaultFactory};
pub use dispatch::{DispatchHandle, HandleBuilder};
pub use registry::{Streams, StreamsBuilder};
