//! Per-stream registration state.
//!
//! A [`Connection`] exists while its stream is registered under at least one
//! stream type. It carries the per-type priority that orders dispatch rounds
//! and the per-type break flag a stream raises to end the round it is
//! running in.

use crate::registry::Shared;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
    },
};
use streamcast_core::{StreamId, StreamKind, StreamObject, StreamType};

#[derive(Default)]
pub(crate) struct FacetState {
    pub(crate) priority: AtomicI32,
    in_flight: AtomicUsize,
    broken: AtomicBool,
}

struct ConnectionInner {
    id: StreamId,
    type_name: &'static str,
    stream_types: Vec<StreamType>,
    facets: HashMap<StreamType, FacetState>,
    registry: Weak<Shared>,
}

/// Registration state of one stream.
///
/// Cloning is O(1); clones share the same state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub(crate) fn new(object: &StreamObject, registry: Weak<Shared>) -> Self {
        let stream_types = object.stream_types();
        let facets = stream_types
            .iter()
            .map(|ty| (*ty, FacetState::default()))
            .collect();
        Self {
            inner: Arc::new(ConnectionInner {
                id: object.id(),
                type_name: object.type_name(),
                stream_types,
                facets,
                registry,
            }),
        }
    }

    /// Identity of the connected stream.
    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    /// Name of the connected stream's concrete type.
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Stream types the stream is registered under.
    pub fn stream_types(&self) -> &[StreamType] {
        &self.inner.stream_types
    }

    /// Priority for `stream_type`; `0` when the stream does not realize it.
    pub fn priority(&self, stream_type: StreamType) -> i32 {
        self.inner
            .facets
            .get(&stream_type)
            .map_or(0, |facet| facet.priority.load(Ordering::Acquire))
    }

    /// Priority for the stream trait `S`.
    pub fn priority_of<S: ?Sized + StreamKind>(&self) -> i32 {
        self.priority(StreamType::of::<S>())
    }

    /// Change the priority for `stream_type`. Higher runs first.
    ///
    /// The new order applies from the next dispatch round on. Returns `false`
    /// when the stream does not realize `stream_type`.
    pub fn set_priority(&self, stream_type: StreamType, priority: i32) -> bool {
        let Some(facet) = self.inner.facets.get(&stream_type) else {
            return false;
        };
        match self.inner.registry.upgrade() {
            Some(shared) => shared.change_priority(self, stream_type, facet, priority),
            None => facet.priority.store(priority, Ordering::Release),
        }
        true
    }

    /// Change the priority for the stream trait `S`.
    pub fn set_priority_of<S: ?Sized + StreamKind>(&self, priority: i32) -> bool {
        self.set_priority(StreamType::of::<S>(), priority)
    }

    /// End the dispatch round over `stream_type` after the current call.
    ///
    /// Only effective while the stream is being invoked for `stream_type`;
    /// returns whether the request was recorded.
    pub fn break_dispatch(&self, stream_type: StreamType) -> bool {
        let Some(facet) = self.inner.facets.get(&stream_type) else {
            return false;
        };
        if facet.in_flight.load(Ordering::Acquire) == 0 {
            return false;
        }
        facet.broken.store(true, Ordering::Release);
        true
    }

    /// End the dispatch round over the stream trait `S` after the current call.
    pub fn break_dispatch_of<S: ?Sized + StreamKind>(&self) -> bool {
        self.break_dispatch(StreamType::of::<S>())
    }

    /// Check whether a break was requested for the call in flight.
    pub fn should_break_dispatch(&self, stream_type: StreamType) -> bool {
        self.inner
            .facets
            .get(&stream_type)
            .is_some_and(|facet| facet.broken.load(Ordering::Acquire))
    }

    /// Mark the stream as being invoked for `stream_type`.
    pub(crate) fn arm(&self, stream_type: StreamType) -> Option<Armed<'_>> {
        let facet = self.inner.facets.get(&stream_type)?;
        facet.in_flight.fetch_add(1, Ordering::AcqRel);
        let outer = facet.broken.swap(false, Ordering::AcqRel);
        Some(Armed { facet, outer })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("type", &self.inner.type_name)
            .field("stream_types", &self.inner.stream_types)
            .finish()
    }
}

/// One invocation in flight; hands the break flag back to the enclosing
/// invocation when dropped.
pub(crate) struct Armed<'a> {
    facet: &'a FacetState,
    /// Break request of the invocation this one is nested in.
    outer: bool,
}

impl Armed<'_> {
    pub(crate) fn should_break(&self) -> bool {
        self.facet.broken.load(Ordering::Acquire)
    }
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        self.facet.broken.store(self.outer, Ordering::Release);
        self.facet.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
