//! The stream registry.
//!
//! [`Streams`] maps every stream type to the streams registered under it and
//! hands out [`DispatchHandle`]s that fan calls out to them.
//!
//! # Ordering
//!
//! Members of a stream type are dispatched by descending priority; equal
//! priorities keep registration order. Membership and priority changes only
//! mark the type as dirty. The next dispatch round re-sorts once and
//! publishes an immutable snapshot, so rounds already in flight keep the
//! order they started with.
//!
//! # Locking
//!
//! Lock order is `bindings` -> `state`. The default-binding table is only
//! held while copying out of it, never while a factory or a stream runs.

use crate::{
    binder::Binding,
    connection::{Connection, FacetState},
    defaults::CachingDefaultFactory,
    dispatch::{DispatchHandle, HandleBuilder},
};
use lazy_static::lazy_static;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::{
    cmp::Reverse,
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use streamcast_core::{
    DefaultBinding, DefaultStreamFactory, Facets, Stream, StreamError, StreamId, StreamKind,
    StreamObject, StreamType,
};

lazy_static! {
    static ref GLOBAL: Streams = Streams::new();
}

// ============================================================================
// Internal state
// ============================================================================

/// One stream as seen by a dispatch round.
#[derive(Clone)]
pub(crate) struct Member {
    pub(crate) object: StreamObject,
    /// `None` for default instances, which are never registered.
    pub(crate) connection: Option<Connection>,
}

impl Member {
    fn priority(&self, stream_type: StreamType) -> i32 {
        self.connection
            .as_ref()
            .map_or(0, |connection| connection.priority(stream_type))
    }
}

/// Members of one stream type.
struct Entry {
    /// Registration order.
    members: Vec<Member>,
    /// Dispatch order, valid while `dirty` is unset.
    ordered: Arc<[Member]>,
    dirty: bool,
}

impl Entry {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            ordered: Arc::from(Vec::new()),
            dirty: false,
        }
    }

    fn contains(&self, id: StreamId) -> bool {
        self.members.iter().any(|member| member.object.id() == id)
    }

    fn insert(&mut self, member: Member) -> bool {
        if self.contains(member.object.id()) {
            return false;
        }
        self.members.push(member);
        self.dirty = true;
        true
    }

    fn remove(&mut self, id: StreamId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member.object.id() != id);
        if self.members.len() == before {
            return false;
        }
        // removal keeps the relative order of the rest
        self.ordered = self
            .ordered
            .iter()
            .filter(|member| member.object.id() != id)
            .cloned()
            .collect();
        true
    }

    fn resort(&mut self, stream_type: StreamType) {
        let mut members = self.members.clone();
        members.sort_by_key(|member| Reverse(member.priority(stream_type)));
        self.ordered = Arc::from(members);
        self.dirty = false;
    }
}

#[derive(Default)]
pub(crate) struct State {
    entries: HashMap<StreamType, Entry>,
    connections: HashMap<StreamId, Connection>,
}

pub(crate) struct Defaults {
    pub(crate) bindings: HashMap<StreamType, DefaultBinding>,
    pub(crate) factory: Arc<dyn DefaultStreamFactory>,
}

pub(crate) struct Shared {
    state: RwLock<State>,
    turns: Mutex<HashMap<StreamType, Arc<ReentrantMutex<()>>>>,
    pub(crate) defaults: RwLock<Defaults>,
    pub(crate) bindings: Mutex<HashMap<StreamId, Binding>>,
    debug: AtomicBool,
}

impl Shared {
    pub(crate) fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub(crate) fn change_priority(
        &self,
        connection: &Connection,
        stream_type: StreamType,
        facet: &FacetState,
        priority: i32,
    ) {
        let mut state = self.state.write();
        let previous = facet.priority.swap(priority, Ordering::AcqRel);
        if previous == priority {
            return;
        }
        if let Some(entry) = state.entries.get_mut(&stream_type) {
            entry.dirty |= entry.contains(connection.id());
        }
        trace_event!(
            self,
            stream = %stream_type,
            target_type = connection.type_name(),
            previous,
            priority,
            "priority changed"
        );
    }
}

// ============================================================================
// Streams
// ============================================================================

/// Registry of streams keyed by stream type.
///
/// Cloning is O(1); clones share the same registry. A process-wide instance
/// is available through [`Streams::global`].
#[derive(Clone)]
pub struct Streams {
    pub(crate) shared: Arc<Shared>,
}

impl Streams {
    /// Create an empty registry with caching default instances.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a registry.
    pub fn builder() -> StreamsBuilder {
        StreamsBuilder::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Streams {
        &GLOBAL
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Check whether both values refer to the same registry.
    pub fn ptr_eq(&self, other: &Streams) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Check whether dispatch tracing is enabled.
    pub fn is_debug(&self) -> bool {
        self.shared.is_debug()
    }

    /// Enable or disable dispatch tracing.
    ///
    /// When enabled, registry changes and dispatch rounds emit `DEBUG` events
    /// through `tracing`.
    pub fn set_debug(&self, debug: bool) {
        self.shared.debug.store(debug, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------------

    /// Register `stream` under every stream type it realizes.
    ///
    /// Returns the types the stream is now registered under. Registering twice
    /// is a no-op, and a stream realizing nothing registers nowhere.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidOperation`] if the stream is bound to a
    /// [`Lifecycle`](crate::binder::Lifecycle).
    pub fn register<X: Stream>(&self, stream: &Arc<X>) -> Result<Vec<StreamType>, StreamError> {
        let bindings = self.shared.bindings.lock();
        let id = StreamId::of_arc(stream);
        if bindings.contains_key(&id) {
            return Err(StreamError::invalid_operation(format!(
                "`{}` is bound to a lifecycle and cannot be registered manually",
                std::any::type_name::<X>()
            )));
        }
        Ok(self.register_object(&StreamObject::new(Arc::clone(stream))))
    }

    /// Remove `stream` from every stream type.
    ///
    /// Returns the types it was removed from; empty if it was not registered.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidOperation`] if the stream is bound to a
    /// [`Lifecycle`](crate::binder::Lifecycle).
    pub fn unregister<X: Stream>(&self, stream: &Arc<X>) -> Result<Vec<StreamType>, StreamError> {
        let bindings = self.shared.bindings.lock();
        let id = StreamId::of_arc(stream);
        if bindings.contains_key(&id) {
            return Err(StreamError::invalid_operation(format!(
                "`{}` is bound to a lifecycle and cannot be unregistered manually",
                std::any::type_name::<X>()
            )));
        }
        Ok(self.unregister_object(id, &Facets::<X>::of().types()))
    }

    pub(crate) fn register_object(&self, object: &StreamObject) -> Vec<StreamType> {
        let stream_types = object.stream_types();
        if stream_types.is_empty() {
            return stream_types;
        }

        let mut state = self.shared.state.write();
        let connection = state
            .connections
            .entry(object.id())
            .or_insert_with(|| Connection::new(object, Arc::downgrade(&self.shared)))
            .clone();
        for stream_type in &stream_types {
            let inserted = state
                .entries
                .entry(*stream_type)
                .or_insert_with(Entry::new)
                .insert(Member {
                    object: object.clone(),
                    connection: Some(connection.clone()),
                });
            if inserted {
                trace_event!(
                    self,
                    stream = %stream_type,
                    target_type = object.type_name(),
                    id = %object.id(),
                    "register"
                );
            }
        }
        stream_types
    }

    pub(crate) fn unregister_object(
        &self,
        id: StreamId,
        stream_types: &[StreamType],
    ) -> Vec<StreamType> {
        let mut state = self.shared.state.write();
        let Some(connection) = state.connections.remove(&id) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        for stream_type in stream_types {
            let Some(entry) = state.entries.get_mut(stream_type) else {
                continue;
            };
            if !entry.remove(id) {
                continue;
            }
            if entry.members.is_empty() {
                state.entries.remove(stream_type);
            }
            trace_event!(
                self,
                stream = %stream_type,
                target_type = connection.type_name(),
                %id,
                "unregister"
            );
            removed.push(*stream_type);
        }
        removed
    }

    /// Connection of a registered stream.
    ///
    /// Pass the stream itself (`&*arc` or `self` inside an implementation).
    pub fn connection<X: Stream>(&self, stream: &X) -> Option<Connection> {
        self.connection_by_id(StreamId::of(stream))
    }

    /// Connection of the stream with identity `id`.
    pub fn connection_by_id(&self, id: StreamId) -> Option<Connection> {
        self.shared.state.read().connections.get(&id).cloned()
    }

    /// Check whether `stream` is registered under any stream type.
    pub fn contains<X: Stream>(&self, stream: &X) -> bool {
        self.shared
            .state
            .read()
            .connections
            .contains_key(&StreamId::of(stream))
    }

    /// Number of streams registered under `S`. Default instances are not
    /// counted.
    pub fn count_of<S: ?Sized + StreamKind>(&self) -> usize {
        self.shared
            .state
            .read()
            .entries
            .get(&StreamType::of::<S>())
            .map_or(0, |entry| entry.members.len())
    }

    /// Streams a dispatch over `S` would reach right now, in dispatch order.
    ///
    /// Falls back to the default instance when nothing is registered.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidState`] if the default factory misbehaves.
    pub fn lookup<S: ?Sized + StreamKind>(&self) -> Result<Vec<Arc<S>>, StreamError> {
        Ok(self
            .targets(StreamType::of::<S>())?
            .iter()
            .filter_map(|member| member.object.facet::<S>())
            .collect())
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Untagged handle over `S` without callback or filter.
    pub fn handle<S: ?Sized + StreamKind>(&self) -> DispatchHandle<S> {
        DispatchHandle::new(self.clone())
    }

    /// Configure a handle over `S`.
    pub fn handle_builder<S: ?Sized + StreamKind>(&self) -> HandleBuilder<S> {
        HandleBuilder::new(self.clone())
    }

    /// Members of `stream_type` in dispatch order, or the default instance.
    pub(crate) fn targets(&self, stream_type: StreamType) -> Result<Arc<[Member]>, StreamError> {
        if let Some(ordered) = self.ordered(stream_type) {
            return Ok(ordered);
        }
        Ok(match self.resolve_default(stream_type)? {
            Some(object) => Arc::from(vec![Member {
                object,
                connection: None,
            }]),
            None => Arc::from(Vec::new()),
        })
    }

    fn ordered(&self, stream_type: StreamType) -> Option<Arc<[Member]>> {
        {
            let state = self.shared.state.read();
            match state.entries.get(&stream_type) {
                None => return None,
                Some(entry) if !entry.dirty => return Some(Arc::clone(&entry.ordered)),
                Some(_) => {}
            }
        }

        let mut state = self.shared.state.write();
        let entry = state.entries.get_mut(&stream_type)?;
        if entry.dirty {
            entry.resort(stream_type);
            trace_event!(
                self,
                stream = %stream_type,
                order = ?entry
                    .ordered
                    .iter()
                    .map(|member| (member.object.type_name(), member.priority(stream_type)))
                    .collect::<Vec<_>>(),
                "sort"
            );
        }
        Some(Arc::clone(&entry.ordered))
    }

    /// Per-type turn lock serializing invocations of one stream type.
    pub(crate) fn turn(&self, stream_type: StreamType) -> Arc<ReentrantMutex<()>> {
        let mut turns = self.shared.turns.lock();
        Arc::clone(
            turns
                .entry(stream_type)
                .or_insert_with(|| Arc::new(ReentrantMutex::new(()))),
        )
    }
}

impl Default for Streams {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Streams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("Streams")
            .field("stream_types", &state.entries.len())
            .field("connections", &state.connections.len())
            .field("debug", &self.is_debug())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Streams`].
#[must_use = "call `build` to create the registry"]
pub struct StreamsBuilder {
    debug: bool,
    factory: Arc<dyn DefaultStreamFactory>,
}

impl Default for StreamsBuilder {
    fn default() -> Self {
        Self {
            debug: false,
            factory: Arc::new(CachingDefaultFactory::new()),
        }
    }
}

impl StreamsBuilder {
    /// Enable dispatch tracing from the start.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Use `factory` for default instances.
    pub fn default_factory(mut self, factory: impl DefaultStreamFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Use an already shared factory for default instances.
    pub fn shared_default_factory(mut self, factory: Arc<dyn DefaultStreamFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Build the registry.
    pub fn build(self) -> Streams {
        Streams::from_shared(Arc::new(Shared {
            state: RwLock::new(State::default()),
            turns: Mutex::new(HashMap::new()),
            defaults: RwLock::new(Defaults {
                bindings: HashMap::new(),
                factory: self.factory,
            }),
            bindings: Mutex::new(HashMap::new()),
            debug: AtomicBool::new(self.debug),
        }))
    }
}

impl fmt::Debug for StreamsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamsBuilder")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Tick: Send + Sync {
        fn tick(&self) -> u32;
    }

    impl StreamKind for dyn Tick {
        const NAME: &'static str = "Tick";
    }

    trait Tock: Send + Sync {
        fn tock(&self);
    }

    impl StreamKind for dyn Tock {
        const NAME: &'static str = "Tock";
    }

    struct Clock(u32);

    impl Tick for Clock {
        fn tick(&self) -> u32 {
            self.0
        }
    }

    impl Tock for Clock {
        fn tock(&self) {}
    }

    impl Stream for Clock {
        fn facets(facets: &mut Facets<Self>) {
            facets.add::<dyn Tick>(|s| s).add::<dyn Tock>(|s| s);
        }
    }

    struct Inert;

    impl Stream for Inert {
        fn facets(_facets: &mut Facets<Self>) {}
    }

    fn ticks(streams: &Streams) -> Vec<u32> {
        streams
            .lookup::<dyn Tick>()
            .unwrap()
            .iter()
            .map(|stream| stream.tick())
            .collect()
    }

    #[test]
    fn test_register_under_every_facet() {
        let streams = Streams::new();
        let clock = Arc::new(Clock(1));

        let types = streams.register(&clock).unwrap();
        assert_eq!(
            types,
            vec![StreamType::of::<dyn Tick>(), StreamType::of::<dyn Tock>()]
        );
        assert_eq!(streams.count_of::<dyn Tick>(), 1);
        assert_eq!(streams.count_of::<dyn Tock>(), 1);
        assert!(streams.contains(&*clock));
    }

    #[test]
    fn test_register_is_idempotent() {
        let streams = Streams::new();
        let clock = Arc::new(Clock(1));

        streams.register(&clock).unwrap();
        streams.register(&clock).unwrap();
        assert_eq!(streams.count_of::<dyn Tick>(), 1);
    }

    #[test]
    fn test_stream_without_facets_registers_nowhere() {
        let streams = Streams::new();
        let inert = Arc::new(Inert);

        assert!(streams.register(&inert).unwrap().is_empty());
        assert!(!streams.contains(&*inert));
    }

    #[test]
    fn test_unregister_removes_connection() {
        let streams = Streams::new();
        let clock = Arc::new(Clock(1));
        streams.register(&clock).unwrap();

        let removed = streams.unregister(&clock).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(streams.count_of::<dyn Tick>(), 0);
        assert!(streams.connection(&*clock).is_none());
        assert!(streams.unregister(&clock).unwrap().is_empty());
    }

    #[test]
    fn test_priority_orders_lookup() {
        let streams = Streams::new();
        let low = Arc::new(Clock(1));
        let high = Arc::new(Clock(2));
        let mid = Arc::new(Clock(3));
        for clock in [&low, &high, &mid] {
            streams.register(clock).unwrap();
        }
        assert_eq!(ticks(&streams), vec![1, 2, 3]);

        let connection = streams.connection(&*high).unwrap();
        connection.set_priority_of::<dyn Tick>(10);
        assert_eq!(ticks(&streams), vec![2, 1, 3]);

        streams
            .connection(&*mid)
            .unwrap()
            .set_priority_of::<dyn Tick>(5);
        assert_eq!(ticks(&streams), vec![2, 3, 1]);
    }

    #[test]
    fn test_priority_is_per_stream_type() {
        let streams = Streams::new();
        let clock = Arc::new(Clock(1));
        streams.register(&clock).unwrap();

        let connection = streams.connection(&*clock).unwrap();
        connection.set_priority_of::<dyn Tick>(3);
        assert_eq!(connection.priority_of::<dyn Tick>(), 3);
        assert_eq!(connection.priority_of::<dyn Tock>(), 0);
    }

    #[test]
    fn test_snapshot_survives_changes() {
        let streams = Streams::new();
        let a = Arc::new(Clock(1));
        streams.register(&a).unwrap();

        let snapshot = streams.targets(StreamType::of::<dyn Tick>()).unwrap();
        streams.register(&Arc::new(Clock(2))).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(ticks(&streams), vec![1, 2]);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Streams::global().ptr_eq(Streams::global()));
    }
}
