//! # Streams and Stream Types
//!
//! A *stream trait* is an ordinary object-safe trait whose calls can be
//! multicast. `dyn Trait` implements [`StreamKind`], which is all the registry
//! needs to key registrations by trait.
//!
//! A *stream* is a concrete object implementing [`Stream`]. It declares the
//! stream traits it realizes through [`Stream::facets`], so one object may be
//! registered under several stream types at once.
//!
//! ```rust,ignore
//! trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! impl StreamKind for dyn Greeter {
//!     const NAME: &'static str = "Greeter";
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self, name: &str) -> String {
//!         format!("hello {name}")
//!     }
//! }
//!
//! impl Stream for English {
//!     fn facets(facets: &mut Facets<Self>) {
//!         facets.add::<dyn Greeter>(|s| s);
//!     }
//! }
//! ```

use crate::tag::Tag;
use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Weak},
};

/// Identity of a stream trait.
///
/// Implemented for `dyn Trait`, usually by the `#[stream]` attribute.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a stream trait",
    label = "missing `StreamKind` implementation",
    note = "Annotate the trait with `#[streamcast::stream]` or implement `StreamKind` for `dyn Trait`."
)]
pub trait StreamKind: Send + Sync + 'static {
    /// Human readable trait name used in traces and errors.
    const NAME: &'static str;
}

/// Runtime descriptor of a stream trait.
///
/// Two descriptors are equal when they describe the same `dyn Trait`.
#[derive(Clone, Copy)]
pub struct StreamType {
    id: TypeId,
    name: &'static str,
}

impl StreamType {
    /// Descriptor of the stream trait `S`.
    pub fn of<S: ?Sized + StreamKind>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: S::NAME,
        }
    }

    /// The trait name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether this descriptor describes `S`.
    pub fn is<S: ?Sized + StreamKind>(&self) -> bool {
        self.id == TypeId::of::<S>()
    }
}

impl PartialEq for StreamType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamType {}

impl Hash for StreamType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamType({})", self.name)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Object identity of a stream.
///
/// Derived from the address of the shared allocation, so `StreamId::of(&*arc)`
/// and `StreamId::of_arc(&arc)` agree. Structural equality never plays a role.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(usize);

impl StreamId {
    /// Identity of the object behind a reference.
    pub fn of<X: ?Sized>(stream: &X) -> Self {
        Self(stream as *const X as *const () as usize)
    }

    /// Identity of the object behind an `Arc`.
    pub fn of_arc<X: ?Sized>(stream: &Arc<X>) -> Self {
        Self(Arc::as_ptr(stream) as *const () as usize)
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({:#x})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A concrete object realizing one or more stream traits.
///
/// `Stream` itself is not a stream trait: it cannot be dispatched on, and
/// dispatch handles never implement it.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Stream`",
    label = "missing `Stream` implementation",
    note = "Implement `Stream::facets` or use `#[derive(streamcast::Stream)]` to list the stream traits `{Self}` realizes."
)]
pub trait Stream: Send + Sync + 'static {
    /// Declare every stream trait this type realizes.
    fn facets(facets: &mut Facets<Self>)
    where
        Self: Sized;

    /// Tag used by tag-scoped dispatch handles for `stream_type`.
    ///
    /// Only implementations call or override this; a dispatch handle has no
    /// way to forward it.
    fn tag_for_stream(&self, stream_type: StreamType) -> Option<Tag> {
        let _ = stream_type;
        None
    }
}

type Upcast<X> = Box<dyn Fn(&Arc<X>) -> Arc<dyn Any + Send + Sync>>;

/// The set of stream traits realized by `X`.
///
/// Adding the same trait twice is a no-op.
pub struct Facets<X> {
    entries: Vec<(StreamType, Upcast<X>)>,
}

impl<X: Stream> Facets<X> {
    /// Collect the facets `X` declares.
    pub fn of() -> Self {
        let mut facets = Self {
            entries: Vec::new(),
        };
        X::facets(&mut facets);
        facets
    }

    /// Declare that `X` realizes the stream trait `S`.
    ///
    /// `upcast` is almost always the identity closure `|s| s`, which the
    /// compiler coerces from `Arc<X>` to `Arc<dyn Trait>`.
    pub fn add<S>(&mut self, upcast: fn(Arc<X>) -> Arc<S>) -> &mut Self
    where
        S: ?Sized + StreamKind,
    {
        let stream_type = StreamType::of::<S>();
        if !self.contains(stream_type) {
            self.entries.push((
                stream_type,
                Box::new(move |stream: &Arc<X>| {
                    Arc::new(upcast(Arc::clone(stream))) as Arc<dyn Any + Send + Sync>
                }),
            ));
        }
        self
    }

    /// Check whether `stream_type` was declared.
    pub fn contains(&self, stream_type: StreamType) -> bool {
        self.entries.iter().any(|(ty, _)| *ty == stream_type)
    }

    /// Declared stream types in declaration order.
    pub fn types(&self) -> Vec<StreamType> {
        self.entries.iter().map(|(ty, _)| *ty).collect()
    }

    /// Number of declared stream types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct ObjectInner {
    id: StreamId,
    type_name: &'static str,
    stream: Arc<dyn Stream>,
    facets: Vec<(StreamType, Arc<dyn Any + Send + Sync>)>,
}

/// A type-erased stream together with its upcast facets.
///
/// Cloning is O(1).
#[derive(Clone)]
pub struct StreamObject {
    inner: Arc<ObjectInner>,
}

impl StreamObject {
    /// Erase a concrete stream.
    pub fn new<X: Stream>(stream: Arc<X>) -> Self {
        let facets = Facets::<X>::of()
            .entries
            .iter()
            .map(|(ty, upcast)| (*ty, upcast(&stream)))
            .collect();
        let id = StreamId::of_arc(&stream);
        Self {
            inner: Arc::new(ObjectInner {
                id,
                type_name: std::any::type_name::<X>(),
                stream,
                facets,
            }),
        }
    }

    /// Identity of the underlying stream.
    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    /// Name of the concrete stream type.
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Stream types realized by the underlying stream.
    pub fn stream_types(&self) -> Vec<StreamType> {
        self.inner.facets.iter().map(|(ty, _)| *ty).collect()
    }

    /// Check whether the underlying stream realizes `stream_type`.
    pub fn realizes(&self, stream_type: StreamType) -> bool {
        self.inner.facets.iter().any(|(ty, _)| *ty == stream_type)
    }

    /// Borrow the facet for `S`.
    pub fn facet_ref<S: ?Sized + StreamKind>(&self) -> Option<&S> {
        let stream_type = StreamType::of::<S>();
        self.inner
            .facets
            .iter()
            .find(|(ty, _)| *ty == stream_type)
            .and_then(|(_, facet)| facet.downcast_ref::<Arc<S>>())
            .map(|facet| &**facet)
    }

    /// Clone the facet for `S`.
    pub fn facet<S: ?Sized + StreamKind>(&self) -> Option<Arc<S>> {
        let stream_type = StreamType::of::<S>();
        self.inner
            .facets
            .iter()
            .find(|(ty, _)| *ty == stream_type)
            .and_then(|(_, facet)| facet.downcast_ref::<Arc<S>>())
            .cloned()
    }

    /// The tag the stream declares for `stream_type`.
    pub fn tag_for(&self, stream_type: StreamType) -> Option<Tag> {
        self.inner.stream.tag_for_stream(stream_type)
    }

    /// Create a weak reference that does not keep the stream alive.
    pub fn downgrade(&self) -> WeakStreamObject {
        WeakStreamObject {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Check whether both objects wrap the same stream.
    pub fn same_stream(&self, other: &StreamObject) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for StreamObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamObject")
            .field("id", &self.inner.id)
            .field("type", &self.inner.type_name)
            .finish()
    }
}

/// Weak counterpart of [`StreamObject`].
#[derive(Clone)]
pub struct WeakStreamObject {
    inner: Weak<ObjectInner>,
}

impl WeakStreamObject {
    /// Upgrade if the stream is still alive.
    pub fn upgrade(&self) -> Option<StreamObject> {
        self.inner.upgrade().map(|inner| StreamObject { inner })
    }
}

impl fmt::Debug for WeakStreamObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakStreamObject")
    }
}
