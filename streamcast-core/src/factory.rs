//! Default-stream fallback contracts.
//!
//! When a stream type has no registered member, the registry looks up the
//! [`DefaultBinding`] for that type and asks the active
//! [`DefaultStreamFactory`] for an instance. Whether instances are cached is
//! entirely the factory's decision.

use crate::stream::{Facets, Stream, StreamKind, StreamObject, StreamType};
use std::{
    any::{TypeId, type_name},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Identity of a concrete stream type used as a default implementation.
#[derive(Clone, Copy)]
pub struct ImplType {
    id: TypeId,
    name: &'static str,
}

impl ImplType {
    /// Identity of `X`.
    pub fn of<X: 'static>() -> Self {
        Self {
            id: TypeId::of::<X>(),
            name: type_name::<X>(),
        }
    }

    /// Name of the concrete type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ImplType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImplType {}

impl Hash for ImplType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ImplType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImplType({})", self.name)
    }
}

fn construct<X: Stream + Default>() -> StreamObject {
    StreamObject::new(Arc::new(X::default()))
}

/// A default implementation bound to one or more stream types.
#[derive(Clone, Copy)]
pub struct DefaultBinding {
    impl_type: ImplType,
    construct: fn() -> StreamObject,
}

impl DefaultBinding {
    /// Binding that builds `X` through `Default`.
    pub fn of<X: Stream + Default>() -> Self {
        Self {
            impl_type: ImplType::of::<X>(),
            construct: construct::<X>,
        }
    }

    /// Stream types `X` realizes.
    pub fn stream_types_of<X: Stream>() -> Vec<StreamType> {
        Facets::<X>::of().types()
    }

    /// Check whether `X` realizes `S`.
    pub fn realizes<X: Stream, S: ?Sized + StreamKind>() -> bool {
        Facets::<X>::of().contains(StreamType::of::<S>())
    }

    /// The bound implementation type.
    pub fn impl_type(&self) -> ImplType {
        self.impl_type
    }

    /// Build a fresh instance.
    pub fn instantiate(&self) -> StreamObject {
        (self.construct)()
    }
}

impl fmt::Debug for DefaultBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultBinding")
            .field("impl_type", &self.impl_type)
            .finish()
    }
}

/// Request for a default instance.
#[derive(Debug, Clone, Copy)]
pub struct CreateParam<'a> {
    /// The stream type that has no registered member.
    pub stream_type: StreamType,
    /// The default implementation bound to it.
    pub binding: &'a DefaultBinding,
}

impl CreateParam<'_> {
    /// Cache key for this request.
    pub fn key(&self) -> (StreamType, ImplType) {
        (self.stream_type, self.binding.impl_type())
    }
}

/// Produces default instances for stream types without registered members.
pub trait DefaultStreamFactory: Send + Sync {
    /// Produce an instance realizing `param.stream_type`.
    ///
    /// Returning `None` is a contract violation and surfaces as
    /// [`StreamError::InvalidState`](crate::StreamError::InvalidState).
    fn create(&self, param: &CreateParam<'_>) -> Option<StreamObject>;

    /// Forget any instance kept for `param`, called when the binding goes
    /// away.
    fn release(&self, param: &CreateParam<'_>) {
        let _ = param;
    }
}
