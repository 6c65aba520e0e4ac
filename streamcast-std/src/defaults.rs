//! # Default Streams
//!
//! A stream type without registered members can fall back to a default
//! implementation. Bindings map stream types to implementations; the active
//! [`DefaultStreamFactory`] decides how instances are produced and kept.
//!
//! | Factory | Instances |
//! |---------|-----------|
//! | [`CachingDefaultFactory`] | one per (stream type, implementation), kept until unbound |
//! | [`WeakDefaultFactory`] | reused while some caller still holds one |
//! | [`FreshDefaultFactory`] | new instance on every round |
//!
//! Default instances are never registered: they have no
//! [`Connection`](crate::connection::Connection) and sit at priority 0.

use crate::registry::Streams;
use parking_lot::Mutex;
use std::{any::type_name, collections::HashMap, fmt, sync::Arc};
use streamcast_core::{
    CreateParam, DefaultBinding, DefaultStreamFactory, ImplType, Stream, StreamError, StreamKind,
    StreamObject, StreamType, WeakStreamObject,
};

type CacheKey = (StreamType, ImplType);

// ============================================================================
// Factories
// ============================================================================

/// Keeps one instance per stream type and implementation.
#[derive(Default)]
pub struct CachingDefaultFactory {
    cache: Mutex<HashMap<CacheKey, StreamObject>>,
}

impl CachingDefaultFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Drop every cached instance.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl DefaultStreamFactory for CachingDefaultFactory {
    fn create(&self, param: &CreateParam<'_>) -> Option<StreamObject> {
        let key = param.key();
        if let Some(object) = self.cache.lock().get(&key) {
            return Some(object.clone());
        }
        // construct outside the lock, first insert wins
        let object = param.binding.instantiate();
        Some(self.cache.lock().entry(key).or_insert(object).clone())
    }

    fn release(&self, param: &CreateParam<'_>) {
        let removed = self.cache.lock().remove(&param.key());
        drop(removed);
    }
}

impl fmt::Debug for CachingDefaultFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingDefaultFactory")
            .field("cached", &self.len())
            .finish()
    }
}

/// Reuses an instance only while something else keeps it alive.
#[derive(Default)]
pub struct WeakDefaultFactory {
    cache: Mutex<HashMap<CacheKey, WeakStreamObject>>,
}

impl WeakDefaultFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DefaultStreamFactory for WeakDefaultFactory {
    fn create(&self, param: &CreateParam<'_>) -> Option<StreamObject> {
        let key = param.key();
        if let Some(object) = self.cache.lock().get(&key).and_then(WeakStreamObject::upgrade) {
            return Some(object);
        }
        let object = param.binding.instantiate();
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&key).and_then(WeakStreamObject::upgrade) {
            return Some(existing);
        }
        cache.insert(key, object.downgrade());
        Some(object)
    }

    fn release(&self, param: &CreateParam<'_>) {
        self.cache.lock().remove(&param.key());
    }
}

impl fmt::Debug for WeakDefaultFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDefaultFactory").finish_non_exhaustive()
    }
}

/// Builds a new instance for every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreshDefaultFactory;

impl DefaultStreamFactory for FreshDefaultFactory {
    fn create(&self, param: &CreateParam<'_>) -> Option<StreamObject> {
        Some(param.binding.instantiate())
    }
}

// ============================================================================
// Registry operations
// ============================================================================

impl Streams {
    /// Bind `X` as the default for every stream type it realizes.
    ///
    /// Replaces earlier bindings for those types. Returns the bound types.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidArgument`] if `X` realizes no stream trait.
    pub fn bind_default<X: Stream + Default>(&self) -> Result<Vec<StreamType>, StreamError> {
        let stream_types = DefaultBinding::stream_types_of::<X>();
        if stream_types.is_empty() {
            return Err(StreamError::invalid_argument(format!(
                "`{}` realizes no stream trait",
                type_name::<X>()
            )));
        }
        let binding = DefaultBinding::of::<X>();
        for stream_type in &stream_types {
            self.install_default(*stream_type, binding);
        }
        Ok(stream_types)
    }

    /// Bind `X` as the default for the stream trait `S` only.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidArgument`] if `X` does not realize `S`.
    pub fn bind_default_for<S, X>(&self) -> Result<(), StreamError>
    where
        S: ?Sized + StreamKind,
        X: Stream + Default,
    {
        if !DefaultBinding::realizes::<X, S>() {
            return Err(StreamError::invalid_argument(format!(
                "`{}` does not realize `{}`",
                type_name::<X>(),
                S::NAME
            )));
        }
        self.install_default(StreamType::of::<S>(), DefaultBinding::of::<X>());
        Ok(())
    }

    /// Remove every default binding that points at `X`.
    ///
    /// Returns the stream types that lost their default.
    pub fn unbind_default<X: Stream>(&self) -> Vec<StreamType> {
        let impl_type = ImplType::of::<X>();
        let (removed, factory) = {
            let mut defaults = self.shared.defaults.write();
            let removed: Vec<(StreamType, DefaultBinding)> = defaults
                .bindings
                .iter()
                .filter(|(_, binding)| binding.impl_type() == impl_type)
                .map(|(stream_type, binding)| (*stream_type, *binding))
                .collect();
            for (stream_type, _) in &removed {
                defaults.bindings.remove(stream_type);
            }
            (removed, Arc::clone(&defaults.factory))
        };

        for (stream_type, binding) in &removed {
            factory.release(&CreateParam {
                stream_type: *stream_type,
                binding,
            });
            trace_event!(
                self,
                stream = %stream_type,
                default_type = impl_type.name(),
                "default unbound"
            );
        }
        removed.into_iter().map(|(stream_type, _)| stream_type).collect()
    }

    /// Implementation bound as the default for `S`.
    pub fn default_binding<S: ?Sized + StreamKind>(&self) -> Option<ImplType> {
        self.shared
            .defaults
            .read()
            .bindings
            .get(&StreamType::of::<S>())
            .map(DefaultBinding::impl_type)
    }

    /// Replace the factory producing default instances.
    ///
    /// Instances the previous factory handed out are unaffected.
    pub fn set_default_factory(&self, factory: impl DefaultStreamFactory + 'static) {
        self.shared.defaults.write().factory = Arc::new(factory);
    }

    /// Resolve the default instance for `stream_type`.
    ///
    /// Returns `None` when no default is bound.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidState`] if the factory produced nothing, or an
    /// instance that does not realize `stream_type`.
    pub fn resolve_default(
        &self,
        stream_type: StreamType,
    ) -> Result<Option<StreamObject>, StreamError> {
        let (binding, factory) = {
            let defaults = self.shared.defaults.read();
            let Some(binding) = defaults.bindings.get(&stream_type) else {
                return Ok(None);
            };
            (*binding, Arc::clone(&defaults.factory))
        };

        let param = CreateParam {
            stream_type,
            binding: &binding,
        };
        let object = factory.create(&param).ok_or_else(|| {
            StreamError::invalid_state(format!(
                "default factory produced no `{}` for `{stream_type}`",
                binding.impl_type().name()
            ))
        })?;
        if !object.realizes(stream_type) {
            return Err(StreamError::invalid_state(format!(
                "default factory produced `{}`, which does not realize `{stream_type}`",
                object.type_name()
            )));
        }
        trace_event!(
            self,
            stream = %stream_type,
            default_type = object.type_name(),
            "default stream"
        );
        Ok(Some(object))
    }

    fn install_default(&self, stream_type: StreamType, binding: DefaultBinding) {
        let (replaced, factory) = {
            let mut defaults = self.shared.defaults.write();
            let replaced = defaults.bindings.insert(stream_type, binding);
            (replaced, Arc::clone(&defaults.factory))
        };
        if let Some(old) = replaced.filter(|old| old.impl_type() != binding.impl_type()) {
            factory.release(&CreateParam {
                stream_type,
                binding: &old,
            });
        }
        trace_event!(
            self,
            stream = %stream_type,
            default_type = binding.impl_type().name(),
            "default bound"
        );
    }
}
