//! # Lifecycle Bindings
//!
//! Ties a stream's registration to the lifecycle of something else, such as
//! a UI element or a session. The host drives the [`Lifecycle`]; the registry
//! follows it:
//!
//! | Transition | Effect on bound streams |
//! |------------|-------------------------|
//! | `attach()` | registered |
//! | `detach()` | unregistered, binding kept |
//! | `finish()` | unregistered, binding dropped |
//!
//! While bound, a stream cannot be registered or unregistered by hand.

use crate::registry::{Shared, Streams};
use parking_lot::Mutex;
use std::{
    any::type_name,
    fmt,
    sync::{Arc, Weak},
};
use streamcast_core::{Stream, StreamError, StreamId, StreamObject};

/// Phase of a [`Lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not attached; bound streams are unregistered.
    #[default]
    Detached,
    /// Attached; bound streams are registered.
    Attached,
    /// Terminal; bindings are gone.
    Finished,
}

struct LifecycleState {
    phase: Phase,
    watchers: Vec<Arc<Watcher>>,
}

/// Host-driven attach/detach lifecycle.
///
/// Cloning is O(1); clones drive the same lifecycle.
#[derive(Clone)]
pub struct Lifecycle {
    state: Arc<Mutex<LifecycleState>>,
}

impl Lifecycle {
    /// Create a detached lifecycle.
    pub fn new() -> Self {
        Self::with_phase(Phase::Detached)
    }

    /// Create a lifecycle that starts attached.
    pub fn attached() -> Self {
        Self::with_phase(Phase::Attached)
    }

    fn with_phase(phase: Phase) -> Self {
        Self {
            state: Arc::new(Mutex::new(LifecycleState {
                phase,
                watchers: Vec::new(),
            })),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Check whether the lifecycle is attached.
    pub fn is_attached(&self) -> bool {
        self.phase() == Phase::Attached
    }

    /// Check whether the lifecycle has finished.
    pub fn is_finished(&self) -> bool {
        self.phase() == Phase::Finished
    }

    /// Enter [`Phase::Attached`]. No-op once finished.
    pub fn attach(&self) {
        self.transition(Phase::Attached);
    }

    /// Enter [`Phase::Detached`]. No-op once finished.
    pub fn detach(&self) {
        self.transition(Phase::Detached);
    }

    /// Enter [`Phase::Finished`] and release every binding.
    pub fn finish(&self) {
        self.transition(Phase::Finished);
    }

    /// Check whether both values drive the same lifecycle.
    pub fn ptr_eq(&self, other: &Lifecycle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn transition(&self, phase: Phase) {
        let watchers = {
            let mut state = self.state.lock();
            if state.phase == Phase::Finished || state.phase == phase {
                return;
            }
            state.phase = phase;
            if phase == Phase::Finished {
                std::mem::take(&mut state.watchers)
            } else {
                state.watchers.clone()
            }
        };
        // watchers take registry locks, never while holding ours
        for watcher in watchers {
            watcher.notify(self, phase);
        }
    }

    /// Returns `false` once finished; the watcher would never hear from us.
    fn watch(&self, watcher: Arc<Watcher>) -> bool {
        let mut state = self.state.lock();
        if state.phase == Phase::Finished {
            return false;
        }
        state.watchers.push(watcher);
        true
    }

    fn unwatch(&self, watcher: &Arc<Watcher>) {
        self.state
            .lock()
            .watchers
            .retain(|existing| !Arc::ptr_eq(existing, watcher));
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Lifecycle")
            .field("phase", &state.phase)
            .field("watchers", &state.watchers.len())
            .finish()
    }
}

/// Follows one lifecycle on behalf of one bound stream.
struct Watcher {
    registry: Weak<Shared>,
    id: StreamId,
}

impl Watcher {
    fn notify(&self, lifecycle: &Lifecycle, phase: Phase) {
        let Some(shared) = self.registry.upgrade() else {
            return;
        };
        let streams = Streams::from_shared(shared);
        let mut bindings = streams.shared.bindings.lock();
        let current = bindings
            .get(&self.id)
            .is_some_and(|binding| binding.lifecycle.ptr_eq(lifecycle));
        if !current {
            return;
        }

        match phase {
            Phase::Attached => {
                if let Some(binding) = bindings.get(&self.id) {
                    streams.register_object(&binding.object);
                }
            }
            Phase::Detached => {
                if let Some(binding) = bindings.get(&self.id) {
                    streams.unregister_object(self.id, &binding.object.stream_types());
                }
            }
            Phase::Finished => {
                if let Some(binding) = bindings.remove(&self.id) {
                    streams.release(binding);
                }
            }
        }
    }
}

pub(crate) struct Binding {
    object: StreamObject,
    lifecycle: Lifecycle,
    watcher: Arc<Watcher>,
}

// ============================================================================
// Registry operations
// ============================================================================

impl Streams {
    /// Bind `stream` to `lifecycle`.
    ///
    /// The stream is registered now if the lifecycle is attached and then
    /// follows it. Binding to another lifecycle first releases the old
    /// binding. Returns `false` if the stream realizes no stream trait.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidArgument`] if `lifecycle` has already finished.
    pub fn bind<X: Stream>(
        &self,
        stream: &Arc<X>,
        lifecycle: &Lifecycle,
    ) -> Result<bool, StreamError> {
        let object = StreamObject::new(Arc::clone(stream));
        if object.stream_types().is_empty() {
            return Ok(false);
        }
        if lifecycle.is_finished() {
            return Err(finished_lifecycle::<X>());
        }

        let id = object.id();
        let mut bindings = self.shared.bindings.lock();
        if let Some(existing) = bindings.get(&id) {
            if existing.lifecycle.ptr_eq(lifecycle) {
                return Ok(true);
            }
        }

        let watcher = Arc::new(Watcher {
            registry: Arc::downgrade(&self.shared),
            id,
        });
        // the phase may have moved on since the check above
        if !lifecycle.watch(Arc::clone(&watcher)) {
            return Err(finished_lifecycle::<X>());
        }
        if let Some(previous) = bindings.remove(&id) {
            self.release(previous);
        }
        if lifecycle.is_attached() {
            self.register_object(&object);
        }
        trace_event!(self, target_type = object.type_name(), %id, "bind");
        bindings.insert(
            id,
            Binding {
                object,
                lifecycle: lifecycle.clone(),
                watcher,
            },
        );
        Ok(true)
    }

    /// Release the binding of `stream`, unregistering it.
    ///
    /// Returns whether a binding existed.
    pub fn unbind<X: Stream>(&self, stream: &X) -> bool {
        let id = StreamId::of(stream);
        let Some(binding) = self.shared.bindings.lock().remove(&id) else {
            return false;
        };
        self.release(binding);
        true
    }

    /// Check whether `stream` is bound to a lifecycle.
    pub fn is_bound<X: Stream>(&self, stream: &X) -> bool {
        self.shared
            .bindings
            .lock()
            .contains_key(&StreamId::of(stream))
    }

    fn release(&self, binding: Binding) {
        binding.lifecycle.unwatch(&binding.watcher);
        let id = binding.object.id();
        self.unregister_object(id, &binding.object.stream_types());
        trace_event!(self, target_type = binding.object.type_name(), %id, "unbind");
    }
}

fn finished_lifecycle<X>() -> StreamError {
    StreamError::invalid_argument(format!(
        "cannot bind `{}` to a finished lifecycle",
        type_name::<X>()
    ))
}
