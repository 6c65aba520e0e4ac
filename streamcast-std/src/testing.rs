//! Testing utilities for streamcast.
//!
//! # Features
//!
//! - [`CallLog`]: A shared, clonable log that streams and callbacks write to
//! - [`RecordingCallback`]: A callback that logs every step of a round
//! - [`StopAt`]: A callback that ends a round at a given step

use parking_lot::Mutex;
use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use streamcast_core::{Args, DispatchCallback, DispatchFlow, Method};

// ============================================================================
// Call Log
// ============================================================================

/// A shared log of entries in insertion order.
///
/// # Example
///
/// ```rust,ignore
/// let log = CallLog::new();
/// streams.register(&Arc::new(Recorder::new("a", log.clone())))?;
///
/// handle.notify(1);
/// assert_eq!(log.entries(), vec!["a:notify"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Get a copy of the entries.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Get the number of entries.
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ============================================================================
// Recording Callback
// ============================================================================

/// A callback that logs `before:<method>` and `after:<method>` entries and
/// always continues.
#[derive(Debug, Clone, Default)]
pub struct RecordingCallback {
    log: CallLog,
}

impl RecordingCallback {
    /// Record into `log`.
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }

    /// The log this callback writes to.
    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

impl<S: ?Sized> DispatchCallback<S> for RecordingCallback {
    fn before_dispatch(&self, _stream: &S, method: &Method, args: &Args<'_>) -> DispatchFlow {
        if args.is_empty() {
            self.log.push(format!("before:{method}"));
        } else {
            self.log.push(format!("before:{method}{args:?}"));
        }
        DispatchFlow::Next
    }

    fn after_dispatch(
        &self,
        _stream: &S,
        method: &Method,
        _args: &Args<'_>,
        _result: &dyn Any,
    ) -> DispatchFlow {
        self.log.push(format!("after:{method}"));
        DispatchFlow::Next
    }
}

// ============================================================================
// Stop At
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Before,
    After,
}

/// A callback that ends a round at the `n`-th stream it sees (zero-based).
///
/// Calls are counted over the callback's whole life, so use one per round.
#[derive(Debug)]
pub struct StopAt {
    stage: Stage,
    at: usize,
    seen: AtomicUsize,
}

impl StopAt {
    /// Stop before invoking the `n`-th stream.
    pub fn before(n: usize) -> Self {
        Self {
            stage: Stage::Before,
            at: n,
            seen: AtomicUsize::new(0),
        }
    }

    /// Stop right after the `n`-th stream returned.
    pub fn after(n: usize) -> Self {
        Self {
            stage: Stage::After,
            at: n,
            seen: AtomicUsize::new(0),
        }
    }

    fn step(&self, stage: Stage) -> DispatchFlow {
        if stage != self.stage {
            return DispatchFlow::Next;
        }
        if self.seen.fetch_add(1, Ordering::SeqCst) == self.at {
            DispatchFlow::Stop
        } else {
            DispatchFlow::Next
        }
    }
}

impl<S: ?Sized> DispatchCallback<S> for StopAt {
    fn before_dispatch(&self, _stream: &S, _method: &Method, _args: &Args<'_>) -> DispatchFlow {
        self.step(Stage::Before)
    }

    fn after_dispatch(
        &self,
        _stream: &S,
        _method: &Method,
        _args: &Args<'_>,
        _result: &dyn Any,
    ) -> DispatchFlow {
        self.step(Stage::After)
    }
}
