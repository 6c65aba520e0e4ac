//! # Dispatch Protocol
//!
//! Callbacks observe a dispatch round one stream at a time and may stop it;
//! filters reduce the results collected during the round into the value the
//! caller receives.
//!
//! # Round Shape
//!
//! ```text
//! for each matching stream (priority order):
//!     before_dispatch  -> Stop ends the round, this stream is skipped, no filter
//!     stream method
//!     after_dispatch   -> Stop ends the round after this stream
//!     break flag       -> set by the stream itself, ends the round after it
//! filter(results)      -> only with at least one collected result
//! ```

use crate::method::{Args, Method};
use std::any::Any;
use std::fmt;

/// Whether a dispatch round continues to the next stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchFlow {
    /// Continue with the next stream.
    #[default]
    Next,
    /// End the round.
    Stop,
}

impl DispatchFlow {
    /// Check whether the round must end.
    pub fn is_stop(self) -> bool {
        matches!(self, DispatchFlow::Stop)
    }
}

/// Observer of a dispatch round over the stream trait `S`.
///
/// Both methods default to [`DispatchFlow::Next`].
pub trait DispatchCallback<S: ?Sized>: Send + Sync {
    /// Called before `stream` is invoked.
    ///
    /// Returning [`DispatchFlow::Stop`] ends the round without invoking
    /// `stream` and without running the result filter.
    fn before_dispatch(&self, stream: &S, method: &Method, args: &Args<'_>) -> DispatchFlow {
        let _ = (stream, method, args);
        DispatchFlow::Next
    }

    /// Called after `stream` returned `result`.
    ///
    /// `result` is the method's return value, or its `Ok` value for fallible
    /// methods. Returning [`DispatchFlow::Stop`] ends the round after
    /// `stream`.
    fn after_dispatch(
        &self,
        stream: &S,
        method: &Method,
        args: &Args<'_>,
        result: &dyn Any,
    ) -> DispatchFlow {
        let _ = (stream, method, args, result);
        DispatchFlow::Next
    }
}

/// Results collected during one round, in invocation order.
pub struct Results {
    values: Vec<Box<dyn Any + Send>>,
}

impl Results {
    /// Wrap collected results.
    pub fn new(values: Vec<Box<dyn Any + Send>>) -> Self {
        Self { values }
    }

    /// Number of collected results.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check whether every result has type `T`.
    pub fn are<T: 'static>(&self) -> bool {
        self.values.iter().all(|value| value.is::<T>())
    }

    /// Recover the typed results, or give them back untouched on a type
    /// mismatch.
    pub fn downcast<T: 'static>(self) -> Result<Vec<T>, Self> {
        if !self.are::<T>() {
            return Err(self);
        }
        Ok(self
            .values
            .into_iter()
            .filter_map(|value| value.downcast::<T>().ok())
            .map(|value| *value)
            .collect())
    }

    /// Give up the erased values.
    pub fn into_values(self) -> Vec<Box<dyn Any + Send>> {
        self.values
    }

    /// Take the last result if it has type `T`.
    pub fn into_last<T: 'static>(mut self) -> Option<T> {
        self.values
            .pop()
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

impl fmt::Debug for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Results")
            .field("len", &self.values.len())
            .finish()
    }
}

/// What a [`ResultFilter`] made of the collected results.
pub enum FilterOutcome {
    /// The reduced value. Its type must be the method's result type.
    Reduced(Box<dyn Any + Send>),
    /// The filter does not apply; the last raw result stands.
    Unchanged(Results),
}

impl FilterOutcome {
    /// Wrap a reduced value.
    pub fn reduced<T: Send + 'static>(value: T) -> Self {
        FilterOutcome::Reduced(Box::new(value))
    }
}

impl fmt::Debug for FilterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOutcome::Reduced(_) => f.write_str("Reduced"),
            FilterOutcome::Unchanged(results) => {
                f.debug_tuple("Unchanged").field(results).finish()
            }
        }
    }
}

/// Reduces the results of one dispatch round.
///
/// A handle applies its filter to every method of the stream trait that
/// returns a value, so filters are type-erased and should answer
/// [`FilterOutcome::Unchanged`] for result types they do not handle.
pub trait ResultFilter: Send + Sync {
    /// Reduce `results`, which holds at least one value.
    fn filter(&self, method: &Method, args: &Args<'_>, results: Results) -> FilterOutcome;
}
