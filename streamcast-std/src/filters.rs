//! Ready-made result filters.
//!
//! Filters are type-erased and a handle applies its filter to every
//! value-returning method of the trait, so each filter here answers
//! [`FilterOutcome::Unchanged`] for result types it does not understand.

use std::{fmt, iter, marker::PhantomData};
use streamcast_core::{Args, FilterOutcome, Method, ResultFilter, Results};

/// Filter built from a closure over results of type `T`.
///
/// Created by [`filter_fn`].
pub struct FnFilter<T, F> {
    reduce: F,
    _marker: PhantomData<fn(Vec<T>) -> T>,
}

/// Reduce results of type `T` with a closure.
///
/// # Example
///
/// ```rust,ignore
/// let longest = filter_fn(|_method, _args, names: Vec<String>| {
///     names.into_iter().max_by_key(String::len).unwrap_or_default()
/// });
/// ```
pub fn filter_fn<T, F>(reduce: F) -> FnFilter<T, F>
where
    T: Send + 'static,
    F: Fn(&Method, &Args<'_>, Vec<T>) -> T + Send + Sync,
{
    FnFilter {
        reduce,
        _marker: PhantomData,
    }
}

impl<T, F> ResultFilter for FnFilter<T, F>
where
    T: Send + 'static,
    F: Fn(&Method, &Args<'_>, Vec<T>) -> T + Send + Sync,
{
    fn filter(&self, method: &Method, args: &Args<'_>, results: Results) -> FilterOutcome {
        match results.downcast::<T>() {
            Ok(values) => FilterOutcome::reduced((self.reduce)(method, args, values)),
            Err(results) => FilterOutcome::Unchanged(results),
        }
    }
}

impl<T, F> fmt::Debug for FnFilter<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter")
            .field("result", &std::any::type_name::<T>())
            .finish()
    }
}

/// `true` if any stream answered `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyTrue;

impl ResultFilter for AnyTrue {
    fn filter(&self, _method: &Method, _args: &Args<'_>, results: Results) -> FilterOutcome {
        match results.downcast::<bool>() {
            Ok(values) => FilterOutcome::reduced(values.into_iter().any(|value| value)),
            Err(results) => FilterOutcome::Unchanged(results),
        }
    }
}

/// `true` if every stream answered `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllTrue;

impl ResultFilter for AllTrue {
    fn filter(&self, _method: &Method, _args: &Args<'_>, results: Results) -> FilterOutcome {
        match results.downcast::<bool>() {
            Ok(values) => FilterOutcome::reduced(values.into_iter().all(|value| value)),
            Err(results) => FilterOutcome::Unchanged(results),
        }
    }
}

/// Sum of numeric results of type `T`.
pub struct Sum<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Sum<T> {
    /// Create the filter.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Sum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Sum<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sum<{}>", std::any::type_name::<T>())
    }
}

impl<T> ResultFilter for Sum<T>
where
    T: iter::Sum<T> + Send + 'static,
{
    fn filter(&self, _method: &Method, _args: &Args<'_>, results: Results) -> FilterOutcome {
        match results.downcast::<T>() {
            Ok(values) => FilterOutcome::reduced(values.into_iter().sum::<T>()),
            Err(results) => FilterOutcome::Unchanged(results),
        }
    }
}

/// The first result of the round, which comes from the highest-priority
/// stream reached.
#[derive(Debug, Default, Clone, Copy)]
pub struct First;

impl ResultFilter for First {
    fn filter(&self, _method: &Method, _args: &Args<'_>, results: Results) -> FilterOutcome {
        match results.into_values().into_iter().next() {
            Some(first) => FilterOutcome::Reduced(first),
            None => FilterOutcome::Unchanged(Results::new(Vec::new())),
        }
    }
}
