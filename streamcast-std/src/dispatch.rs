//! # Dispatch Handles
//!
//! A [`DispatchHandle<dyn Trait>`] is the caller-side stand-in for "every
//! stream registered under `Trait`". The `#[stream]` attribute implements
//! `Trait` for it by forwarding each method to [`DispatchHandle::invoke`] or
//! [`DispatchHandle::try_invoke`].
//!
//! # Round Semantics
//!
//! - Members are visited in descending priority. The order is fixed when the
//!   round starts.
//! - A tagged handle only reaches streams reporting an equal tag for the
//!   handle's stream type; an untagged handle only reaches untagged streams.
//! - Invocations of one stream type are serialized by a reentrant per-type
//!   lock, so a stream may dispatch again from inside its own method.
//! - Without a filter the caller receives the last collected result. With a
//!   filter, every result is collected and reduced once at the end.
//! - With no stream reached, the caller receives `Default::default()`.

use crate::registry::Streams;
use std::{
    any::{Any, TypeId, type_name},
    convert::Infallible,
    fmt,
    sync::Arc,
};
use streamcast_core::{
    Args, DispatchCallback, DispatchFlow, FilterOutcome, Method, ResultFilter, Results,
    StreamKind, StreamType, Tag,
};

/// Multicast handle over the stream trait `S`.
///
/// Cloning is O(1). The handle does not cache members; every call observes
/// the registry as it is when the call starts.
pub struct DispatchHandle<S: ?Sized + StreamKind> {
    streams: Streams,
    stream_type: StreamType,
    tag: Option<Tag>,
    callback: Option<Arc<dyn DispatchCallback<S>>>,
    filter: Option<Arc<dyn ResultFilter>>,
}

impl<S: ?Sized + StreamKind> Clone for DispatchHandle<S> {
    fn clone(&self) -> Self {
        Self {
            streams: self.streams.clone(),
            stream_type: self.stream_type,
            tag: self.tag.clone(),
            callback: self.callback.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<S: ?Sized + StreamKind> DispatchHandle<S> {
    pub(crate) fn new(streams: Streams) -> Self {
        Self {
            streams,
            stream_type: StreamType::of::<S>(),
            tag: None,
            callback: None,
            filter: None,
        }
    }

    /// The stream type this handle dispatches over.
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// The tag scoping this handle, if any.
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// The registry this handle dispatches through.
    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    /// Run one dispatch round of an infallible method.
    ///
    /// `call` invokes the method on one stream.
    ///
    /// # Panics
    ///
    /// Panics if the default factory misbehaves while resolving a fallback,
    /// or if the result filter reduces to a value that is not an `R`.
    pub fn invoke<R, F>(&self, method: &Method, args: Args<'_>, mut call: F) -> R
    where
        R: Default + Send + 'static,
        F: FnMut(&S) -> R,
    {
        let round = self.round(method, args, |stream: &S| {
            Ok::<R, Infallible>(call(stream))
        });
        match round {
            Ok(result) => result.unwrap_or_default(),
            Err(never) => match never {},
        }
    }

    /// Run one dispatch round of a fallible method.
    ///
    /// The first `Err` ends the round and is returned to the caller; callbacks
    /// and filters only ever see `Ok` values.
    ///
    /// # Errors
    ///
    /// The error of the first stream that failed.
    ///
    /// # Panics
    ///
    /// Same as [`invoke`](Self::invoke).
    pub fn try_invoke<T, E, F>(&self, method: &Method, args: Args<'_>, call: F) -> Result<T, E>
    where
        T: Default + Send + 'static,
        F: FnMut(&S) -> Result<T, E>,
    {
        Ok(self.round(method, args, call)?.unwrap_or_default())
    }

    fn round<T, E, F>(&self, method: &Method, args: Args<'_>, mut call: F) -> Result<Option<T>, E>
    where
        T: Send + 'static,
        F: FnMut(&S) -> Result<T, E>,
    {
        let stream_type = self.stream_type;
        let targets = match self.streams.targets(stream_type) {
            Ok(targets) => targets,
            Err(err) => panic!("cannot dispatch `{stream_type}::{method}`: {err}"),
        };
        trace_event!(
            self.streams,
            stream = %stream_type,
            %method,
            ?args,
            tag = ?self.tag,
            targets = targets.len(),
            "dispatch"
        );
        if targets.is_empty() {
            return Ok(None);
        }

        // unit results carry nothing to reduce
        let filter = self
            .filter
            .as_deref()
            .filter(|_| TypeId::of::<T>() != TypeId::of::<()>());
        let turn = self.streams.turn(stream_type);
        let mut collected: Vec<Box<dyn Any + Send>> = Vec::new();
        let mut last: Option<T> = None;

        for (index, member) in targets.iter().enumerate() {
            if member.object.tag_for(stream_type) != self.tag {
                continue;
            }
            let Some(stream) = member.object.facet_ref::<S>() else {
                continue;
            };

            if let Some(callback) = &self.callback {
                if callback.before_dispatch(stream, method, &args).is_stop() {
                    trace_event!(
                        self.streams,
                        stream = %stream_type,
                        %method,
                        index,
                        target_type = member.object.type_name(),
                        "dispatch stopped before call"
                    );
                    return Ok(settle(last, collected));
                }
            }

            let (result, should_break) = {
                let _turn = turn.lock();
                let armed = member
                    .connection
                    .as_ref()
                    .and_then(|connection| connection.arm(stream_type));
                let result = call(stream)?;
                (result, armed.is_some_and(|armed| armed.should_break()))
            };
            trace_event!(
                self.streams,
                stream = %stream_type,
                %method,
                index,
                target_type = member.object.type_name(),
                should_break,
                "dispatch step"
            );

            let flow = match &self.callback {
                Some(callback) => callback.after_dispatch(stream, method, &args, &result),
                None => DispatchFlow::Next,
            };
            if filter.is_some() {
                collected.push(Box::new(result));
            } else {
                last = Some(result);
            }
            if flow.is_stop() || should_break {
                trace_event!(
                    self.streams,
                    stream = %stream_type,
                    %method,
                    index,
                    by_callback = flow.is_stop(),
                    "dispatch stopped after call"
                );
                break;
            }
        }

        let Some(filter) = filter else {
            return Ok(last);
        };
        if collected.is_empty() {
            return Ok(None);
        }
        let count = collected.len();
        match filter.filter(method, &args, Results::new(collected)) {
            FilterOutcome::Reduced(value) => match value.downcast::<T>() {
                Ok(value) => {
                    trace_event!(self.streams, stream = %stream_type, %method, count, "filter");
                    Ok(Some(*value))
                }
                Err(_) => panic!(
                    "result filter for `{stream_type}::{method}` did not reduce to `{}`",
                    type_name::<T>()
                ),
            },
            FilterOutcome::Unchanged(results) => Ok(results.into_last()),
        }
    }
}

fn settle<T: 'static>(last: Option<T>, collected: Vec<Box<dyn Any + Send>>) -> Option<T> {
    if collected.is_empty() {
        last
    } else {
        Results::new(collected).into_last()
    }
}

impl<S: ?Sized + StreamKind> fmt::Debug for DispatchHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("stream_type", &self.stream_type)
            .field("tag", &self.tag)
            .field("callback", &self.callback.is_some())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for a [`DispatchHandle`] with a tag, callback or filter.
///
/// # Example
///
/// ```rust,ignore
/// let handle = streams
///     .handle_builder::<dyn Vote>()
///     .with_tag("room-1")
///     .with_filter(AnyTrue)
///     .build();
/// ```
#[must_use = "call `build` to create the handle"]
pub struct HandleBuilder<S: ?Sized + StreamKind> {
    handle: DispatchHandle<S>,
}

impl<S: ?Sized + StreamKind> HandleBuilder<S> {
    pub(crate) fn new(streams: Streams) -> Self {
        Self {
            handle: DispatchHandle::new(streams),
        }
    }

    /// Only reach streams tagged with `tag`.
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.handle.tag = Some(tag.into());
        self
    }

    /// Observe each call of a round.
    pub fn with_callback(mut self, callback: impl DispatchCallback<S> + 'static) -> Self {
        self.handle.callback = Some(Arc::new(callback));
        self
    }

    /// Observe each call of a round with an already shared callback.
    pub fn with_shared_callback(mut self, callback: Arc<dyn DispatchCallback<S>>) -> Self {
        self.handle.callback = Some(callback);
        self
    }

    /// Reduce the results of each round.
    pub fn with_filter(mut self, filter: impl ResultFilter + 'static) -> Self {
        self.handle.filter = Some(Arc::new(filter));
        self
    }

    /// Reduce the results of each round with an already shared filter.
    pub fn with_shared_filter(mut self, filter: Arc<dyn ResultFilter>) -> Self {
        self.handle.filter = Some(filter);
        self
    }

    /// Finish the handle.
    pub fn build(self) -> DispatchHandle<S> {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use streamcast_core::{Facets, Stream};

    trait Score: Send + Sync {
        fn score(&self) -> i32;
        fn reset(&self);
    }

    impl StreamKind for dyn Score {
        const NAME: &'static str = "Score";
    }

    static SCORE: Method = Method::new("score");
    static RESET: Method = Method::new("reset");

    fn score(handle: &DispatchHandle<dyn Score>) -> i32 {
        handle.invoke(&SCORE, Args::EMPTY, |stream| stream.score())
    }

    struct Fixed {
        value: i32,
        resets: AtomicUsize,
        tag: Option<&'static str>,
    }

    impl Fixed {
        fn new(value: i32) -> Arc<Self> {
            Arc::new(Self {
                value,
                resets: AtomicUsize::new(0),
                tag: None,
            })
        }

        fn tagged(value: i32, tag: &'static str) -> Arc<Self> {
            Arc::new(Self {
                value,
                resets: AtomicUsize::new(0),
                tag: Some(tag),
            })
        }
    }

    impl Score for Fixed {
        fn score(&self) -> i32 {
            self.value
        }

        fn reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Stream for Fixed {
        fn facets(facets: &mut Facets<Self>) {
            facets.add::<dyn Score>(|s| s);
        }

        fn tag_for_stream(&self, _stream_type: StreamType) -> Option<Tag> {
            self.tag.map(Tag::from)
        }
    }

    struct Sum;

    impl ResultFilter for Sum {
        fn filter(&self, _method: &Method, _args: &Args<'_>, results: Results) -> FilterOutcome {
            match results.downcast::<i32>() {
                Ok(values) => FilterOutcome::reduced(values.into_iter().sum::<i32>()),
                Err(results) => FilterOutcome::Unchanged(results),
            }
        }
    }

    #[test]
    fn test_empty_round_yields_default() {
        let streams = Streams::new();
        assert_eq!(score(&streams.handle()), 0);
    }

    #[test]
    fn test_last_result_wins() {
        let streams = Streams::new();
        let a = Fixed::new(10);
        let b = Fixed::new(20);
        streams.register(&a).unwrap();
        streams.register(&b).unwrap();

        assert_eq!(score(&streams.handle()), 20);

        streams
            .connection(&*b)
            .unwrap()
            .set_priority_of::<dyn Score>(1);
        assert_eq!(score(&streams.handle()), 10);
    }

    #[test]
    fn test_filter_reduces() {
        let streams = Streams::new();
        streams.register(&Fixed::new(10)).unwrap();
        streams.register(&Fixed::new(20)).unwrap();

        let handle = streams.handle_builder::<dyn Score>().with_filter(Sum).build();
        assert_eq!(score(&handle), 30);
    }

    #[test]
    fn test_unit_methods_reach_everyone() {
        let streams = Streams::new();
        let a = Fixed::new(1);
        let b = Fixed::new(2);
        streams.register(&a).unwrap();
        streams.register(&b).unwrap();

        let handle = streams.handle_builder::<dyn Score>().with_filter(Sum).build();
        handle.invoke(&RESET, Args::EMPTY, |stream| stream.reset());

        assert_eq!(a.resets.load(Ordering::SeqCst), 1);
        assert_eq!(b.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tag_scopes_round() {
        let streams = Streams::new();
        streams.register(&Fixed::tagged(1, "red")).unwrap();
        streams.register(&Fixed::tagged(2, "blue")).unwrap();
        streams.register(&Fixed::new(3)).unwrap();

        let red = streams.handle_builder::<dyn Score>().with_tag("red").build();
        let green = streams.handle_builder::<dyn Score>().with_tag("green").build();
        assert_eq!(score(&red), 1);
        assert_eq!(score(&green), 0);
        assert_eq!(score(&streams.handle()), 3);
    }

    #[test]
    fn test_try_invoke_stops_at_first_error() {
        let streams = Streams::new();
        let a = Fixed::new(1);
        let b = Fixed::new(-1);
        let c = Fixed::new(3);
        for stream in [&a, &b, &c] {
            streams.register(stream).unwrap();
        }

        let mut visited = Vec::new();
        let result: Result<i32, String> =
            streams
                .handle::<dyn Score>()
                .try_invoke(&SCORE, Args::EMPTY, |stream| {
                    let value = stream.score();
                    visited.push(value);
                    if value < 0 {
                        Err(format!("negative score {value}"))
                    } else {
                        Ok(value)
                    }
                });

        assert_eq!(result, Err("negative score -1".to_string()));
        assert_eq!(visited, vec![1, -1]);
    }
}
