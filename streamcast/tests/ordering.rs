//! Priority ordering and result selection.

mod common;

use common::{Counter, Fixed, Notice, set_priority};
use std::sync::{Arc, atomic::Ordering};
use streamcast::{
    DispatchHandle, Facets, Stream, StreamType, Streams, filters::Sum, stream, testing::CallLog,
};

fn counter() -> StreamType {
    StreamType::of::<dyn Counter>()
}

#[test]
fn test_higher_priority_runs_first() {
    let streams = Streams::new();
    let log = CallLog::new();
    let low = Fixed::new("low", 1, &log);
    let high = Fixed::new("high", 2, &log);
    let mid = Fixed::new("mid", 3, &log);
    for stream in [&low, &high, &mid] {
        streams.register(stream).unwrap();
    }
    set_priority(&streams, &*high, counter(), 10);
    set_priority(&streams, &*mid, counter(), 5);
    set_priority(&streams, &*low, counter(), -1);

    streams.handle::<dyn Counter>().bump(1);

    assert_eq!(log.entries(), vec!["high:bump", "mid:bump", "low:bump"]);
}

#[test]
fn test_equal_priorities_keep_registration_order() {
    let streams = Streams::new();
    let log = CallLog::new();
    for name in ["a", "b", "c"] {
        streams.register(&Fixed::new(name, 0, &log)).unwrap();
    }

    streams.handle::<dyn Counter>().bump(1);

    assert_eq!(log.entries(), vec!["a:bump", "b:bump", "c:bump"]);
}

#[test]
fn test_last_result_wins_without_filter() {
    let streams = Streams::new();
    let log = CallLog::new();
    let a = Fixed::new("a", 10, &log);
    let b = Fixed::new("b", 20, &log);
    streams.register(&a).unwrap();
    streams.register(&b).unwrap();
    set_priority(&streams, &*a, counter(), 5);
    set_priority(&streams, &*b, counter(), 1);

    assert_eq!(streams.handle::<dyn Counter>().value(), 20);
    assert_eq!(log.entries(), vec!["a:value", "b:value"]);
}

#[test]
fn test_sum_filter_reduces_all_results() {
    let streams = Streams::new();
    let log = CallLog::new();
    let a = Fixed::new("a", 10, &log);
    let b = Fixed::new("b", 20, &log);
    streams.register(&a).unwrap();
    streams.register(&b).unwrap();
    set_priority(&streams, &*a, counter(), 5);
    set_priority(&streams, &*b, counter(), 1);

    let handle = streams
        .handle_builder::<dyn Counter>()
        .with_filter(Sum::<i32>::new())
        .build();
    assert_eq!(handle.value(), 30);
}

#[test]
fn test_priority_change_applies_to_next_round() {
    let streams = Streams::new();
    let log = CallLog::new();
    let a = Fixed::new("a", 1, &log);
    let b = Fixed::new("b", 2, &log);
    streams.register(&a).unwrap();
    streams.register(&b).unwrap();
    let handle = streams.handle::<dyn Counter>();

    assert_eq!(handle.value(), 2);
    set_priority(&streams, &*b, counter(), 1);
    assert_eq!(handle.value(), 1);
    set_priority(&streams, &*b, counter(), 0);
    assert_eq!(handle.value(), 2);
}

#[test]
fn test_priorities_are_per_stream_type() {
    let streams = Streams::new();
    let log = CallLog::new();
    let a = Fixed::new("a", 1, &log);
    let b = Fixed::new("b", 2, &log);
    streams.register(&a).unwrap();
    streams.register(&b).unwrap();
    set_priority(&streams, &*b, counter(), 1);

    streams.handle::<dyn Counter>().bump(0);
    streams.handle::<dyn Notice>().notify("hi".to_string());

    assert_eq!(
        log.entries(),
        vec!["b:bump", "a:bump", "a:notify:hi", "b:notify:hi"]
    );
}

#[test]
fn test_unregister_keeps_relative_order() {
    let streams = Streams::new();
    let log = CallLog::new();
    let a = Fixed::new("a", 0, &log);
    let b = Fixed::new("b", 0, &log);
    let c = Fixed::new("c", 0, &log);
    for stream in [&a, &b, &c] {
        streams.register(stream).unwrap();
    }
    set_priority(&streams, &*c, counter(), 3);
    streams.handle::<dyn Counter>().bump(0);
    log.clear();

    streams.unregister(&b).unwrap();
    streams.handle::<dyn Counter>().bump(0);

    assert_eq!(log.entries(), vec!["c:bump", "a:bump"]);
}

// ============================================================================
// Round snapshots
// ============================================================================

#[stream]
trait Spawn {
    fn spawn(&self) -> usize;
}

/// Registers a new `Spawn` member while a round is running.
struct Spawner {
    streams: Streams,
    log: CallLog,
}

impl Spawn for Spawner {
    fn spawn(&self) -> usize {
        self.log.push("spawner");
        self.streams
            .register(&Arc::new(Spawned { log: self.log.clone() }))
            .unwrap();
        1
    }
}

impl Stream for Spawner {
    fn facets(facets: &mut Facets<Self>) {
        facets.add::<dyn Spawn>(|s| s);
    }
}

struct Spawned {
    log: CallLog,
}

impl Spawn for Spawned {
    fn spawn(&self) -> usize {
        self.log.push("spawned");
        2
    }
}

impl Stream for Spawned {
    fn facets(facets: &mut Facets<Self>) {
        facets.add::<dyn Spawn>(|s| s);
    }
}

#[test]
fn test_round_uses_snapshot_taken_at_start() {
    let streams = Streams::new();
    let log = CallLog::new();
    streams
        .register(&Arc::new(Spawner {
            streams: streams.clone(),
            log: log.clone(),
        }))
        .unwrap();
    let handle: DispatchHandle<dyn Spawn> = streams.handle();

    assert_eq!(handle.spawn(), 1);
    assert_eq!(log.entries(), vec!["spawner"]);
    assert_eq!(streams.count_of::<dyn Spawn>(), 2);

    log.clear();
    assert_eq!(handle.spawn(), 2);
    assert_eq!(log.entries(), vec!["spawner", "spawned"]);
}

#[test]
fn test_bump_reaches_every_member() {
    let streams = Streams::new();
    let log = CallLog::new();
    let a = Fixed::new("a", 1, &log);
    let b = Fixed::new("b", 2, &log);
    streams.register(&a).unwrap();
    streams.register(&b).unwrap();

    streams.handle::<dyn Counter>().bump(10);

    assert_eq!(a.value.load(Ordering::SeqCst), 11);
    assert_eq!(b.value.load(Ordering::SeqCst), 12);
}

/// Removes `victim` from the registry the first time it is asked.
struct Evictor {
    streams: Streams,
    victim: Arc<Fixed>,
    log: CallLog,
}

impl Counter for Evictor {
    fn value(&self) -> i32 {
        self.log.push("evictor:value");
        self.streams.unregister(&self.victim).unwrap();
        0
    }

    fn bump(&self, _by: i32) {}
}

impl Stream for Evictor {
    fn facets(facets: &mut Facets<Self>) {
        facets.add::<dyn Counter>(|s| s);
    }
}

#[test]
fn test_unregister_during_round_spares_snapshot() {
    let streams = Streams::new();
    let log = CallLog::new();
    let victim = Fixed::new("victim", 3, &log);
    streams
        .register(&Arc::new(Evictor {
            streams: streams.clone(),
            victim: Arc::clone(&victim),
            log: log.clone(),
        }))
        .unwrap();
    streams.register(&victim).unwrap();
    let handle = streams.handle::<dyn Counter>();

    assert_eq!(handle.value(), 3);
    assert_eq!(log.entries(), vec!["evictor:value", "victim:value"]);
    assert!(!streams.contains(&*victim));

    log.clear();
    assert_eq!(handle.value(), 0);
    assert_eq!(log.entries(), vec!["evictor:value"]);
}
