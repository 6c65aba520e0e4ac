//! Debug tracing of registry activity.

mod common;

use common::{Counter, Fixed};
use parking_lot::Mutex;
use std::{io, sync::Arc};
use streamcast::{Streams, testing::CallLog};

/// Collects formatted events in memory.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn subscriber(writer: Capture) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter("streamcast_std=debug")
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish()
}

#[test]
fn test_debug_flag_gates_events() {
    let capture = Capture::default();

    tracing::subscriber::with_default(subscriber(capture.clone()), || {
        let streams = Streams::new();
        let log = CallLog::new();
        assert!(!streams.is_debug());

        streams.register(&Fixed::new("quiet", 1, &log)).unwrap();
        streams.handle::<dyn Counter>().value();
        assert!(capture.text().is_empty());

        streams.set_debug(true);
        let fixed = Fixed::new("loud", 2, &log);
        streams.register(&fixed).unwrap();
        streams
            .connection(&*fixed)
            .unwrap()
            .set_priority_of::<dyn Counter>(3);
        streams.handle::<dyn Counter>().value();
        streams.unregister(&fixed).unwrap();
    });

    let text = capture.text();
    for event in [
        "register",
        "priority changed",
        "sort",
        "dispatch",
        "dispatch step",
        "unregister",
    ] {
        assert!(text.contains(event), "missing `{event}` in:\n{text}");
    }
    assert!(text.contains("Counter"));
}

#[test]
fn test_builder_enables_debug() {
    let capture = Capture::default();

    tracing::subscriber::with_default(subscriber(capture.clone()), || {
        let streams = Streams::builder().debug(true).build();
        assert!(streams.is_debug());
        streams.bind_default::<common::Fallback>().unwrap();
        assert_eq!(streams.handle::<dyn Counter>().value(), -1);
    });

    let text = capture.text();
    assert!(text.contains("default bound"), "{text}");
    assert!(text.contains("default stream"), "{text}");
}
