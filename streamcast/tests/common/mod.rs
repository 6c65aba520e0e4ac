#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicI32, Ordering},
};
use streamcast::{Stream, StreamType, Streams, Tag, stream, testing::CallLog};

// ============================================================================
// Test Stream Traits
// ============================================================================

#[stream]
pub trait Counter {
    fn value(&self) -> i32;
    fn bump(&self, by: i32);
}

#[stream(name = "Vote")]
pub trait Vote {
    fn approve(&self, item: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("missing key `{0}`")]
    Missing(String),
}

#[stream]
pub trait Loader {
    fn load(&self, key: &str) -> Result<String, LoadError>;
}

#[stream]
pub trait Notice {
    fn notify(&self, text: String);
}

// ============================================================================
// Test Streams
// ============================================================================

/// Answers a fixed value and logs every call as `<name>:<method>`.
#[derive(Stream)]
#[facets(Counter, Notice)]
pub struct Fixed {
    pub name: &'static str,
    pub value: AtomicI32,
    pub log: CallLog,
}

impl Fixed {
    pub fn new(name: &'static str, value: i32, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            value: AtomicI32::new(value),
            log: log.clone(),
        })
    }
}

impl Counter for Fixed {
    fn value(&self) -> i32 {
        self.log.push(format!("{}:value", self.name));
        self.value.load(Ordering::SeqCst)
    }

    fn bump(&self, by: i32) {
        self.log.push(format!("{}:bump", self.name));
        self.value.fetch_add(by, Ordering::SeqCst);
    }
}

impl Notice for Fixed {
    fn notify(&self, text: String) {
        self.log.push(format!("{}:notify:{}", self.name, text));
    }
}

/// Votes a fixed answer, optionally scoped to a room tag.
pub struct Voter {
    pub name: &'static str,
    pub answer: bool,
    pub room: Option<&'static str>,
    pub log: CallLog,
}

impl Voter {
    pub fn new(name: &'static str, answer: bool, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            answer,
            room: None,
            log: log.clone(),
        })
    }

    pub fn in_room(
        name: &'static str,
        answer: bool,
        room: &'static str,
        log: &CallLog,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            answer,
            room: Some(room),
            log: log.clone(),
        })
    }
}

impl Vote for Voter {
    fn approve(&self, item: &str) -> bool {
        self.log.push(format!("{}:approve:{}", self.name, item));
        self.answer
    }
}

impl Stream for Voter {
    fn facets(facets: &mut streamcast::Facets<Self>) {
        facets.add::<dyn Vote>(|s| s);
    }

    fn tag_for_stream(&self, stream_type: StreamType) -> Option<Tag> {
        if stream_type.is::<dyn Vote>() {
            self.room.map(Tag::from)
        } else {
            None
        }
    }
}

/// Serves keys from a fixed table.
#[derive(Stream)]
#[facets(Loader)]
pub struct Table {
    pub name: &'static str,
    pub entries: Vec<(&'static str, &'static str)>,
    pub log: CallLog,
}

impl Loader for Table {
    fn load(&self, key: &str) -> Result<String, LoadError> {
        self.log.push(format!("{}:load:{}", self.name, key));
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
            .ok_or_else(|| LoadError::Missing(key.to_string()))
    }
}

/// Default `Counter` used by fallback tests.
#[derive(Default, Stream)]
#[facets(Counter)]
pub struct Fallback;

impl Counter for Fallback {
    fn value(&self) -> i32 {
        -1
    }

    fn bump(&self, _by: i32) {}
}

// ============================================================================
// Helpers
// ============================================================================

pub fn set_priority<X: Stream>(
    streams: &Streams,
    stream: &X,
    stream_type: StreamType,
    priority: i32,
) {
    let connection = streams
        .connection(stream)
        .expect("stream should be registered");
    assert!(connection.set_priority(stream_type, priority));
}
