//! Tags partition the members of one stream type.
//!
//! A stream reports a tag per stream type through
//! [`Stream::tag_for_stream`](crate::Stream::tag_for_stream); a dispatch handle
//! built with a tag only reaches streams reporting an equal tag, while an
//! untagged handle only reaches untagged streams.

use std::{any::Any, fmt, sync::Arc};

trait TagValue: Any + fmt::Debug + Send + Sync {
    fn eq_value(&self, other: &dyn TagValue) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T> TagValue for T
where
    T: PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn eq_value(&self, other: &dyn TagValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type-erased tag compared by value.
///
/// Tags of different underlying types are never equal, except that string
/// slices are stored as `String` so literal and owned names match.
#[derive(Clone)]
pub struct Tag(Arc<dyn TagValue>);

impl Tag {
    /// Wrap any comparable value.
    pub fn new<T>(value: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        if let Some(text) = (&value as &dyn Any).downcast_ref::<&'static str>() {
            return Self(Arc::new(String::from(*text)));
        }
        Self(Arc::new(value))
    }

    /// Borrow the value if it has type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_value(&*other.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", self.0)
    }
}

impl From<&'static str> for Tag {
    fn from(value: &'static str) -> Self {
        Tag::new(String::from(value))
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Tag::new(value)
    }
}

impl From<u64> for Tag {
    fn from(value: u64) -> Self {
        Tag::new(value)
    }
}
