//! Method descriptors and argument views handed to dispatch callbacks.

use std::fmt;

/// Descriptor of a stream trait method.
///
/// Adapters keep one `static` descriptor per method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    name: &'static str,
}

impl Method {
    /// Describe the method called `name`.
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// The method name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Borrowed view of the arguments of one dispatched call.
///
/// Every stream receives the same arguments; callbacks and filters only get
/// to inspect them.
#[derive(Clone, Copy)]
pub struct Args<'a> {
    values: &'a [&'a dyn fmt::Debug],
}

impl<'a> Args<'a> {
    /// Arguments of a method without parameters.
    pub const EMPTY: Args<'static> = Args { values: &[] };

    /// Wrap the argument list.
    pub const fn new(values: &'a [&'a dyn fmt::Debug]) -> Self {
        Self { values }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the method takes no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument at `index`.
    pub fn get(&self, index: usize) -> Option<&'a dyn fmt::Debug> {
        self.values.get(index).copied()
    }

    /// Iterate over the arguments in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'a dyn fmt::Debug> + 'a {
        self.values.iter().copied()
    }
}

impl fmt::Debug for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}
