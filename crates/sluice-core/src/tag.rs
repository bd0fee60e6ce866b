//! Stream tags: metadata pinned to absolute item offsets.
//!
//! A [`Tag`] annotates a single item position in a stream with a key/value
//! pair. Offsets are absolute: item `n` is the `n`-th item ever written to the
//! buffer, counted from the start of the stream, so they never wrap even though
//! the buffer's physical indices do.
//!
//! Buffers keep their tags in a [`TagStore`], an offset-ordered multimap. Tags
//! are pruned once every attached reader has moved past their offset.

use std::collections::BTreeMap;
use std::fmt;

/// Value carried by a [`Tag`].
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    /// No payload; the key alone carries the meaning.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    I64(i64),
    /// Unsigned integer.
    U64(u64),
    /// Floating-point value.
    F64(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque byte payload.
    Bytes(Vec<u8>),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for TagValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// An immutable `(offset, key, value)` annotation on a stream position.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    offset: u64,
    key: String,
    value: TagValue,
}

impl Tag {
    /// Creates a tag at the given absolute item offset.
    pub fn new(offset: u64, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        Self {
            offset,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Absolute item offset this tag is attached to.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Tag key.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tag value.
    #[inline]
    pub fn value(&self) -> &TagValue {
        &self.value
    }

    /// Returns a copy of this tag moved to `offset`.
    pub fn with_offset(&self, offset: u64) -> Self {
        Self {
            offset,
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} {}={}", self.offset, self.key, self.value)
    }
}

/// Offset-ordered multimap of tags.
///
/// Insertion order is preserved among tags sharing an offset. No
/// de-duplication is performed.
#[derive(Clone, Debug, Default)]
pub struct TagStore {
    tags: BTreeMap<u64, Vec<Tag>>,
    len: usize,
}

impl TagStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tag.
    pub fn insert(&mut self, tag: Tag) {
        self.tags.entry(tag.offset).or_default().push(tag);
        self.len += 1;
    }

    /// Returns the tags with `start <= offset < end`, in offset order.
    pub fn in_window(&self, start: u64, end: u64) -> Vec<Tag> {
        if start >= end {
            return Vec::new();
        }
        self.tags
            .range(start..end)
            .flat_map(|(_, tags)| tags.iter().cloned())
            .collect()
    }

    /// Removes every tag with `offset < min_offset`. Returns how many were removed.
    pub fn prune_below(&mut self, min_offset: u64) -> usize {
        let kept = self.tags.split_off(&min_offset);
        let removed: usize = self.tags.values().map(Vec::len).sum();
        self.tags = kept;
        self.len -= removed;
        removed
    }

    /// Number of stored tags.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no tags are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over all tags in offset order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values().flatten()
    }
}
