//! The key-value store a [`PersistentTree`](crate::PersistentTree) is written to.
//!
//! A store only needs point reads, point writes and a scan over every key sharing a prefix.
//! Each tree owns one namespace inside the store: its leaves live under `!{name}!{index}` and its
//! metadata record lives under `{name}` itself.

use std::collections::BTreeMap;
use std::convert::Infallible;

use bytes::Bytes;

/// The entries produced by a namespace scan.
pub type ScanIter<'a, E> = Box<dyn Iterator<Item = Result<(Bytes, Bytes), E>> + 'a>;

/// An ordered key-value store.
pub trait KvStore {
    /// The error returned by the underlying storage.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error>;

    /// Writes `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &[u8], value: Bytes) -> Result<(), Self::Error>;

    /// Applies every write in the batch. Stores which can commit a batch atomically should
    /// override this; the default applies the writes one at a time.
    fn write_batch(&mut self, batch: WriteBatch) -> Result<(), Self::Error> {
        for (key, value) in batch.into_writes() {
            self.put(&key, value)?;
        }
        Ok(())
    }

    /// Iterates over every entry whose key starts with `prefix`. Callers must not rely on the order.
    fn scan_prefix<'a>(&'a self, prefix: &'a [u8]) -> ScanIter<'a, Self::Error>;
}

impl<S: KvStore + ?Sized> KvStore for &mut S {
    type Error = S::Error;

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error> {
        (**self).get(key)
    }

    fn put(&mut self, key: &[u8], value: Bytes) -> Result<(), Self::Error> {
        (**self).put(key, value)
    }

    fn write_batch(&mut self, batch: WriteBatch) -> Result<(), Self::Error> {
        (**self).write_batch(batch)
    }

    fn scan_prefix<'a>(&'a self, prefix: &'a [u8]) -> ScanIter<'a, Self::Error> {
        (**self).scan_prefix(prefix)
    }
}

/// A group of writes to be committed together.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<(Bytes, Bytes)>,
}

impl WriteBatch {
    /// Returns an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a write. Later writes to the same key win.
    pub fn put(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.writes.push((key.into(), value.into()));
    }

    /// The number of queued writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns true if nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consumes the batch, returning its writes in the order they were queued.
    pub fn into_writes(self) -> Vec<(Bytes, Bytes)> {
        self.writes
    }
}

/// An in-memory [`KvStore`]. Batches are applied atomically.
#[derive(Debug, Default, Clone)]
pub struct MemStore(BTreeMap<Bytes, Bytes>);

impl MemStore {
    /// Returns an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of keys in the store, across every namespace.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes the value stored under `key`, returning it.
    pub fn remove(&mut self, key: &[u8]) -> Option<Bytes> {
        self.0.remove(key)
    }
}

impl KvStore for MemStore {
    type Error = Infallible;

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error> {
        Ok(self.0.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: Bytes) -> Result<(), Self::Error> {
        self.0.insert(Bytes::copy_from_slice(key), value);
        Ok(())
    }

    fn write_batch(&mut self, batch: WriteBatch) -> Result<(), Self::Error> {
        // Nothing can fail part way through, so applying in order is atomic
        self.0.extend(batch.into_writes());
        Ok(())
    }

    fn scan_prefix<'a>(&'a self, prefix: &'a [u8]) -> ScanIter<'a, Self::Error> {
        let iter = self
            .0
            .range::<[u8], _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(key, value)| Ok::<_, Infallible>((key.clone(), value.clone())));
        Box::new(iter)
    }
}

const SEPARATOR: u8 = b'!';

/// Returns true if `name` can be used as a tree namespace.
///
/// Names must be non-empty and must not contain the `!` separator: `!a!` is a prefix of every
/// key of a tree called `a!b`, and the metadata key of a tree called `!a!1` is a leaf key of `a`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.as_bytes().contains(&SEPARATOR)
}

/// The key under which the metadata record of the tree `name` is stored.
pub fn metadata_key(name: &str) -> Bytes {
    Bytes::copy_from_slice(name.as_bytes())
}

/// The prefix shared by every leaf record of the tree `name`.
pub fn leaf_prefix(name: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(name.len() + 2);
    prefix.push(SEPARATOR);
    prefix.extend_from_slice(name.as_bytes());
    prefix.push(SEPARATOR);
    prefix
}

/// The key of the leaf record for `element` in the tree `name`. Indices are written in decimal.
pub fn leaf_key(name: &str, element: u64) -> Bytes {
    let mut key = leaf_prefix(name);
    key.extend_from_slice(element.to_string().as_bytes());
    key.into()
}

/// Recovers the element index from a leaf key found under `prefix`.
pub fn parse_leaf_key(prefix: &[u8], key: &[u8]) -> Option<u64> {
    let digits = key.strip_prefix(prefix)?;
    // Reject signs and empty strings, which `u64::from_str` would otherwise accept or report oddly
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    // `leaf_key` never pads, so a padded key would alias another element
    if digits.len() > 1 && digits[0] == b'0' {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
