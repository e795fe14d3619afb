use std::collections::HashMap;

/// Stores the explicitly written nodes of a tree, keyed by heap index.
/// Any index which has never been written is implicitly the empty subtree hash for its depth.
#[derive(Debug, Clone)]
pub struct MemNodeDb<H>(HashMap<u64, H>);

impl<H> Default for MemNodeDb<H> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<H> NodeReader<H> for MemNodeDb<H> {
    fn get(&self, index: u64) -> Option<&H> {
        self.0.get(&index)
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl<H> NodeWriter<H> for MemNodeDb<H> {
    fn put(&mut self, index: u64, hash: H) {
        self.0.insert(index, hash);
    }
}

impl<H> NodeDb<H> for MemNodeDb<H> {}

pub trait NodeReader<H> {
    /// Returns the stored hash at `index`, if one was ever written.
    fn get(&self, index: u64) -> Option<&H>;

    /// The number of materialised nodes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait NodeWriter<H> {
    /// Writes (or overwrites) the hash at `index`. Nodes are never removed.
    fn put(&mut self, index: u64, hash: H);
}

pub trait NodeDb<H>: NodeReader<H> + NodeWriter<H> + Default {}
