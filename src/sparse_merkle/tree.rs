use super::db::{MemNodeDb, NodeDb};
use super::error::TreeError;
use super::utils::{index_depth, leaf_count, leaf_index, left_child, max_index, parent, right_child};
use crate::config::TreeConfig;
use std::fmt::Debug;
use std::hash::Hash;

/// A trait for hashing data into a merkle tree
pub trait MerkleHash {
    /// The output of this hasher. Outputs are fixed width, so they can be persisted as raw bytes
    /// and read back with `TryFrom<&[u8]>`.
    type Output: Debug + PartialEq + Eq + Clone + Hash + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Hashes data as a "leaf" of the tree. This operation *should* be domain separated.
    fn hash_leaf(&self, data: &[u8]) -> Self::Output;
    /// Hashes two digests into one. This operation *should* be domain separated.
    fn hash_nodes(&self, l: &Self::Output, r: &Self::Output) -> Self::Output;
}

/// The root hashes of subtrees made up entirely of default (all-zero) leaves, one for each level
/// of the tree. Entry `d` is the value of any untouched node at depth `d`, so entry `0` is the
/// root of a completely empty tree and entry `depth` is the hash of the default leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyHashes<H> {
    hashes: Vec<H>,
}

impl<H: Clone> EmptyHashes<H> {
    /// Computes the table for a tree of the given depth whose default leaf is `leaf_bytes` zeros.
    pub fn new<M>(hasher: &M, depth: u32, leaf_bytes: usize) -> Result<Self, TreeError>
    where
        M: MerkleHash<Output = H>,
    {
        TreeConfig { depth, leaf_bytes }.validate()?;
        let mut hashes = Vec::with_capacity(depth as usize + 1);
        let mut hash = hasher.hash_leaf(&vec![0u8; leaf_bytes]);
        for _ in 0..=depth {
            let next = hasher.hash_nodes(&hash, &hash);
            hashes.push(hash);
            hash = next;
        }
        // Built from the leaves upward, but indexed from the root
        hashes.reverse();
        Ok(Self { hashes })
    }

    /// The empty subtree hash for a node at depth `depth`, if the tree is that deep.
    pub fn get(&self, depth: u32) -> Option<&H> {
        self.hashes.get(depth as usize)
    }

    /// The root of a tree containing only default leaves.
    pub fn root(&self) -> &H {
        &self.hashes[0]
    }

    /// The hash of the default leaf.
    pub fn leaf(&self) -> &H {
        &self.hashes[self.hashes.len() - 1]
    }

    /// The depth of the tree this table was built for.
    pub fn depth(&self) -> u32 {
        (self.hashes.len() - 1) as u32
    }
}

/// Implements a fixed-depth sparse merkle tree over a node store which only holds the nodes that
/// have actually been written. Every write eagerly recomputes the whole ancestor chain, so the
/// root always reflects the current set of leaves.
pub struct SparseMerkleTree<M, Db = MemNodeDb<<M as MerkleHash>::Output>>
where
    M: MerkleHash,
{
    nodes: Db,
    empty_hashes: EmptyHashes<M::Output>,
    depth: u32,
    hasher: M,
}

impl<M, Db> SparseMerkleTree<M, Db>
where
    M: MerkleHash,
    Db: NodeDb<M::Output>,
{
    /// Constructs an empty tree of the given depth. Untouched leaves hash as `leaf_bytes` zeros.
    pub fn new(hasher: M, depth: u32, leaf_bytes: usize) -> Result<Self, TreeError> {
        let empty_hashes = EmptyHashes::new(&hasher, depth, leaf_bytes)?;
        Ok(Self {
            nodes: Default::default(),
            empty_hashes,
            depth,
            hasher,
        })
    }

    /// Returns the root of the tree.
    pub fn root(&self) -> &M::Output {
        self.node(0)
    }

    /// Returns the node at the given heap index. If the node was never written, this is the empty
    /// subtree hash for its depth.
    pub fn get(&self, index: u64) -> Result<&M::Output, TreeError> {
        self.check_index(index)?;
        Ok(self.node(index))
    }

    /// Sets the node at the given heap index and recomputes all of its ancestors up to the root.
    pub fn set(&mut self, index: u64, hash: M::Output) -> Result<(), TreeError> {
        self.check_index(index)?;
        self.nodes.put(index, hash);

        let mut current = index;
        while let Some(parent_idx) = parent(current) {
            let node = self.hasher.hash_nodes(
                self.node(left_child(parent_idx)),
                self.node(right_child(parent_idx)),
            );
            self.nodes.put(parent_idx, node);
            current = parent_idx;
        }
        Ok(())
    }

    /// Returns the children of every ancestor of `index`, starting with the immediate parent and
    /// ending with the children of the root. The path of the root itself is empty.
    pub fn get_path(&self, index: u64) -> Result<Vec<(M::Output, M::Output)>, TreeError> {
        self.check_index(index)?;
        let mut path = Vec::with_capacity(index_depth(index) as usize);

        let mut current = index;
        while let Some(parent_idx) = parent(current) {
            let left = self.node(left_child(parent_idx)).clone();
            let right = self.node(right_child(parent_idx)).clone();
            path.push((left, right));
            current = parent_idx;
        }
        Ok(path)
    }

    /// Maps an element (leaf) index to its heap index, checking that the leaf exists.
    pub fn leaf_index(&self, element: u64) -> Result<u64, TreeError> {
        let leaves = leaf_count(self.depth);
        if element >= leaves {
            return Err(TreeError::IndexOutOfRange {
                index: element.saturating_add(leaves - 1),
                max: max_index(self.depth),
            });
        }
        Ok(leaf_index(self.depth, element))
    }

    /// Returns the hash of the leaf at the given element index.
    pub fn leaf_hash(&self, element: u64) -> Result<&M::Output, TreeError> {
        let index = self.leaf_index(element)?;
        Ok(self.node(index))
    }

    /// Sets the leaf at the given element index to a pre-hashed value.
    pub fn set_leaf(&mut self, element: u64, hash: M::Output) -> Result<(), TreeError> {
        let index = self.leaf_index(element)?;
        self.set(index, hash)
    }

    /// The depth of the tree. A tree of depth `d` has `2^d` leaves.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The number of leaves in the tree, written or not.
    pub fn capacity(&self) -> u64 {
        leaf_count(self.depth)
    }

    /// The empty subtree hashes of this tree.
    pub fn empty_hashes(&self) -> &EmptyHashes<M::Output> {
        &self.empty_hashes
    }

    /// The number of nodes which have been materialised by writes.
    pub fn stored_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The hasher used by this tree.
    pub fn hasher(&self) -> &M {
        &self.hasher
    }

    fn check_index(&self, index: u64) -> Result<(), TreeError> {
        let max = max_index(self.depth);
        if index > max {
            return Err(TreeError::IndexOutOfRange { index, max });
        }
        Ok(())
    }

    /// Looks up a node whose index is already known to be in range.
    fn node(&self, index: u64) -> &M::Output {
        match self.nodes.get(index) {
            Some(hash) => hash,
            None => &self.empty_hashes.hashes[index_depth(index) as usize],
        }
    }
}
