//! A sparse merkle tree whose leaves are persisted to a [`KvStore`].
//!
//! Every written leaf hash is stored under the tree's namespace, keyed by its element index, and
//! a small metadata record holding the current root and the depth is stored under the tree's
//! name. Opening a tree replays every stored leaf into a fresh in-memory tree and refuses to
//! return it unless the recomputed root matches the recorded one.
//!
//! A tree is owned by a single writer: every mutating operation takes `&mut self`. Callers that
//! need to share a tree between threads must wrap it in their own lock.

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::config::TreeConfig;
use crate::db::{
    is_valid_name, leaf_key, leaf_prefix, metadata_key, parse_leaf_key, KvStore, WriteBatch,
};
use crate::sparse_merkle::error::TreeError;
use crate::sparse_merkle::proof::HashPath;
use crate::sparse_merkle::tree::{MerkleHash, SparseMerkleTree};

/// Bytes following the root in a metadata record: the depth, then four reserved zero bytes.
const METADATA_TRAILER: usize = 8;

/// An error that occurred while opening or updating a [`PersistentTree`].
#[derive(Debug, Error)]
pub enum PersistentTreeError<E> {
    /// The tree could not be built with the requested (or recorded) shape
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] TreeError),
    /// The tree name is empty or contains the `!` namespace separator
    #[error("invalid tree name {0:?}")]
    InvalidName(String),
    /// The root rebuilt from the stored leaves differs from the recorded root
    #[error("root mismatch: stored {stored}, computed {computed}")]
    Integrity {
        /// Hex encoding of the root in the metadata record
        stored: String,
        /// Hex encoding of the root rebuilt from the stored leaves
        computed: String,
    },
    /// The metadata record has the wrong length for this hasher
    #[error("malformed metadata record of {len} bytes")]
    MalformedMetadata {
        /// Length of the stored record
        len: usize,
    },
    /// A key inside the tree's namespace is not a decimal element index
    #[error("malformed leaf key {0:?}")]
    MalformedLeafKey(String),
    /// A stored leaf is not a valid hash
    #[error("malformed leaf hash of {len} bytes for element {index}")]
    MalformedLeafValue {
        /// The element the value was stored for
        index: u64,
        /// Length of the stored value
        len: usize,
    },
    /// The element index does not exist in a tree of this depth
    #[error("element {index} is out of range for a tree with {leaves} leaves")]
    ElementOutOfRange {
        /// The offending element index
        index: u64,
        /// The number of leaves in the tree
        leaves: u64,
    },
    /// The underlying store failed
    #[error("store error: {0}")]
    Store(#[source] E),
}

/// The record used to validate a tree when it is reopened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata<H> {
    /// The root of the tree when the record was written
    pub root: H,
    /// The depth the tree was created with
    pub depth: u32,
}

impl<H> Metadata<H>
where
    H: AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>,
{
    /// Encodes the record as the root bytes, the depth as a little-endian `u32`, and four reserved
    /// zero bytes. For a 32 byte hash the record is 40 bytes long.
    pub fn encode(&self) -> Bytes {
        let root = self.root.as_ref();
        let mut out = Vec::with_capacity(root.len() + METADATA_TRAILER);
        out.extend_from_slice(root);
        out.extend_from_slice(&self.depth.to_le_bytes());
        out.extend_from_slice(&[0u8; METADATA_TRAILER - 4]);
        out.into()
    }

    /// Decodes a record written by [`Metadata::encode`]. Returns `None` if the root portion is
    /// not a valid hash.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let root_len = bytes.len().checked_sub(METADATA_TRAILER)?;
        let root = <H as TryFrom<&[u8]>>::try_from(&bytes[..root_len]).ok()?;
        let mut depth = [0u8; 4];
        depth.copy_from_slice(&bytes[root_len..root_len + 4]);
        Some(Self {
            root,
            depth: u32::from_le_bytes(depth),
        })
    }
}

/// A sparse merkle tree backed by a key-value store.
pub struct PersistentTree<S, M>
where
    M: MerkleHash,
{
    store: S,
    name: String,
    leaf_prefix: Vec<u8>,
    tree: SparseMerkleTree<M>,
}

impl<S, M> PersistentTree<S, M>
where
    S: KvStore,
    M: MerkleHash,
{
    /// Opens the tree called `name`, creating it with the given depth if it doesn't exist yet.
    /// Default leaves are [`DEFAULT_LEAF_BYTES`](crate::DEFAULT_LEAF_BYTES) zeros.
    pub fn open(
        store: S,
        name: &str,
        hasher: M,
        depth: u32,
    ) -> Result<Self, PersistentTreeError<S::Error>> {
        Self::open_with_config(store, name, hasher, TreeConfig::new(depth))
    }

    /// Opens the tree called `name`, creating it with `config` if it doesn't exist yet.
    /// Names must be non-empty and free of `!`, see [`is_valid_name`](crate::db::is_valid_name).
    ///
    /// An existing tree always keeps the depth it was created with. Its stored leaves are replayed
    /// and the resulting root is checked against the metadata record; on mismatch this returns
    /// [`PersistentTreeError::Integrity`] and no tree.
    pub fn open_with_config(
        store: S,
        name: &str,
        hasher: M,
        config: TreeConfig,
    ) -> Result<Self, PersistentTreeError<S::Error>> {
        if !is_valid_name(name) {
            return Err(PersistentTreeError::InvalidName(name.to_string()));
        }
        let meta = store
            .get(&metadata_key(name))
            .map_err(PersistentTreeError::Store)?;

        let Some(meta) = meta else {
            let mut tree = Self::new(store, name, hasher, config)?;
            tree.write_metadata()?;
            debug!(name, depth = config.depth, "created tree");
            return Ok(tree);
        };

        let metadata = Metadata::<M::Output>::decode(&meta)
            .ok_or(PersistentTreeError::MalformedMetadata { len: meta.len() })?;
        if metadata.depth != config.depth {
            warn!(
                name,
                requested = config.depth,
                stored = metadata.depth,
                "opening tree with its stored depth"
            );
        }

        let mut tree = Self::new(store, name, hasher, config.with_depth(metadata.depth))?;
        let restored = tree.restore_elements()?;
        if tree.root() != &metadata.root {
            let stored = hex::encode(metadata.root.as_ref());
            let computed = hex::encode(tree.root().as_ref());
            error!(name, %stored, %computed, restored, "root mismatch");
            return Err(PersistentTreeError::Integrity { stored, computed });
        }
        debug!(name, depth = metadata.depth, restored, "restored tree");
        Ok(tree)
    }

    fn new(
        store: S,
        name: &str,
        hasher: M,
        config: TreeConfig,
    ) -> Result<Self, PersistentTreeError<S::Error>> {
        let tree = SparseMerkleTree::new(hasher, config.depth, config.leaf_bytes)?;
        Ok(Self {
            store,
            name: name.to_string(),
            leaf_prefix: leaf_prefix(name),
            tree,
        })
    }

    /// Replays every stored leaf into the in-memory tree, returning how many were found.
    fn restore_elements(&mut self) -> Result<u64, PersistentTreeError<S::Error>> {
        let leaves = self.tree.capacity();
        let mut restored = 0;
        for entry in self.store.scan_prefix(&self.leaf_prefix) {
            let (key, value) = entry.map_err(PersistentTreeError::Store)?;
            let index = parse_leaf_key(&self.leaf_prefix, &key).ok_or_else(|| {
                PersistentTreeError::MalformedLeafKey(String::from_utf8_lossy(&key).into_owned())
            })?;
            if index >= leaves {
                return Err(PersistentTreeError::ElementOutOfRange { index, leaves });
            }
            let hash = <M::Output as TryFrom<&[u8]>>::try_from(&value[..]).map_err(|_| {
                PersistentTreeError::MalformedLeafValue {
                    index,
                    len: value.len(),
                }
            })?;
            self.tree.set_leaf(index, hash)?;
            restored += 1;
        }
        Ok(restored)
    }

    fn metadata(&self) -> Metadata<M::Output> {
        Metadata {
            root: self.root().clone(),
            depth: self.depth(),
        }
    }

    fn write_metadata(&mut self) -> Result<(), PersistentTreeError<S::Error>> {
        let record = self.metadata().encode();
        self.store
            .put(&metadata_key(&self.name), record)
            .map_err(PersistentTreeError::Store)
    }

    /// Returns the root of the tree.
    pub fn root(&self) -> &M::Output {
        self.tree.root()
    }

    /// Returns the inclusion path of the element at `index`.
    pub fn get_hash_path(
        &self,
        index: u64,
    ) -> Result<HashPath<M::Output>, PersistentTreeError<S::Error>> {
        let tree_index = self.element_tree_index(index)?;
        Ok(HashPath::new(self.tree.get_path(tree_index)?))
    }

    /// Returns the leaf hash currently stored for the element at `index`.
    pub fn leaf_hash(&self, index: u64) -> Result<&M::Output, PersistentTreeError<S::Error>> {
        let tree_index = self.element_tree_index(index)?;
        Ok(self.tree.get(tree_index)?)
    }

    /// Hashes `value` into the leaf at `index` and persists the leaf together with the new
    /// metadata record in one batch. Returns the new root.
    ///
    /// If the store rejects the batch, the in-memory tree is rolled back so it keeps mirroring
    /// the store.
    pub fn update_element(
        &mut self,
        index: u64,
        value: &[u8],
    ) -> Result<M::Output, PersistentTreeError<S::Error>> {
        self.update_elements([(index, value)])
    }

    /// Like [`PersistentTree::update_element`], but for many elements at once. Every leaf and a
    /// single metadata record go into one batch. If an element appears more than once, its last
    /// value wins.
    pub fn update_elements<I, V>(
        &mut self,
        elements: I,
    ) -> Result<M::Output, PersistentTreeError<S::Error>>
    where
        I: IntoIterator<Item = (u64, V)>,
        V: AsRef<[u8]>,
    {
        let elements = elements.into_iter().collect::<Vec<_>>();
        for (index, _) in &elements {
            self.element_tree_index(*index)?;
        }
        if elements.is_empty() {
            return Ok(self.root().clone());
        }

        let mut batch = WriteBatch::new();
        let mut previous = Vec::with_capacity(elements.len());
        for (index, value) in &elements {
            let hash = self.tree.hasher().hash_leaf(value.as_ref());
            previous.push((*index, self.tree.leaf_hash(*index)?.clone()));
            batch.put(
                leaf_key(&self.name, *index),
                Bytes::copy_from_slice(hash.as_ref()),
            );
            self.tree.set_leaf(*index, hash)?;
        }
        batch.put(metadata_key(&self.name), self.metadata().encode());

        if let Err(err) = self.store.write_batch(batch) {
            // Undo in reverse so repeated elements end up at their original value
            for (index, hash) in previous.into_iter().rev() {
                self.tree.set_leaf(index, hash)?;
            }
            warn!(name = %self.name, elements = elements.len(), "store rejected update");
            return Err(PersistentTreeError::Store(err));
        }
        trace!(name = %self.name, elements = elements.len(), "updated elements");
        Ok(self.root().clone())
    }

    /// Maps an element index to its heap index in the tree: `index + 2^depth - 1`.
    pub fn element_tree_index(&self, index: u64) -> Result<u64, PersistentTreeError<S::Error>> {
        self.tree
            .leaf_index(index)
            .map_err(|_| PersistentTreeError::ElementOutOfRange {
                index,
                leaves: self.tree.capacity(),
            })
    }

    /// The depth of the tree.
    pub fn depth(&self) -> u32 {
        self.tree.depth()
    }

    /// The name (and namespace) of the tree inside its store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The in-memory mirror of the tree.
    pub fn tree(&self) -> &SparseMerkleTree<M> {
        &self.tree
    }

    /// The store the tree is written to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Closes the tree, handing back its store.
    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemStore, ScanIter};
    use crate::sparse_merkle::error::HashPathError;
    use crate::Sha256Hasher;
    use test_case::test_case;

    type MemTree = PersistentTree<MemStore, Sha256Hasher>;

    fn open(store: MemStore, depth: u32) -> MemTree {
        PersistentTree::open(store, "test", Sha256Hasher::new(), depth).unwrap()
    }

    #[derive(Debug, Error)]
    #[error("injected failure")]
    struct InjectedFailure;

    /// A store that applies batches one write at a time and can be told to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemStore,
        fail_gets: bool,
        fail_key: Option<Bytes>,
    }

    impl KvStore for FlakyStore {
        type Error = InjectedFailure;

        fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error> {
            if self.fail_gets {
                return Err(InjectedFailure);
            }
            Ok(self.inner.get(key).unwrap())
        }

        fn put(&mut self, key: &[u8], value: Bytes) -> Result<(), Self::Error> {
            if self.fail_key.as_deref() == Some(key) {
                return Err(InjectedFailure);
            }
            self.inner.put(key, value).unwrap();
            Ok(())
        }

        fn scan_prefix<'a>(&'a self, prefix: &'a [u8]) -> ScanIter<'a, Self::Error> {
            Box::new(
                self.inner
                    .scan_prefix(prefix)
                    .map(|entry| entry.map_err(|never| -> InjectedFailure { match never {} })),
            )
        }
    }

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(16)]
    #[test_case(32)]
    fn test_open_empty_store(depth: u32) {
        let tree = open(MemStore::new(), depth);
        assert_eq!(tree.depth(), depth);
        assert_eq!(tree.root(), tree.tree().empty_hashes().root());

        // Only the metadata record was written
        let store = tree.into_store();
        assert_eq!(store.len(), 1);
        let meta = store.get(b"test").unwrap().unwrap();
        assert_eq!(meta.len(), 40);
        assert_eq!(&meta[32..36], &depth.to_le_bytes());
        assert_eq!(&meta[36..], &[0u8; 4]);
    }

    #[test_case(0)]
    #[test_case(33)]
    fn test_invalid_depth(depth: u32) {
        let err = PersistentTree::open(MemStore::new(), "test", Sha256Hasher::new(), depth)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PersistentTreeError::InvalidConfiguration(TreeError::InvalidDepth(d)) if d == depth
        ));
    }

    #[test]
    fn test_update_and_reopen() {
        let mut tree = open(MemStore::new(), 8);
        let first = tree.update_element(0, b"zero").unwrap();
        let root = tree.update_element(200, b"two hundred").unwrap();
        assert_ne!(first, root);
        assert_eq!(tree.root(), &root);
        let paths = [0u64, 1, 200, 255]
            .map(|i| tree.get_hash_path(i).unwrap())
            .to_vec();

        let tree = open(tree.into_store(), 8);
        assert_eq!(tree.root(), &root);
        for (i, path) in [0u64, 1, 200, 255].into_iter().zip(paths) {
            assert_eq!(tree.get_hash_path(i).unwrap(), path);
        }
        assert_eq!(
            tree.leaf_hash(200).unwrap(),
            &Sha256Hasher::new().hash_leaf(b"two hundred")
        );
    }

    #[test]
    fn test_hash_path_verifies() {
        let mut tree = open(MemStore::new(), 6);
        tree.update_element(13, b"thirteen").unwrap();
        tree.update_element(40, b"forty").unwrap();
        let hasher = Sha256Hasher::new();
        let path = tree.get_hash_path(13).unwrap();
        assert_eq!(path.len(), 6);
        let leaf = hasher.hash_leaf(b"thirteen");
        assert!(path.verify(&hasher, tree.root(), 13, &leaf).is_ok());
        assert_eq!(
            path.verify(&hasher, tree.root(), 13, &hasher.hash_leaf(b"fourteen")),
            Err(HashPathError::SiblingMismatch { level: 0 })
        );
    }

    #[test]
    fn test_four_leaf_scenario() {
        let config = TreeConfig::new(2).with_leaf_bytes(1);
        let mut tree =
            PersistentTree::open_with_config(MemStore::new(), "test", Sha256Hasher::new(), config)
                .unwrap();
        tree.update_element(0, b"a").unwrap();
        let root = tree.update_element(3, b"d").unwrap();

        let h = Sha256Hasher::new();
        let empty = h.hash_leaf(&[0u8]);
        assert_eq!(tree.tree().empty_hashes().leaf(), &empty);
        let expected = h.hash_nodes(
            &h.hash_nodes(&h.hash_leaf(b"a"), &empty),
            &h.hash_nodes(&empty, &h.hash_leaf(b"d")),
        );
        assert_eq!(root, expected);
    }

    #[test]
    fn test_element_out_of_range() {
        let mut tree = open(MemStore::new(), 3);
        let root = tree.root().clone();
        assert!(matches!(
            tree.update_element(8, b"x"),
            Err(PersistentTreeError::ElementOutOfRange { index: 8, leaves: 8 })
        ));
        assert!(matches!(
            tree.get_hash_path(u64::MAX),
            Err(PersistentTreeError::ElementOutOfRange { .. })
        ));
        assert!(tree.update_elements([(1, b"a"), (9, b"b")]).is_err());
        assert_eq!(tree.root(), &root);
        assert_eq!(tree.element_tree_index(7).unwrap(), 14);
        assert_eq!(tree.into_store().len(), 1);
    }

    #[test]
    fn test_update_elements_batch() {
        let mut single = open(MemStore::new(), 5);
        single.update_element(1, b"one").unwrap();
        single.update_element(2, b"two").unwrap();
        single.update_element(1, b"uno").unwrap();

        let mut batched = open(MemStore::new(), 5);
        let values: [(u64, &[u8]); 3] = [(1, b"one"), (2, b"two"), (1, b"uno")];
        let root = batched.update_elements(values).unwrap();
        assert_eq!(&root, single.root());

        let store = batched.into_store();
        // Two leaves plus the metadata record
        assert_eq!(store.len(), 3);
        assert_eq!(open(store, 5).root(), &root);
    }

    #[test]
    fn test_replay_order_does_not_matter() {
        let values: [(u64, &[u8]); 4] = [(3, b"c"), (0, b"a"), (9, b"i"), (5, b"e")];
        let mut forward = open(MemStore::new(), 4);
        let mut backward = open(MemStore::new(), 4);
        for (i, v) in values {
            forward.update_element(i, v).unwrap();
        }
        for (i, v) in values.into_iter().rev() {
            backward.update_element(i, v).unwrap();
        }
        assert_eq!(forward.root(), backward.root());
        assert_eq!(open(backward.into_store(), 4).root(), forward.root());
    }

    #[test]
    fn test_stored_depth_wins() {
        let mut tree = open(MemStore::new(), 4);
        let root = tree.update_element(15, b"last").unwrap();
        let tree = open(tree.into_store(), 20);
        assert_eq!(tree.depth(), 4);
        assert_eq!(tree.root(), &root);
    }

    #[test]
    fn test_trees_share_a_store() {
        let mut a = open(MemStore::new(), 4);
        a.update_element(1, b"in a").unwrap();
        let mut b = PersistentTree::open(a.into_store(), "other", Sha256Hasher::new(), 4).unwrap();
        assert_eq!(b.root(), b.tree().empty_hashes().root());
        let b_root = b.update_element(2, b"in b").unwrap();

        let store = b.into_store();
        let a = open(store, 4);
        assert_eq!(
            a.leaf_hash(1).unwrap(),
            &Sha256Hasher::new().hash_leaf(b"in a")
        );
        let b = PersistentTree::open(a.into_store(), "other", Sha256Hasher::new(), 4).unwrap();
        assert_eq!(b.root(), &b_root);
    }

    #[test]
    fn test_overlapping_names_are_rejected() {
        let mut a = PersistentTree::open(MemStore::new(), "a", Sha256Hasher::new(), 4).unwrap();
        let root = a.update_element(1, b"one").unwrap();
        let store = a.into_store();

        for name in ["a!b", "!a!1", ""] {
            assert!(matches!(
                PersistentTree::open(store.clone(), name, Sha256Hasher::new(), 4),
                Err(PersistentTreeError::InvalidName(n)) if n == name
            ));
        }

        // A sibling whose name extends `a` lives outside its namespace
        let mut ab = PersistentTree::open(store, "ab", Sha256Hasher::new(), 4).unwrap();
        ab.update_element(3, b"three").unwrap();
        let a = PersistentTree::open(ab.into_store(), "a", Sha256Hasher::new(), 4).unwrap();
        assert_eq!(a.root(), &root);
        assert_eq!(a.into_store().len(), 4);
    }

    #[test]
    fn test_padded_leaf_key_is_rejected() {
        let mut tree = open(MemStore::new(), 4);
        tree.update_element(7, b"seven").unwrap();
        let mut store = tree.into_store();
        let forged = Sha256Hasher::new().hash_leaf(b"forged");
        store
            .put(b"!test!007", Bytes::copy_from_slice(&forged))
            .unwrap();
        assert!(matches!(
            PersistentTree::open(store, "test", Sha256Hasher::new(), 4),
            Err(PersistentTreeError::MalformedLeafKey(key)) if key == "!test!007"
        ));
    }

    #[test]
    fn test_tampered_leaf_is_detected() {
        let mut tree = open(MemStore::new(), 4);
        tree.update_element(3, b"honest").unwrap();
        let mut store = tree.into_store();
        let forged = Sha256Hasher::new().hash_leaf(b"forged");
        store
            .put(&leaf_key("test", 3), Bytes::copy_from_slice(&forged))
            .unwrap();
        let err = PersistentTree::open(store, "test", Sha256Hasher::new(), 4)
            .err()
            .unwrap();
        assert!(matches!(err, PersistentTreeError::Integrity { .. }));
        assert!(err.to_string().starts_with("root mismatch"));
    }

    #[test]
    fn test_missing_leaf_is_detected() {
        let mut tree = open(MemStore::new(), 4);
        tree.update_element(3, b"three").unwrap();
        tree.update_element(4, b"four").unwrap();
        let mut store = tree.into_store();
        store.remove(&leaf_key("test", 4)).unwrap();
        let err = PersistentTree::open(store, "test", Sha256Hasher::new(), 4)
            .err()
            .unwrap();
        assert!(matches!(err, PersistentTreeError::Integrity { .. }));
    }

    #[test]
    fn test_leaf_bytes_mismatch_is_detected() {
        let tree = open(MemStore::new(), 4);
        let config = TreeConfig::new(4).with_leaf_bytes(1);
        let err =
            PersistentTree::open_with_config(tree.into_store(), "test", Sha256Hasher::new(), config)
                .err()
                .unwrap();
        assert!(matches!(err, PersistentTreeError::Integrity { .. }));
    }

    #[test]
    fn test_malformed_records() {
        let mut store = MemStore::new();
        store.put(b"test", Bytes::from_static(&[0u8; 12])).unwrap();
        assert!(matches!(
            PersistentTree::open(store, "test", Sha256Hasher::new(), 4),
            Err(PersistentTreeError::MalformedMetadata { len: 12 })
        ));

        let tree = open(MemStore::new(), 4);
        let mut store = tree.into_store();
        store
            .put(b"!test!abc", Bytes::from_static(&[0u8; 32]))
            .unwrap();
        assert!(matches!(
            PersistentTree::open(store, "test", Sha256Hasher::new(), 4),
            Err(PersistentTreeError::MalformedLeafKey(key)) if key == "!test!abc"
        ));

        let tree = open(MemStore::new(), 4);
        let mut store = tree.into_store();
        store
            .put(&leaf_key("test", 2), Bytes::from_static(&[0u8; 31]))
            .unwrap();
        assert!(matches!(
            PersistentTree::open(store, "test", Sha256Hasher::new(), 4),
            Err(PersistentTreeError::MalformedLeafValue { index: 2, len: 31 })
        ));

        let tree = open(MemStore::new(), 4);
        let mut store = tree.into_store();
        store
            .put(&leaf_key("test", 16), Bytes::from_static(&[0u8; 32]))
            .unwrap();
        assert!(matches!(
            PersistentTree::open(store, "test", Sha256Hasher::new(), 4),
            Err(PersistentTreeError::ElementOutOfRange {
                index: 16,
                leaves: 16
            })
        ));
    }

    #[test]
    fn test_store_errors_propagate() {
        let store = FlakyStore {
            fail_gets: true,
            ..Default::default()
        };
        assert!(matches!(
            PersistentTree::open(store, "test", Sha256Hasher::new(), 4),
            Err(PersistentTreeError::Store(InjectedFailure))
        ));
    }

    #[test]
    fn test_rejected_write_rolls_back() {
        let mut tree = PersistentTree::open(FlakyStore::default(), "test", Sha256Hasher::new(), 4)
            .unwrap();
        let root = tree.update_element(1, b"one").unwrap();

        let mut store = tree.into_store();
        store.fail_key = Some(leaf_key("test", 2));
        let mut tree = PersistentTree::open(store, "test", Sha256Hasher::new(), 4).unwrap();
        assert!(matches!(
            tree.update_element(2, b"two"),
            Err(PersistentTreeError::Store(InjectedFailure))
        ));
        assert_eq!(tree.root(), &root);
        assert_eq!(tree.leaf_hash(2).unwrap(), tree.tree().empty_hashes().leaf());

        // Nothing was written, so the tree reopens cleanly
        let mut store = tree.into_store();
        store.fail_key = None;
        let tree = PersistentTree::open(store, "test", Sha256Hasher::new(), 4).unwrap();
        assert_eq!(tree.root(), &root);
    }

    #[test]
    fn test_interrupted_metadata_write_is_detected() {
        let mut tree = PersistentTree::open(FlakyStore::default(), "test", Sha256Hasher::new(), 4)
            .unwrap();
        let root = tree.update_element(1, b"one").unwrap();

        // This store is not atomic: the leaf lands, then the metadata write fails
        let mut store = tree.into_store();
        store.fail_key = Some(metadata_key("test"));
        let mut tree = PersistentTree::open(store, "test", Sha256Hasher::new(), 4).unwrap();
        assert!(tree.update_element(2, b"two").is_err());
        assert_eq!(tree.root(), &root);

        let mut store = tree.into_store();
        store.fail_key = None;
        assert!(matches!(
            PersistentTree::open(store, "test", Sha256Hasher::new(), 4),
            Err(PersistentTreeError::Integrity { .. })
        ));
    }

    #[test]
    fn test_metadata_codec() {
        let metadata = Metadata {
            root: [0xabu8; 32],
            depth: 17,
        };
        let encoded = metadata.encode();
        assert_eq!(encoded.len(), 40);
        assert_eq!(Metadata::<[u8; 32]>::decode(&encoded), Some(metadata));
        assert_eq!(Metadata::<[u8; 32]>::decode(&encoded[..39]), None);
        assert_eq!(Metadata::<[u8; 32]>::decode(&[]), None);
    }
}
