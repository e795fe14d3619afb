//! # smt-rs
//!
//! A fixed-depth sparse merkle tree, and a wrapper which persists it to a key-value store.
//!
//! The in-memory [`SparseMerkleTree`] only stores nodes which have been written; every other
//! node takes the precomputed hash of an empty subtree of its height. The [`PersistentTree`]
//! writes each leaf hash to a [`KvStore`] keyed by its element index, along with a metadata
//! record holding the root, and checks that root whenever the tree is reopened.

mod config;
/// Defines the key-value store a [`PersistentTree`] is written to.
pub mod db;
/// Defines the persisted tree.
pub mod persistent;
mod sha2_hash;
/// Defines the in-memory sparse merkle tree.
pub mod sparse_merkle;

pub use config::{TreeConfig, DEFAULT_LEAF_BYTES, MAX_DEPTH};
pub use db::{KvStore, MemStore, WriteBatch};
pub use persistent::{Metadata, PersistentTree, PersistentTreeError};
pub use sha2_hash::Sha256Hasher;
pub use sparse_merkle::error::{HashPathError, TreeError};
pub use sparse_merkle::proof::HashPath;
pub use sparse_merkle::tree::{EmptyHashes, MerkleHash, SparseMerkleTree};
