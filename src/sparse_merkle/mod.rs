//! Implements a fixed-depth sparse merkle tree over an in-memory node store which only holds the
//! nodes that have been written. Untouched subtrees hash to precomputed "empty" values.

/// Defines traits and types for storing node hashes.
pub mod db;
/// Defines errors that might arise in tree construction and hash path verification.
pub mod error;
/// Defines inclusion paths through the tree.
pub mod proof;
/// Defines the merkle tree itself.
pub mod tree;
/// Heap index arithmetic.
pub mod utils;
