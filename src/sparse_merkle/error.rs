use thiserror::Error;

/// An error that occurred while constructing or updating a sparse merkle tree.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TreeError {
    /// The requested depth is outside of the supported range `1..=32`
    #[error("invalid tree depth {0}: must be between 1 and 32")]
    InvalidDepth(u32),
    /// Empty leaves must have a non-zero length
    #[error("invalid default leaf length: must be non-zero")]
    InvalidLeafBytes,
    /// The node index does not exist in a tree of this depth
    #[error("node index {index} is out of range (max {max})")]
    IndexOutOfRange {
        /// The offending heap index
        index: u64,
        /// The largest valid heap index
        max: u64,
    },
}

/// An error that occurred while trying to check a claimed hash path.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum HashPathError {
    /// The element index has more bits than the path has levels
    #[error("element index {index} does not fit in a path of {len} levels")]
    IndexOutOfRange {
        /// The claimed element index
        index: u64,
        /// The number of levels in the path
        len: usize,
    },
    /// The value computed for some level does not appear on the expected side of the next pair
    #[error("hash path does not contain the computed node at level {level}")]
    SiblingMismatch {
        /// The level (counting from the leaf) at which the path diverged
        level: usize,
    },
    /// The claimed path does not verify against the provided root
    #[error("hash path does not lead to the expected root")]
    InvalidRoot,
}
