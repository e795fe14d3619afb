use crate::sparse_merkle::error::TreeError;

/// The deepest tree supported. A tree of this depth has 2^32 leaves.
pub const MAX_DEPTH: u32 = 32;

/// The length in bytes of the default (all-zero) leaf value.
pub const DEFAULT_LEAF_BYTES: usize = 64;

/// The shape of a tree: its depth and the length of the zero-filled default leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeConfig {
    /// Number of levels below the root, in `1..=MAX_DEPTH`
    pub depth: u32,
    /// Length of the default leaf preimage, must be non-zero
    pub leaf_bytes: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: MAX_DEPTH,
            leaf_bytes: DEFAULT_LEAF_BYTES,
        }
    }
}

impl TreeConfig {
    /// A config with the given depth and the default leaf length.
    pub fn new(depth: u32) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    /// Sets the length of the default leaf.
    pub fn with_leaf_bytes(mut self, leaf_bytes: usize) -> Self {
        self.leaf_bytes = leaf_bytes;
        self
    }

    /// Sets the depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Checks the config without building a tree.
    pub fn validate(&self) -> Result<(), TreeError> {
        if !(1..=MAX_DEPTH).contains(&self.depth) {
            return Err(TreeError::InvalidDepth(self.depth));
        }
        if self.leaf_bytes == 0 {
            return Err(TreeError::InvalidLeafBytes);
        }
        Ok(())
    }
}
