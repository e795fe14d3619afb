use super::error::HashPathError;
use super::tree::MerkleHash;

/// An inclusion witness for a single leaf of a sparse merkle tree.
///
/// Each entry holds the `(left, right)` children of one ancestor of the leaf, starting with its
/// immediate parent and ending with the children of the root. The path doesn't record which side
/// the proven node sits on; that is given by the bits of the element index, least significant
/// bit first (a 0 bit means the node is the left child).
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshSerialize, borsh::BorshDeserialize)
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HashPath<H> {
    pairs: Vec<(H, H)>,
}

impl<H> HashPath<H> {
    /// Wraps a leaf-to-root list of sibling pairs.
    pub fn new(pairs: Vec<(H, H)>) -> Self {
        Self { pairs }
    }

    /// Returns the sibling pairs, leaf-most first.
    pub fn pairs(&self) -> &[(H, H)] {
        &self.pairs
    }

    /// The number of levels covered by the path (the depth of the tree for a leaf path).
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if the path has no levels.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Consumes the path, returning its sibling pairs leaf-most first.
    pub fn into_inner(self) -> Vec<(H, H)> {
        self.pairs
    }
}

impl<H: PartialEq> HashPath<H> {
    /// Recomputes the root implied by this path for the given leaf.
    pub fn compute_root<M>(
        &self,
        hasher: &M,
        element: u64,
        leaf_hash: &H,
    ) -> Result<H, HashPathError>
    where
        M: MerkleHash<Output = H>,
        H: Clone,
    {
        let len = self.pairs.len();
        if len < u64::BITS as usize && element >> len != 0 {
            return Err(HashPathError::IndexOutOfRange {
                index: element,
                len,
            });
        }

        let mut current = leaf_hash.clone();
        for (level, (left, right)) in self.pairs.iter().enumerate() {
            let known = if element.checked_shr(level as u32).unwrap_or(0) & 1 == 0 {
                left
            } else {
                right
            };
            if known != &current {
                return Err(HashPathError::SiblingMismatch { level });
            }
            current = hasher.hash_nodes(left, right);
        }
        Ok(current)
    }

    /// Checks that this path proves `leaf_hash` is the leaf at `element` in the tree with `root`.
    pub fn verify<M>(
        &self,
        hasher: &M,
        root: &H,
        element: u64,
        leaf_hash: &H,
    ) -> Result<(), HashPathError>
    where
        M: MerkleHash<Output = H>,
        H: Clone,
    {
        let computed = self.compute_root(hasher, element, leaf_hash)?;
        if &computed == root {
            return Ok(());
        }
        Err(HashPathError::InvalidRoot)
    }
}

impl<H> From<Vec<(H, H)>> for HashPath<H> {
    fn from(pairs: Vec<(H, H)>) -> Self {
        Self::new(pairs)
    }
}
