use sha2::{Digest, Sha256};

use crate::sparse_merkle::tree::MerkleHash;

const LEAF_DOMAIN: [u8; 1] = [0x00];
const NODE_DOMAIN: [u8; 1] = [0x01];

/// A domain separated sha256 hasher. Leaves are prefixed with `0x00` and inner nodes with `0x01`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    /// Returns the hasher.
    pub fn new() -> Self {
        Self
    }
}

impl MerkleHash for Sha256Hasher {
    type Output = [u8; 32];

    fn hash_leaf(&self, data: &[u8]) -> Self::Output {
        Sha256::new_with_prefix(LEAF_DOMAIN)
            .chain_update(data)
            .finalize()
            .into()
    }

    fn hash_nodes(&self, left: &Self::Output, right: &Self::Output) -> Self::Output {
        Sha256::new_with_prefix(NODE_DOMAIN)
            .chain_update(left)
            .chain_update(right)
            .finalize()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separation() {
        let hasher = Sha256Hasher::new();
        let data = [7u8; 64];
        let leaf = hasher.hash_leaf(&data);
        let (l, r) = data.split_at(32);
        let node = hasher.hash_nodes(&l.try_into().unwrap(), &r.try_into().unwrap());
        assert_ne!(leaf, node);
        assert_eq!(
            hex::encode(hasher.hash_leaf(&[])),
            "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
        );
    }

    #[test]
    fn test_node_hash_is_prefixed_concatenation() {
        let hasher = Sha256Hasher::new();
        let left = [1u8; 32];
        let right = [2u8; 32];
        let mut preimage = vec![0x01];
        preimage.extend_from_slice(&left);
        preimage.extend_from_slice(&right);
        let expected: [u8; 32] = Sha256::digest(&preimage).into();
        assert_eq!(hasher.hash_nodes(&left, &right), expected);
        assert_ne!(hasher.hash_nodes(&right, &left), expected);
    }
}
