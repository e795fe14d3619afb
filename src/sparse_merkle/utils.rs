//! Helpers for navigating a complete binary tree stored in heap order.
//!
//! The root lives at index 0 and the children of node `i` live at `2i + 1` and `2i + 2`.
//! A tree of depth `d` therefore holds its `2^d` leaves at indices `2^d - 1 ..= 2^(d+1) - 2`.

/// Computes the depth of a node from its heap index. The root has depth 0.
///
/// This is `bitlength(index + 1) - 1`, computed without any floating point.
pub fn index_depth(index: u64) -> u32 {
    // index + 1 is never zero for the index space we support (at most 2^33 - 2)
    u64::BITS - 1 - (index + 1).leading_zeros()
}

/// Returns the parent of the node at `index`, or `None` for the root.
pub fn parent(index: u64) -> Option<u64> {
    if index == 0 {
        None
    } else {
        Some((index - 1) / 2)
    }
}

/// The heap index of the left child of `index`.
pub fn left_child(index: u64) -> u64 {
    2 * index + 1
}

/// The heap index of the right child of `index`.
pub fn right_child(index: u64) -> u64 {
    2 * index + 2
}

/// Returns true if the node at `index` is the left child of its parent.
pub fn is_left_child(index: u64) -> bool {
    index % 2 == 1
}

/// The number of leaves in a tree of the given depth.
pub fn leaf_count(depth: u32) -> u64 {
    1u64 << depth
}

/// Maps a 0-based element (leaf) index to its heap index.
pub fn leaf_index(depth: u32, element: u64) -> u64 {
    element + leaf_count(depth) - 1
}

/// The largest valid heap index in a tree of the given depth.
pub fn max_index(depth: u32) -> u64 {
    (leaf_count(depth) << 1) - 2
}
