//! Flat, placeholder padded encoding of k-d trees.
//!
//! Nodes are laid out in heap order: the node in slot `i` has its children in
//! slots `2i + 1` and `2i + 2`. Each slot holds `dims` coordinates, and slots with
//! no node are filled with [`EMPTY_PLACEHOLDER`]. A tree of height `h` occupies
//! `2^h - 1` slots, so the receiving side needs only the length of the buffer.

use crate::{
    constants::EMPTY_PLACEHOLDER,
    error::{BuildError, Result},
    types::{node::KNode, point::Coordinate},
};

/// Number of slots needed to store a tree of the given height.
fn slots(height: usize) -> Result<usize> {
    u32::try_from(height)
        .ok()
        .and_then(|h| 1usize.checked_shl(h))
        .filter(|&n| n != 0)
        .map(|n| n - 1)
        .ok_or_else(|| BuildError::Codec(format!("a tree of height {height} cannot be encoded")))
}

fn fill(node: &KNode, slot: usize, dims: usize, buffer: &mut [Coordinate]) {
    buffer[slot * dims..(slot + 1) * dims].copy_from_slice(node.coordinate());

    if let Some(left) = node.left() {
        fill(left, 2 * slot + 1, dims, buffer);
    }
    if let Some(right) = node.right() {
        fill(right, 2 * slot + 2, dims, buffer);
    }
}

/// Flatten a subtree. An absent subtree packs to an empty buffer.
pub fn pack(root: Option<&KNode>, dims: usize) -> Result<Vec<Coordinate>> {
    let root = match root {
        Some(root) => root,
        None => return Ok(Vec::new()),
    };

    let nslots = slots(root.height())?;
    let size = nslots
        .checked_mul(dims)
        .ok_or_else(|| BuildError::Codec(format!("{nslots} slots of {dims} dims overflow")))?;

    let mut buffer = vec![EMPTY_PLACEHOLDER; size];
    fill(root, 0, dims, &mut buffer);
    Ok(buffer)
}

fn grow(data: &[Coordinate], slot: usize, dims: usize) -> Option<Box<KNode>> {
    let group = data.get(slot * dims..(slot + 1) * dims)?;
    if group[0] == EMPTY_PLACEHOLDER {
        return None;
    }

    // Slot indices stay below data.len() / dims, so 2 * slot + 2 cannot overflow.
    Some(Box::new(KNode::with_children(
        group.to_vec(),
        grow(data, 2 * slot + 1, dims),
        grow(data, 2 * slot + 2, dims),
    )))
}

/// Rebuild a subtree from its flat form. Slots under a placeholder are ignored.
pub fn unpack(data: &[Coordinate], dims: usize) -> Result<Option<Box<KNode>>> {
    if dims == 0 {
        return Err(BuildError::Codec("dims must be at least 1".to_string()));
    }
    if data.len() % dims != 0 {
        return Err(BuildError::Codec(format!(
            "buffer of {} coordinates is not a whole number of {dims} dimensional slots",
            data.len()
        )));
    }
    Ok(grow(data, 0, dims))
}
