//! Sequential construction, used on a single worker and wherever a subtree is
//! owned by one worker only.

use crate::types::{node::KNode, point::PointSet};

/// Build the subtree for `points`, whose root sits at `depth`.
pub fn build(points: PointSet, depth: usize) -> Option<Box<KNode>> {
    let split = points.median_split(depth)?;

    let left = build(split.low, depth + 1);
    let right = build(split.high, depth + 1);

    Some(Box::new(KNode::with_children(split.median, left, right)))
}
