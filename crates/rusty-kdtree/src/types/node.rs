//! Nodes of a k-d tree, and the tree handed back to the coordinator.

use serde::Serialize;

use crate::{
    error::Result,
    serialize::{pack, unpack},
    types::point::Coordinate,
};

/// A single node of a k-d tree. The node at depth `d` splits its subtree along
/// dimension `d % dims`. Children are exclusively owned and dropped with the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KNode {
    #[serde(rename = "value")]
    coordinate: Vec<Coordinate>,
    left: Option<Box<KNode>>,
    right: Option<Box<KNode>>,
}

impl KNode {
    pub fn new(coordinate: Vec<Coordinate>) -> KNode {
        KNode {
            coordinate,
            left: None,
            right: None,
        }
    }

    pub fn with_children(
        coordinate: Vec<Coordinate>,
        left: Option<Box<KNode>>,
        right: Option<Box<KNode>>,
    ) -> KNode {
        KNode {
            coordinate,
            left,
            right,
        }
    }

    /// Coordinate along `dim`, if the node has that many dimensions.
    pub fn get(&self, dim: usize) -> Option<Coordinate> {
        self.coordinate.get(dim).copied()
    }

    pub fn coordinate(&self) -> &[Coordinate] {
        &self.coordinate
    }

    pub fn left(&self) -> Option<&KNode> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&KNode> {
        self.right.as_deref()
    }

    /// Number of nodes in this subtree.
    pub fn len(&self) -> usize {
        1 + self.left().map_or(0, KNode::len) + self.right().map_or(0, KNode::len)
    }

    /// Number of levels in this subtree, a leaf has height 1.
    pub fn height(&self) -> usize {
        1 + self
            .left()
            .map_or(0, KNode::height)
            .max(self.right().map_or(0, KNode::height))
    }

    /// Coordinates of every node in pre-order.
    pub fn points(&self) -> Vec<Vec<Coordinate>> {
        let mut points = Vec::with_capacity(self.len());
        let mut work_list = vec![self];

        while let Some(node) = work_list.pop() {
            points.push(node.coordinate.clone());
            if let Some(right) = node.right() {
                work_list.push(right);
            }
            if let Some(left) = node.left() {
                work_list.push(left);
            }
        }
        points
    }

    /// Check the k-d property for this subtree, rooted at `depth`: every coordinate
    /// on the left is `<=` this node's along the split dimension, every one on the
    /// right is `>=`.
    pub fn is_valid(&self, depth: usize) -> bool {
        let Some(axis) = depth.checked_rem(self.coordinate.len()) else {
            return false;
        };
        let split = self.coordinate[axis];

        let left_ok = self.left().map_or(true, |left| {
            left.points().iter().all(|p| p.get(axis).map_or(false, |&c| c <= split)) && left.is_valid(depth + 1)
        });
        let right_ok = self.right().map_or(true, |right| {
            right.points().iter().all(|p| p.get(axis).map_or(false, |&c| c >= split)) && right.is_valid(depth + 1)
        });

        left_ok && right_ok
    }
}

/// A k-d tree over points of `dims` dimensions. The root is absent for an empty tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KdTree {
    dims: usize,
    root: Option<Box<KNode>>,
}

impl KdTree {
    pub fn new(root: Option<Box<KNode>>, dims: usize) -> KdTree {
        KdTree { dims, root }
    }

    /// Rebuild a tree from its flat serialized form.
    pub fn from_serialized(data: &[Coordinate], dims: usize) -> Result<KdTree> {
        Ok(KdTree {
            dims,
            root: unpack(data, dims)?,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn root(&self) -> Option<&KNode> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.root().map_or(0, KNode::len)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn height(&self) -> usize {
        self.root().map_or(0, KNode::height)
    }

    /// Coordinates of every node, sorted, so trees built differently can be compared.
    pub fn sorted_points(&self) -> Vec<Vec<Coordinate>> {
        let mut points = self.root().map_or_else(Vec::new, KNode::points);
        points.sort();
        points
    }

    pub fn is_valid(&self) -> bool {
        self.root().map_or(true, |root| root.is_valid(0))
    }

    /// The flat, placeholder padded form of the tree handed to callers. Empty for
    /// an empty tree.
    pub fn finalize(&self) -> Result<Vec<Coordinate>> {
        pack(self.root(), self.dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(coordinate: Vec<Coordinate>) -> Option<Box<KNode>> {
        Some(Box::new(KNode::new(coordinate)))
    }

    /// Tree built from the 2D staircase (9,1), (8,2), ..., (4,6).
    fn staircase_tree() -> KNode {
        KNode::with_children(
            vec![7, 3],
            Some(Box::new(KNode::with_children(
                vec![5, 5],
                leaf(vec![6, 4]),
                leaf(vec![4, 6]),
            ))),
            Some(Box::new(KNode::with_children(
                vec![8, 2],
                leaf(vec![9, 1]),
                None,
            ))),
        )
    }

    #[test]
    fn test_accessors() {
        let tree = staircase_tree();

        assert_eq!(tree.get(0), Some(7));
        assert_eq!(tree.get(1), Some(3));
        assert_eq!(tree.get(2), None);
        assert_eq!(tree.left().unwrap().coordinate(), &[5, 5]);
        assert!(tree.right().unwrap().right().is_none());
    }

    #[test]
    fn test_len_and_height() {
        let tree = staircase_tree();
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.height(), 3);
        assert_eq!(KNode::new(vec![1]).height(), 1);
    }

    #[test]
    fn test_points_pre_order() {
        let points = staircase_tree().points();
        let expected: Vec<Vec<Coordinate>> = vec![
            vec![7, 3],
            vec![5, 5],
            vec![6, 4],
            vec![4, 6],
            vec![8, 2],
            vec![9, 1],
        ];
        assert_eq!(points, expected);
    }

    #[test]
    fn test_is_valid() {
        assert!(staircase_tree().is_valid(0));

        let broken = KNode::with_children(vec![5, 5], leaf(vec![6, 0]), None);
        assert!(!broken.is_valid(0));
        // Along the second dimension the same node is fine.
        assert!(broken.is_valid(1));

        assert!(!KNode::new(vec![]).is_valid(0));
        let short_child = KNode::with_children(vec![5, 5], leaf(vec![]), None);
        assert!(!short_child.is_valid(1));
    }

    #[test]
    fn test_kdtree() {
        let tree = KdTree::new(Some(Box::new(staircase_tree())), 2);
        assert_eq!(tree.len(), 6);
        assert!(tree.is_valid());
        assert_eq!(tree.sorted_points()[0], vec![4, 6]);

        let empty = KdTree::new(None, 2);
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert!(empty.finalize().unwrap().is_empty());
    }
}
