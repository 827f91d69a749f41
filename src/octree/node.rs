//! Octree node and node id

use crate::core::types::DVec3;
use crate::math::Aabb;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena index of an octree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The root node is always the first arena slot
    pub const ROOT: NodeId = NodeId(0);

    /// Get arena index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One octree cell.
///
/// A node keeps the first points that reach it, up to the bucket capacity.
/// Once the bucket is full, later points pass through to children that are
/// created lazily per receiving octant, so every node also serves as a
/// coarse level of detail for its subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeNode<P> {
    pub(crate) bbox: Aabb,
    pub(crate) depth: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: [Option<NodeId>; 8],
    pub(crate) points: Vec<P>,
    /// Set when the bucket filled up with points all at this position
    pub(crate) coincident: Option<DVec3>,
    pub(crate) subtree_points: u64,
}

impl<P> OctreeNode<P> {
    /// Create an empty leaf
    pub fn new(bbox: Aabb, depth: u32, parent: Option<NodeId>) -> Self {
        Self {
            bbox,
            depth,
            parent,
            children: [None; 8],
            points: Vec::new(),
            coincident: None,
            subtree_points: 0,
        }
    }

    /// Get bounding box
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// Get depth (root = 0)
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Get parent id, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Get child in octant `octant` (0-7)
    pub fn child(&self, octant: u8) -> Option<NodeId> {
        self.children[octant as usize]
    }

    /// Existing children in octant order
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().flatten().copied()
    }

    /// Bit `i` set when octant `i` has a child
    pub fn child_mask(&self) -> u8 {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Points stored directly in this node
    pub fn points(&self) -> &[P] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Points in this node and all descendants
    pub fn subtree_point_count(&self) -> u64 {
        self.subtree_points
    }
}
