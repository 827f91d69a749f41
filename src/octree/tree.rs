//! Arena point octree

use super::node::{NodeId, OctreeNode};
use crate::core::types::DVec3;
use crate::math::Aabb;
use crate::point::{PointAccessor, PointRecord};

/// Depth at which nodes stop subdividing regardless of bucket size.
///
/// At this depth a cell of a 10^6 unit dataset is a few nanometres wide,
/// close to the resolution of `f64` coordinates at that magnitude.
pub const MAX_OCTREE_DEPTH: u32 = 48;

/// Summary of an octree's shape
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OctreeStats {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Nodes holding at least one point
    pub populated_count: usize,
    pub depth: u32,
    pub point_count: u64,
    /// Largest single bucket
    pub max_bucket: usize,
}

/// Point octree stored as a flat node arena (root at index 0)
#[derive(Clone, Debug)]
pub struct PointOctree<P> {
    nodes: Vec<OctreeNode<P>>,
    bucket_capacity: usize,
}

impl<P: PointRecord> PointOctree<P> {
    /// Create a tree with an empty root leaf covering `bbox`
    pub fn new(bbox: Aabb, bucket_capacity: usize) -> Self {
        Self {
            nodes: vec![OctreeNode::new(bbox, 0, None)],
            bucket_capacity: bucket_capacity.max(1),
        }
    }

    /// Reassemble a tree from nodes already linked by id
    pub(crate) fn from_nodes(mut nodes: Vec<OctreeNode<P>>, bucket_capacity: usize) -> Self {
        for node in &mut nodes {
            if node.points.len() >= bucket_capacity {
                node.coincident = Self::common_position(&node.points);
            }
        }
        Self {
            nodes,
            bucket_capacity,
        }
    }

    /// Get root node
    pub fn root(&self) -> &OctreeNode<P> {
        &self.nodes[0]
    }

    /// Get node by id
    pub fn node(&self, id: NodeId) -> Option<&OctreeNode<P>> {
        self.nodes.get(id.index())
    }

    /// All nodes in arena order
    pub fn nodes(&self) -> &[OctreeNode<P>] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    /// Dataset bounding box
    pub fn bbox(&self) -> &Aabb {
        &self.root().bbox
    }

    pub fn point_count(&self) -> u64 {
        self.root().subtree_points
    }

    /// True when the tree holds no points
    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Deepest node depth
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Insert one point into the first node on its path with room
    pub(crate) fn insert(&mut self, point: P) {
        let acc = P::accessor();
        let pos = acc.position64(&point);
        let capacity = self.bucket_capacity;
        let mut id = NodeId::ROOT;

        loop {
            let node = &mut self.nodes[id.index()];
            node.subtree_points += 1;

            let keep = node.points.len() < capacity
                || node.coincident == Some(pos)
                || node.depth >= MAX_OCTREE_DEPTH;
            if keep {
                node.points.push(point);
                if node.points.len() == capacity {
                    node.coincident = Self::common_position(&node.points);
                }
                return;
            }

            let octant = node.bbox.octant_of(pos);
            id = self.child_or_create(id, octant);
        }
    }

    /// Position shared by every point, if they all coincide
    fn common_position(points: &[P]) -> Option<DVec3> {
        let acc = P::accessor();
        let first = acc.position64(points.first()?);
        points[1..]
            .iter()
            .all(|p| acc.position64(p) == first)
            .then_some(first)
    }

    fn child_or_create(&mut self, parent: NodeId, octant: u8) -> NodeId {
        if let Some(child) = self.nodes[parent.index()].children[octant as usize] {
            return child;
        }
        let (bbox, depth) = {
            let node = &self.nodes[parent.index()];
            (node.bbox.child_octant(octant), node.depth + 1)
        };
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(OctreeNode::new(bbox, depth, Some(parent)));
        self.nodes[parent.index()].children[octant as usize] = Some(id);
        id
    }

    /// Visit nodes depth-first, pre-order, children in octant order
    pub fn traverse<F: FnMut(NodeId, &OctreeNode<P>)>(&self, mut visit: F) {
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            visit(id, node);
            for octant in (0..8).rev() {
                if let Some(child) = node.children[octant] {
                    stack.push(child);
                }
            }
        }
    }

    /// Node ids in [`traverse`](Self::traverse) order
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.traverse(|id, _| order.push(id));
        order
    }

    /// Leaf nodes in arena order
    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &OctreeNode<P>)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Compute shape statistics
    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats {
            node_count: self.nodes.len(),
            point_count: self.point_count(),
            ..Default::default()
        };
        for node in &self.nodes {
            if node.is_leaf() {
                stats.leaf_count += 1;
            }
            if !node.points.is_empty() {
                stats.populated_count += 1;
            }
            stats.depth = stats.depth.max(node.depth);
            stats.max_bucket = stats.max_bucket.max(node.points.len());
        }
        stats
    }
}
