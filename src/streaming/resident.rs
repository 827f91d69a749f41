//! LRU set of resident nodes
//!
//! Holds the decoded points and draw buffers of every node in memory. Access
//! order is tracked so eviction can drop the least recently used nodes first.

use crate::math::Aabb;
use crate::octree::NodeId;
use crate::store::NodeData;
use crate::streaming::chunking::DrawBufferChunk;
use std::collections::HashMap;
use std::sync::Arc;

/// A node held in memory
#[derive(Debug)]
pub struct ResidentNode<P> {
    pub id: NodeId,
    pub bbox: Aabb,
    pub points: NodeData<P>,
    pub chunks: Arc<[DrawBufferChunk]>,
}

impl<P> ResidentNode<P> {
    pub fn point_count(&self) -> u64 {
        self.points.len() as u64
    }
}

/// Resident node set with least-recently-used ordering
pub struct ResidentSet<P> {
    nodes: HashMap<NodeId, ResidentNode<P>>,
    /// Access order: oldest first, newest last
    access_order: Vec<NodeId>,
    /// Sum of points over all resident nodes
    points: u64,
}

impl<P> Default for ResidentSet<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ResidentSet<P> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            access_order: Vec::new(),
            points: 0,
        }
    }

    /// Get a node and mark it as recently used
    pub fn touch(&mut self, id: NodeId) -> Option<&ResidentNode<P>> {
        if self.nodes.contains_key(&id) {
            self.update_access_order(id);
            self.nodes.get(&id)
        } else {
            None
        }
    }

    /// Get a node without changing the access order
    pub fn get(&self, id: NodeId) -> Option<&ResidentNode<P>> {
        self.nodes.get(&id)
    }

    /// Insert a node as most recently used
    ///
    /// # Returns
    /// The node previously stored under the same id
    pub fn insert(&mut self, node: ResidentNode<P>) -> Option<ResidentNode<P>> {
        let id = node.id;
        let replaced = self.remove(id);
        self.points += node.point_count();
        self.nodes.insert(id, node);
        self.access_order.push(id);
        replaced
    }

    /// Remove a node
    pub fn remove(&mut self, id: NodeId) -> Option<ResidentNode<P>> {
        let node = self.nodes.remove(&id)?;
        self.remove_from_access_order(id);
        self.points -= node.point_count();
        Some(node)
    }

    /// Replace the draw buffers of a resident node
    pub fn set_chunks(&mut self, id: NodeId, chunks: Vec<DrawBufferChunk>) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.chunks = chunks.into();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get the number of resident nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total points held
    pub fn point_count(&self) -> u64 {
        self.points
    }

    /// Ids from least to most recently used
    pub fn lru_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.access_order.iter().copied()
    }

    /// Iterate over resident nodes in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &ResidentNode<P>> {
        self.nodes.values()
    }

    /// Evict the least recently used node that `keep` does not protect
    pub fn evict_oldest_where<F: Fn(NodeId) -> bool>(&mut self, keep: F) -> Option<ResidentNode<P>> {
        let id = self.access_order.iter().copied().find(|&id| !keep(id))?;
        self.remove(id)
    }

    fn update_access_order(&mut self, id: NodeId) {
        self.remove_from_access_order(id);
        self.access_order.push(id);
    }

    fn remove_from_access_order(&mut self, id: NodeId) {
        if let Some(pos) = self.access_order.iter().position(|&n| n == id) {
            self.access_order.remove(pos);
        }
    }
}
