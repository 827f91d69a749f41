//! Node index (`octree.index`)

use super::metadata::StoreMetadata;
use super::StoreCompression;
use crate::core::error::Error;
use crate::core::types::{DVec3, Result};
use crate::math::Aabb;
use crate::octree::NodeId;
use rkyv::{Archive, Deserialize, Serialize};

/// Marks an absent parent or child
pub const NO_NODE: u32 = u32::MAX;

/// Index record for one node
#[derive(Clone, Debug, PartialEq, Archive, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: u32,
    pub depth: u32,
    /// Parent id or [`NO_NODE`] for the root
    pub parent: u32,
    /// Bit `i` set when octant `i` has a child
    pub child_mask: u8,
    /// Child ids per octant, [`NO_NODE`] where absent
    pub children: [u32; 8],
    pub bbox_min: [f64; 3],
    pub bbox_max: [f64; 3],
    /// Points stored in this node's blob
    pub point_count: u64,
    /// Points in this node and all descendants
    pub subtree_point_count: u64,
    /// Blob byte offset in the data file
    pub offset: u64,
    /// Blob byte length in the data file (compressed size when compressed)
    pub length: u64,
}

impl NodeEntry {
    pub fn node_id(&self) -> NodeId {
        NodeId(self.id)
    }

    pub fn bbox(&self) -> Aabb {
        Aabb::new(DVec3::from_array(self.bbox_min), DVec3::from_array(self.bbox_max))
    }

    pub fn parent(&self) -> Option<NodeId> {
        (self.parent != NO_NODE).then_some(NodeId(self.parent))
    }

    pub fn child(&self, octant: u8) -> Option<NodeId> {
        let id = self.children[octant as usize];
        (id != NO_NODE).then_some(NodeId(id))
    }

    /// Existing children in octant order
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children
            .iter()
            .filter(|&&id| id != NO_NODE)
            .map(|&id| NodeId(id))
    }

    pub fn is_leaf(&self) -> bool {
        self.child_mask == 0
    }
}

/// Table of every node, indexed by node id
#[derive(Clone, Debug, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct NodeIndex {
    pub entries: Vec<NodeEntry>,
}

impl NodeIndex {
    /// Get entry for `id`
    pub fn get(&self, id: NodeId) -> Option<&NodeEntry> {
        self.entries.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize with rkyv
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| Error::CorruptIndex(format!("failed to serialize index: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// Validate and deserialize an rkyv archive
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        // File buffers carry no alignment guarantee
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);

        let archived = rkyv::access::<ArchivedNodeIndex, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        rkyv::deserialize::<NodeIndex, rkyv::rancor::Error>(archived)
            .map_err(|e| Error::CorruptIndex(e.to_string()))
    }

    /// Check the index against the metadata and the data file size
    pub fn validate(&self, meta: &StoreMetadata, data_len: u64) -> Result<()> {
        let corrupt = |msg: String| Err(Error::CorruptIndex(msg));

        if self.entries.len() != meta.node_count {
            return corrupt(format!(
                "index has {} nodes, metadata declares {}",
                self.entries.len(),
                meta.node_count
            ));
        }
        let Some(root) = self.entries.first() else {
            return corrupt("index has no root node".into());
        };
        if root.parent != NO_NODE {
            return corrupt("root node has a parent".into());
        }
        if root.subtree_point_count != meta.point_count {
            return corrupt(format!(
                "root holds {} points, metadata declares {}",
                root.subtree_point_count, meta.point_count
            ));
        }

        let record_size = meta.schema.record_size() as u64;
        let mut total = 0u64;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.id as usize != i {
                return corrupt(format!("entry {} carries id {}", i, entry.id));
            }
            let end = entry.offset.checked_add(entry.length);
            if end.is_none_or(|end| end > data_len) {
                return corrupt(format!(
                    "node {} blob {}+{} exceeds data file of {} bytes",
                    i, entry.offset, entry.length, data_len
                ));
            }
            if meta.compression == StoreCompression::None
                && entry.length != entry.point_count * record_size
            {
                return corrupt(format!(
                    "node {} blob is {} bytes, expected {} points of {} bytes",
                    i, entry.length, entry.point_count, record_size
                ));
            }

            let mut children_total = 0u64;
            for octant in 0..8u8 {
                let has_bit = entry.child_mask & (1 << octant) != 0;
                match entry.child(octant) {
                    None if has_bit => {
                        return corrupt(format!("node {} mask names a missing child", i));
                    }
                    None => {}
                    Some(_) if !has_bit => {
                        return corrupt(format!("node {} child {} not in mask", i, octant));
                    }
                    Some(child) => {
                        let Some(c) = self.get(child) else {
                            return corrupt(format!("node {} child {} out of range", i, child));
                        };
                        if c.parent != entry.id || c.depth != entry.depth + 1 {
                            return corrupt(format!("node {} does not link back to {}", child, i));
                        }
                        children_total += c.subtree_point_count;
                    }
                }
            }
            if entry.subtree_point_count != entry.point_count + children_total {
                return corrupt(format!("node {} subtree count does not add up", i));
            }
            total += entry.point_count;
        }

        if total != meta.point_count {
            return corrupt(format!(
                "nodes hold {} points, metadata declares {}",
                total, meta.point_count
            ));
        }
        Ok(())
    }
}
