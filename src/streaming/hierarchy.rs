//! Breadth-first table of the visible octree, for adaptive point sizing
//!
//! A shader sizes a point by how deep the visible octree goes at its
//! position. It walks the table from the root: each entry names which
//! octants have visible children and how far ahead the first of them sits.

use crate::octree::NodeId;
use crate::store::NodeIndex;
use std::collections::{HashMap, HashSet, VecDeque};

/// One visible node in the hierarchy table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeHierarchyEntry {
    pub id: NodeId,
    /// Bit `o` set when the child in octant `o` is visible
    pub child_mask: u8,
    /// Entries from this one to its first visible child, 0 without children
    pub first_child_offset: u32,
}

impl NodeHierarchyEntry {
    pub fn visible_children(&self) -> u32 {
        self.child_mask.count_ones()
    }
}

/// Build the table for `visible` nodes.
///
/// Entries are in breadth-first order with children in octant order, so the
/// visible children of an entry are contiguous. Only nodes whose every
/// ancestor is visible are linked into the table; the rest cannot be
/// reached from the root and are left out. Empty when the root is not
/// visible.
pub fn visible_hierarchy(index: &NodeIndex, visible: &[NodeId]) -> Vec<NodeHierarchyEntry> {
    let visible: HashSet<NodeId> = visible.iter().copied().collect();
    if !visible.contains(&NodeId::ROOT) || index.get(NodeId::ROOT).is_none() {
        return Vec::new();
    }

    let mut table: Vec<NodeHierarchyEntry> = Vec::with_capacity(visible.len());
    let mut slots: HashMap<NodeId, usize> = HashMap::with_capacity(visible.len());
    // (node, octant in its parent)
    let mut queue = VecDeque::from([(NodeId::ROOT, 0u8)]);

    while let Some((id, octant)) = queue.pop_front() {
        let Some(entry) = index.get(id) else {
            continue;
        };
        let slot = table.len();
        table.push(NodeHierarchyEntry {
            id,
            child_mask: 0,
            first_child_offset: 0,
        });
        slots.insert(id, slot);

        if let Some(parent_slot) = entry.parent().and_then(|p| slots.get(&p).copied()) {
            let parent = &mut table[parent_slot];
            if parent.child_mask == 0 {
                parent.first_child_offset = (slot - parent_slot) as u32;
            }
            parent.child_mask |= 1 << octant;
        }

        for child_octant in 0..8u8 {
            if let Some(child) = entry.child(child_octant) {
                if visible.contains(&child) {
                    queue.push_back((child, child_octant));
                }
            }
        }
    }

    log::trace!(
        "Visible hierarchy: {} of {} visible nodes linked",
        table.len(),
        visible.len()
    );
    table
}
