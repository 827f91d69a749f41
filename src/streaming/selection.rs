//! Per-frame node selection under a point budget

use crate::core::view::ViewState;
use crate::math::frustum::Frustum;
use crate::octree::NodeId;
use crate::store::NodeIndex;
use crate::streaming::budget::PointBudget;
use crate::streaming::config::StreamingConfig;
use crate::streaming::lod::{projected_size, should_refine, size_threshold};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Frontier entry, ordered by projected size
#[derive(Clone, Copy, Debug)]
pub struct NodePriority {
    pub id: NodeId,
    /// Projected size in pixels; larger is more important
    pub projected_size: f64,
}

impl Eq for NodePriority {}

impl PartialEq for NodePriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for NodePriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on size; equal sizes pop in id order for stable output
        self.projected_size
            .total_cmp(&other.projected_size)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for NodePriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A node chosen for this frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectedNode {
    pub id: NodeId,
    pub projected_size: f64,
    pub point_count: u64,
}

/// Result of one selection pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// Selected nodes in frontier pop order
    pub nodes: Vec<SelectedNode>,
    /// Points across all selected nodes
    pub points: u64,
    /// Nodes rejected by the frustum test
    pub culled: usize,
}

impl Selection {
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Choose the nodes to show for `view`.
///
/// Walks the index from the root through a frontier ordered by projected
/// size. A popped node with points is selected if they fit the remaining
/// budget. It is refined only when its projected size exceeds the threshold
/// and the points held directly by its visible children fit what is left.
/// Nodes outside the frustum are skipped along with their subtrees.
pub fn select_nodes(index: &NodeIndex, view: &ViewState, config: &StreamingConfig) -> Selection {
    let mut selection = Selection::default();
    let mut budget = PointBudget::new(config.point_budget);

    let Some(root) = index.get(NodeId::ROOT) else {
        return selection;
    };
    if budget.limit() == 0 || root.subtree_point_count == 0 {
        return selection;
    }

    let frustum = Frustum::from_view_projection(&view.view_projection());
    let threshold = size_threshold(config.projected_size_modifier, view.viewport_height);

    let root_bbox = root.bbox();
    if !frustum.intersects_aabb(&root_bbox) {
        selection.culled = 1;
        return selection;
    }

    let mut frontier = BinaryHeap::new();
    frontier.push(NodePriority {
        id: NodeId::ROOT,
        projected_size: projected_size(&root_bbox, view),
    });

    while let Some(item) = frontier.pop() {
        let Some(entry) = index.get(item.id) else {
            continue;
        };

        if entry.point_count > 0 {
            if !budget.try_spend(entry.point_count) {
                continue;
            }
            selection.nodes.push(SelectedNode {
                id: item.id,
                projected_size: item.projected_size,
                point_count: entry.point_count,
            });
        }

        if !should_refine(item.projected_size, threshold) {
            continue;
        }

        let mut visible = Vec::with_capacity(8);
        for child in entry.children() {
            let Some(child_entry) = index.get(child) else {
                continue;
            };
            if child_entry.subtree_point_count == 0 {
                continue;
            }
            let bbox = child_entry.bbox();
            if frustum.intersects_aabb(&bbox) {
                visible.push((child, child_entry.point_count, bbox));
            } else {
                selection.culled += 1;
            }
        }

        let needed: u64 = visible.iter().map(|(_, points, _)| points).sum();
        if !budget.fits(needed) {
            continue;
        }
        for (id, _, bbox) in visible {
            frontier.push(NodePriority {
                id,
                projected_size: projected_size(&bbox, view),
            });
        }
    }

    selection.points = budget.used();
    log::debug!(
        "Selected {} nodes ({} points of {}), {} culled",
        selection.nodes.len(),
        selection.points,
        config.point_budget,
        selection.culled
    );
    selection
}
