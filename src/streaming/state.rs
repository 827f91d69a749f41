//! Per-node streaming state machine

use crate::octree::NodeId;
use std::collections::HashMap;

/// Where a node is in its load cycle.
///
/// `NotLoaded -> Loading -> Resident -> Evicted -> NotLoaded`. A failed or
/// abandoned load returns `Loading -> NotLoaded`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeState {
    #[default]
    NotLoaded,
    Loading,
    Resident,
    Evicted,
}

impl NodeState {
    /// Check whether moving to `next` is a legal transition
    pub fn can_transition(self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (NotLoaded, Loading)
                | (Loading, Resident)
                | (Loading, NotLoaded)
                | (Resident, Evicted)
                | (Evicted, NotLoaded)
        )
    }
}

/// State of every node the manager has touched; absent ids are `NotLoaded`
#[derive(Debug, Default)]
pub struct NodeStateTable {
    states: HashMap<NodeId, NodeState>,
}

impl NodeStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state of `id`
    pub fn get(&self, id: NodeId) -> NodeState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    /// Move `id` to `next` if the transition is legal
    ///
    /// # Returns
    /// True if the state changed
    pub fn transition(&mut self, id: NodeId, next: NodeState) -> bool {
        let current = self.get(id);
        if !current.can_transition(next) {
            log::debug!("Ignored node {} transition {:?} -> {:?}", id, current, next);
            return false;
        }
        if next == NodeState::NotLoaded {
            self.states.remove(&id);
        } else {
            self.states.insert(id, next);
        }
        true
    }

    /// Ids currently in `state` (never lists `NotLoaded`)
    pub fn with_state(&self, state: NodeState) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .states
            .iter()
            .filter(|&(_, s)| *s == state)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of nodes in `state` (never counts `NotLoaded`)
    pub fn count(&self, state: NodeState) -> usize {
        self.states.values().filter(|&&s| s == state).count()
    }

    /// Return every evicted node to `NotLoaded`
    pub fn settle_evicted(&mut self) -> usize {
        let before = self.states.len();
        self.states.retain(|_, s| *s != NodeState::Evicted);
        before - self.states.len()
    }
}
