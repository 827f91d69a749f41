//! Frame-driven streaming of store nodes
//!
//! [`StreamingManager::update`] is called once per frame. It folds finished
//! loads into the resident set, selects the nodes worth showing, requests
//! the missing ones, and evicts what no longer fits the resident capacity.

use crate::core::types::Result;
use crate::core::view::ViewState;
use crate::math::Aabb;
use crate::octree::NodeId;
use crate::point::PointRecord;
use crate::store::{NodeData, PagedStoreReader};
use crate::streaming::chunking::{ChunkSettings, DrawBufferChunk, chunk_nodes};
use crate::streaming::config::{LoaderConfig, PointSizeMode, StreamingConfig};
use crate::streaming::hierarchy::{NodeHierarchyEntry, visible_hierarchy};
use crate::streaming::loader::{LoadResult, NodeLoader};
use crate::streaming::resident::{ResidentNode, ResidentSet};
use crate::streaming::selection::{Selection, select_nodes};
use crate::streaming::state::{NodeState, NodeStateTable};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// A resident node to draw this frame
#[derive(Clone, Debug)]
pub struct VisibleNode {
    pub id: NodeId,
    pub bbox: Aabb,
    pub chunks: Arc<[DrawBufferChunk]>,
}

impl VisibleNode {
    pub fn point_count(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }
}

/// Counters for one update
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Nodes chosen by selection
    pub selected: usize,
    /// Selected nodes that were resident and returned
    pub visible: usize,
    /// Loads in flight after the update
    pub loading: usize,
    /// Resident nodes after the update
    pub resident: usize,
    /// Nodes evicted during the update
    pub evicted: usize,
    /// Points across all visible nodes
    pub visible_points: u64,
    /// Loads that failed and were returned to not loaded
    pub failed: usize,
}

/// Output of one update
#[derive(Clone, Debug, Default)]
pub struct FrameOutput {
    /// Visible nodes in selection order
    pub nodes: Vec<VisibleNode>,
    /// Breadth-first table of the visible nodes; only filled in
    /// [`PointSizeMode::AdaptiveSize`]
    pub hierarchy: Vec<NodeHierarchyEntry>,
    pub stats: FrameStats,
}

/// Drives selection, loading and eviction for one store
pub struct StreamingManager<P: PointRecord> {
    reader: Arc<PagedStoreReader<P>>,
    loader: NodeLoader<P>,
    states: NodeStateTable,
    resident: ResidentSet<P>,
    /// Settings the resident chunks were built with
    chunk_settings: Option<ChunkSettings>,
    frame: u64,
}

impl<P: PointRecord> StreamingManager<P> {
    /// Create a manager with a background loader pool
    pub fn new(reader: Arc<PagedStoreReader<P>>, config: &LoaderConfig) -> Result<Self> {
        let loader = NodeLoader::new(Arc::clone(&reader), config)?;
        Ok(Self::with_loader(reader, loader))
    }

    /// Create a manager around an existing loader
    pub fn with_loader(reader: Arc<PagedStoreReader<P>>, loader: NodeLoader<P>) -> Self {
        log::info!(
            "Streaming {} points in {} nodes from {:?}",
            reader.metadata().point_count,
            reader.metadata().node_count,
            reader.dir()
        );
        Self {
            reader,
            loader,
            states: NodeStateTable::new(),
            resident: ResidentSet::new(),
            chunk_settings: None,
            frame: 0,
        }
    }

    /// Open the store in `dir` and stream it with a background loader
    pub fn open(dir: impl AsRef<Path>, config: &LoaderConfig) -> Result<Self> {
        let reader = Arc::new(PagedStoreReader::open(dir)?);
        Self::new(reader, config)
    }

    pub fn reader(&self) -> &Arc<PagedStoreReader<P>> {
        &self.reader
    }

    /// Get the state of `id`
    pub fn node_state(&self, id: NodeId) -> NodeState {
        self.states.get(id)
    }

    /// Get the resident node set
    pub fn resident(&self) -> &ResidentSet<P> {
        &self.resident
    }

    /// Number of completed updates
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance streaming by one frame.
    ///
    /// Loads requested during this call are visible on a later call at the
    /// earliest. Resident points never exceed the configured resident
    /// capacity once the update returns.
    pub fn update(&mut self, view: &ViewState, config: &StreamingConfig) -> FrameOutput {
        let config = config.clone().sanitized();
        let settings = ChunkSettings::from_config(&config);
        let mut stats = FrameStats::default();

        self.states.settle_evicted();
        stats.failed = self.integrate_loads(&settings);
        self.rechunk_if_changed(settings);

        let selection = if self.reader.is_empty() {
            Selection::default()
        } else {
            select_nodes(self.reader.index(), view, &config)
        };
        stats.selected = selection.len();

        self.request_missing(&selection, config.max_new_loads_per_frame);
        self.cancel_unselected(&selection);
        stats.evicted = self.evict_to_capacity(&selection, config.resident_capacity());

        let mut nodes = Vec::with_capacity(selection.len());
        for selected in &selection.nodes {
            if let Some(node) = self.resident.get(selected.id) {
                stats.visible_points += node.point_count();
                nodes.push(VisibleNode {
                    id: node.id,
                    bbox: node.bbox,
                    chunks: Arc::clone(&node.chunks),
                });
            }
        }

        let hierarchy = if config.point_size_mode == PointSizeMode::AdaptiveSize {
            let ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
            visible_hierarchy(self.reader.index(), &ids)
        } else {
            Vec::new()
        };

        stats.visible = nodes.len();
        stats.loading = self.states.count(NodeState::Loading);
        stats.resident = self.resident.len();
        self.frame += 1;

        log::debug!(
            "Frame {}: {} selected, {} visible, {} loading, {} resident, {} evicted",
            self.frame,
            stats.selected,
            stats.visible,
            stats.loading,
            stats.resident,
            stats.evicted
        );

        FrameOutput {
            nodes,
            hierarchy,
            stats,
        }
    }

    /// Promote finished loads to resident and build their draw buffers
    fn integrate_loads(&mut self, settings: &ChunkSettings) -> usize {
        let mut loaded: Vec<(NodeId, NodeData<P>)> = Vec::new();
        let mut failed = 0;

        for result in self.loader.poll_results() {
            match result {
                LoadResult::Loaded(id, data) => {
                    if self.states.get(id) == NodeState::Loading {
                        loaded.push((id, data));
                    } else {
                        // No longer wanted
                        self.reader.evict(id);
                    }
                }
                LoadResult::Failed(id, e) => {
                    log::warn!("Load of node {} failed: {}", id, e);
                    self.states.transition(id, NodeState::NotLoaded);
                    failed += 1;
                }
            }
        }

        if loaded.is_empty() {
            return failed;
        }

        let index = self.reader.index();
        for (id, chunks) in chunk_nodes(&loaded, settings) {
            let Some((_, points)) = loaded.iter().find(|(loaded_id, _)| *loaded_id == id) else {
                continue;
            };
            let Some(entry) = index.get(id) else {
                continue;
            };
            self.resident.insert(ResidentNode {
                id,
                bbox: entry.bbox(),
                points: Arc::clone(points),
                chunks: chunks.into(),
            });
            self.states.transition(id, NodeState::Resident);
        }
        failed
    }

    /// Rebuild every resident node's draw buffers when the settings changed
    fn rechunk_if_changed(&mut self, settings: ChunkSettings) {
        if self.chunk_settings == Some(settings) {
            return;
        }
        let first = self.chunk_settings.is_none();
        self.chunk_settings = Some(settings);
        if first || self.resident.is_empty() {
            return;
        }

        let nodes: Vec<(NodeId, NodeData<P>)> = self
            .resident
            .iter()
            .map(|node| (node.id, Arc::clone(&node.points)))
            .collect();
        log::info!("Rebuilding draw buffers of {} resident nodes", nodes.len());
        for (id, chunks) in chunk_nodes(&nodes, &settings) {
            self.resident.set_chunks(id, chunks);
        }
    }

    /// Touch selected resident nodes and request the missing ones
    fn request_missing(&mut self, selection: &Selection, max_new_loads: usize) {
        let mut issued = 0;
        for selected in &selection.nodes {
            match self.states.get(selected.id) {
                NodeState::Resident => {
                    self.resident.touch(selected.id);
                }
                NodeState::NotLoaded if issued < max_new_loads => {
                    if self.loader.request(selected.id, selected.projected_size) {
                        self.states.transition(selected.id, NodeState::Loading);
                        issued += 1;
                    }
                }
                _ => {}
            }
        }
    }

    /// Abandon loads of nodes that dropped out of the selection
    fn cancel_unselected(&mut self, selection: &Selection) {
        let selected: HashSet<NodeId> = selection.nodes.iter().map(|n| n.id).collect();
        for id in self.states.with_state(NodeState::Loading) {
            if !selected.contains(&id) {
                self.loader.cancel(id);
                self.states.transition(id, NodeState::NotLoaded);
                log::trace!("Abandoned load of node {}", id);
            }
        }
    }

    /// Evict least recently used nodes outside the selection until the
    /// resident points fit `capacity`
    fn evict_to_capacity(&mut self, selection: &Selection, capacity: u64) -> usize {
        let selected: HashSet<NodeId> = selection.nodes.iter().map(|n| n.id).collect();
        let mut evicted = 0;

        while self.resident.point_count() > capacity {
            // Selected nodes go too, oldest first, if everything else is gone
            let victim = self
                .resident
                .evict_oldest_where(|id| selected.contains(&id))
                .or_else(|| self.resident.evict_oldest_where(|_| false));
            let Some(node) = victim else {
                break;
            };
            self.reader.evict(node.id);
            self.states.transition(node.id, NodeState::Evicted);
            evicted += 1;
        }

        if evicted > 0 {
            log::debug!(
                "Evicted {} nodes, {} resident points of {} allowed",
                evicted,
                self.resident.point_count(),
                capacity
            );
        }
        evicted
    }
}
