//! View-dependent node selection, loading and eviction

pub mod budget;
pub mod chunking;
pub mod color;
pub mod config;
pub mod hierarchy;
pub mod loader;
pub mod lod;
pub mod manager;
pub mod resident;
pub mod selection;
pub mod state;

pub use budget::PointBudget;
pub use chunking::{ChunkSettings, DrawBufferChunk, MAX_CHUNK_VERTICES, chunk_nodes, chunk_points};
pub use color::{ColorSource, FALLBACK_COLOR, pack_rgb, unpack_rgb};
pub use config::{ColorMode, LoaderConfig, PointShape, PointSizeMode, StreamingConfig};
pub use hierarchy::{NodeHierarchyEntry, visible_hierarchy};
pub use loader::{LoadRequest, LoadResult, NodeLoader};
pub use lod::{projected_size, should_refine, size_threshold};
pub use manager::{FrameOutput, FrameStats, StreamingManager, VisibleNode};
pub use resident::{ResidentNode, ResidentSet};
pub use selection::{NodePriority, SelectedNode, Selection, select_nodes};
pub use state::{NodeState, NodeStateTable};
