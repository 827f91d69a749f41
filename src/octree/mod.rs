//! Bucketed point octree

pub mod builder;
pub mod node;
pub mod tree;

pub use builder::{BuildConfig, DEFAULT_BUCKET_CAPACITY, OctreeBuilder, spread_order};
pub use node::{NodeId, OctreeNode};
pub use tree::{MAX_OCTREE_DEPTH, OctreeStats, PointOctree};
