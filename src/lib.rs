//! Pointstream - out-of-core point-cloud octree storage and LOD streaming

pub mod core;
pub mod math;
pub mod point;
pub mod octree;
pub mod store;
pub mod streaming;
