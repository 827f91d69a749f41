//! Conversion of node points into renderer draw buffers

use crate::core::types::Vec3;
use crate::octree::NodeId;
use crate::point::{PointAccessor, PointRecord};
use crate::store::NodeData;
use crate::streaming::color::ColorSource;
use crate::streaming::config::{ColorMode, PointShape, PointSizeMode, StreamingConfig};
use rayon::prelude::*;

/// Most points in one chunk, so every index fits a `u16`
pub const MAX_CHUNK_VERTICES: usize = u16::MAX as usize - 1;

/// Fixed-capacity vertex buffer handed to the renderer.
///
/// All attribute vectors have the same length; `indices` is always
/// `0..len`.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawBufferChunk {
    pub positions: Vec<Vec3>,
    /// Packed `r | g << 8 | b << 16`
    pub colors: Vec<u32>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u16>,
    pub shape: PointShape,
    pub size_mode: PointSizeMode,
    pub point_size: f32,
}

impl DrawBufferChunk {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Settings that shape draw buffer contents
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkSettings {
    pub color_mode: ColorMode,
    pub intensity_max: f32,
    pub max_label: u8,
    pub point_shape: PointShape,
    pub point_size_mode: PointSizeMode,
    pub point_size: f32,
}

impl ChunkSettings {
    pub fn from_config(config: &StreamingConfig) -> Self {
        Self {
            color_mode: config.color_mode,
            intensity_max: config.intensity_max,
            max_label: config.max_label,
            point_shape: config.point_shape,
            point_size_mode: config.point_size_mode,
            point_size: config.point_size,
        }
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self::from_config(&StreamingConfig::default())
    }
}

/// Split `points` into `ceil(len / MAX_CHUNK_VERTICES)` draw buffers.
///
/// Every chunk but the last holds exactly [`MAX_CHUNK_VERTICES`] points.
/// Chunks are built in parallel.
pub fn chunk_points<P: PointRecord>(points: &[P], settings: &ChunkSettings) -> Vec<DrawBufferChunk> {
    let acc = P::accessor();
    let colors = ColorSource::resolve(&acc, settings.color_mode, settings.intensity_max, settings.max_label);

    points
        .par_chunks(MAX_CHUNK_VERTICES)
        .map(|batch| build_chunk(&acc, &colors, batch, settings))
        .collect()
}

fn build_chunk<A: PointAccessor>(
    acc: &A,
    colors: &ColorSource,
    batch: &[A::Point],
    settings: &ChunkSettings,
) -> DrawBufferChunk {
    let has_normals = acc.has_normal32();
    let n = batch.len();

    let mut chunk = DrawBufferChunk {
        positions: Vec::with_capacity(n),
        colors: Vec::with_capacity(n),
        normals: Vec::with_capacity(n),
        indices: (0..n as u16).collect(),
        shape: settings.point_shape,
        size_mode: settings.point_size_mode,
        point_size: settings.point_size,
    };

    for p in batch {
        chunk.positions.push(acc.position64(p).as_vec3());
        chunk.colors.push(colors.color_of(acc, p));
        chunk.normals.push(if has_normals { acc.normal32(p) } else { Vec3::ZERO });
    }
    chunk
}

/// Chunk several nodes at once
pub fn chunk_nodes<P: PointRecord>(
    nodes: &[(NodeId, NodeData<P>)],
    settings: &ChunkSettings,
) -> Vec<(NodeId, Vec<DrawBufferChunk>)> {
    nodes
        .par_iter()
        .map(|(id, points)| (*id, chunk_points(points, settings)))
        .collect()
}
