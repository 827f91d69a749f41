//! Octree construction from a flat point list

use super::tree::PointOctree;
use crate::core::error::Error;
use crate::core::types::{DVec3, Result};
use crate::math::Aabb;
use crate::point::records::bounds_of;
use crate::point::{PointAccessor, PointRecord, PointSource, PrepareOptions, prepare_points};
use crate::store::StoreCompression;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default maximum number of points per node
pub const DEFAULT_BUCKET_CAPACITY: usize = 10_000;

/// Settings for building and storing an octree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum points per node before it splits
    pub bucket_capacity: usize,
    /// Compression applied to node blobs when the tree is written
    pub compression: StoreCompression,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            compression: StoreCompression::None,
        }
    }
}

/// Builds a [`PointOctree`] from raw points
#[derive(Clone, Debug, Default)]
pub struct OctreeBuilder {
    config: BuildConfig,
}

impl OctreeBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Builder with the given bucket capacity and default settings otherwise
    pub fn with_capacity(bucket_capacity: usize) -> Self {
        Self::new(BuildConfig {
            bucket_capacity,
            ..Default::default()
        })
    }

    /// Get the build configuration
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Bucket `points` into an octree.
    ///
    /// The root covers the exact dataset bounding box. Points are inserted in
    /// a fixed stride order over the input (see [`spread_order`]), so a
    /// bucket samples the whole input even when it arrives sorted, and
    /// identical input always yields an identical tree. An empty input
    /// produces an empty root with a zero-size box at the origin.
    pub fn build<P: PointRecord>(&self, points: Vec<P>) -> Result<PointOctree<P>> {
        if self.config.bucket_capacity == 0 {
            return Err(Error::InvalidInput("bucket capacity must be at least 1".into()));
        }

        let acc = P::accessor();
        if let Some(i) = points
            .par_iter()
            .position_any(|p| !acc.position64(p).is_finite())
        {
            return Err(Error::InvalidInput(format!(
                "point {} has a non-finite position {:?}",
                i,
                acc.position64(&points[i])
            )));
        }

        let start = Instant::now();
        let bbox = bounds_of(&points).unwrap_or(Aabb::new(DVec3::ZERO, DVec3::ZERO));
        let count = points.len();

        let mut tree = PointOctree::new(bbox, self.config.bucket_capacity);
        for i in spread_order(count) {
            tree.insert(points[i]);
        }

        let stats = tree.stats();
        log::info!(
            "Built {} octree: {} points, {} nodes ({} populated), depth {}, largest bucket {} in {:.2?}",
            P::SCHEMA,
            count,
            stats.node_count,
            stats.populated_count,
            stats.depth,
            stats.max_bucket,
            start.elapsed()
        );
        Ok(tree)
    }

    /// Read, prepare and build in one step.
    ///
    /// # Returns
    /// The tree and the translation subtracted by [`prepare_points`].
    pub fn build_from_source<S: PointSource>(
        &self,
        source: &mut S,
        options: &PrepareOptions,
    ) -> Result<(PointOctree<S::Point>, DVec3)> {
        let mut points = source.read_points()?;
        let offset = prepare_points(&mut points, options);
        if offset != DVec3::ZERO {
            log::info!("Translated points by {:?}", -offset);
        }
        let tree = self.build(points)?;
        Ok((tree, offset))
    }
}

/// Visit `0..n` with a stride near `n / phi` that is coprime to `n`.
///
/// Every index is produced exactly once, and consecutive indices land far
/// apart in the input.
pub fn spread_order(n: usize) -> impl Iterator<Item = usize> {
    let mut step = ((n as f64 * 0.618_033_988_75) as usize).max(1);
    while n > 1 && gcd(step, n) != 1 {
        step += 1;
    }
    (0..n).map(move |k| ((k as u128 * step as u128) % n as u128) as usize)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
