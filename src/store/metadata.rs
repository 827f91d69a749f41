//! Store metadata side-file (`meta.json`)

use super::{DATA_FILE, FORMAT_VERSION, INDEX_FILE, META_FILE, StoreCompression};
use crate::core::types::{DVec3, Result};
use crate::math::Aabb;
use crate::octree::PointOctree;
use crate::point::{Capabilities, PointRecord, PointSchema};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Dataset-wide facts, written once when the store is created
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub format_version: u32,
    pub schema: PointSchema,
    pub capabilities: Capabilities,
    pub bbox_min: [f64; 3],
    pub bbox_max: [f64; 3],
    /// Translation removed from every point before building
    #[serde(default)]
    pub origin: [f64; 3],
    pub bucket_capacity: usize,
    pub depth: u32,
    pub node_count: usize,
    pub point_count: u64,
    #[serde(default)]
    pub compression: StoreCompression,
    pub index_file: String,
    pub data_file: String,
}

impl StoreMetadata {
    /// Describe `tree` as it will be written
    pub fn for_octree<P: PointRecord>(
        tree: &PointOctree<P>,
        compression: StoreCompression,
        origin: DVec3,
    ) -> Self {
        let bbox = tree.bbox();
        Self {
            format_version: FORMAT_VERSION,
            schema: P::SCHEMA,
            capabilities: P::SCHEMA.capabilities(),
            bbox_min: bbox.min.to_array(),
            bbox_max: bbox.max.to_array(),
            origin: origin.to_array(),
            bucket_capacity: tree.bucket_capacity(),
            depth: tree.depth(),
            node_count: tree.node_count(),
            point_count: tree.point_count(),
            compression,
            index_file: INDEX_FILE.to_string(),
            data_file: DATA_FILE.to_string(),
        }
    }

    /// Get dataset bounding box
    pub fn bbox(&self) -> Aabb {
        Aabb::new(DVec3::from_array(self.bbox_min), DVec3::from_array(self.bbox_max))
    }

    /// Get translation that maps stored coordinates back to source coordinates
    pub fn origin(&self) -> DVec3 {
        DVec3::from_array(self.origin)
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// Read `meta.json` from a store directory
    pub fn load(dir: &Path) -> Result<Self> {
        let text = fs::read_to_string(dir.join(META_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write pretty printed JSON to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
