//! Store writer

use super::index::{NO_NODE, NodeEntry, NodeIndex};
use super::metadata::StoreMetadata;
use super::{DATA_FILE, INDEX_FILE, META_FILE, StoreCompression};
use crate::core::types::{DVec3, Result};
use crate::octree::PointOctree;
use crate::point::PointRecord;
use crate::point::records::encode_records;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

const TMP_SUFFIX: &str = ".tmp";

/// Serializes a built octree into a store directory
#[derive(Clone, Debug, Default)]
pub struct StoreWriter {
    compression: StoreCompression,
    origin: DVec3,
}

impl StoreWriter {
    pub fn new(compression: StoreCompression) -> Self {
        Self {
            compression,
            origin: DVec3::ZERO,
        }
    }

    /// Record the translation removed from the points before building
    pub fn with_origin(mut self, origin: DVec3) -> Self {
        self.origin = origin;
        self
    }

    /// Write `tree` into `dir`, replacing any store already there.
    ///
    /// All three files are first written under temporary names and renamed
    /// into place only after every write succeeded; `meta.json` is renamed
    /// last. On failure the temporary files are removed and no new store is
    /// published.
    pub fn write<P: PointRecord>(&self, tree: &PointOctree<P>, dir: impl AsRef<Path>) -> Result<StoreMetadata> {
        let dir = dir.as_ref();
        let start = Instant::now();
        fs::create_dir_all(dir)?;

        let final_paths = [dir.join(DATA_FILE), dir.join(INDEX_FILE), dir.join(META_FILE)];
        let tmp_paths = final_paths.clone().map(|p| tmp_path(&p));

        let meta = match self.write_temp(tree, &tmp_paths) {
            Ok(meta) => meta,
            Err(e) => {
                for p in &tmp_paths {
                    let _ = fs::remove_file(p);
                }
                return Err(e);
            }
        };

        // Unpublish the old store before swapping files in
        match fs::remove_file(&final_paths[2]) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        for (tmp, dst) in tmp_paths.iter().zip(final_paths.iter()) {
            fs::rename(tmp, dst)?;
        }

        log::info!(
            "Wrote {} store to {}: {} points in {} nodes, {:?} compression, {:.2?}",
            meta.schema,
            dir.display(),
            meta.point_count,
            meta.node_count,
            meta.compression,
            start.elapsed()
        );
        Ok(meta)
    }

    fn write_temp<P: PointRecord>(&self, tree: &PointOctree<P>, paths: &[PathBuf; 3]) -> Result<StoreMetadata> {
        let mut data = BufWriter::new(File::create(&paths[0])?);
        let mut entries: Vec<Option<NodeEntry>> = vec![None; tree.node_count()];
        let mut offset = 0u64;

        for id in tree.preorder() {
            let Some(node) = tree.node(id) else {
                continue;
            };
            let length = if node.points().is_empty() {
                0
            } else {
                let raw = encode_records(node.points());
                let blob = match self.compression {
                    StoreCompression::None => std::borrow::Cow::Borrowed(raw),
                    mode => std::borrow::Cow::Owned(mode.encode(raw)),
                };
                data.write_all(&blob)?;
                blob.len() as u64
            };

            let mut children = [NO_NODE; 8];
            for octant in 0..8u8 {
                if let Some(child) = node.child(octant) {
                    children[octant as usize] = child.0;
                }
            }
            entries[id.index()] = Some(NodeEntry {
                id: id.0,
                depth: node.depth(),
                parent: node.parent().map_or(NO_NODE, |p| p.0),
                child_mask: node.child_mask(),
                children,
                bbox_min: node.bbox().min.to_array(),
                bbox_max: node.bbox().max.to_array(),
                point_count: node.point_count() as u64,
                subtree_point_count: node.subtree_point_count(),
                offset,
                length,
            });
            log::trace!("node {}: {} points at {}+{}", id, node.point_count(), offset, length);
            offset += length;
        }

        let file = data.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        let index = NodeIndex {
            entries: entries.into_iter().flatten().collect(),
        };
        let mut index_file = File::create(&paths[1])?;
        index_file.write_all(&index.to_bytes()?)?;
        index_file.sync_all()?;

        let meta = StoreMetadata::for_octree(tree, self.compression, self.origin);
        meta.save(&paths[2])?;
        Ok(meta)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}
