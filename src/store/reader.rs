//! Lazy node reader over a store directory

use super::index::NodeIndex;
use super::metadata::StoreMetadata;
use super::{FORMAT_VERSION, StoreCompression};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::octree::{NodeId, OctreeNode, PointOctree};
use crate::point::records::decode_records;
use crate::point::{PointRecord, PointSchema};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Decoded points of one node, shared between the reader cache and callers
pub type NodeData<P> = Arc<[P]>;

/// Random-access reader for a store of `P` records.
///
/// Opening reads only the metadata and the node index. Node blobs are read on
/// demand and kept in a cache until [`evict`](Self::evict) is called, so the
/// caller decides what stays in memory.
pub struct PagedStoreReader<P: PointRecord> {
    dir: PathBuf,
    data_path: PathBuf,
    metadata: StoreMetadata,
    index: Arc<NodeIndex>,
    cache: Mutex<HashMap<NodeId, NodeData<P>>>,
}

/// Read the schema id of a store without opening it
pub fn read_schema(dir: impl AsRef<Path>) -> Result<PointSchema> {
    Ok(StoreMetadata::load(dir.as_ref())?.schema)
}

impl<P: PointRecord> PagedStoreReader<P> {
    /// Open the store in `dir` for records of type `P`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let metadata = StoreMetadata::load(&dir)?;

        if metadata.schema != P::SCHEMA {
            return Err(Error::InvalidSchema {
                stored: metadata.schema,
                expected: P::SCHEMA,
                reason: format!("accessor expects {}", P::SCHEMA),
            });
        }
        if metadata.capabilities != P::SCHEMA.capabilities() {
            return Err(Error::InvalidSchema {
                stored: metadata.schema,
                expected: P::SCHEMA,
                reason: "stored capability flags do not match the schema".into(),
            });
        }
        if metadata.format_version != FORMAT_VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported format version {} (expected {})",
                metadata.format_version, FORMAT_VERSION
            )));
        }

        let index_bytes = fs::read(dir.join(&metadata.index_file))?;
        let index = NodeIndex::from_bytes(&index_bytes)?;
        let data_path = dir.join(&metadata.data_file);
        let data_len = fs::metadata(&data_path)?.len();
        index.validate(&metadata, data_len)?;

        log::info!(
            "Opened {} store {}: {} points in {} nodes, depth {}",
            metadata.schema,
            dir.display(),
            metadata.point_count,
            metadata.node_count,
            metadata.depth
        );

        Ok(Self {
            dir,
            data_path,
            metadata,
            index: Arc::new(index),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Get store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get store metadata
    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    /// Get the shared node index
    pub fn index(&self) -> &Arc<NodeIndex> {
        &self.index
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Points stored in node `id`, answered from the index
    pub fn node_point_count(&self, id: NodeId) -> Result<u64> {
        self.index
            .get(id)
            .map(|e| e.point_count)
            .ok_or(Error::NodeNotFound(id))
    }

    /// Get the points of node `id`, reading from disk unless cached
    pub fn load_node(&self, id: NodeId) -> Result<NodeData<P>> {
        if let Some(data) = self.lock_cache().get(&id) {
            return Ok(Arc::clone(data));
        }

        let data: NodeData<P> = self.read_node(id)?.into();
        // A concurrent load of the same node may have won; keep the first
        let mut cache = self.lock_cache();
        let data = cache.entry(id).or_insert(data);
        Ok(Arc::clone(data))
    }

    /// Drop node `id` from the cache; returns whether it was cached
    pub fn evict(&self, id: NodeId) -> bool {
        self.lock_cache().remove(&id).is_some()
    }

    /// Number of cached nodes
    pub fn cached_count(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn is_cached(&self, id: NodeId) -> bool {
        self.lock_cache().contains_key(&id)
    }

    /// Drop every cached node
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Rebuild the whole octree in memory, bypassing the cache
    pub fn load_octree(&self) -> Result<PointOctree<P>> {
        let mut nodes = Vec::with_capacity(self.index.len());
        for entry in &self.index.entries {
            let id = entry.node_id();
            let mut node = OctreeNode::new(entry.bbox(), entry.depth, entry.parent());
            for octant in 0..8u8 {
                node.children[octant as usize] = entry.child(octant);
            }
            node.points = self.read_node(id)?;
            node.subtree_points = entry.subtree_point_count;
            nodes.push(node);
        }
        Ok(PointOctree::from_nodes(nodes, self.metadata.bucket_capacity))
    }

    fn read_node(&self, id: NodeId) -> Result<Vec<P>> {
        let entry = self.index.get(id).ok_or(Error::NodeNotFound(id))?;
        if entry.point_count == 0 {
            return Ok(Vec::new());
        }

        let failure = |source: io::Error| Error::DiskReadFailure { node: id, source };

        let mut file = File::open(&self.data_path).map_err(failure)?;
        file.seek(SeekFrom::Start(entry.offset)).map_err(failure)?;
        let mut blob = vec![0u8; entry.length as usize];
        file.read_exact(&mut blob).map_err(failure)?;

        let raw = self.metadata.compression.decode(blob).map_err(failure)?;
        let points: Vec<P> = decode_records(&raw).map_err(|e| {
            failure(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        })?;
        if points.len() as u64 != entry.point_count {
            return Err(failure(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("decoded {} points, index lists {}", points.len(), entry.point_count),
            )));
        }

        log::trace!("Read node {} ({} points, {} bytes)", id, points.len(), entry.length);
        Ok(points)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<NodeId, NodeData<P>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compression used by the node blobs
    pub fn compression(&self) -> StoreCompression {
        self.metadata.compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DVec3, Vec3};
    use crate::octree::OctreeBuilder;
    use crate::point::{PointAccessor, Pos64, Pos64Label8, Pos64Nor32Col32IShort};
    use crate::store::{DATA_FILE, INDEX_FILE, META_FILE, StoreWriter};

    fn sample<P: PointRecord>(n: usize) -> Vec<P> {
        let acc = P::accessor();
        (0..n)
            .map(|i| {
                let mut p = P::default();
                let t = i as f64 * 0.37;
                acc.set_position64(&mut p, DVec3::new(t.sin() * 50.0, t.cos() * 50.0, (i % 17) as f64));
                if acc.has_color32() {
                    acc.set_color32(&mut p, Vec3::new((i * 13 % 65536) as f32, 100.0, 0.0));
                }
                if acc.has_normal32() {
                    acc.set_normal32(&mut p, Vec3::new(0.0, 0.0, 1.0));
                }
                if acc.has_intensity16() {
                    acc.set_intensity16(&mut p, (i % 4096) as u16);
                }
                if acc.has_label8() {
                    acc.set_label8(&mut p, (i % 33) as u8);
                }
                p
            })
            .collect()
    }

    fn roundtrip<P: PointRecord>(compression: StoreCompression) {
        let dir = tempfile::tempdir().unwrap();
        let tree = OctreeBuilder::with_capacity(40).build(sample::<P>(900)).unwrap();
        StoreWriter::new(compression).write(&tree, dir.path()).unwrap();

        let reader = PagedStoreReader::<P>::open(dir.path()).unwrap();
        assert_eq!(reader.metadata().point_count, 900);
        assert_eq!(reader.cached_count(), 0);

        let loaded = reader.load_octree().unwrap();
        assert_eq!(loaded.nodes(), tree.nodes());
        assert_eq!(loaded.bbox(), tree.bbox());

        tree.traverse(|id, node| {
            let data = reader.load_node(id).unwrap();
            assert_eq!(&data[..], node.points());
            assert_eq!(reader.node_point_count(id).unwrap(), node.point_count() as u64);
        });
    }

    #[test]
    fn test_roundtrip_every_schema() {
        for schema in PointSchema::ALL {
            crate::dispatch_schema!(schema, P => roundtrip::<P>(StoreCompression::None));
        }
    }

    #[test]
    fn test_roundtrip_lz4() {
        roundtrip::<Pos64Nor32Col32IShort>(StoreCompression::Lz4);
        roundtrip::<Pos64Label8>(StoreCompression::Lz4);
    }

    #[test]
    fn test_cache_and_evict() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OctreeBuilder::with_capacity(10).build(sample::<Pos64>(100)).unwrap();
        StoreWriter::default().write(&tree, dir.path()).unwrap();
        let reader = PagedStoreReader::<Pos64>::open(dir.path()).unwrap();

        let (id, _) = tree.leaves().find(|(_, n)| n.point_count() > 0).unwrap();
        let first = reader.load_node(id).unwrap();
        assert!(reader.is_cached(id));

        // Served from cache even with the data file gone
        fs::remove_file(dir.path().join(DATA_FILE)).unwrap();
        let second = reader.load_node(id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(reader.evict(id));
        assert!(!reader.evict(id));
        assert_eq!(reader.cached_count(), 0);

        let err = reader.load_node(id).unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, Error::DiskReadFailure { node, .. } if node == id));
    }

    #[test]
    fn test_unknown_node_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OctreeBuilder::with_capacity(10).build(sample::<Pos64>(30)).unwrap();
        StoreWriter::default().write(&tree, dir.path()).unwrap();
        let reader = PagedStoreReader::<Pos64>::open(dir.path()).unwrap();

        let missing = NodeId(tree.node_count() as u32 + 5);
        assert!(matches!(reader.load_node(missing), Err(Error::NodeNotFound(id)) if id == missing));
        assert!(matches!(reader.node_point_count(missing), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OctreeBuilder::with_capacity(10).build(sample::<Pos64>(30)).unwrap();
        StoreWriter::default().write(&tree, dir.path()).unwrap();

        assert_eq!(read_schema(dir.path()).unwrap(), PointSchema::Pos64);
        let err = PagedStoreReader::<Pos64Label8>::open(dir.path()).err().unwrap();
        assert!(matches!(
            err,
            Error::InvalidSchema {
                stored: PointSchema::Pos64,
                expected: PointSchema::Pos64Label8,
                ..
            }
        ));
    }

    #[test]
    fn test_tampered_capabilities_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OctreeBuilder::with_capacity(10).build(sample::<Pos64>(30)).unwrap();
        StoreWriter::default().write(&tree, dir.path()).unwrap();

        let mut meta = StoreMetadata::load(dir.path()).unwrap();
        meta.capabilities.label8 = true;
        meta.save(&dir.path().join(META_FILE)).unwrap();

        let err = PagedStoreReader::<Pos64>::open(dir.path()).err().unwrap();
        assert!(matches!(
            err,
            Error::InvalidSchema {
                stored: PointSchema::Pos64,
                expected: PointSchema::Pos64,
                ..
            }
        ));
        assert!(err.to_string().contains("capability flags"));
    }

    #[test]
    fn test_corrupt_index_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OctreeBuilder::with_capacity(10).build(sample::<Pos64>(200)).unwrap();
        StoreWriter::default().write(&tree, dir.path()).unwrap();

        fs::write(dir.path().join(INDEX_FILE), [0x7f; 16]).unwrap();
        let err = PagedStoreReader::<Pos64>::open(dir.path()).err().unwrap();
        assert!(matches!(err, Error::CorruptIndex(_)));

        // A valid archive that disagrees with the metadata
        StoreWriter::default().write(&tree, dir.path()).unwrap();
        let mut meta = StoreMetadata::load(dir.path()).unwrap();
        meta.point_count += 1;
        meta.save(&dir.path().join(META_FILE)).unwrap();
        let err = PagedStoreReader::<Pos64>::open(dir.path()).err().unwrap();
        assert!(matches!(err, Error::CorruptIndex(_)));
    }

    #[test]
    fn test_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OctreeBuilder::default().build::<Pos64>(Vec::new()).unwrap();
        StoreWriter::default().write(&tree, dir.path()).unwrap();

        let reader = PagedStoreReader::<Pos64>::open(dir.path()).unwrap();
        assert!(reader.is_empty());
        assert!(reader.load_node(NodeId::ROOT).unwrap().is_empty());
        assert!(reader.load_octree().unwrap().is_empty());
    }
}
