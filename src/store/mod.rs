//! Paged on-disk octree store
//!
//! A store is a directory holding three files:
//!
//! - `meta.json`: dataset metadata ([`StoreMetadata`]), human readable
//! - `octree.index`: per-node table ([`NodeIndex`]), rkyv archive
//! - `octree.bin`: node point blobs, concatenated depth-first
//!
//! `meta.json` is always written last, so a directory without it is not a
//! store.

pub mod index;
pub mod metadata;
pub mod reader;
pub mod writer;

pub use index::{NodeEntry, NodeIndex};
pub use metadata::StoreMetadata;
pub use reader::{NodeData, PagedStoreReader, read_schema};
pub use writer::StoreWriter;

use serde::{Deserialize, Serialize};

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Metadata file name
pub const META_FILE: &str = "meta.json";

/// Node index file name
pub const INDEX_FILE: &str = "octree.index";

/// Node data file name
pub const DATA_FILE: &str = "octree.bin";

/// Per-node blob compression
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreCompression {
    /// Raw record bytes
    #[default]
    None,
    /// LZ4 block with the uncompressed size prepended
    Lz4,
}

impl StoreCompression {
    pub(crate) fn encode(self, raw: &[u8]) -> Vec<u8> {
        match self {
            StoreCompression::None => raw.to_vec(),
            StoreCompression::Lz4 => lz4_flex::compress_prepend_size(raw),
        }
    }

    pub(crate) fn decode(self, stored: Vec<u8>) -> std::io::Result<Vec<u8>> {
        match self {
            StoreCompression::None => Ok(stored),
            StoreCompression::Lz4 => lz4_flex::decompress_size_prepended(&stored).map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("LZ4 decompression failed: {}", e),
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_roundtrip() {
        let raw: Vec<u8> = (0..4096u32).flat_map(|i| (i % 7).to_le_bytes()).collect();
        for mode in [StoreCompression::None, StoreCompression::Lz4] {
            let stored = mode.encode(&raw);
            assert_eq!(mode.decode(stored).unwrap(), raw);
        }
        assert!(StoreCompression::Lz4.encode(&raw).len() < raw.len());
    }

    #[test]
    fn test_lz4_rejects_garbage() {
        assert!(StoreCompression::Lz4.decode(vec![8, 0, 0, 0, 0xf0]).is_err());
    }

    #[test]
    fn test_compression_serde_name() {
        assert_eq!(serde_json::to_string(&StoreCompression::Lz4).unwrap(), "\"lz4\"");
    }
}
