//! Error types for storage and streaming

use crate::octree::NodeId;
use crate::point::PointSchema;
use thiserror::Error;

/// Main error type for the engine
///
/// An empty dataset is not an error: stores and octrees report it through
/// `is_empty()` and stream zero nodes.
#[derive(Debug, Error)]
pub enum Error {
    /// The stored schema does not match the accessor used to open it, or
    /// its capability flags contradict the schema id
    #[error("invalid schema: store holds {stored}, {reason}")]
    InvalidSchema {
        stored: PointSchema,
        expected: PointSchema,
        reason: String,
    },

    /// The node index cannot be parsed or contradicts the metadata
    #[error("corrupt node index: {0}")]
    CorruptIndex(String),

    /// A node id that is not part of the index was requested
    #[error("node {0} not found in index")]
    NodeNotFound(NodeId),

    /// Reading or decoding a node blob failed; the node stays unloaded
    #[error("failed to read node {node}: {source}")]
    DiskReadFailure {
        node: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True for failures that are isolated to one node and may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::DiskReadFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_read_failure_is_transient() {
        let err = Error::DiskReadFailure {
            node: NodeId(3),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("node 3"));
    }

    #[test]
    fn test_invalid_schema_message() {
        let err = Error::InvalidSchema {
            stored: PointSchema::Pos64,
            expected: PointSchema::Pos64Label8,
            reason: "accessor expects Pos64Label8".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "invalid schema: store holds Pos64, accessor expects Pos64Label8"
        );
    }
}
