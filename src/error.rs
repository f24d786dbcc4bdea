use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading headers, grouping files or maintaining
/// groups.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("could not read DICOM header from {}", path.display())]
    UnreadableRecord {
        path: PathBuf,
        #[source]
        source: dicom::object::ReadError,
    },

    #[error("field weights must contain at least one field")]
    EmptyFieldWeights,

    #[error("merge index lists differ in length: {targets} targets vs {sources} sources")]
    MergeLengthMismatch { targets: usize, sources: usize },

    #[error("merge index {index} out of range for {len} groups")]
    MergeIndexOutOfRange { index: usize, len: usize },

    #[error("group {index} used more than once as a merge source")]
    MergeSourceReused { index: usize },

    #[error("cannot merge group {index} into itself")]
    MergeSelfReference { index: usize },

    #[error("field {field} missing on representative {}", path.display())]
    MissingKeyField { field: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
