//! # DICOM-cluster library
//!
//! This crate groups collections of DICOM files by their header contents.

//!
//! This library is part of the dicom-rs ecosystem and leverages its
//! components to read file headers; everything above the header read works
//! on plain string fields. Files are first partitioned into groups whose
//! selected header fields are exactly identical; the group representatives
//! are then compared with a weighted normalized edit distance, and groups
//! falling under a percentile cutoff can be merged, which recovers
//! per-subject or per-session sets from collections where operators typed
//! names or identifiers slightly differently.
//!
//! Distances live in `[0, 1]` (0 identical, 1 maximally dissimilar) and the
//! N×N representative matrix is stored as `f16`, falling back to sparse
//! cells when the dense allocation fails.
//!
//! # Examples
//!
//! Group everything under a folder by patient identity, then merge the
//! most similar groups:
//!
//! ```no_run
//! # use std::path::{Path, PathBuf};
//! # use dicom_cluster::{DicomClustering, DistanceKind, FieldWeights, matrix_where};
//! # fn main() -> Result<(), dicom_cluster::ClusterError> {
//! let mut clustering = DicomClustering::from_folders(
//!     &[PathBuf::from("raw")],
//!     FieldWeights::patient_defaults(),
//!     DistanceKind::Levenshtein,
//! )?;
//!
//! let distances = clustering.distance_matrix(None)?;
//! let mask = distances.percentile_threshold(5.0, 1);
//! let (targets, sources) = matrix_where(&mask);
//! clustering.merge_groups(&targets, &sources)?;
//!
//! clustering.copy_to_folder(Path::new("by_subject"), Some("PatientID"))?;
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod clustering;
pub mod distance;
pub mod enums;
pub mod error;
pub mod grouping;
pub mod matrix;
pub mod record;
pub mod search;

pub use cluster::{ClusterStore, Group};
pub use clustering::DicomClustering;
pub use distance::{ExactDistance, FieldWeights, FileDistance, LevenshteinDistance};
pub use enums::DistanceKind;
pub use error::ClusterError;
pub use grouping::{group_by_field, group_dicom_files};
pub use matrix::{DistanceMatrix, calculate_file_distances, matrix_where};
pub use record::{DicomReader, HeaderRecord, RecordReader, unique_field_values};
pub use search::{find_dicom_files, find_dicom_files_in, is_dicom_file};
