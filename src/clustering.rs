//! High-level clustering over folders of DICOM files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::info;

use crate::cluster::ClusterStore;
use crate::distance::{ExactDistance, FieldWeights, LevenshteinDistance};
use crate::enums::DistanceKind;
use crate::error::ClusterError;
use crate::grouping::group_dicom_files;
use crate::matrix::{DistanceMatrix, calculate_file_distances};
use crate::record::{DicomReader, RecordReader};
use crate::search::find_dicom_files_in;

/// A self-organizing set of DICOM files.
///
/// Construction lists the files and groups exact header duplicates; the
/// remaining methods compare group representatives with a weighted measure
/// so that similar groups can be merged, typically one merged group per
/// subject or session.
#[derive(Debug)]
pub struct DicomClustering<R: RecordReader = DicomReader> {
    reader: R,
    field_weights: FieldWeights,
    distance_kind: DistanceKind,
    groups: ClusterStore,
}

impl DicomClustering<DicomReader> {
    /// Scan `folders` recursively and group the DICOM files found by exact
    /// equality of the weighted fields.
    ///
    /// This reads the header of every file found and can take a while on
    /// large collections.
    pub fn from_folders(
        folders: &[PathBuf],
        field_weights: FieldWeights,
        distance_kind: DistanceKind,
    ) -> Result<Self, ClusterError> {
        let paths = find_dicom_files_in(folders)?;
        info!(files = paths.len(), "scanned folders");
        Self::with_reader(DicomReader, &paths, field_weights, distance_kind)
    }
}

impl<R: RecordReader> DicomClustering<R> {
    /// Group `paths` through an explicit record reader.
    pub fn with_reader(
        reader: R,
        paths: &[PathBuf],
        field_weights: FieldWeights,
        distance_kind: DistanceKind,
    ) -> Result<Self, ClusterError> {
        if field_weights.is_empty() {
            return Err(ClusterError::EmptyFieldWeights);
        }
        let groups = group_dicom_files(&reader, paths, &field_weights)?;
        info!(groups = groups.len(), "grouped exact header duplicates");
        Ok(Self {
            reader,
            field_weights,
            distance_kind,
            groups,
        })
    }

    pub fn groups(&self) -> &ClusterStore {
        &self.groups
    }

    /// Total number of files across all groups.
    pub fn num_files(&self) -> usize {
        self.groups.num_files()
    }

    /// Pairwise distances between group representatives under the
    /// configured measure, using `field_weights` or, when `None`, the
    /// weights the clustering was built with.
    pub fn distance_matrix(
        &self,
        field_weights: Option<&FieldWeights>,
    ) -> Result<DistanceMatrix, ClusterError> {
        let weights = field_weights.unwrap_or(&self.field_weights).clone();
        let keys: Vec<PathBuf> = self
            .groups
            .representatives()
            .map(Path::to_path_buf)
            .collect();

        match self.distance_kind {
            DistanceKind::Levenshtein => {
                let measure = LevenshteinDistance::new(weights)?;
                calculate_file_distances(&self.reader, &keys, &measure)
            }
            DistanceKind::Exact => {
                let measure = ExactDistance::new(weights);
                calculate_file_distances(&self.reader, &keys, &measure)
            }
        }
    }

    /// Binarize a distance matrix against the `perc`-th percentile of its
    /// `k`-offset upper triangle. See [`DistanceMatrix::percentile_threshold`].
    pub fn dist_percentile_threshold(
        matrix: &DistanceMatrix,
        perc: f64,
        k: i64,
    ) -> Array2<bool> {
        matrix.percentile_threshold(perc, k)
    }

    /// Pairs of group representatives sharing a folder prefix of the given
    /// depth.
    pub fn groups_in_same_folder(&self, depth: usize) -> Vec<(PathBuf, PathBuf)> {
        self.groups.groups_in_same_folder(depth)
    }

    /// Merge groups by index pairs; see [`ClusterStore::merge`].
    pub fn merge_groups(&mut self, targets: &[usize], sources: &[usize]) -> Result<(), ClusterError> {
        self.groups.merge(targets, sources)
    }

    /// Copy all groups into subfolders of `dest`; see
    /// [`ClusterStore::copy_to_folder`].
    pub fn copy_to_folder(
        &self,
        dest: &Path,
        groupby_field: Option<&str>,
    ) -> Result<(), ClusterError> {
        self.groups.copy_to_folder(&self.reader, dest, groupby_field)
    }

    /// Distinct values of `field` per group; see
    /// [`ClusterStore::unique_field_values_per_group`].
    pub fn unique_field_values_per_group(
        &self,
        field: &str,
        key_field: Option<&str>,
    ) -> Result<Vec<(String, BTreeSet<String>)>, ClusterError> {
        self.groups
            .unique_field_values_per_group(&self.reader, field, key_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::matrix_where;
    use crate::record::testing::MemoryReader;

    fn session_reader() -> (MemoryReader, Vec<PathBuf>) {
        let mut reader = MemoryReader::new();
        // Two files of one subject, a near-duplicate of the same subject
        // with a typo, and one unrelated subject.
        reader.insert(
            "/scan/s1/a.dcm",
            &[("PatientID", "SUBJ-0001"), ("PatientName", "John Doe")],
        );
        reader.insert(
            "/scan/s1/b.dcm",
            &[("PatientID", "SUBJ-0001"), ("PatientName", "John Doe")],
        );
        reader.insert(
            "/scan/s1/c.dcm",
            &[("PatientID", "SUBJ-0001"), ("PatientName", "Jhon Doe")],
        );
        reader.insert(
            "/scan/s2/d.dcm",
            &[("PatientID", "SUBJ-0999"), ("PatientName", "Mary Major")],
        );
        let paths = ["/scan/s1/a.dcm", "/scan/s1/b.dcm", "/scan/s1/c.dcm", "/scan/s2/d.dcm"]
            .iter()
            .map(PathBuf::from)
            .collect();
        (reader, paths)
    }

    fn build(reader: MemoryReader, paths: &[PathBuf]) -> DicomClustering<MemoryReader> {
        DicomClustering::with_reader(
            reader,
            paths,
            FieldWeights::from_fields(["PatientID", "PatientName"]),
            DistanceKind::Levenshtein,
        )
        .unwrap()
    }

    #[test]
    fn construction_groups_exact_duplicates() {
        let (reader, paths) = session_reader();
        let clustering = build(reader, &paths);

        assert_eq!(clustering.groups().len(), 3);
        assert_eq!(clustering.num_files(), 4);
    }

    #[test]
    fn empty_weights_are_rejected_up_front() {
        let (reader, paths) = session_reader();
        let err = DicomClustering::with_reader(
            reader,
            &paths,
            FieldWeights::from_fields(Vec::<String>::new()),
            DistanceKind::Levenshtein,
        )
        .unwrap_err();
        assert!(matches!(err, ClusterError::EmptyFieldWeights));
    }

    #[test]
    fn threshold_then_merge_coalesces_similar_groups() {
        let (reader, paths) = session_reader();
        let mut clustering = build(reader, &paths);

        let matrix = clustering.distance_matrix(None).unwrap();
        let mask = DicomClustering::<MemoryReader>::dist_percentile_threshold(&matrix, 50.0, 1);
        let (targets, sources) = matrix_where(&mask);

        // The typo'd near-duplicate is the only pair below the median.
        assert_eq!(targets.len(), 1);
        let before = clustering.num_files();
        clustering.merge_groups(&targets, &sources).unwrap();

        assert_eq!(clustering.groups().len(), 2);
        assert_eq!(clustering.num_files(), before);
    }

    #[test]
    fn folder_hints_pair_groups_by_prefix() {
        let (reader, paths) = session_reader();
        let clustering = build(reader, &paths);

        let pairs = clustering.groups_in_same_folder(3);
        // Both SUBJ-0001 groups live under /scan/s1.
        assert_eq!(pairs.len(), 1);
        let (first, second) = &pairs[0];
        assert!(first.starts_with("/scan/s1") && second.starts_with("/scan/s1"));
    }
}
