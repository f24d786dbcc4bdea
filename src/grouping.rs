//! Partitioning file collections into groups of header-identical files.

use std::path::PathBuf;

use tracing::debug;

use crate::cluster::{ClusterStore, Group};
use crate::distance::{ExactDistance, FieldWeights};
use crate::error::ClusterError;
use crate::record::{HeaderRecord, RecordReader};

/// Partition `paths` into groups of files whose `header_fields` values are
/// pairwise identical.
///
/// Every header is read exactly once up front; a read failure aborts with
/// the offending path attached. Seeds are popped from the end of the pool,
/// so representatives appear in reverse input order; within a group the
/// members after the seed keep input order. Membership itself does not
/// depend on scan order since exact equality is an equivalence relation.
pub fn group_dicom_files<R: RecordReader>(
    reader: &R,
    paths: &[PathBuf],
    header_fields: &FieldWeights,
) -> Result<ClusterStore, ClusterError> {
    let exact = ExactDistance::new(header_fields.clone());

    let mut pool: Vec<HeaderRecord> = paths
        .iter()
        .map(|path| reader.read(path))
        .collect::<Result<_, _>>()?;

    let mut store = ClusterStore::new();
    while let Some(seed) = pool.pop() {
        let mut group = Group::new(seed.path().to_path_buf());
        pool.retain(|candidate| {
            if exact.matches(&seed, candidate) {
                group.push(candidate.path().to_path_buf());
                false
            } else {
                true
            }
        });
        debug!(
            representative = %seed.path().display(),
            members = group.len(),
            "formed exact-duplicate group"
        );
        store.push(group);
    }

    Ok(store)
}

/// Bucket `paths` by the value of a single header field.
///
/// Returns (field value, member paths) pairs in first-seen order. Absent
/// fields bucket under the empty string.
pub fn group_by_field<R: RecordReader>(
    reader: &R,
    paths: &[PathBuf],
    field: &str,
) -> Result<Vec<(String, Vec<PathBuf>)>, ClusterError> {
    let mut buckets: Vec<(String, Vec<PathBuf>)> = Vec::new();
    for path in paths {
        let record = reader.read(path)?;
        let value = record.get_or(field, "").to_string();
        match buckets.iter_mut().find(|(key, _)| *key == value) {
            Some((_, members)) => members.push(path.clone()),
            None => buckets.push((value, vec![path.clone()])),
        }
    }
    Ok(buckets)
}
