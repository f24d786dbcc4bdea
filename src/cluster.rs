//! The authoritative group partition and its maintenance operations.

use std::collections::{BTreeSet, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ClusterError;
use crate::record::RecordReader;
use crate::search::folder_subpath;

/// One cluster of files, keyed by its first member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    members: Vec<PathBuf>,
}

impl Group {
    /// New group containing only its representative.
    pub fn new(representative: PathBuf) -> Self {
        Self {
            members: vec![representative],
        }
    }

    /// The file standing for this group; always the first member.
    pub fn representative(&self) -> &Path {
        &self.members[0]
    }

    pub fn members(&self) -> &[PathBuf] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn push(&mut self, path: PathBuf) {
        self.members.push(path);
    }
}

/// Insertion-ordered collection of [`Group`]s forming a partition of the
/// grouped files: every file belongs to exactly one group, and merged-away
/// groups are deleted rather than left behind empty.
#[derive(Debug, Default, Clone)]
pub struct ClusterStore {
    groups: Vec<Group>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.groups.iter()
    }

    pub fn group(&self, index: usize) -> Option<&Group> {
        self.groups.get(index)
    }

    /// Group representatives in store order.
    pub fn representatives(&self) -> impl Iterator<Item = &Path> {
        self.groups.iter().map(Group::representative)
    }

    /// Total number of files across all groups.
    pub fn num_files(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// Absorb source groups into target groups, pairing `targets[i]` with
    /// `sources[i]`.
    ///
    /// Indices refer to the store order at call time. All appends happen
    /// first, preserving source member order, then the source groups are
    /// removed; a chain like `(0←1, 2←0)` therefore carries the members
    /// already appended to group 0 into group 2.
    ///
    /// # Errors
    ///
    /// Fails when the index slices differ in length, an index is out of
    /// range, a source index repeats, or a pair maps a group onto itself.
    /// The store is not modified on any of these.
    pub fn merge(&mut self, targets: &[usize], sources: &[usize]) -> Result<(), ClusterError> {
        if targets.len() != sources.len() {
            return Err(ClusterError::MergeLengthMismatch {
                targets: targets.len(),
                sources: sources.len(),
            });
        }

        let len = self.groups.len();
        let mut consumed = HashSet::new();
        for (&target, &source) in targets.iter().zip(sources) {
            for index in [target, source] {
                if index >= len {
                    return Err(ClusterError::MergeIndexOutOfRange { index, len });
                }
            }
            if target == source {
                return Err(ClusterError::MergeSelfReference { index: target });
            }
            if !consumed.insert(source) {
                return Err(ClusterError::MergeSourceReused { index: source });
            }
        }

        for (&target, &source) in targets.iter().zip(sources) {
            let moved = self.groups[source].members.clone();
            self.groups[target].members.extend(moved);
        }

        let mut removal: Vec<usize> = sources.to_vec();
        removal.sort_unstable();
        for source in removal.into_iter().rev() {
            self.groups.remove(source);
        }

        Ok(())
    }

    /// Pairs of distinct representatives whose paths share the same
    /// `depth`-component folder prefix. A hint query; the store is not
    /// modified.
    pub fn groups_in_same_folder(&self, depth: usize) -> Vec<(PathBuf, PathBuf)> {
        let mut pairs = Vec::new();
        for (i, first) in self.groups.iter().enumerate() {
            let prefix = folder_subpath(first.representative(), depth);
            for second in &self.groups[i + 1..] {
                if folder_subpath(second.representative(), depth) == prefix {
                    pairs.push((
                        first.representative().to_path_buf(),
                        second.representative().to_path_buf(),
                    ));
                }
            }
        }
        pairs
    }

    /// Distinct values of `field` across the members of each group.
    ///
    /// Groups are keyed by their representative path, or by the value of
    /// `key_field` read from the representative; groups whose keys collide
    /// are reported under one entry. Absent member fields contribute the
    /// empty string.
    ///
    /// # Errors
    ///
    /// Fails when `key_field` is absent on a representative (naming field
    /// and path), or when any member cannot be read.
    pub fn unique_field_values_per_group<R: RecordReader>(
        &self,
        reader: &R,
        field: &str,
        key_field: Option<&str>,
    ) -> Result<Vec<(String, BTreeSet<String>)>, ClusterError> {
        let mut entries: Vec<(String, BTreeSet<String>)> = Vec::new();
        for group in &self.groups {
            let key = match key_field {
                None => group.representative().display().to_string(),
                Some(key_field) => {
                    let record = reader.read(group.representative())?;
                    record
                        .get(key_field)
                        .ok_or_else(|| ClusterError::MissingKeyField {
                            field: key_field.to_string(),
                            path: group.representative().to_path_buf(),
                        })?
                        .to_string()
                }
            };

            let index = match entries.iter().position(|(existing, _)| *existing == key) {
                Some(index) => index,
                None => {
                    entries.push((key, BTreeSet::new()));
                    entries.len() - 1
                }
            };

            for member in group.members() {
                let record = reader.read(member)?;
                entries[index].1.insert(record.get_or(field, "").to_string());
            }
        }
        Ok(entries)
    }

    /// Copy every group into a subfolder of `dest`.
    ///
    /// The subfolder is named after the representative's `groupby_field`
    /// value, falling back to its base filename when no field is given or
    /// the value is absent or empty. Existing destination files are never
    /// overwritten; colliding names grow a `+` suffix until free.
    pub fn copy_to_folder<R: RecordReader>(
        &self,
        reader: &R,
        dest: &Path,
        groupby_field: Option<&str>,
    ) -> Result<(), ClusterError> {
        fs::create_dir_all(dest)?;

        for group in &self.groups {
            let folder_name = self.group_folder_name(reader, group, groupby_field)?;
            let group_dir = dest.join(folder_name);
            fs::create_dir_all(&group_dir)?;
            debug!(dir = %group_dir.display(), files = group.len(), "copying group");

            for source in group.members() {
                let Some(file_name) = source.file_name() else {
                    warn!(path = %source.display(), "member path has no file name, skipped");
                    continue;
                };
                let mut target = group_dir.join(file_name);
                while target.exists() {
                    let mut bumped = target
                        .file_name()
                        .map(OsStr::to_os_string)
                        .unwrap_or_default();
                    bumped.push("+");
                    target.set_file_name(bumped);
                }
                fs::copy(source, &target)?;
            }
        }
        Ok(())
    }

    fn group_folder_name<R: RecordReader>(
        &self,
        reader: &R,
        group: &Group,
        groupby_field: Option<&str>,
    ) -> Result<String, ClusterError> {
        let representative = group.representative();
        let base_name = || {
            representative
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        match groupby_field {
            None => Ok(base_name()),
            Some(field) => {
                let record = reader.read(representative)?;
                match record.get(field) {
                    Some(value) if !value.is_empty() => Ok(value.to_string()),
                    _ => Ok(base_name()),
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a ClusterStore {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
