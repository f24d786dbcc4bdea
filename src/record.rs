//! Header records and the readers that produce them.
//!
//! A [`HeaderRecord`] is an immutable snapshot of the string-convertible
//! header elements of one DICOM file, keyed by the standard dictionary name
//! of each tag. Records are identified by their file path; the comparison
//! and grouping code never holds open DICOM objects.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use dicom::core::dictionary::{DataDictionary, DataDictionaryEntry};
use dicom::core::header::Header;
use dicom::object::{FileDicomObject, InMemDicomObject, open_file};
use dicom_dictionary_std::StandardDataDictionary;

use crate::error::ClusterError;

/// Named header fields of one file, as stringified values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    path: PathBuf,
    fields: BTreeMap<String, String>,
}

impl HeaderRecord {
    pub fn new(path: impl Into<PathBuf>, fields: BTreeMap<String, String>) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    /// Path of the file this record was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of a single field, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Value of a single field, or `default` when absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Values of several fields in the given order, with `default` standing
    /// in for absent ones.
    pub fn get_attributes<'a>(&'a self, names: &[&str], default: &'a str) -> Vec<&'a str> {
        names.iter().map(|name| self.get_or(name, default)).collect()
    }

    /// All (name, value) pairs, in dictionary-name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Source of header records, keyed by file path.
pub trait RecordReader {
    /// Read the header of `path` into a record.
    ///
    /// # Errors
    ///
    /// Fails with the path attached when the file is missing, corrupt or not
    /// a DICOM file.
    fn read(&self, path: &Path) -> Result<HeaderRecord, ClusterError>;
}

/// Reads header records from DICOM files on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DicomReader;

impl RecordReader for DicomReader {
    fn read(&self, path: &Path) -> Result<HeaderRecord, ClusterError> {
        let object = open_file(path).map_err(|source| ClusterError::UnreadableRecord {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(snapshot_header(path, &object))
    }
}

/// Snapshot every string-convertible header element of `object` into a
/// record, keyed by the standard dictionary name of its tag.
fn snapshot_header(path: &Path, object: &FileDicomObject<InMemDicomObject>) -> HeaderRecord {
    let dictionary = StandardDataDictionary;
    let mut fields = BTreeMap::new();

    for element in object.iter() {
        let tag = element.tag();
        // Pixel data is never part of a header comparison.
        if tag.group() == 0x7FE0 {
            continue;
        }
        let Some(name) = dictionary.by_tag(tag).map(|entry| entry.alias()) else {
            continue;
        };
        // Sequences and binary payloads have no string form; skip them.
        let Ok(value) = element.to_str() else {
            continue;
        };
        fields.insert(name.to_string(), value.trim().to_string());
    }

    HeaderRecord::new(path, fields)
}

/// Distinct stringified values of `field` across all given files.
///
/// Absent fields contribute the empty string. Read failures abort with the
/// offending path attached.
pub fn unique_field_values<R: RecordReader>(
    reader: &R,
    paths: &[PathBuf],
    field: &str,
) -> Result<BTreeSet<String>, ClusterError> {
    let mut values = BTreeSet::new();
    for path in paths {
        let record = reader.read(path)?;
        values.insert(record.get_or(field, "").to_string());
    }
    Ok(values)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{BTreeMap, HashMap};
    use std::io;
    use std::path::{Path, PathBuf};

    use super::{HeaderRecord, RecordReader};
    use crate::error::ClusterError;

    /// In-memory record source so engine tests never need DICOM files.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryReader {
        records: HashMap<PathBuf, BTreeMap<String, String>>,
    }

    impl MemoryReader {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn insert(&mut self, path: impl Into<PathBuf>, fields: &[(&str, &str)]) {
            let fields = fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            self.records.insert(path.into(), fields);
        }
    }

    impl RecordReader for MemoryReader {
        fn read(&self, path: &Path) -> Result<HeaderRecord, ClusterError> {
            match self.records.get(path) {
                Some(fields) => Ok(HeaderRecord::new(path, fields.clone())),
                None => Err(ClusterError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no record for {}", path.display()),
                ))),
            }
        }
    }
}
