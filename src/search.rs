//! Locating DICOM files on disk.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use dicom::object::open_file;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ClusterError;

/// Truncated prefix of `path` keeping its first `depth` components.
///
/// The root of an absolute path counts as one component.
pub fn folder_subpath(path: &Path, depth: usize) -> PathBuf {
    path.components().take(depth).collect()
}

/// Best-effort check whether `path` is a readable DICOM file.
///
/// `DICOMDIR` index files are not considered data files.
pub fn is_dicom_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    if path.file_name() == Some(OsStr::new("DICOMDIR")) {
        return false;
    }
    match open_file(path) {
        Ok(_) => true,
        Err(_) => {
            debug!(path = %path.display(), "not a DICOM file");
            false
        }
    }
}

/// All DICOM files under `root`, recursively, in sorted order.
///
/// Unreadable directory entries are skipped with a warning; non-DICOM files
/// are ignored silently.
pub fn find_dicom_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%error, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && is_dicom_file(path) {
            found.push(path.to_path_buf());
        }
    }
    found.sort_unstable();
    found
}

/// All DICOM files under each of `roots`, concatenated in root order.
pub fn find_dicom_files_in(roots: &[PathBuf]) -> Result<Vec<PathBuf>, ClusterError> {
    let mut found = Vec::new();
    for root in roots {
        if !root.exists() {
            return Err(ClusterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("folder {} not found", root.display()),
            )));
        }
        found.extend(find_dicom_files(root));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn subpath_truncates_by_component_count() {
        let path = Path::new("/data/site1/subj1/scan.dcm");
        assert_eq!(folder_subpath(path, 3), PathBuf::from("/data/site1"));
        assert_eq!(folder_subpath(path, 99), path.to_path_buf());
        assert_eq!(folder_subpath(path, 0), PathBuf::new());
    }

    #[test]
    fn non_dicom_files_are_rejected() {
        let work = tempfile::tempdir().unwrap();
        let text = work.path().join("notes.txt");
        fs::write(&text, b"not a dicom").unwrap();
        let dicomdir = work.path().join("DICOMDIR");
        fs::write(&dicomdir, b"index").unwrap();

        assert!(!is_dicom_file(&text));
        assert!(!is_dicom_file(&dicomdir));
        assert!(!is_dicom_file(&work.path().join("missing.dcm")));
    }

    #[test]
    fn scanning_a_folder_of_non_dicoms_finds_nothing() {
        let work = tempfile::tempdir().unwrap();
        fs::create_dir_all(work.path().join("nested")).unwrap();
        fs::write(work.path().join("nested/readme.md"), b"hello").unwrap();

        assert!(find_dicom_files(work.path()).is_empty());
    }

    #[test]
    fn missing_roots_are_an_error() {
        let work = tempfile::tempdir().unwrap();
        let missing = work.path().join("gone");
        assert!(find_dicom_files_in(&[missing]).is_err());
    }
}
