//! Folder scanning for batch job candidates.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ConvertError;
use crate::job::JobKind;

/// A recognized file found by [`scan_folder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub name: String,
    pub kind: JobKind,
}

/// Lists files under `dir` with a recognized text or image extension.
///
/// Without `recursive` only the top level is visited. Entries are returned in
/// file-name order per directory.
pub fn scan_folder(dir: &Path, recursive: bool) -> Result<Vec<ScannedFile>, ConvertError> {
    if !dir.is_dir() {
        return Err(ConvertError::io(
            format!("Failed to scan {}", dir.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if let Some(kind) = JobKind::from_path(path) {
            files.push(ScannedFile {
                path: path.to_path_buf(),
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
    }

    debug!("Scanned {}: {} recognized files", dir.display(), files.len());
    Ok(files)
}

/// Replaces every folder in `inputs` with the recognized files inside it.
///
/// Plain file paths pass through unchanged. A folder that cannot be scanned
/// is logged and skipped.
pub fn expand_inputs(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            paths.push(input.clone());
            continue;
        }
        info!("Scanning folder: {}", input.display());
        match scan_folder(input, recursive) {
            Ok(files) => {
                info!("Found {} files", files.len());
                paths.extend(files.into_iter().map(|f| f.path));
            }
            Err(e) => warn!("Folder scan failed: {}", e),
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.PNG"), "b").unwrap();
        fs::write(dir.path().join("c.zip"), "c").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/d.md"), "d").unwrap();
        dir
    }

    fn names(files: &[ScannedFile]) -> Vec<(&str, JobKind)> {
        files.iter().map(|f| (f.name.as_str(), f.kind)).collect()
    }

    #[test]
    fn test_flat_scan() {
        let dir = fixture();
        let files = scan_folder(dir.path(), false).unwrap();

        assert_eq!(
            names(&files),
            vec![("a.txt", JobKind::Text), ("b.PNG", JobKind::Image)]
        );
    }

    #[test]
    fn test_recursive_scan() {
        let dir = fixture();
        let files = scan_folder(dir.path(), true).unwrap();

        assert_eq!(
            names(&files),
            vec![
                ("a.txt", JobKind::Text),
                ("b.PNG", JobKind::Image),
                ("d.md", JobKind::Text)
            ]
        );
        assert_eq!(files[2].path, dir.path().join("nested").join("d.md"));
    }

    #[test]
    fn test_expand_inputs_keeps_order() {
        let dir = fixture();
        let single = dir.path().join("nested/d.md");
        let inputs = vec![single.clone(), dir.path().to_path_buf()];

        assert_eq!(
            expand_inputs(&inputs, false),
            vec![single, dir.path().join("a.txt"), dir.path().join("b.PNG")]
        );
    }

    #[test]
    fn test_missing_folder_is_io_error() {
        let result = scan_folder(Path::new("/nonexistent/seedoc"), true);
        assert!(matches!(result, Err(ConvertError::Io { .. })));
    }
}
