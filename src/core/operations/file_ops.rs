use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Result type for file operations
pub type FileOpResult<T> = Result<T, FileOpError>;

/// Error types for file operations
#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("Copy failed from {from:?} to {to:?}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Remove failed for {path:?}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to walk {path:?}: {source}")]
    WalkFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub fn create_dir_all(path: &Path) -> FileOpResult<()> {
    fs::create_dir_all(path).map_err(|source| FileOpError::CreateDirFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy a file, keeping its permissions and access/modification times.
/// Parent directories of `dest` are created as needed.
///
/// # Returns
/// * `Ok(bytes)` - number of bytes copied
/// * `Err(FileOpError)` if the source can't be read or the destination written
pub fn copy_file_preserving(src: &Path, dest: &Path) -> FileOpResult<u64> {
    if let Some(parent) = dest.parent() {
        create_dir_all(parent)?;
    }

    let copy_err = |source| FileOpError::CopyFailed {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source,
    };

    let mut input = File::open(src).map_err(copy_err)?;
    let metadata = input.metadata().map_err(copy_err)?;
    let mut output = File::create(dest).map_err(copy_err)?;
    let bytes = io::copy(&mut input, &mut output).map_err(copy_err)?;

    // Times must be set through the writable handle, before a read-only
    // permission set lands on the copy.
    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    output.set_times(times).map_err(copy_err)?;
    drop(output);

    fs::set_permissions(dest, metadata.permissions()).map_err(copy_err)?;
    Ok(bytes)
}

/// Recursively copy a directory tree. Symlinks are followed and their targets copied.
///
/// # Returns
/// * `Ok(count)` - number of files copied
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> FileOpResult<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| FileOpError::WalkFailed {
            path: src.to_path_buf(),
            source,
        })?;
        // WalkDir only yields paths under `src`
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else {
            copy_file_preserving(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Replace `dest` with a fresh copy of `src`, deleting whatever was there before.
pub fn replace_dir(src: &Path, dest: &Path) -> FileOpResult<usize> {
    if dest.exists() {
        info!("Removing existing directory {:?}", dest);
        fs::remove_dir_all(dest).map_err(|source| FileOpError::RemoveFailed {
            path: dest.to_path_buf(),
            source,
        })?;
    }

    let copied = copy_dir_recursive(src, dest)?;
    debug!("Copied {} files from {:?} to {:?}", copied, src, dest);
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_copy_preserves_contents_and_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.h5");
        fs::write(&src, b"typhoon").unwrap();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let dest = dir.path().join("nested").join("deeper").join("a.h5");
        let bytes = copy_file_preserving(&src, &dest).unwrap();

        assert_eq!(bytes, 7);
        assert_eq!(fs::read(&dest).unwrap(), b"typhoon");
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let err = copy_file_preserving(&dir.path().join("nope"), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, FileOpError::CopyFailed { .. }));
    }

    #[test]
    fn test_replace_dir_removes_stale_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("top.json"), "{}").unwrap();
        fs::write(src.join("sub").join("inner.json"), "[]").unwrap();

        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        let copied = replace_dir(&src, &dest).unwrap();

        assert_eq!(copied, 2);
        assert!(!dest.join("stale.txt").exists());
        assert_eq!(fs::read_to_string(dest.join("sub").join("inner.json")).unwrap(), "[]");
        assert_eq!(fs::read_to_string(dest.join("top.json")).unwrap(), "{}");
    }
}
