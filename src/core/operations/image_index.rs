use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::file_ops::{FileOpError, FileOpResult};

/// File name -> location lookup for an image tree.
///
/// The tree is walked once, depth first, with each directory's entries
/// sorted by file name. When the same file name occurs in several
/// subdirectories the first one in that order wins.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    root: PathBuf,
    by_name: HashMap<String, PathBuf>,
    duplicates: usize,
}

impl ImageIndex {
    /// Index every file under `root`. A missing root gives an empty index.
    pub fn build(root: &Path) -> FileOpResult<Self> {
        let mut index = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };

        if !root.is_dir() {
            warn!("Image directory {:?} does not exist, no images can be copied", root);
            return Ok(index);
        }

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| FileOpError::WalkFailed {
                path: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                warn!("Skipping non UTF-8 file name {:?}", entry.path());
                continue;
            };
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());

            if let Some(existing) = index.by_name.get(name) {
                debug!("Duplicate image name {} at {:?}, keeping {:?}", name, relative, existing);
                index.duplicates += 1;
                continue;
            }
            index.by_name.insert(name.to_string(), relative.to_path_buf());
        }

        info!(
            "Indexed {} image files under {:?} ({} duplicate names ignored)",
            index.by_name.len(),
            root,
            index.duplicates
        );
        Ok(index)
    }

    /// Path of `image_name` relative to the indexed root.
    ///
    /// Bare file names are looked up anywhere in the tree; names that already
    /// carry a subdirectory are taken as a path relative to the root. Absolute
    /// paths and paths with `.` or `..` components never resolve.
    pub fn locate<'a>(&'a self, image_name: &'a str) -> Option<&'a Path> {
        if let Some(relative) = self.by_name.get(image_name) {
            return Some(relative.as_path());
        }

        let as_path = Path::new(image_name);
        if is_nested_relative(as_path) && self.root.join(as_path).is_file() {
            return Some(as_path);
        }
        None
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    #[cfg(test)]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }
}

/// At least two components, all of them plain names
fn is_nested_relative(path: &Path) -> bool {
    let mut count = 0;
    for component in path.components() {
        if !matches!(component, Component::Normal(_)) {
            return false;
        }
        count += 1;
    }
    count > 1
}
