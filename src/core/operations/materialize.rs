//! Writing a sampled subset back out to disk.
//!
//! The output mirrors the source layout: `aux_data.csv`, the `image/` tree,
//! the `metadata/` directory and `metadata.json`.

use indicatif::ProgressBar;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::dataset::ImageRecord;

use super::file_ops::{copy_file_preserving, create_dir_all, replace_dir, FileOpResult};
use super::image_index::ImageIndex;

pub const IMAGE_DIR: &str = "image";
pub const METADATA_DIR: &str = "metadata";
pub const METADATA_JSON: &str = "metadata.json";

/// Outcome of copying the images referenced by a subset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    /// `image_path` values that matched no file under the source tree
    pub not_found: Vec<String>,
}

/// Copy every image the records reference from `<src_root>/image` to
/// `<out_root>/image`, keeping the relative sub-path each was found at.
///
/// Missing images are not an error; they are collected in the report.
pub fn copy_images(
    records: &[ImageRecord],
    src_root: &Path,
    out_root: &Path,
    progress: &ProgressBar,
) -> FileOpResult<CopyReport> {
    let src_dir = src_root.join(IMAGE_DIR);
    let dst_dir = out_root.join(IMAGE_DIR);
    create_dir_all(&dst_dir)?;

    let index = ImageIndex::build(&src_dir)?;
    let mut report = CopyReport::default();

    progress.set_length(records.len() as u64);
    for record in records {
        match index.locate(&record.image_path) {
            Some(relative) => {
                copy_file_preserving(&src_dir.join(relative), &dst_dir.join(relative))?;
                report.copied += 1;
            }
            None => {
                debug!("Image not found: {}", record.image_path);
                report.not_found.push(record.image_path.clone());
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if !report.not_found.is_empty() {
        warn!("{} referenced images were not found under {:?}", report.not_found.len(), src_dir);
    }
    info!("Copied {} images to {:?}", report.copied, dst_dir);
    Ok(report)
}

/// Copy `<src_root>/metadata` verbatim, replacing any existing copy.
///
/// # Returns
/// * `Ok(None)` if the source has no metadata directory
/// * `Ok(Some(count))` with the number of files copied
pub fn copy_metadata_dir(src_root: &Path, out_root: &Path) -> FileOpResult<Option<usize>> {
    let src = src_root.join(METADATA_DIR);
    if !src.is_dir() {
        debug!("No metadata directory at {:?}, skipping", src);
        return Ok(None);
    }

    let copied = replace_dir(&src, &out_root.join(METADATA_DIR))?;
    info!("Copied metadata directory ({} files)", copied);
    Ok(Some(copied))
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?} must contain a JSON object keyed by typhoon id")]
    NotAnObject { path: PathBuf },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Keep only the entries whose key is one of the selected ids. Key order is preserved.
pub fn filter_metadata(metadata: Map<String, Value>, selected: &[i64]) -> Map<String, Value> {
    let keys: HashSet<String> = selected.iter().map(|id| id.to_string()).collect();
    metadata
        .into_iter()
        .filter(|(key, _)| keys.contains(key))
        .collect()
}

/// Filter `<src_root>/metadata.json` down to the selected typhoons and write it
/// pretty-printed to `<out_root>/metadata.json`.
///
/// # Returns
/// * `Ok(None)` if there is no source metadata file
/// * `Ok(Some(count))` with the number of entries kept
pub fn write_filtered_metadata(
    src_root: &Path,
    out_root: &Path,
    selected: &[i64],
) -> Result<Option<usize>, MetadataError> {
    let src = src_root.join(METADATA_JSON);
    if !src.is_file() {
        debug!("No {} at {:?}, skipping", METADATA_JSON, src_root);
        return Ok(None);
    }

    let text = fs::read_to_string(&src).map_err(|source| MetadataError::Read {
        path: src.clone(),
        source,
    })?;
    let parsed: Value = serde_json::from_str(&text).map_err(|source| MetadataError::Parse {
        path: src.clone(),
        source,
    })?;
    let Value::Object(metadata) = parsed else {
        return Err(MetadataError::NotAnObject { path: src });
    };

    let total = metadata.len();
    let filtered = filter_metadata(metadata, selected);
    let kept = filtered.len();

    let dst = out_root.join(METADATA_JSON);
    let json = serde_json::to_string_pretty(&Value::Object(filtered))?;
    fs::write(&dst, json).map_err(|source| MetadataError::Write {
        path: dst.clone(),
        source,
    })?;

    info!("Wrote {} of {} metadata entries to {:?}", kept, total, dst);
    Ok(Some(kept))
}
