//! Jupyter notebook merging.
//!
//! Concatenates the cells of several `.ipynb` documents into one nbformat 4
//! notebook. Metadata and the minor format version come from the first input.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const NBFORMAT: u64 = 4;
const DEFAULT_NBFORMAT_MINOR: u64 = 5;

#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("no notebooks given to merge")]
    NoInputs,
    #[error("failed to read notebook {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse notebook {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("notebook {path:?} has no 'cells' array")]
    MissingCells { path: PathBuf },
    #[error("failed to write notebook {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

fn read_notebook(path: &Path) -> Result<Value, NotebookError> {
    let text = fs::read_to_string(path).map_err(|source| NotebookError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| NotebookError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build a merged notebook from already parsed documents
pub fn merge_notebook_values(notebooks: &[(PathBuf, Value)]) -> Result<Value, NotebookError> {
    let Some((_, first)) = notebooks.first() else {
        return Err(NotebookError::NoInputs);
    };

    let mut cells = Vec::new();
    for (path, notebook) in notebooks {
        let notebook_cells = notebook
            .get("cells")
            .and_then(Value::as_array)
            .ok_or_else(|| NotebookError::MissingCells { path: path.clone() })?;
        debug!("{:?}: {} cells", path, notebook_cells.len());
        cells.extend(notebook_cells.iter().cloned());
    }

    let metadata = first.get("metadata").cloned().unwrap_or_else(|| json!({}));
    let nbformat_minor = first
        .get("nbformat_minor")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_NBFORMAT_MINOR);

    Ok(json!({
        "cells": cells,
        "metadata": metadata,
        "nbformat": NBFORMAT,
        "nbformat_minor": nbformat_minor
    }))
}

/// Merge the notebooks at `inputs`, in order, and write the result to `output`.
///
/// # Returns
/// * `Ok(count)` - total number of cells in the merged notebook
pub fn merge_notebooks(inputs: &[PathBuf], output: &Path) -> Result<usize, NotebookError> {
    let notebooks = inputs
        .iter()
        .map(|path| read_notebook(path).map(|nb| (path.clone(), nb)))
        .collect::<Result<Vec<_>, _>>()?;

    let merged = merge_notebook_values(&notebooks)?;
    let cell_count = merged["cells"].as_array().map_or(0, Vec::len);

    let text = serde_json::to_string_pretty(&merged)?;
    fs::write(output, text + "\n").map_err(|source| NotebookError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    info!(
        "Merged {} notebooks ({} cells) into {:?}",
        inputs.len(),
        cell_count,
        output
    );
    Ok(cell_count)
}
