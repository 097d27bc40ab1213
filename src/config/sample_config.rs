use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::sampling::{ImagePolicy, LowCountFilter, SelectionPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Options for one sampling run.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Source dataset directory (holds `aux_data.csv` and `image/`)
    pub root: PathBuf,

    /// Destination directory, laid out like the source
    pub output_dir: PathBuf,

    /// How many typhoons to select
    pub total_typhoons: usize,

    /// Typhoons with fewer images than this are dropped after collection; 0 disables
    pub min_images_per_typhoon: usize,

    pub random_seed: u64,

    pub selection_policy: SelectionPolicy,

    /// Cap on images kept per typhoon; `None` keeps all of them
    pub images_per_typhoon: Option<usize>,

    /// Also write `sample_summary.json` and `sample_config.json` into the output
    /// directory; off by default so the output only holds the dataset layout
    pub write_summary: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("WP"),
            output_dir: PathBuf::from("WP_sampled"),
            total_typhoons: 180,
            min_images_per_typhoon: 50,
            random_seed: 42,
            selection_policy: SelectionPolicy::Stratified,
            images_per_typhoon: None,
            write_summary: false,
        }
    }
}

impl SampleConfig {
    pub const FILE_NAME: &'static str = "typhoon-subset.json";

    /// Platform config location, e.g. `~/.config/typhoon-subset/typhoon-subset.json`
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "typhoon-subset").map(|dirs| dirs.config_dir().join(Self::FILE_NAME))
    }

    /// Read a config file. Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from: {:?}", path);
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicitly given config file, otherwise the platform default
    /// file if there is one, otherwise the built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            Some(_) => {
                info!("No config file found. Using defaults.");
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory. Using defaults.");
                Ok(Self::default())
            }
        }
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("root must not be empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_dir must not be empty".to_string()));
        }
        let root = resolve_path(&self.root);
        let output_dir = resolve_path(&self.output_dir);
        if output_dir.starts_with(&root) {
            return Err(ConfigError::Invalid(format!(
                "output_dir {:?} must not be root or lie inside it ({:?})",
                self.output_dir, self.root
            )));
        }
        if self.images_per_typhoon == Some(0) {
            return Err(ConfigError::Invalid(
                "images_per_typhoon must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy::from_cap(self.images_per_typhoon)
    }

    pub fn low_count_filter(&self) -> LowCountFilter {
        LowCountFilter::new(self.min_images_per_typhoon)
    }
}

/// Canonical form of `path`. Components that don't exist yet are appended to
/// the canonical form of their nearest existing ancestor.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => resolve_path(parent).join(name),
        _ => match Path::new(".").canonicalize() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        },
    }
}
