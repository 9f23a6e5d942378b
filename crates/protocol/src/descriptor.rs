use crate::path_filters;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MAX_CONTENT_BYTES: u64 = 10 * 1024 * 1024;

fn default_save_interval_secs() -> u64 {
    DEFAULT_SAVE_INTERVAL_SECS
}

fn default_max_content_bytes() -> u64 {
    DEFAULT_MAX_CONTENT_BYTES
}

fn default_exclude_paths() -> Vec<String> {
    ["/.git/", "/.svn/", "/.hg/", "/node_modules/", "/target/", "/bin/", "/obj/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Everything needed to build and maintain one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    /// Directory tree being indexed.
    pub monitor_folder: PathBuf,
    /// Directory holding the content and hint indexes.
    pub index_folder: PathBuf,
    #[serde(default)]
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    /// Path fragments; any file whose path contains one is skipped.
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
    /// Files larger than this are not indexed.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,
}

impl IndexDescriptor {
    pub fn new(
        name: impl Into<String>,
        monitor_folder: impl AsRef<Path>,
        index_folder: impl AsRef<Path>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            monitor_folder: monitor_folder.as_ref().to_path_buf(),
            index_folder: index_folder.as_ref().to_path_buf(),
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            exclude_paths: default_exclude_paths(),
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }

    pub fn content_index_path(&self) -> PathBuf {
        self.index_folder.join("content")
    }

    pub fn hint_index_path(&self) -> PathBuf {
        self.index_folder.join("hints")
    }

    /// Whether a file path passes every rule of this index.
    pub fn is_file_included(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        path_filters::path_allowed(
            &path,
            &self.include_extensions,
            &self.exclude_extensions,
            &self.exclude_paths,
        )
    }

    /// Whether a directory lies inside an excluded fragment.
    ///
    /// A trailing separator is appended so that fragments like `/target/`
    /// also match the directory itself.
    pub fn is_dir_excluded(&self, path: &Path) -> bool {
        let mut path = path.to_string_lossy().replace('\\', "/");
        if !path.ends_with('/') {
            path.push('/');
        }
        path_filters::path_excluded(&path, &self.exclude_paths)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("index name must not be empty");
        }
        if self.monitor_folder.as_os_str().is_empty() {
            bail!("monitor folder must not be empty");
        }
        if self.index_folder.as_os_str().is_empty() {
            bail!("index folder must not be empty");
        }
        if self.save_interval_secs == 0 {
            bail!("save interval must be at least one second");
        }
        if self.index_folder.starts_with(&self.monitor_folder) {
            bail!(
                "index folder {} must not live inside the monitored folder {}",
                self.index_folder.display(),
                self.monitor_folder.display()
            );
        }
        Ok(())
    }
}
