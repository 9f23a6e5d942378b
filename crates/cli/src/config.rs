//! `codesearch.toml` loading.
//!
//! ```toml
//! lock_timeout_ms = 60000
//!
//! [[indexes]]
//! name = "backend"
//! monitor_folder = "/work/backend"
//! index_folder = "/var/lib/codesearch/backend"
//! include_extensions = ["rs", "toml"]
//! ```

use anyhow::{bail, Context, Result};
use codesearch_indexer::parse_bounded;
use codesearch_protocol::IndexDescriptor;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "CODESEARCH_CONFIG";
pub const LOCK_TIMEOUT_ENV: &str = "CODESEARCH_LOCK_TIMEOUT_MS";
pub const DEFAULT_CONFIG_FILE: &str = "codesearch.toml";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 60_000;
const MIN_LOCK_TIMEOUT_MS: u64 = 10;
const MAX_LOCK_TIMEOUT_MS: u64 = 600_000;

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Upper bound on waits for an index pool lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            indexes: Vec::new(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl AppConfig {
    /// Config path: the explicit argument, then `CODESEARCH_CONFIG`, then
    /// `codesearch.toml` in the working directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config {}", path.display()))?;
        let mut config = Self::parse(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.apply_env(env::var(LOCK_TIMEOUT_ENV).ok().as_deref());
        log::debug!("Loaded {} index(es) from {}", config.indexes.len(), path.display());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        for descriptor in &config.indexes {
            descriptor
                .validate()
                .with_context(|| format!("index {}", descriptor.name))?;
        }
        for (idx, descriptor) in config.indexes.iter().enumerate() {
            let duplicate = config.indexes[..idx]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&descriptor.name));
            if duplicate {
                bail!("index name {} is used twice", descriptor.name);
            }
        }
        Ok(config)
    }

    fn apply_env(&mut self, lock_timeout_ms: Option<&str>) {
        if lock_timeout_ms.is_some() {
            self.lock_timeout_ms = parse_bounded(
                lock_timeout_ms,
                self.lock_timeout_ms,
                MIN_LOCK_TIMEOUT_MS,
                MAX_LOCK_TIMEOUT_MS,
            );
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Index by case-insensitive name or by id.
    pub fn find(&self, name_or_id: &str) -> Result<&IndexDescriptor> {
        self.indexes
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name_or_id) || d.id.to_string() == name_or_id)
            .with_context(|| format!("No index named {name_or_id} in the config"))
    }

    /// The named indexes, or all of them when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<IndexDescriptor>> {
        if names.is_empty() {
            return Ok(self.indexes.clone());
        }
        names
            .iter()
            .map(|name| self.find(name).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        [[indexes]]
        name = "backend"
        monitor_folder = "/work/backend"
        index_folder = "/var/lib/codesearch/backend"
        include_extensions = ["rs"]

        [[indexes]]
        name = "docs"
        monitor_folder = "/work/docs"
        index_folder = "/var/lib/codesearch/docs"
    "#;

    #[test]
    fn parses_indexes_with_defaults() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.indexes.len(), 2);
        assert_eq!(config.lock_timeout(), Duration::from_secs(60));
        assert_eq!(config.find("DOCS").unwrap().name, "docs");
        assert!(config.find("missing").is_err());
        assert_eq!(config.select(&[]).unwrap().len(), 2);
        assert_eq!(config.select(&["backend".to_string()]).unwrap().len(), 1);
    }

    #[test]
    fn env_override_is_clamped() {
        let mut config = AppConfig::parse(SAMPLE).unwrap();
        config.apply_env(Some("5"));
        assert_eq!(config.lock_timeout_ms, MIN_LOCK_TIMEOUT_MS);
        config.apply_env(Some("1500"));
        assert_eq!(config.lock_timeout_ms, 1500);
        config.apply_env(Some("garbage"));
        assert_eq!(config.lock_timeout_ms, 1500);
        config.apply_env(None);
        assert_eq!(config.lock_timeout_ms, 1500);
    }

    #[test]
    fn rejects_invalid_indexes() {
        let nested = r#"
            [[indexes]]
            name = "bad"
            monitor_folder = "/work"
            index_folder = "/work/.index"
        "#;
        assert!(AppConfig::parse(nested).is_err());

        let twice = format!("{SAMPLE}\n[[indexes]]\nname = \"Docs\"\nmonitor_folder = \"/a\"\nindex_folder = \"/b\"\n");
        assert!(AppConfig::parse(&twice).is_err());
    }
}
