use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where scans and their cached volumes live.
///
/// ```toml
/// scans_dir = "/data/CTscans"
/// compressed_volumes_dir = "/data/cache"
/// prefer_compressed_cache = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanStoreConfig {
    pub scans_dir: PathBuf,
    /// Defaults to `scans_dir` when unset.
    pub compressed_volumes_dir: Option<PathBuf>,
    pub prefer_compressed_cache: bool,
}

impl Default for ScanStoreConfig {
    fn default() -> Self {
        Self {
            scans_dir: PathBuf::from("CTscans"),
            compressed_volumes_dir: None,
            prefer_compressed_cache: true,
        }
    }
}

impl ScanStoreConfig {
    pub fn new(scans_dir: impl Into<PathBuf>) -> Self {
        Self {
            scans_dir: scans_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.compressed_volumes_dir = Some(dir.into());
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn cache_dir(&self) -> &Path {
        self.compressed_volumes_dir
            .as_deref()
            .unwrap_or(&self.scans_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_defaults_to_scans_dir() {
        let config = ScanStoreConfig::new("/data/scans");
        assert_eq!(config.cache_dir(), Path::new("/data/scans"));
        let config = config.with_cache_dir("/data/cache");
        assert_eq!(config.cache_dir(), Path::new("/data/cache"));
    }

    #[test]
    fn parses_partial_toml() {
        let config = ScanStoreConfig::from_toml_str("scans_dir = \"/mnt/ct\"\n").unwrap();
        assert_eq!(config.scans_dir, PathBuf::from("/mnt/ct"));
        assert!(config.prefer_compressed_cache);
        assert_eq!(config.compressed_volumes_dir, None);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(matches!(
            ScanStoreConfig::from_toml_str("prefer_compressed_cache = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
