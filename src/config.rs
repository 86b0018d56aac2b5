//! Include configuration.
//!
//! Loaded from an optional YAML file, then layered under command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Environment variable listing extra library roots in path-list syntax.
pub const LIBS_ENV: &str = "HDRINC_LIBS";

pub const DEFAULT_HEADER_SUFFIX: &str = ".hrl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncludeConfig {
    /// Directories searched, in order, for include names.
    pub include_path: Vec<PathBuf>,
    /// Directories holding `app` or `app-VERSION` library directories.
    pub lib_roots: Vec<PathBuf>,
    /// Names ending with this go through the header translators.
    pub header_suffix: String,
    /// Read typed records in the older combined encoding.
    pub legacy_record_types: bool,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            include_path: vec![PathBuf::from(".")],
            lib_roots: Vec::new(),
            header_suffix: DEFAULT_HEADER_SUFFIX.to_string(),
            legacy_record_types: false,
        }
    }
}

impl IncludeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Appends library roots named by `HDRINC_LIBS`.
    pub fn with_env_lib_roots(mut self) -> Self {
        if let Some(paths) = env::var_os(LIBS_ENV) {
            self.lib_roots.extend(env::split_paths(&paths));
        }
        self
    }

    pub fn is_header(&self, name: &str) -> bool {
        name.ends_with(&self.header_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = IncludeConfig::from_yaml("lib_roots: [/opt/lib]\n").unwrap();
        assert_eq!(config.lib_roots, vec![PathBuf::from("/opt/lib")]);
        assert_eq!(config.header_suffix, ".hrl");
        assert_eq!(config.include_path, vec![PathBuf::from(".")]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(IncludeConfig::from_yaml("include_dirs: []\n").is_err());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(IncludeConfig::from_yaml("").unwrap(), IncludeConfig::default());
    }
}
