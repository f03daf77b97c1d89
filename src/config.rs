//! Configuration persistence for commit-analysis settings.
//!
//! Settings are read from `~/.config/commit-analysis/config.toml` unless an
//! explicit path is given on the command line.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Thirty days, the age below which a replaced line counts as a rewrite.
pub const DEFAULT_THRESHOLD_SECS: u64 = 30 * 24 * 60 * 60;

/// Persisted analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Filename suffixes that are never analyzed (lock files, minified assets).
    pub ignored_files: Vec<String>,
    /// Folder names that are never analyzed wherever they appear in a path.
    pub ignored_folders: Vec<String>,
    pub threshold_secs: u64,
    pub context_lines: u32,
    pub repository_id: Option<String>,
    pub organization_id: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignored_files: [
                "package-lock.json",
                "yarn.lock",
                "pnpm-lock.yaml",
                "cargo.lock",
                ".gitignore",
                ".env",
                ".min.js",
                ".min.css",
                ".map",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignored_folders: [
                "node_modules",
                "vendor",
                "dist",
                "build",
                "target",
                ".git",
                ".github",
                "coverage",
                "__pycache__",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            threshold_secs: DEFAULT_THRESHOLD_SECS,
            context_lines: 3,
            repository_id: None,
            organization_id: None,
            endpoint: None,
        }
    }
}

/// Returns the path to the config file: `~/.config/commit-analysis/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("commit-analysis").join("config.toml"))
}

/// Load configuration.
///
/// With an explicit path the file must be readable. The default location is
/// optional: a missing file yields defaults. In both cases a file that fails
/// to parse is reported and replaced by defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
                path: path.display().to_string(),
                source,
            })?;
            return Ok(parse(&contents, path));
        }
        None => match config_path() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(parse(&contents, &path)),
        Err(_) => Ok(Config::default()),
    }
}

fn parse(contents: &str, path: &Path) -> Config {
    match toml::from_str(contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Config::default()
        }
    }
}
