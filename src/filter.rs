//! Skips vendored, generated and lock-file paths before analysis.

use crate::config::Config;

/// Case-insensitive path predicate built from the configured ignore sets.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    files: Vec<String>,
    folders: Vec<String>,
}

impl PathFilter {
    pub fn new<F, D>(files: F, folders: D) -> Self
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let normalize = |s: &str| s.trim().trim_matches('/').to_lowercase();
        Self {
            files: files
                .into_iter()
                .map(|f| normalize(f.as_ref()))
                .filter(|f| !f.is_empty())
                .collect(),
            folders: folders
                .into_iter()
                .map(|d| normalize(d.as_ref()))
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.ignored_files, &config.ignored_folders)
    }

    /// Whether `path` (as written in a diff header) should be skipped.
    ///
    /// A path is ignored when it ends with an ignored filename, when one of
    /// its segments is an ignored folder, or when it starts with
    /// `<folder>/`. Matching on folders is per segment, so
    /// `src/node_modules_helper.ts` is kept.
    pub fn is_ignored(&self, path: &str) -> bool {
        let path = path.trim().to_lowercase();
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return false;
        }

        if self.files.iter().any(|f| path.ends_with(f.as_str())) {
            return true;
        }

        self.folders.iter().any(|folder| {
            path.split('/').any(|segment| segment == folder)
                || path
                    .strip_prefix(folder.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}
