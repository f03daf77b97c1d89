//! Line provenance: when was a given line of a file last authored.

use crate::error::Result;
use git2::{BlameOptions, Repository};
use std::collections::HashMap;
use std::path::Path;

/// Answers "when was line N of this file authored, as of this revision".
///
/// Implementations resolve many lines of one file per call. Lines that
/// cannot be resolved (file missing at that revision, line out of range,
/// lookup failure) are simply absent from the result.
pub trait ProvenanceResolver {
    fn resolve_many(&self, path: &str, lines: &[u32], revision: &str) -> HashMap<u32, i64>;

    fn resolve(&self, path: &str, line: u32, revision: &str) -> Option<i64> {
        self.resolve_many(path, &[line], revision).get(&line).copied()
    }
}

/// Resolves provenance with libgit2 blame, one blame per file and call.
pub struct BlameResolver<'r> {
    repo: &'r Repository,
}

impl<'r> BlameResolver<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        Self { repo }
    }

    fn blame(
        &self,
        path: &str,
        lines: &[u32],
        revision: &str,
    ) -> Result<HashMap<u32, i64>> {
        let (Some(&min), Some(&max)) = (lines.iter().min(), lines.iter().max()) else {
            return Ok(HashMap::new());
        };

        let commit = self.repo.revparse_single(revision)?.peel_to_commit()?;

        let mut opts = BlameOptions::new();
        opts.newest_commit(commit.id())
            .min_line(min as usize)
            .max_line(max as usize);

        let blame = self.repo.blame_file(Path::new(path), Some(&mut opts))?;

        Ok(lines
            .iter()
            .filter_map(|&line| {
                let hunk = blame.get_line(line as usize)?;
                let authored_at = hunk.final_signature().when().seconds();
                Some((line, authored_at))
            })
            .collect())
    }
}

impl ProvenanceResolver for BlameResolver<'_> {
    fn resolve_many(&self, path: &str, lines: &[u32], revision: &str) -> HashMap<u32, i64> {
        // Line numbers are 1-based; a 0 can only come from a bogus hunk header.
        let lines: Vec<u32> = lines.iter().copied().filter(|&l| l > 0).collect();
        if lines.is_empty() {
            return HashMap::new();
        }

        match self.blame(path, &lines, revision) {
            Ok(found) => {
                tracing::debug!(
                    path,
                    revision,
                    requested = lines.len(),
                    resolved = found.len(),
                    "blame resolved"
                );
                found
            }
            Err(e) => {
                tracing::debug!(path, revision, error = %e, "blame failed, lines left unresolved");
                HashMap::new()
            }
        }
    }
}
