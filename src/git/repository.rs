use anyhow::{anyhow, Context, Result};
use git2::{DiffFormat, DiffOptions, Oid, Repository as Git2Repo, Sort};
use std::path::Path;

/// A commit selected for analysis
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub sha: String,
    pub short_sha: String,
    pub parent_sha: Option<String>,
    pub summary: String,
    pub author: String,
    /// Committer time, seconds since the Unix epoch.
    pub time: i64,
}

pub struct Repository {
    repo: Git2Repo,
}

impl Repository {
    /// Open the repository containing `path`
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path.as_ref()).context("Not a git repository")?;
        Ok(Self { repo })
    }

    /// Borrow the underlying libgit2 handle (used for blame lookups)
    pub fn git(&self) -> &Git2Repo {
        &self.repo
    }

    /// Find the default branch (main or master)
    pub fn find_default_branch(&self) -> Result<String> {
        for branch in &["main", "master"] {
            if self
                .repo
                .find_branch(branch, git2::BranchType::Local)
                .is_ok()
            {
                return Ok(branch.to_string());
            }
        }

        // CI checkouts often only have the remote-tracking branch
        for branch in &["origin/main", "origin/master"] {
            if self
                .repo
                .find_branch(branch, git2::BranchType::Remote)
                .is_ok()
            {
                return Ok(branch.to_string());
            }
        }

        Err(anyhow!("Could not find default branch (main or master)"))
    }

    /// Resolve a ref name or commit hash to the OID of a commit
    pub fn resolve_ref(&self, ref_name: &str) -> Result<Oid> {
        if let Ok(reference) = self.repo.find_reference(ref_name) {
            if let Ok(commit) = reference.peel_to_commit() {
                return Ok(commit.id());
            }
        }

        if let Ok(branch) = self.repo.find_branch(ref_name, git2::BranchType::Local) {
            if let Ok(commit) = branch.get().peel_to_commit() {
                return Ok(commit.id());
            }
        }

        let remote_ref = format!("origin/{}", ref_name);
        if let Ok(branch) = self.repo.find_branch(&remote_ref, git2::BranchType::Remote) {
            if let Ok(commit) = branch.get().peel_to_commit() {
                return Ok(commit.id());
            }
        }

        let commit = self
            .repo
            .revparse_single(ref_name)
            .and_then(|obj| obj.peel_to_commit())
            .context(format!("Could not resolve ref: {}", ref_name))?;

        Ok(commit.id())
    }

    /// Get the HEAD commit OID
    pub fn head_commit(&self) -> Result<Oid> {
        let head = self.repo.head().context("Failed to get HEAD")?;
        let commit = head.peel_to_commit().context("HEAD is not a commit")?;
        Ok(commit.id())
    }

    pub fn merge_base(&self, a: Oid, b: Oid) -> Result<Oid> {
        self.repo
            .merge_base(a, b)
            .context(format!("No merge base between {} and {}", a, b))
    }

    /// Non-merge commits reachable from `head` but not from `base`, oldest first
    pub fn commits_between(&self, base: Oid, head: Oid) -> Result<Vec<Oid>> {
        let mut revwalk = self.repo.revwalk().context("Failed to start revwalk")?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(head)?;
        revwalk.hide(base)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.context("Failed to walk history")?;
            let commit = self.repo.find_commit(oid)?;
            if commit.parent_count() <= 1 {
                commits.push(oid);
            }
        }

        Ok(commits)
    }

    pub fn commit_info(&self, oid: Oid) -> Result<CommitInfo> {
        let commit = self
            .repo
            .find_commit(oid)
            .context(format!("Failed to find commit {}", oid))?;

        let sha = oid.to_string();
        let short_sha = sha.chars().take(7).collect();
        let parent_sha = commit.parent_id(0).ok().map(|p| p.to_string());
        let summary = commit.summary().unwrap_or("").to_string();
        let author = commit.author();
        let author = author.name().unwrap_or("").to_string();

        Ok(CommitInfo {
            sha,
            short_sha,
            parent_sha,
            summary,
            author,
            time: commit.time().seconds(),
        })
    }

    /// Render the diff between a commit's first parent and the commit as
    /// unified diff text. A root commit is diffed against the empty tree.
    pub fn diff_text(&self, oid: Oid, context_lines: u32) -> Result<String> {
        let commit = self
            .repo
            .find_commit(oid)
            .context(format!("Failed to find commit {}", oid))?;
        let tree = commit.tree().context("Failed to get commit tree")?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree().context("Failed to get parent tree")?),
            Err(_) => None,
        };

        let mut opts = DiffOptions::new();
        opts.context_lines(context_lines);

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
            .context("Failed to compute diff")?;

        let mut text = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => text.push(line.origin()),
                // End-of-file newline markers carry no line of their own.
                '=' | '>' | '<' => return true,
                _ => {}
            }
            text.push_str(&String::from_utf8_lossy(line.content()));
            if !text.ends_with('\n') {
                text.push('\n');
            }
            true
        })
        .context("Failed to render diff")?;

        Ok(text)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_commits_between_is_oldest_first() {
        let (dir, repo) = init_repo();
        let base = commit_file(&repo, "a.txt", "1\n", 100);
        let c1 = commit_file(&repo, "a.txt", "1\n2\n", 200);
        let c2 = commit_file(&repo, "a.txt", "1\n2\n3\n", 300);

        let wrapped = Repository::discover(dir.path()).unwrap();
        assert_eq!(wrapped.commits_between(base, c2).unwrap(), vec![c1, c2]);
        assert!(wrapped.commits_between(c2, c2).unwrap().is_empty());
    }

    #[test]
    fn test_commits_between_skips_merges() {
        let (dir, repo) = init_repo();
        let base = commit_file(&repo, "a.txt", "1\n", 100);
        let side = commit_file(&repo, "b.txt", "b\n", 150);
        // Rewind HEAD to base to build a diverging line.
        repo.set_head_detached(base).unwrap();
        let main = commit_file(&repo, "c.txt", "c\n", 200);
        let merge = commit_merge(&repo, side, 300);

        let wrapped = Repository::discover(dir.path()).unwrap();
        let commits = wrapped.commits_between(base, merge).unwrap();
        assert_eq!(commits.len(), 2);
        assert!(commits.contains(&side));
        assert!(commits.contains(&main));
        assert!(!commits.contains(&merge));
    }

    #[test]
    fn test_commit_info() {
        let (dir, repo) = init_repo();
        let first = commit_file(&repo, "a.txt", "1\n", 1_700_000_000);
        let second = commit_file(&repo, "a.txt", "2\n", 1_700_000_500);

        let wrapped = Repository::discover(dir.path()).unwrap();
        let info = wrapped.commit_info(second).unwrap();
        assert_eq!(info.sha, second.to_string());
        assert_eq!(info.short_sha.len(), 7);
        assert_eq!(info.parent_sha, Some(first.to_string()));
        assert_eq!(info.time, 1_700_000_500);
        assert_eq!(info.summary, "update a.txt");
        assert_eq!(info.author, "Test");

        assert_eq!(wrapped.commit_info(first).unwrap().parent_sha, None);
        assert_eq!(wrapped.head_commit().unwrap(), second);
        assert_eq!(wrapped.resolve_ref(&first.to_string()).unwrap(), first);
    }

    #[test]
    fn test_diff_text_is_unified() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "a.txt", "one\ntwo\nthree\n", 100);
        let second = commit_file(&repo, "a.txt", "one\nTWO\nthree\nfour", 200);

        let wrapped = Repository::discover(dir.path()).unwrap();
        let text = wrapped.diff_text(second, 3).unwrap();
        assert!(text.starts_with("diff --git a/a.txt b/a.txt\n"));
        assert!(text.contains("--- a/a.txt\n+++ b/a.txt\n"));
        assert!(text.contains("@@ -1,3 +1,4 @@"));
        assert!(text.contains("\n-two\n+TWO\n"));
        assert!(text.contains("\n+four\n"));
        assert!(!text.contains("No newline"));
    }

    #[test]
    fn test_root_commit_diffs_against_empty_tree() {
        let (dir, repo) = init_repo();
        let root = commit_file(&repo, "a.txt", "one\ntwo\n", 100);

        let wrapped = Repository::discover(dir.path()).unwrap();
        let text = wrapped.diff_text(root, 3).unwrap();
        assert!(text.contains("--- /dev/null\n+++ b/a.txt\n"));
        assert!(text.contains("+one\n+two\n"));
    }

    #[test]
    fn test_default_branch_lookup() {
        let (dir, repo) = init_repo();
        let oid = commit_file(&repo, "a.txt", "1\n", 100);
        let commit = repo.find_commit(oid).unwrap();
        repo.branch("main", &commit, true).unwrap();

        let wrapped = Repository::discover(dir.path()).unwrap();
        assert_eq!(wrapped.find_default_branch().unwrap(), "main");
        assert_eq!(wrapped.resolve_ref("main").unwrap(), oid);
    }
}
