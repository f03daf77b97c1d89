use crate::analysis::{
    aggregate, Classifier, ClassificationCounts, CommitReport, Engine, PushReport, TracingObserver,
};
use crate::cli::{Args, BaseSpec, OutputFormat};
use crate::config::{self, Config};
use crate::filter::PathFilter;
use crate::git::{BlameResolver, Repository};
use crate::reporter::{self, Reporter};
use anyhow::{Context, Result};
use chrono::DateTime;
use git2::Oid;
use std::fmt;

pub struct App {
    args: Args,
    config: Config,
    repo: Repository,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let mut config =
            config::load(args.config.as_deref()).context("Failed to load configuration")?;

        // Command line and environment take precedence over the file
        if let Some(threshold) = args.threshold_secs {
            config.threshold_secs = threshold;
        }
        if args.repository_id.is_some() {
            config.repository_id = args.repository_id.clone();
        }
        if args.organization_id.is_some() {
            config.organization_id = args.organization_id.clone();
        }
        if args.endpoint.is_some() {
            config.endpoint = args.endpoint.clone();
        }

        let repo = Repository::discover(&args.repo)?;

        Ok(Self { args, config, repo })
    }

    /// Resolve the analyzed range: `(base, head)`, where no base means only
    /// `head` itself is analyzed.
    fn resolve_range(&self) -> Result<(Option<Oid>, Oid)> {
        let head = match self.args.head.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => self.repo.resolve_ref(h)?,
            _ => self.repo.head_commit()?,
        };

        let base = match BaseSpec::parse(self.args.base.as_deref()) {
            BaseSpec::Ref(r) => Some(self.repo.resolve_ref(&r)?),
            BaseSpec::DefaultBranch => self.default_branch_base(head),
        };

        Ok((base, head))
    }

    /// Merge-base of `head` with the default branch, unless `head` is
    /// already on it.
    fn default_branch_base(&self, head: Oid) -> Option<Oid> {
        let branch = match self.repo.find_default_branch() {
            Ok(branch) => branch,
            Err(e) => {
                tracing::debug!(error = %e, "no default branch, analyzing HEAD only");
                return None;
            }
        };

        let tip = self.repo.resolve_ref(&branch).ok()?;
        if tip == head {
            return None;
        }

        match self.repo.merge_base(tip, head) {
            Ok(base) if base != head => Some(base),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, branch = %branch, "no merge base, analyzing HEAD only");
                None
            }
        }
    }

    /// Analyze every selected commit and assemble the run's report.
    pub fn analyze(&self) -> Result<PushReport> {
        let (base, head) = self.resolve_range()?;
        let commits = match base {
            Some(base) => self.repo.commits_between(base, head).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "commit walk failed, nothing to analyze");
                Vec::new()
            }),
            None => vec![head],
        };
        tracing::info!(
            base = ?base.map(|b| b.to_string()),
            head = %head,
            commits = commits.len(),
            "analyzing commits"
        );

        let resolver = BlameResolver::new(self.repo.git());
        let filter = PathFilter::from_config(&self.config);
        let engine = Engine::new(
            &resolver,
            Classifier::new(self.config.threshold_secs),
            &filter,
        );

        let reports = commits
            .iter()
            .map(|&oid| self.analyze_commit(&engine, oid))
            .collect::<Result<Vec<_>>>()?;

        Ok(PushReport {
            repository_id: self.config.repository_id.clone(),
            organization_id: self.config.organization_id.clone(),
            base: base.map(|b| b.to_string()),
            head: head.to_string(),
            threshold_secs: self.config.threshold_secs,
            summary: aggregate(&reports),
            commits: reports,
        })
    }

    fn analyze_commit(
        &self,
        engine: &Engine<'_, BlameResolver<'_>>,
        oid: Oid,
    ) -> Result<CommitReport> {
        let info = self.repo.commit_info(oid)?;

        // A diff that cannot be produced counts as an empty one
        let diff_text = match self.repo.diff_text(oid, self.config.context_lines) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(commit = %info.short_sha, error = %e, "diff failed, skipping commit");
                String::new()
            }
        };

        let analysis = engine.analyze_diff(
            &diff_text,
            info.time,
            info.parent_sha.as_deref(),
            &mut TracingObserver,
        );
        if analysis.counts.is_empty() {
            tracing::debug!(commit = %info.short_sha, "no classifiable line changes");
        }
        tracing::info!(
            commit = %info.short_sha,
            lines = analysis.counts.total(),
            new_feature = analysis.counts.new_feature,
            rewrite = analysis.counts.rewrite,
            refactor = analysis.counts.refactor,
            unresolved = analysis.counts.unresolved,
            "commit analyzed"
        );

        Ok(CommitReport {
            commit: info.sha,
            parent: info.parent_sha,
            summary: info.summary,
            author: info.author,
            committed_at: DateTime::from_timestamp(info.time, 0).unwrap_or_default(),
            counts: analysis.counts,
            files: analysis.files,
            files_skipped: analysis.files_skipped,
            repository_id: self.config.repository_id.clone(),
            organization_id: self.config.organization_id.clone(),
        })
    }

    pub fn run(self) -> Result<()> {
        let report = self.analyze()?;

        match self.args.format {
            OutputFormat::Text => print!("{}", TextReport(&report)),
            OutputFormat::Json => {
                let body = reporter::canonical_json(&report)?;
                println!("{}", String::from_utf8_lossy(&body));
            }
        }

        self.deliver(&report)
    }

    fn deliver(&self, report: &PushReport) -> Result<()> {
        if self.config.endpoint.is_none() && !self.args.require_delivery {
            tracing::info!("no reporting endpoint configured, results are local only");
            return Ok(());
        }

        let reporter = Reporter::new(self.config.endpoint.clone(), self.args.secret.clone())?;
        reporter
            .deliver(report)
            .with_context(|| format!("Failed to deliver report to {}", reporter.endpoint()))
    }
}

/// The report as printed for `--format text`.
struct TextReport<'a>(&'a PushReport);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let window = describe_threshold(report.threshold_secs);

        for commit in &report.commits {
            let short: String = commit.commit.chars().take(7).collect();
            writeln!(f, "Commit Analysis Report: {} {}", short, commit.summary)?;
            writeln!(f, "-----------------------")?;
            write_counts(f, &commit.counts, &window)?;
            if commit.files_skipped > 0 {
                writeln!(f, "Ignored files: {}", commit.files_skipped)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Summary ({} commits)", report.summary.commits)?;
        writeln!(f, "-----------------------")?;
        write_counts(f, &report.summary.totals, &window)
    }
}

fn write_counts(
    f: &mut fmt::Formatter<'_>,
    counts: &ClassificationCounts,
    window: &str,
) -> fmt::Result {
    writeln!(f, "New Features (new lines added): {}", counts.new_feature)?;
    writeln!(
        f,
        "Rewrites (modified code written ≤ {} ago): {}",
        window, counts.rewrite
    )?;
    writeln!(
        f,
        "Refactors (modified code written > {} ago): {}",
        window, counts.refactor
    )?;
    writeln!(f, "Unresolved (no line history): {}", counts.unresolved)?;
    writeln!(f, "Removed Only (of the above): {}", counts.removed_only)
}

fn describe_threshold(secs: u64) -> String {
    const DAY: u64 = 24 * 60 * 60;
    match secs {
        DAY => "1 day".to_string(),
        s if s > 0 && s % DAY == 0 => format!("{} days", s / DAY),
        s => format!("{} seconds", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sample_commit;
    use crate::git::test_support::{commit_file, init_repo};
    use clap::Parser;

    const DAY: i64 = 24 * 60 * 60;
    const NOW: i64 = 1_700_000_000;

    fn app_for(dir: &std::path::Path, extra: &[&str]) -> App {
        let config = dir.join("analysis.toml");
        std::fs::write(&config, "repository_id = \"repo-42\"\n").unwrap();

        let mut argv = vec![
            "commit-analysis".to_string(),
            "--repo".to_string(),
            dir.display().to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        let mut args = Args::try_parse_from(argv).unwrap();

        // Only flags passed here count, not ANALYSIS_* from the environment
        let given = |flag: &str| extra.contains(&flag);
        if !given("--base") {
            args.base = None;
        }
        if !given("--head") {
            args.head = None;
        }
        if !given("--endpoint") {
            args.endpoint = None;
        }
        if !given("--secret") {
            args.secret = None;
        }
        args.repository_id = None;
        args.organization_id = None;
        App::new(args).unwrap()
    }

    #[test]
    fn test_range_analysis_end_to_end() {
        let (dir, repo) = init_repo();
        let c0 = commit_file(&repo, "a.txt", "1\n2\n3\n4\n5\n", NOW - 100 * DAY);
        let c1 = commit_file(&repo, "a.txt", "1\nB\n3\n4\n5\n", NOW - 10 * DAY);
        let c2 = commit_file(&repo, "a.txt", "1\nBB\n3\nD\n5\n6\n", NOW);

        let c0s = c0.to_string();
        let c2s = c2.to_string();
        let app = app_for(dir.path(), &["--base", &c0s, "--head", &c2s]);
        let report = app.analyze().unwrap();

        assert_eq!(report.base.as_deref(), Some(c0s.as_str()));
        assert_eq!(report.head, c2s);
        assert_eq!(report.repository_id.as_deref(), Some("repo-42"));
        assert_eq!(report.commits.len(), 2);

        // c1 replaced a 90 day old line
        let first = &report.commits[0];
        assert_eq!(first.commit, c1.to_string());
        assert_eq!(first.counts.refactor, 1);
        assert_eq!(first.counts.total(), 1);

        // c2 replaced a 10 day old line, a 100 day old line, and added one
        let second = &report.commits[1];
        assert_eq!(second.counts.rewrite, 1);
        assert_eq!(second.counts.refactor, 1);
        assert_eq!(second.counts.new_feature, 1);
        assert_eq!(second.counts.unresolved, 0);
        assert_eq!(second.files.len(), 1);
        assert_eq!(second.files[0].path, "a.txt");
        assert_eq!(second.committed_at.timestamp(), NOW);

        assert_eq!(report.summary.commits, 2);
        assert_eq!(report.summary.totals.refactor, 2);
        assert_eq!(report.summary.totals.rewrite, 1);
        assert_eq!(report.summary.totals.new_feature, 1);
    }

    #[test]
    fn test_head_only_on_default_branch() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "a.txt", "1\n2\n", NOW - 2 * DAY);
        let head = commit_file(&repo, "a.txt", "1\n2\n3\n", NOW);

        let app = app_for(dir.path(), &[]);
        let report = app.analyze().unwrap();
        assert_eq!(report.base, None);
        assert_eq!(report.commits.len(), 1);
        assert_eq!(report.commits[0].commit, head.to_string());
        assert_eq!(report.summary.totals.new_feature, 1);
    }

    #[test]
    fn test_short_threshold_turns_rewrites_into_refactors() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "a.txt", "x\n", NOW - 300);
        commit_file(&repo, "a.txt", "y\n", NOW);

        let app = app_for(dir.path(), &["--threshold-secs", "200"]);
        let report = app.analyze().unwrap();
        assert_eq!(report.threshold_secs, 200);
        assert_eq!(report.summary.totals.refactor, 1);
        assert_eq!(report.summary.totals.rewrite, 0);
    }

    #[test]
    fn test_delivery_without_endpoint_is_local_only() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "a.txt", "x\n", NOW);
        let app = app_for(dir.path(), &[]);
        assert_eq!(app.config.endpoint, None);
        let report = app.analyze().unwrap();
        assert!(app.deliver(&report).is_ok());
    }

    #[test]
    fn test_required_delivery_without_endpoint_fails() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "a.txt", "x\n", NOW);
        let mut app = app_for(dir.path(), &["--require-delivery"]);
        app.config.endpoint = None;
        let report = app.analyze().unwrap();
        assert!(app.deliver(&report).is_err());
    }

    #[test]
    fn test_text_report_layout() {
        let commits = vec![sample_commit(
            "0123456789abcdef",
            ClassificationCounts {
                new_feature: 4,
                rewrite: 2,
                refactor: 1,
                unresolved: 0,
                removed_only: 1,
            },
        )];
        let report = PushReport {
            repository_id: None,
            organization_id: None,
            base: None,
            head: "0123456789abcdef".to_string(),
            threshold_secs: 30 * 24 * 60 * 60,
            summary: aggregate(&commits),
            commits,
        };

        let text = TextReport(&report).to_string();
        assert!(text.starts_with("Commit Analysis Report: 0123456 commit 0123456789abcdef\n"));
        assert!(text.contains("New Features (new lines added): 4\n"));
        assert!(text.contains("Rewrites (modified code written ≤ 30 days ago): 2\n"));
        assert!(text.contains("Refactors (modified code written > 30 days ago): 1\n"));
        assert!(text.contains("Summary (1 commits)\n"));
        assert!(text.ends_with("Removed Only (of the above): 1\n"));
    }

    #[test]
    fn test_describe_threshold() {
        assert_eq!(describe_threshold(86_400), "1 day");
        assert_eq!(describe_threshold(2_592_000), "30 days");
        assert_eq!(describe_threshold(200), "200 seconds");
    }
}
