use clap::{CommandFactory, Parser, ValueEnum, ValueHint};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// commit-analysis - classify the lines a push changes as new feature, rewrite or refactor
#[derive(Parser, Debug)]
#[command(name = "commit-analysis", version, about, long_about = None)]
pub struct Args {
    /// Path inside the git repository to analyze
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    pub repo: PathBuf,

    /// Base revision; commits after it up to --head are analyzed.
    /// If omitted, the merge-base with main/master is used, or only HEAD
    /// when already on the default branch.
    #[arg(long, env = "ANALYSIS_BASE_SHA")]
    pub base: Option<String>,

    /// Head revision (defaults to HEAD)
    #[arg(long, env = "ANALYSIS_HEAD_SHA")]
    pub head: Option<String>,

    /// Config file (defaults to ~/.config/commit-analysis/config.toml)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Age in seconds up to which a replaced line counts as a rewrite
    #[arg(long)]
    pub threshold_secs: Option<u64>,

    #[arg(long, env = "ANALYSIS_REPOSITORY_ID")]
    pub repository_id: Option<String>,

    #[arg(long, env = "ANALYSIS_ORGANIZATION_ID")]
    pub organization_id: Option<String>,

    /// Reporting endpoint URL; without it results are only printed
    #[arg(long, env = "ANALYSIS_ENDPOINT", value_hint = ValueHint::Url)]
    pub endpoint: Option<String>,

    /// Shared secret used to sign the report
    #[arg(long, env = "ANALYSIS_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Fail when the report cannot be delivered (or no endpoint is set)
    #[arg(long)]
    pub require_delivery: bool,

    /// Output format for the local summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Log every classification decision
    #[arg(short, long)]
    pub verbose: bool,

    /// Generate shell completions
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable report
    Text,
    /// Canonical JSON, identical to the delivered body
    Json,
}

/// Where the analyzed range starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseSpec {
    /// Merge-base with main/master, falling back to HEAD only
    DefaultBranch,
    /// A branch name or commit hash
    Ref(String),
}

impl BaseSpec {
    /// CI systems pass an empty value or the all-zero SHA when there is no
    /// previous revision (first push of a branch); both mean "no base".
    pub fn parse(base: Option<&str>) -> Self {
        match base.map(str::trim) {
            None | Some("") => BaseSpec::DefaultBranch,
            Some(s) if s.chars().all(|c| c == '0') => BaseSpec::DefaultBranch,
            Some(s) => BaseSpec::Ref(s.to_string()),
        }
    }
}

/// Generate shell completions to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    generate(shell, &mut cmd, "commit-analysis", &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default() {
        assert_eq!(BaseSpec::parse(None), BaseSpec::DefaultBranch);
        assert_eq!(BaseSpec::parse(Some("  ")), BaseSpec::DefaultBranch);
    }

    #[test]
    fn test_parse_zero_sha() {
        assert_eq!(
            BaseSpec::parse(Some("0000000000000000000000000000000000000000")),
            BaseSpec::DefaultBranch
        );
    }

    #[test]
    fn test_parse_ref() {
        assert_eq!(
            BaseSpec::parse(Some("abc123")),
            BaseSpec::Ref("abc123".to_string())
        );
        assert_eq!(
            BaseSpec::parse(Some("origin/main")),
            BaseSpec::Ref("origin/main".to_string())
        );
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "commit-analysis",
            "--base",
            "abc",
            "--threshold-secs",
            "200",
            "--format",
            "json",
            "--require-delivery",
        ])
        .unwrap();
        assert_eq!(args.base.as_deref(), Some("abc"));
        assert_eq!(args.threshold_secs, Some(200));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.require_delivery);
        assert_eq!(args.repo, PathBuf::from("."));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }
}
