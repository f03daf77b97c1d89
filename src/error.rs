use thiserror::Error;

/// Errors surfaced by the analysis pipeline.
///
/// Most failures inside the pipeline are recovered locally (a blame that
/// cannot be computed leaves lines unresolved, a malformed hunk header is
/// skipped). Only the variants below ever reach the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("git: {0}")]
    Git(#[from] git2::Error),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("delivery requested but no endpoint is configured")]
    MissingEndpoint,

    #[error("delivery requested but no shared secret is configured")]
    MissingSecret,

    #[error("invalid signing key")]
    InvalidKey,

    #[error("report delivery failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("report endpoint rejected delivery with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;
