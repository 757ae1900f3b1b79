use std::path::PathBuf;

/// Failures raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("pull request {repo}#{number} already exists")]
    DuplicatePullRequest { repo: String, number: u32 },

    #[error("pull request {repo}#{number} not found")]
    PullRequestNotFound { repo: String, number: u32 },

    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures while loading or validating a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("reading seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON seed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML seed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported seed file format {0:?} (use .json, .yaml, or .yml)")]
    UnsupportedFormat(String),

    #[error("validation failed: {0}")]
    Invalid(String),
}
