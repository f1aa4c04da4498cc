//! Error taxonomy for resolving and installing programs.
//!
//! Everything except [`VkError::Config`] is scoped to a single program: the
//! installer captures those into an `InstallOutcome::Failed` so a batch keeps
//! going. `Config` means the catalog or environment is broken and ends the run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = VkError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum VkError {
    #[error("could not determine local version of {program}: {reason}")]
    Probe { program: String, reason: String },

    #[error("GitHub rate limit hit for {owner}/{repo}, please add a personal API token")]
    RateLimited { owner: String, repo: String },

    #[error("{0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("could not install {program}: {source}")]
    Install {
        program: String,
        #[source]
        source: FetchError,
    },

    #[error("could not make {} executable: {source}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure while placing a payload at the install target.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download of {url} failed with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("entry '{entry}' not found in archive")]
    EntryNotFound { entry: String },

    #[error("unsupported archive type: {0}")]
    UnsupportedArchive(String),

    #[error("bad zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Whether the payload could not be fetched at all, as opposed to being
    /// fetched but not unpacked.
    pub fn is_download(&self) -> bool {
        matches!(self, FetchError::Http(_) | FetchError::Status { .. })
    }
}

impl VkError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            VkError::Network(_) => 10,
            VkError::RateLimited { .. } => 11,
            VkError::Config(_) => 20,
            VkError::Probe { .. } => 60,
            VkError::Install { source, .. } if source.is_download() => 70,
            VkError::Install { .. } => 90,
            VkError::Permission { .. } => 80,
            VkError::NotFound(_) => 200,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, VkError::Config(_))
    }
}

impl From<reqwest::Error> for VkError {
    fn from(err: reqwest::Error) -> Self {
        VkError::Network(err.to_string())
    }
}
