//! Release sources
//!
//! A program is installed from exactly one [`ReleaseSource`]. The variant
//! decides both how the latest version is discovered and how the payload is
//! placed on disk:
//! - `DirectAsset`: a GitHub release asset that is the executable itself
//! - `TarArchive` / `ZipArchive`: a GitHub release asset containing it
//! - `Checkpoint`: a HashiCorp product announced by the checkpoint service

pub mod checkpoint;
pub mod github;

use crate::error::{Result, VkError};
use crate::program::Program;
use crate::types::VkSettings;
use std::path::PathBuf;

/// Placeholder substituted with the resolved version in name and URL templates.
pub const VERSION_PLACEHOLDER: &str = "{VERSION}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubProject {
    pub owner: String,
    pub repo: String,
    /// Asset name template, e.g. `kustomize_{VERSION}_linux_amd64`.
    pub asset_template: String,
    pub prerelease: bool,
    /// Used instead of looking up the asset when set.
    pub download_url: Option<String>,
    /// Tag prefix for repos releasing several programs, e.g. `kustomize`
    /// selects `kustomize/v3.3.0`.
    pub tag_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointProduct {
    pub product: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseSource {
    DirectAsset(GithubProject),
    TarArchive { github: GithubProject, entry: String },
    ZipArchive { github: GithubProject, entry: String },
    Checkpoint(CheckpointProduct),
}

impl ReleaseSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ReleaseSource::DirectAsset(_) => "github-direct",
            ReleaseSource::TarArchive { .. } => "github-tar",
            ReleaseSource::ZipArchive { .. } => "github-zip",
            ReleaseSource::Checkpoint(_) => "hashicorp-checkpoint",
        }
    }
}

/// Latest version of a program and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub version: String,
    pub location: String,
    /// Name of the executable inside the archive, for archive payloads.
    pub entry: Option<String>,
}

/// Flags for a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub force: bool,
    pub clear_cache: bool,
}

/// HTTP access to the release sources.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    github_api_url: String,
    checkpoint_url: String,
    github_token: Option<String>,
    cache_dir: PathBuf,
}

impl ReleaseClient {
    pub fn new(settings: &VkSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            github_api_url: settings.github_api_url.trim_end_matches('/').to_string(),
            checkpoint_url: settings.checkpoint_url.trim_end_matches('/').to_string(),
            github_token: settings.github_token.clone(),
            cache_dir: settings.cache_dir.clone(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Look up the latest release of `program`.
    pub async fn resolve(&self, program: &Program, options: &RunOptions) -> Result<ResolvedRelease> {
        tracing::debug!("Resolving {} via {}", program.cmd(), program.source.kind());
        match &program.source {
            ReleaseSource::DirectAsset(github) => self.resolve_github(github, None).await,
            ReleaseSource::TarArchive { github, entry }
            | ReleaseSource::ZipArchive { github, entry } => {
                self.resolve_github(github, Some(entry)).await
            }
            ReleaseSource::Checkpoint(product) => {
                self.resolve_checkpoint(program.cmd(), product, options).await
            }
        }
    }
}

pub fn expand_template(template: &str, version: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, version)
}

pub(crate) fn status_error(url: &str, status: reqwest::StatusCode) -> VkError {
    if status == reqwest::StatusCode::NOT_FOUND {
        VkError::NotFound(format!("{} returned 404", url))
    } else {
        VkError::Network(format!("{} returned HTTP {}", url, status))
    }
}
