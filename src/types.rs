use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_DEFINITIONS_URL: &str =
    "https://drzero42.github.io/vk-definitions/vk-definitions.json";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_CHECKPOINT_URL: &str = "https://checkpoint-api.hashicorp.com";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VkSettings {
    #[serde(default = "default_bindir")]
    pub bindir: PathBuf,
    #[serde(default = "default_definitions")]
    pub definitions: String,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default = "default_checkpoint_url")]
    pub checkpoint_url: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
}

fn default_bindir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("bin")
}
fn default_definitions() -> String {
    DEFAULT_DEFINITIONS_URL.to_string()
}
fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}
fn default_checkpoint_url() -> String {
    DEFAULT_CHECKPOINT_URL.to_string()
}
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vk")
}

impl Default for VkSettings {
    fn default() -> Self {
        Self {
            bindir: default_bindir(),
            definitions: default_definitions(),
            github_api_url: default_github_api_url(),
            checkpoint_url: default_checkpoint_url(),
            cache_dir: default_cache_dir(),
            github_token: None,
        }
    }
}

impl VkSettings {
    /// Copy safe to print: the token is masked.
    pub fn redacted(&self) -> Self {
        Self {
            github_token: self.github_token.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubRelease {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Body of a checkpoint `/v1/check/<product>` response. Only the fields used
/// for resolution are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointResponse {
    #[serde(default)]
    pub product: String,
    pub current_version: String,
    pub current_download_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointCacheEntry {
    pub checked_at: DateTime<Utc>,
    pub response: CheckpointResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}
