//! HashiCorp checkpoint resolution.
//!
//! The checkpoint service announces the current version and a download base
//! for a product. Responses are cached per product for [`CACHE_PERIOD_HOURS`].

use super::{status_error, CheckpointProduct, ReleaseClient, ResolvedRelease, RunOptions};
use crate::error::Result;
use crate::types::{CheckpointCacheEntry, CheckpointResponse, PlatformInfo};
use chrono::{Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub const CACHE_PERIOD_HOURS: i64 = 48;

/// OS and architecture of the build target, in HashiCorp's release naming.
pub fn target_platform() -> PlatformInfo {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };

    PlatformInfo {
        os: std::env::consts::OS.to_string(),
        arch: arch.to_string(),
    }
}

/// `<base>/<cmd>_<version>_<os>_<arch>.zip`
pub fn build_download_url(base: &str, cmd: &str, version: &str, platform: &PlatformInfo) -> String {
    format!(
        "{}/{}_{}_{}_{}.zip",
        base.trim_end_matches('/'),
        cmd,
        version,
        platform.os,
        platform.arch
    )
}

pub fn cache_file_path(cache_dir: &Path, product: &str) -> PathBuf {
    cache_dir.join(format!("checkpoint-{}.json", product))
}

fn read_cache(path: &Path) -> Option<CheckpointResponse> {
    let content = fs::read_to_string(path).ok()?;
    let entry: CheckpointCacheEntry = match serde_json::from_str(&content) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::debug!("Ignoring unreadable checkpoint cache {}: {}", path.display(), e);
            return None;
        }
    };

    if Utc::now() - entry.checked_at > Duration::hours(CACHE_PERIOD_HOURS) {
        tracing::debug!("Checkpoint cache {} is stale", path.display());
        return None;
    }
    Some(entry.response)
}

fn write_cache(path: &Path, response: &CheckpointResponse) {
    let entry = CheckpointCacheEntry {
        checked_at: Utc::now(),
        response: response.clone(),
    };

    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| {
            let content = serde_json::to_string_pretty(&entry).map_err(std::io::Error::from)?;
            fs::write(path, content)
        });

    if let Err(e) = result {
        tracing::warn!("Could not write checkpoint cache {}: {}", path.display(), e);
    }
}

impl ReleaseClient {
    pub(super) async fn resolve_checkpoint(
        &self,
        cmd: &str,
        product: &CheckpointProduct,
        options: &RunOptions,
    ) -> Result<ResolvedRelease> {
        let cache_path = cache_file_path(&self.cache_dir, &product.product);

        if options.clear_cache {
            match fs::remove_file(&cache_path) {
                Ok(()) => tracing::info!("Cleared checkpoint cache {}", cache_path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not clear {}: {}", cache_path.display(), e),
            }
        }

        let response = match read_cache(&cache_path) {
            Some(response) => {
                tracing::debug!("Using cached checkpoint for {}", product.product);
                response
            }
            None => {
                let response = self.fetch_checkpoint(&product.product).await?;
                write_cache(&cache_path, &response);
                response
            }
        };

        let location = build_download_url(
            &response.current_download_url,
            cmd,
            &response.current_version,
            &target_platform(),
        );

        Ok(ResolvedRelease {
            version: response.current_version,
            location,
            entry: Some(cmd.to_string()),
        })
    }

    async fn fetch_checkpoint(&self, product: &str) -> Result<CheckpointResponse> {
        let url = format!("{}/v1/check/{}", self.checkpoint_url, product);
        tracing::debug!("Fetching {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(&url, response.status()));
        }
        Ok(response.json().await?)
    }
}
