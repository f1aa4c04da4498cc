use crate::error::{Result, VkError};
use semver::{BuildMetadata, Version};

/// Parse a version string as semver, tolerating a single leading `v`.
pub fn parse_version(version: &str) -> Result<Version> {
    let clean = version.trim();
    let clean = clean.strip_prefix('v').unwrap_or(clean);
    Version::parse(clean)
        .map_err(|e| VkError::Config(format!("'{}' is not a semantic version: {}", version, e)))
}

/// True unless `local` is strictly older than `latest`. Build metadata does
/// not take part in the ordering.
pub fn is_current(local: &str, latest: &str) -> Result<bool> {
    let mut local_version = parse_version(local)?;
    let mut latest_version = parse_version(latest)?;
    local_version.build = BuildMetadata::EMPTY;
    latest_version.build = BuildMetadata::EMPTY;
    tracing::debug!("Comparing local {} with latest {}", local_version, latest_version);
    Ok(local_version >= latest_version)
}
