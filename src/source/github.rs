//! GitHub release resolution.
//!
//! Releases are listed in the order the API returns them (newest first) and
//! the first one passing the prerelease/tag filters wins. There is no scan for
//! the highest version.

use super::{expand_template, status_error, GithubProject, ReleaseClient, ResolvedRelease};
use crate::error::{Result, VkError};
use crate::types::{GitHubAsset, GitHubRelease};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

pub fn build_releases_url(api: &str, owner: &str, repo: &str) -> String {
    format!("{}/repos/{}/{}/releases", api, owner, repo)
}

pub fn build_assets_url(api: &str, owner: &str, repo: &str, release_id: u64) -> String {
    format!("{}/repos/{}/{}/releases/{}/assets", api, owner, repo, release_id)
}

/// First release whose prerelease flag equals `prerelease` and, when a prefix
/// is given, whose tag starts with it.
pub fn select_release<'a>(
    releases: &'a [GitHubRelease],
    prerelease: bool,
    tag_prefix: Option<&str>,
) -> Option<&'a GitHubRelease> {
    releases.iter().find(|release| {
        release.prerelease == prerelease
            && tag_prefix.map_or(true, |prefix| release.tag_name.starts_with(prefix))
    })
}

/// Version string from a tag: `prefix/` is stripped when a tag prefix is
/// configured, otherwise a leading `v`.
pub fn release_version(tag: &str, tag_prefix: Option<&str>) -> String {
    match tag_prefix {
        Some(prefix) => {
            let with_separator = format!("{}/", prefix);
            tag.strip_prefix(&with_separator).unwrap_or(tag).to_string()
        }
        None => tag.strip_prefix('v').unwrap_or(tag).to_string(),
    }
}

/// GitHub signals exhaustion with 429, or 403 plus a zero remaining quota.
pub fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}

impl ReleaseClient {
    pub(super) async fn resolve_github(
        &self,
        project: &GithubProject,
        entry_template: Option<&str>,
    ) -> Result<ResolvedRelease> {
        let releases_url = build_releases_url(&self.github_api_url, &project.owner, &project.repo);
        let releases: Vec<GitHubRelease> = self.get_github_json(&releases_url, project).await?;

        let tag_prefix = project.tag_prefix.as_deref();
        let release = select_release(&releases, project.prerelease, tag_prefix).ok_or_else(|| {
            VkError::NotFound(format!(
                "no {}release{} found for {}/{}",
                if project.prerelease { "pre" } else { "" },
                tag_prefix
                    .map(|p| format!(" tagged '{}'", p))
                    .unwrap_or_default(),
                project.owner,
                project.repo
            ))
        })?;

        let version = release_version(&release.tag_name, tag_prefix);
        tracing::debug!(
            "Selected release {} ({}) of {}/{}",
            release.tag_name,
            version,
            project.owner,
            project.repo
        );

        let entry = entry_template.map(|t| expand_template(t, &version));

        let location = match &project.download_url {
            Some(template) => expand_template(template, &version),
            None => {
                let asset_name = expand_template(&project.asset_template, &version);
                let assets_url = build_assets_url(
                    &self.github_api_url,
                    &project.owner,
                    &project.repo,
                    release.id,
                );
                let assets: Vec<GitHubAsset> = self.get_github_json(&assets_url, project).await?;
                assets
                    .into_iter()
                    .find(|a| a.name == asset_name)
                    .map(|a| a.browser_download_url)
                    .ok_or_else(|| {
                        VkError::NotFound(format!(
                            "asset '{}' not found in release {} of {}/{}",
                            asset_name, release.tag_name, project.owner, project.repo
                        ))
                    })?
            }
        };

        Ok(ResolvedRelease {
            version,
            location,
            entry,
        })
    }

    async fn get_github_json<T: DeserializeOwned>(
        &self,
        url: &str,
        project: &GithubProject,
    ) -> Result<T> {
        tracing::debug!("Fetching {}", url);

        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");

        if let Some(token) = &self.github_token {
            request = request.header("Authorization", format!("token {}", token));
            tracing::debug!("Using GitHub API token");
        }

        let response = request.send().await?;
        let status = response.status();

        if is_rate_limited(status, response.headers()) {
            return Err(VkError::RateLimited {
                owner: project.owner.clone(),
                repo: project.repo.clone(),
            });
        }
        if !status.is_success() {
            return Err(status_error(url, status));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Program, ProgramIdentity};
    use crate::source::{ReleaseSource, RunOptions};
    use crate::types::VkSettings;
    use mockito::Server;
    use std::path::Path;

    fn release(id: u64, tag: &str, prerelease: bool) -> GitHubRelease {
        GitHubRelease {
            id,
            tag_name: tag.to_string(),
            prerelease,
        }
    }

    fn project(asset_template: &str) -> GithubProject {
        GithubProject {
            owner: "acme".to_string(),
            repo: "tool".to_string(),
            asset_template: asset_template.to_string(),
            prerelease: false,
            download_url: None,
            tag_prefix: None,
        }
    }

    fn program(source: ReleaseSource) -> Program {
        let identity =
            ProgramIdentity::new("tool", Path::new("/nonexistent"), "--version", r"(\S+)").unwrap();
        Program::new(identity, source)
    }

    fn client(server: &Server) -> ReleaseClient {
        ReleaseClient::new(&VkSettings {
            github_api_url: server.url(),
            ..VkSettings::default()
        })
        .unwrap()
    }

    const RELEASES: &str = r#"[
        {"id": 30, "tag_name": "v2.1.0-rc.1", "prerelease": true},
        {"id": 20, "tag_name": "v2.0.0", "prerelease": false},
        {"id": 10, "tag_name": "v1.9.0", "prerelease": false}
    ]"#;

    #[test]
    fn test_build_urls() {
        assert_eq!(
            build_releases_url("https://api.github.com", "owner", "repo"),
            "https://api.github.com/repos/owner/repo/releases"
        );
        assert_eq!(
            build_assets_url("https://api.github.com", "owner", "repo", 42),
            "https://api.github.com/repos/owner/repo/releases/42/assets"
        );
    }

    #[test]
    fn test_select_release_is_first_match_not_max() {
        // Provider order is kept even when an older version comes first.
        let releases = vec![
            release(1, "v1.0.0", false),
            release(2, "v3.0.0", false),
            release(3, "v4.0.0-beta", true),
        ];
        assert_eq!(select_release(&releases, false, None).unwrap().id, 1);
        assert_eq!(select_release(&releases, true, None).unwrap().id, 3);
    }

    #[test]
    fn test_select_release_newest_first_gives_newest() {
        let releases = vec![
            release(3, "v1.2.0", false),
            release(2, "v1.1.0", false),
            release(1, "v1.0.0", false),
        ];
        assert_eq!(select_release(&releases, false, None).unwrap().tag_name, "v1.2.0");
    }

    #[test]
    fn test_select_release_with_tag_prefix() {
        let releases = vec![
            release(4, "api/v0.9.0", false),
            release(3, "kustomize/v3.3.0", true),
            release(2, "kustomize/v3.2.0", false),
            release(1, "v1.0.0", false),
        ];
        let chosen = select_release(&releases, false, Some("kustomize")).unwrap();
        assert_eq!(chosen.id, 2);
        assert!(select_release(&releases, true, Some("api")).is_none());
    }

    #[test]
    fn test_release_version() {
        assert_eq!(release_version("v1.2.3", None), "1.2.3");
        assert_eq!(release_version("1.2.3", None), "1.2.3");
        assert_eq!(release_version("kustomize/v3.3.0", Some("kustomize")), "v3.3.0");
        assert_eq!(release_version("other-1.0", Some("kustomize")), "other-1.0");
    }

    #[test]
    fn test_is_rate_limited() {
        let mut headers = HeaderMap::new();
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &headers));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &headers));
        headers.insert("x-ratelimit-remaining", "0".parse().unwrap());
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &headers));
        assert!(!is_rate_limited(StatusCode::OK, &headers));
    }

    #[tokio::test]
    async fn test_resolve_direct_asset_by_listing() {
        let mut server = Server::new_async().await;
        let releases = server
            .mock("GET", "/repos/acme/tool/releases")
            .with_header("content-type", "application/json")
            .with_body(RELEASES)
            .create_async()
            .await;
        let assets = server
            .mock("GET", "/repos/acme/tool/releases/20/assets")
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"name": "tool_2.0.0_darwin_amd64", "browser_download_url": "https://dl/darwin"},
                    {"name": "tool_2.0.0_linux_amd64", "browser_download_url": "https://dl/linux"}
                ]"#,
            )
            .create_async()
            .await;

        let program = program(ReleaseSource::DirectAsset(project("tool_{VERSION}_linux_amd64")));
        let resolved = client(&server)
            .resolve(&program, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved.version, "2.0.0");
        assert_eq!(resolved.location, "https://dl/linux");
        assert_eq!(resolved.entry, None);
        releases.assert_async().await;
        assets.assert_async().await;
    }

    #[tokio::test]
    async fn test_fixed_download_url_skips_asset_listing() {
        let mut server = Server::new_async().await;
        let releases = server
            .mock("GET", "/repos/acme/tool/releases")
            .with_header("content-type", "application/json")
            .with_body(RELEASES)
            .create_async()
            .await;
        let assets = server
            .mock("GET", mockito::Matcher::Regex(r"/assets$".to_string()))
            .expect(0)
            .create_async()
            .await;

        let mut github = project("unused");
        github.download_url = Some("https://dl/{VERSION}/tool-{VERSION}.tar.gz".to_string());
        let program = program(ReleaseSource::TarArchive {
            github,
            entry: "tool-{VERSION}/tool".to_string(),
        });

        let resolved = client(&server)
            .resolve(&program, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved.location, "https://dl/2.0.0/tool-2.0.0.tar.gz");
        assert_eq!(resolved.entry.as_deref(), Some("tool-2.0.0/tool"));
        releases.assert_async().await;
        assets.assert_async().await;
    }

    #[tokio::test]
    async fn test_fixed_download_url_direct_asset_only_looks_up_version() {
        let mut server = Server::new_async().await;
        let releases = server
            .mock("GET", "/repos/acme/tool/releases")
            .with_header("content-type", "application/json")
            .with_body(RELEASES)
            .expect(1)
            .create_async()
            .await;
        let assets = server
            .mock("GET", mockito::Matcher::Regex(r"/assets$".to_string()))
            .expect(0)
            .create_async()
            .await;

        let mut github = project("unused");
        github.download_url = Some("https://dl/{VERSION}/tool".to_string());
        let program = program(ReleaseSource::DirectAsset(github));

        let resolved = client(&server)
            .resolve(&program, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(resolved.version, "2.0.0");
        assert_eq!(resolved.location, "https://dl/2.0.0/tool");
        assert_eq!(resolved.entry, None);
        releases.assert_async().await;
        assets.assert_async().await;
    }

    #[tokio::test]
    async fn test_prerelease_selection() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/acme/tool/releases")
            .with_body(RELEASES)
            .create_async()
            .await;

        let mut github = project("tool");
        github.prerelease = true;
        github.download_url = Some("https://dl/{VERSION}".to_string());
        let program = program(ReleaseSource::DirectAsset(github));

        let resolved = client(&server)
            .resolve(&program, &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(resolved.version, "2.1.0-rc.1");
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/acme/tool/releases")
            .with_body(RELEASES)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/acme/tool/releases/20/assets")
            .with_body(r#"[{"name": "tool_2.0.0_linux_arm64", "browser_download_url": "x"}]"#)
            .create_async()
            .await;

        let program = program(ReleaseSource::DirectAsset(project("tool_{VERSION}_linux_amd64")));
        let err = client(&server)
            .resolve(&program, &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VkError::NotFound(_)));
        assert_eq!(err.exit_code(), 200);
    }

    #[tokio::test]
    async fn test_no_matching_release_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/acme/tool/releases")
            .with_body("[]")
            .create_async()
            .await;

        let program = program(ReleaseSource::DirectAsset(project("tool")));
        let err = client(&server)
            .resolve(&program, &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VkError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("GET", "/repos/acme/tool/releases")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .expect(1)
            .create_async()
            .await;

        let program = program(ReleaseSource::DirectAsset(project("tool")));
        let err = client(&server)
            .resolve(&program, &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VkError::RateLimited { .. }));
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_is_sent() {
        let mut server = Server::new_async().await;
        let releases = server
            .mock("GET", "/repos/acme/tool/releases")
            .match_header("authorization", "token s3cret")
            .with_body(RELEASES)
            .create_async()
            .await;

        let client = ReleaseClient::new(&VkSettings {
            github_api_url: server.url(),
            github_token: Some("s3cret".to_string()),
            ..VkSettings::default()
        })
        .unwrap();

        let mut github = project("tool");
        github.download_url = Some("https://dl/{VERSION}".to_string());
        client
            .resolve(&program(ReleaseSource::DirectAsset(github)), &RunOptions::default())
            .await
            .unwrap();
        releases.assert_async().await;
    }
}
