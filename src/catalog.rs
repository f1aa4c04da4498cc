//! Program catalog loaded from the published definitions document.
//!
//! The document groups programs by how they are released:
//!
//! ```json
//! {
//!   "github": { "directdownload": [], "untarfile": [], "unzipfile": [] },
//!   "hashicorp": []
//! }
//! ```

use crate::error::{Result, VkError};
use crate::program::{Program, ProgramIdentity};
use crate::source::{CheckpointProduct, GithubProject, ReleaseSource};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub type Catalog = BTreeMap<String, Program>;

#[derive(Debug, Default, Deserialize)]
struct Definitions {
    #[serde(default)]
    github: GithubGroups,
    #[serde(default)]
    hashicorp: Vec<CheckpointEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct GithubGroups {
    #[serde(default)]
    directdownload: Vec<GithubEntry>,
    #[serde(default)]
    untarfile: Vec<ArchiveEntry>,
    #[serde(default)]
    unzipfile: Vec<ArchiveEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommandEntry {
    cmd: String,
    #[serde(default)]
    version_arg: String,
    version_regexp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GithubEntry {
    #[serde(flatten)]
    command: CommandEntry,
    github_owner: String,
    github_repo: String,
    #[serde(default)]
    release_name: String,
    #[serde(default, rename = "DownloadURL")]
    download_url: Option<String>,
    #[serde(default)]
    pre_release: bool,
    #[serde(default)]
    tag_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArchiveEntry {
    #[serde(flatten)]
    github: GithubEntry,
    filename: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CheckpointEntry {
    #[serde(flatten)]
    command: CommandEntry,
    #[serde(default)]
    product: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl CommandEntry {
    fn identity(&self, bindir: &Path, default_version_arg: &str) -> Result<ProgramIdentity> {
        let version_arg = if self.version_arg.trim().is_empty() {
            default_version_arg
        } else {
            &self.version_arg
        };
        ProgramIdentity::new(&self.cmd, bindir, version_arg, &self.version_regexp)
    }
}

impl GithubEntry {
    fn project(self) -> (CommandEntry, GithubProject) {
        let project = GithubProject {
            owner: self.github_owner,
            repo: self.github_repo,
            asset_template: self.release_name,
            prerelease: self.pre_release,
            download_url: non_empty(self.download_url),
            tag_prefix: non_empty(self.tag_name),
        };
        (self.command, project)
    }
}

fn validate_project(cmd: &str, project: &GithubProject) -> Result<()> {
    if project.owner.is_empty() || project.repo.is_empty() {
        return Err(VkError::Config(format!("{}: GithubOwner and GithubRepo are required", cmd)));
    }
    if project.download_url.is_none() && project.asset_template.is_empty() {
        return Err(VkError::Config(format!(
            "{}: either ReleaseName or DownloadURL is required",
            cmd
        )));
    }
    Ok(())
}

fn insert(catalog: &mut Catalog, program: Program) {
    let cmd = program.cmd().to_string();
    if let Some(previous) = catalog.insert(cmd.clone(), program) {
        tracing::warn!(
            "{} is defined more than once, replacing its {} definition",
            cmd,
            previous.source.kind()
        );
    }
}

/// Parse the definitions document, installing every program into `bindir`.
pub fn parse_catalog(json: &str, bindir: &Path) -> Result<Catalog> {
    let definitions: Definitions = serde_json::from_str(json)
        .map_err(|e| VkError::Config(format!("could not parse definitions: {}", e)))?;

    let mut catalog = Catalog::new();

    for entry in definitions.github.directdownload {
        let (command, project) = entry.project();
        validate_project(&command.cmd, &project)?;
        let identity = command.identity(bindir, "")?;
        insert(&mut catalog, Program::new(identity, ReleaseSource::DirectAsset(project)));
    }

    for entry in definitions.github.untarfile {
        let (command, project) = entry.github.project();
        validate_project(&command.cmd, &project)?;
        let identity = command.identity(bindir, "")?;
        let source = ReleaseSource::TarArchive {
            github: project,
            entry: entry.filename,
        };
        insert(&mut catalog, Program::new(identity, source));
    }

    for entry in definitions.github.unzipfile {
        let (command, project) = entry.github.project();
        validate_project(&command.cmd, &project)?;
        let identity = command.identity(bindir, "")?;
        let source = ReleaseSource::ZipArchive {
            github: project,
            entry: entry.filename,
        };
        insert(&mut catalog, Program::new(identity, source));
    }

    for entry in definitions.hashicorp {
        let identity = entry.command.identity(bindir, "version")?;
        let product = non_empty(entry.product).unwrap_or_else(|| entry.command.cmd.clone());
        insert(
            &mut catalog,
            Program::new(identity, ReleaseSource::Checkpoint(CheckpointProduct { product })),
        );
    }

    tracing::debug!("Loaded {} program definitions", catalog.len());
    Ok(catalog)
}

/// Load the catalog from an http(s) URL or a local file.
pub async fn load_catalog(http: &reqwest::Client, source: &str, bindir: &Path) -> Result<Catalog> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        tracing::debug!("Fetching definitions from {}", source);
        let response = http.get(source).send().await?;
        if !response.status().is_success() {
            return Err(VkError::Network(format!(
                "could not download definitions from {}: HTTP {}",
                source,
                response.status()
            )));
        }
        response.text().await?
    } else {
        tracing::debug!("Reading definitions from {}", source);
        fs::read_to_string(source)
            .map_err(|e| VkError::Config(format!("could not read definitions {}: {}", source, e)))?
    };

    parse_catalog(&content, bindir)
}
