//! Install, update and replace programs.
//!
//! Replacing an installed binary follows one procedure for every payload type:
//!
//! 1. rename `<path>` to `<path>.bak` (skipped on first install)
//! 2. fetch/extract the new payload straight to `<path>`
//! 3. on failure, put `<path>.bak` back (or drop a partial first install)
//! 4. chmod 0755
//! 5. remove `<path>.bak`
//!
//! A failed update therefore leaves the previous binary in place with its
//! original content and permissions.

use crate::archive::{extract_from_tar, extract_from_zip, ArchiveKind};
use crate::download::{download_bytes, download_file};
use crate::error::{FetchError, Result, VkError};
use crate::program::Program;
use crate::source::{ReleaseClient, ReleaseSource, ResolvedRelease, RunOptions};
use crate::version;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Result of evaluating a single program.
#[derive(Debug)]
pub enum InstallOutcome {
    /// Installed version is already the latest (or newer).
    Skipped { version: String },
    Installed { version: String },
    Failed(VkError),
}

pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

fn set_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

pub struct Installer<'a> {
    client: &'a ReleaseClient,
    options: RunOptions,
}

impl<'a> Installer<'a> {
    pub fn new(client: &'a ReleaseClient, options: RunOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub async fn resolve_latest(&self, program: &Program) -> Result<ResolvedRelease> {
        self.client.resolve(program, &self.options).await
    }

    /// False when not installed; otherwise whether the local version is not
    /// older than `latest`, as returned by [`Installer::resolve_latest`].
    pub fn is_current(&self, program: &Program, latest: &ResolvedRelease) -> Result<bool> {
        if !program.identity.is_installed() {
            return Ok(false);
        }
        let local = program.identity.local_version()?;
        version::is_current(&local, &latest.version)
    }

    /// Install or update `program` if it is missing, stale, or `force` is
    /// set. Per-program failures come back as [`InstallOutcome::Failed`];
    /// only configuration errors are returned as `Err`.
    pub async fn evaluate(&self, program: &Program) -> Result<InstallOutcome> {
        match self.try_evaluate(program).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::debug!("{} failed: {}", program.cmd(), e);
                Ok(InstallOutcome::Failed(e))
            }
        }
    }

    async fn try_evaluate(&self, program: &Program) -> Result<InstallOutcome> {
        let local = if program.identity.is_installed() && !self.options.force {
            Some(program.identity.local_version()?)
        } else {
            None
        };

        let release = self.resolve_latest(program).await?;

        if let Some(local) = local {
            if version::is_current(&local, &release.version)? {
                tracing::info!("{} {} is already the latest version", program.cmd(), local);
                return Ok(InstallOutcome::Skipped { version: local });
            }
            tracing::info!(
                "Updating {} from {} to {}",
                program.cmd(),
                local,
                release.version
            );
        }

        self.place(program, &release).await?;
        Ok(InstallOutcome::Installed {
            version: release.version,
        })
    }

    /// Resolve the latest release and install it unconditionally.
    pub async fn install(&self, program: &Program) -> Result<String> {
        let release = self.resolve_latest(program).await?;
        self.place(program, &release).await?;
        Ok(release.version)
    }

    /// Atomically replace the program's binary with the payload of `release`.
    pub async fn place(&self, program: &Program, release: &ResolvedRelease) -> Result<()> {
        self.place_with(program, release, set_executable).await
    }

    /// [`Installer::place`] with the permission step supplied by the caller.
    pub(crate) async fn place_with(
        &self,
        program: &Program,
        release: &ResolvedRelease,
        set_mode: impl Fn(&Path) -> io::Result<()>,
    ) -> Result<()> {
        let target = program.identity.full_path();
        let backup = backup_path(&target);
        let install_error = |source: FetchError| VkError::Install {
            program: program.cmd().to_string(),
            source,
        };

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| install_error(e.into()))?;
        }

        // A dangling symlink is moved aside too, so the payload is never
        // written through it.
        let backed_up = if fs::symlink_metadata(&target).is_ok() {
            tracing::debug!("Backing up {} to {}", target.display(), backup.display());
            fs::rename(&target, &backup).map_err(|e| install_error(e.into()))?;
            true
        } else {
            false
        };

        tracing::info!(
            "Installing {} {} from {}",
            program.cmd(),
            release.version,
            release.location
        );

        if let Err(source) = self.fetch(program, release, &target).await {
            restore(&target, &backup, backed_up);
            return Err(install_error(source));
        }

        if let Err(source) = set_mode(&target) {
            restore(&target, &backup, backed_up);
            return Err(VkError::Permission {
                path: target,
                source,
            });
        }

        if backed_up {
            if let Err(e) = fs::remove_file(&backup) {
                tracing::warn!("Could not remove backup {}: {}", backup.display(), e);
            }
        }

        tracing::info!("Installed {} {} to {}", program.cmd(), release.version, target.display());
        Ok(())
    }

    async fn fetch(
        &self,
        program: &Program,
        release: &ResolvedRelease,
        target: &Path,
    ) -> Result<(), FetchError> {
        let http = self.client.http();
        let entry = release.entry.as_deref().unwrap_or(program.cmd());

        match &program.source {
            ReleaseSource::DirectAsset(_) => download_file(http, &release.location, target).await,
            ReleaseSource::TarArchive { .. } => {
                let kind = ArchiveKind::from_url(&release.location)
                    .filter(|k| k.is_tar())
                    .ok_or_else(|| FetchError::UnsupportedArchive(release.location.clone()))?;

                let temp_dir = TempDir::new()?;
                let archive_path = temp_dir.path().join(format!("{}.archive", program.cmd()));
                download_file(http, &release.location, &archive_path).await?;

                tracing::info!("Extracting {}...", entry);
                extract_from_tar(fs::File::open(&archive_path)?, kind, entry, target)
            }
            ReleaseSource::ZipArchive { .. } | ReleaseSource::Checkpoint(_) => {
                let bytes = download_bytes(http, &release.location).await?;
                tracing::info!("Extracting {}...", entry);
                extract_from_zip(&bytes, entry, target)
            }
        }
    }
}

/// Put the previous binary back after a failed install. Failures are logged
/// so they never mask the error that triggered the restore.
fn restore(target: &Path, backup: &Path, backed_up: bool) {
    if backed_up {
        tracing::warn!("Restoring {} from {}", target.display(), backup.display());
        if let Err(e) = fs::rename(backup, target) {
            tracing::error!(
                "Could not restore {} from {}: {}",
                target.display(),
                backup.display(),
                e
            );
        }
    } else {
        match fs::remove_file(target) {
            Ok(()) => tracing::debug!("Removed partial download {}", target.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Could not remove {}: {}", target.display(), e),
        }
    }
}
