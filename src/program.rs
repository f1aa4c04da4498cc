use crate::error::{Result, VkError};
use crate::source::ReleaseSource;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where a program lives and how to ask it for its version.
#[derive(Debug, Clone)]
pub struct ProgramIdentity {
    cmd: String,
    path: PathBuf,
    version_args: Vec<String>,
    version_pattern: Regex,
}

impl ProgramIdentity {
    /// `version_arg` is split on whitespace; `version_regexp` must capture the
    /// version in group 1.
    pub fn new(cmd: &str, path: &Path, version_arg: &str, version_regexp: &str) -> Result<Self> {
        if cmd.is_empty() || cmd.contains(['/', '\\']) {
            return Err(VkError::Config(format!("invalid command name '{}'", cmd)));
        }

        let version_pattern = Regex::new(version_regexp).map_err(|e| {
            VkError::Config(format!("invalid version pattern for {}: {}", cmd, e))
        })?;

        Ok(Self {
            cmd: cmd.to_string(),
            path: path.to_path_buf(),
            version_args: version_arg.split_whitespace().map(String::from).collect(),
            version_pattern,
        })
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn full_path(&self) -> PathBuf {
        self.path.join(&self.cmd)
    }

    pub fn is_installed(&self) -> bool {
        self.full_path().exists()
    }

    /// Run the installed binary with its version arguments and extract the
    /// version from standard output.
    pub fn local_version(&self) -> Result<String> {
        let full_path = self.full_path();
        tracing::debug!("Probing {} {:?}", full_path.display(), self.version_args);

        let output = Command::new(&full_path)
            .args(&self.version_args)
            .output()
            .map_err(|e| self.probe_error(format!("could not run {}: {}", full_path.display(), e)))?;

        if !output.status.success() {
            return Err(self.probe_error(format!("version command exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.version_pattern
            .captures(&stdout)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                self.probe_error(format!(
                    "pattern '{}' did not match output {:?}",
                    self.version_pattern.as_str(),
                    stdout.trim()
                ))
            })
    }

    fn probe_error(&self, reason: String) -> VkError {
        VkError::Probe {
            program: self.cmd.clone(),
            reason,
        }
    }
}

/// A catalog entry: the program plus the release source it is installed from.
#[derive(Debug, Clone)]
pub struct Program {
    pub identity: ProgramIdentity,
    pub source: ReleaseSource,
}

impl Program {
    pub fn new(identity: ProgramIdentity, source: ReleaseSource) -> Self {
        Self { identity, source }
    }

    pub fn cmd(&self) -> &str {
        self.identity.cmd()
    }
}
