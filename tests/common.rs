use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// Not every test binary uses every helper.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub config_path: PathBuf,
    pub definitions_path: PathBuf,
    pub bin_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub bin_path: PathBuf,
    pub github_api_url: Option<String>,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.json");
        let definitions_path = temp_dir.path().join("definitions.json");
        let bin_dir = temp_dir.path().join("bin");
        let cache_dir = temp_dir.path().join("cache");
        fs::create_dir_all(&bin_dir).expect("Failed to create bin dir");
        fs::write(&definitions_path, "{}").expect("Failed to write definitions");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_vk"));

        Self {
            _temp_dir: temp_dir,
            config_path,
            definitions_path,
            bin_dir,
            cache_dir,
            bin_path,
            github_api_url: None,
        }
    }

    pub fn with_github_api(mut self, url: String) -> Self {
        self.github_api_url = Some(url);
        self
    }

    pub fn write_definitions(&self, json: &str) {
        fs::write(&self.definitions_path, json).expect("Failed to write definitions");
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("VK_CONFIG_PATH", &self.config_path);
        cmd.env("VK_BINDIR", &self.bin_dir);
        cmd.env("VK_DEFINITIONS", &self.definitions_path);
        cmd.env("VK_CACHE_DIR", &self.cache_dir);
        cmd.env("HOME", self._temp_dir.path());
        cmd.env_remove("GITHUB_TOKEN");
        cmd.env_remove("RUST_LOG");
        if let Some(url) = &self.github_api_url {
            cmd.env("VK_GITHUB_API_URL", url);
        }
        cmd
    }

    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.cmd()
            .args(args)
            .output()
            .expect("Failed to run vk")
            .into()
    }

    pub fn tool_path(&self, name: &str) -> PathBuf {
        self.bin_dir.join(name)
    }
}

/// Write an executable shell script that prints `output`.
#[allow(dead_code)]
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, output: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\necho '{}'\n", output)).expect("Failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("Failed to chmod");
    path
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_code(&self, code: i32) -> &Self {
        assert_eq!(
            self.status.code(),
            Some(code),
            "unexpected exit code\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
