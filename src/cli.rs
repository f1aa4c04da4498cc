use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Release builds are tagged; use the tag as is
    if let Some(tag) = option_env!("VK_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("VK_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("VK_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "vk")]
#[command(about = "Install and update the latest releases of command-line tools")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory tools are installed into
    #[arg(long, global = true)]
    pub bindir: Option<PathBuf>,

    /// URL or path of the tool definitions document
    #[arg(long, global = true)]
    pub definitions: Option<String>,

    /// GitHub personal access token, avoids API rate limits
    #[arg(long, global = true)]
    pub github_api_token: Option<String>,

    /// Clear cached checkpoint responses before looking up versions
    #[arg(long, global = true)]
    pub clear_cache: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tools available for install
    Available {
        /// Include installed tools
        #[arg(long)]
        all: bool,
    },

    /// Show how a tool definition resolves
    Debug {
        /// Tool name (e.g., 'kubectl')
        program: String,
    },

    /// Install the latest version of a tool
    Install {
        /// Tool name (e.g., 'kubectl')
        program: String,
        /// Overwrite an installed version
        #[arg(long)]
        force: bool,
    },

    /// List installed tools and their versions
    Installed,

    /// Remove an installed tool
    Uninstall {
        /// Tool name (e.g., 'kubectl')
        program: String,
    },

    /// Update one or all installed tools to the latest version
    Update {
        /// Tool to update; all installed tools when omitted
        program: Option<String>,
        /// Reinstall even when already at the latest version
        #[arg(long)]
        force: bool,
    },

    /// Show the current version
    Version {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// Inspect vk's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Output format (json, yaml)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Print the path of the configuration file
    Path,
}
