mod archive;
mod catalog;
mod cli;
mod config;
mod download;
mod error;
mod installer;
mod program;
mod source;
mod types;
mod version;

use anyhow::{anyhow, Result};
use catalog::{load_catalog, Catalog};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use error::VkError;
use installer::{InstallOutcome, Installer};
use program::Program;
use source::{ReleaseClient, RunOptions};
use std::fs;
use types::VkSettings;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<VkError>().map_or(1, VkError::exit_code)
        }
    };
    std::process::exit(code);
}

fn setup_logging(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();
}

fn effective_settings(cli: &Cli) -> Result<VkSettings> {
    let mut settings = config::load_settings()?;
    if let Some(bindir) = &cli.bindir {
        settings.bindir = bindir.clone();
    }
    if let Some(definitions) = &cli.definitions {
        settings.definitions = definitions.clone();
    }
    if let Some(token) = &cli.github_api_token {
        settings.github_token = Some(token.clone());
    }
    Ok(settings)
}

async fn run(cli: Cli) -> Result<i32> {
    let settings = effective_settings(&cli)?;

    let force = match &cli.command {
        Commands::Version { json } => return print_version(*json),
        Commands::Config { action } => return show_config(action, &settings),
        Commands::Install { force, .. } | Commands::Update { force, .. } => *force,
        _ => false,
    };

    let options = RunOptions {
        force,
        clear_cache: cli.clear_cache,
    };
    let client = ReleaseClient::new(&settings)?;
    let catalog = load_catalog(client.http(), &settings.definitions, &settings.bindir).await?;
    let installer = Installer::new(&client, options);

    match cli.command {
        Commands::Available { all } => available(&installer, &catalog, all).await,
        Commands::Debug { program } => debug(&installer, lookup(&catalog, &program)?).await,
        Commands::Install { program, .. } => install(&installer, lookup(&catalog, &program)?).await,
        Commands::Installed => Ok(installed(&catalog)),
        Commands::Uninstall { program } => uninstall(lookup(&catalog, &program)?),
        Commands::Update { program: Some(name), .. } => {
            update_one(&installer, lookup(&catalog, &name)?).await
        }
        Commands::Update { program: None, .. } => update_all(&installer, &catalog).await,
        Commands::Version { .. } | Commands::Config { .. } => Ok(0),
    }
}

fn lookup<'a>(catalog: &'a Catalog, name: &str) -> Result<&'a Program> {
    catalog
        .get(name)
        .ok_or_else(|| anyhow!("Unknown program: {}", name))
}

/// Print a per-program failure and hand back its exit code. Configuration
/// errors abort the whole run instead.
fn report_failure(program: &Program, err: VkError) -> Result<i32> {
    if err.is_fatal() {
        return Err(err.into());
    }
    eprintln!("{}: {}", program.cmd(), err);
    Ok(err.exit_code())
}

async fn available(installer: &Installer<'_>, catalog: &Catalog, all: bool) -> Result<i32> {
    let mut code = 0;
    for (name, program) in catalog {
        let is_installed = program.identity.is_installed();
        if is_installed && !all {
            continue;
        }

        let latest = match installer.resolve_latest(program).await {
            Ok(latest) => latest,
            Err(e) => {
                code = first_failure(code, report_failure(program, e)?);
                continue;
            }
        };

        if !is_installed {
            println!("{} version {}", name, latest.version);
            continue;
        }

        match program.identity.local_version() {
            Ok(local) if version::is_current(&local, &latest.version)? => {
                println!("{} version {} (installed)", name, latest.version)
            }
            Ok(local) => println!("{} version {} ({} installed)", name, latest.version, local),
            Err(e) => {
                println!("{} version {}", name, latest.version);
                code = first_failure(code, report_failure(program, e)?);
            }
        }
    }
    Ok(code)
}

async fn debug(installer: &Installer<'_>, program: &Program) -> Result<i32> {
    println!("Definition: {:#?}", program);
    println!("Full path: {}", program.identity.full_path().display());

    let is_installed = program.identity.is_installed();
    println!("Is installed: {}", is_installed);
    if is_installed {
        match program.identity.local_version() {
            Ok(local) => println!("Local version: {}", local),
            Err(e) => println!("Local version: <{}>", e),
        }
    }

    match installer.resolve_latest(program).await {
        Ok(latest) => {
            println!("Latest version: {}", latest.version);
            println!("Download URL: {}", latest.location);
            if let Some(entry) = &latest.entry {
                println!("Archive entry: {}", entry);
            }
            if is_installed {
                match installer.is_current(program, &latest) {
                    Ok(current) => println!("Up to date: {}", current),
                    Err(e) => return report_failure(program, e),
                }
            }
            Ok(0)
        }
        Err(e) => report_failure(program, e),
    }
}

async fn install(installer: &Installer<'_>, program: &Program) -> Result<i32> {
    if program.identity.is_installed() && !installer.options().force {
        println!("{} is already installed.", program.cmd());
        return Ok(0);
    }

    match installer.install(program).await {
        Ok(version) => {
            println!("{} version {} has been installed.", program.cmd(), version);
            Ok(0)
        }
        Err(e) => report_failure(program, e),
    }
}

fn installed(catalog: &Catalog) -> i32 {
    println!("The following programs are installed:");
    let mut code = 0;
    for program in catalog.values().filter(|p| p.identity.is_installed()) {
        match program.identity.local_version() {
            Ok(local) => println!("{}: {}", program.cmd(), local),
            Err(e) => {
                eprintln!("{}: {}", program.cmd(), e);
                code = first_failure(code, e.exit_code());
            }
        }
    }
    code
}

fn uninstall(program: &Program) -> Result<i32> {
    if !program.identity.is_installed() {
        println!("{} is not installed.", program.cmd());
        return Ok(0);
    }

    let path = program.identity.full_path();
    fs::remove_file(&path).map_err(|e| anyhow!("Could not remove {}: {}", path.display(), e))?;
    println!("{} has been uninstalled.", program.cmd());
    Ok(0)
}

async fn update_one(installer: &Installer<'_>, program: &Program) -> Result<i32> {
    if !program.identity.is_installed() {
        println!("{} is not installed.", program.cmd());
        return Ok(0);
    }

    match installer.evaluate(program).await? {
        InstallOutcome::Skipped { .. } => {
            println!("{} is already latest version.", program.cmd());
            Ok(0)
        }
        InstallOutcome::Installed { version } => {
            println!("Updated {} to version {}", program.cmd(), version);
            Ok(0)
        }
        InstallOutcome::Failed(e) => report_failure(program, e),
    }
}

async fn update_all(installer: &Installer<'_>, catalog: &Catalog) -> Result<i32> {
    let mut code = 0;
    let mut updated = 0;

    for program in catalog.values().filter(|p| p.identity.is_installed()) {
        match installer.evaluate(program).await? {
            InstallOutcome::Skipped { version } => {
                tracing::info!("{} {} is already latest version", program.cmd(), version)
            }
            InstallOutcome::Installed { version } => {
                println!("Updated {} to version {}", program.cmd(), version);
                updated += 1;
            }
            InstallOutcome::Failed(e) => code = first_failure(code, report_failure(program, e)?),
        }
    }

    tracing::info!("Update finished, {} program(s) updated", updated);
    Ok(code)
}

fn first_failure(current: i32, next: i32) -> i32 {
    if current == 0 {
        next
    } else {
        current
    }
}

fn print_version(json: bool) -> Result<i32> {
    if json {
        let info = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "commit": option_env!("VK_GIT_COMMIT").unwrap_or("unknown"),
            "branch": option_env!("VK_GIT_BRANCH").unwrap_or("unknown"),
            "tag": option_env!("VK_GIT_TAG"),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("vk {}", cli::get_version());
    }
    Ok(0)
}

fn show_config(action: &ConfigAction, settings: &VkSettings) -> Result<i32> {
    match action {
        ConfigAction::Show { format } => {
            let shown = settings.redacted();
            let output = match format.as_str() {
                "json" => serde_json::to_string_pretty(&shown)?,
                "yaml" => serde_yaml::to_string(&shown)?,
                other => return Err(anyhow!("Unsupported format '{}', use json or yaml", other)),
            };
            println!("{}", output);
        }
        ConfigAction::Path => {
            println!("{}", config::get_vk_config_file_path()?.display());
        }
    }
    Ok(0)
}
