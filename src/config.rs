use crate::types::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub const CONFIG_DIR_NAME: &str = ".vk";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub fn get_user_config_dir() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(CONFIG_DIR_NAME);
    Ok(path)
}

pub fn get_vk_config_file_path() -> Result<PathBuf> {
    let path = match std::env::var_os("VK_CONFIG_PATH") {
        Some(path) => PathBuf::from(path),
        None => get_user_config_dir()?.join(CONFIG_FILE_NAME),
    };
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

/// Load settings from the config file (if any) and apply environment overrides.
pub fn load_settings() -> Result<VkSettings> {
    let config_path = get_vk_config_file_path()?;

    let mut settings = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Could not read config file at {}", config_path.display()))?;
        serde_json::from_str(&content).with_context(|| "Could not parse config file as JSON")?
    } else {
        VkSettings::default()
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn apply_env_overrides(settings: &mut VkSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bindir) = lookup("VK_BINDIR") {
        settings.bindir = PathBuf::from(bindir);
    }

    if let Some(definitions) = lookup("VK_DEFINITIONS") {
        settings.definitions = definitions;
    }

    if let Some(cache_dir) = lookup("VK_CACHE_DIR") {
        settings.cache_dir = PathBuf::from(cache_dir);
    }

    if let Some(url) = lookup("VK_GITHUB_API_URL") {
        settings.github_api_url = url;
    }

    if let Some(url) = lookup("VK_CHECKPOINT_URL") {
        settings.checkpoint_url = url;
    }

    if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
        settings.github_token = Some(token);
    }
}
