pub mod config;

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

pub use config::{
    Config, ConfigStorage, GeneralConfig, GridConfig, ProtocolConfig, ResizeConfig,
    TomlConfigStorage,
};

/// Ensure XDG data and config directories exist
/// Returns (data_dir, config_dir)
///
/// XDG Base Directory Specification:
/// - Data: $XDG_DATA_HOME/pixgrid (default: ~/.local/share/pixgrid)
/// - Config: $XDG_CONFIG_HOME/pixgrid (default: ~/.config/pixgrid)
pub fn ensure_directories() -> Result<(PathBuf, PathBuf)> {
    let (data_dir, config_dir) = directories()?;

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

    log::debug!("Data directory: {:?}", data_dir);
    log::debug!("Config directory: {:?}", config_dir);

    Ok((data_dir, config_dir))
}

fn directories() -> Result<(PathBuf, PathBuf)> {
    let home = PathBuf::from(env::var("HOME").context("HOME environment variable not set")?);
    let xdg = |var: &str, fallback: &str| match env::var(var) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join("pixgrid"),
        _ => home.join(fallback),
    };

    Ok((
        xdg("XDG_DATA_HOME", ".local/share/pixgrid"),
        xdg("XDG_CONFIG_HOME", ".config/pixgrid"),
    ))
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    let (_, config_dir) = ensure_directories()?;
    Ok(config_dir.join("pixgrid.toml"))
}

/// Location of the rotated log file
pub fn default_log_path() -> Result<PathBuf> {
    let (data_dir, _) = ensure_directories()?;
    Ok(data_dir.join("pixgrid.log"))
}
