use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::grid::TextOverflow;
use crate::image::Resample;
use crate::models::{Align, Size};
use crate::protocol::Medium;
use crate::protocol::codec::{MAX_ID, MIN_ID};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub resize: ResizeConfig,
    #[serde(default)]
    pub grid: GridConfig,
}

impl Config {
    /// Check values serde cannot
    pub fn validate(&self) -> Result<()> {
        self.protocol.validate()
    }
}

/// Error policy and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Abort on the first image that cannot be loaded or resized
    #[serde(default)]
    pub raise_errors: bool,

    /// Print skipped images' errors on stderr
    #[serde(default = "default_true")]
    pub print_errors: bool,

    /// Write logs to a rotated file instead of stderr
    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            raise_errors: false,
            print_errors: true,
            log_to_file: false,
            log_level: default_log_level(),
        }
    }
}

/// Graphics protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// How long to wait for the terminal to answer a command
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_min_id")]
    pub min_id: u32,

    #[serde(default = "default_max_id")]
    pub max_id: u32,

    #[serde(default)]
    pub medium: Medium,

    #[serde(default = "default_z_index")]
    pub z_index: i32,

    /// Cell size assumed when the terminal doesn't report pixels
    #[serde(default = "default_cell_width")]
    pub fallback_cell_width: u32,

    #[serde(default = "default_cell_height")]
    pub fallback_cell_height: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            timeout_ms: default_timeout_ms(),
            min_id: default_min_id(),
            max_id: default_max_id(),
            medium: Medium::default(),
            z_index: default_z_index(),
            fallback_cell_width: default_cell_width(),
            fallback_cell_height: default_cell_height(),
        }
    }
}

impl ProtocolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_id == 0 || self.min_id > self.max_id {
            anyhow::bail!(
                "invalid id range {}..={}: need 1 <= min_id <= max_id",
                self.min_id,
                self.max_id
            );
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("timeout_ms must be greater than 0");
        }
        Ok(())
    }
}

/// Defaults for the resize subcommands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResizeConfig {
    #[serde(default)]
    pub resample: Resample,

    /// Ignore the aspect ratio and fill the bounds exactly
    #[serde(default)]
    pub stretch: bool,
}

/// Defaults for the grid subcommand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_cell_size")]
    pub column_width: Size,

    #[serde(default = "default_cell_size")]
    pub row_height: Size,

    #[serde(default)]
    pub align: Align,

    #[serde(default)]
    pub text_overflow: TextOverflow,

    #[serde(default = "default_cut_placeholder")]
    pub cut_placeholder: String,

    #[serde(default)]
    pub wrap_around: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            column_width: default_cell_size(),
            row_height: default_cell_size(),
            align: Align::default(),
            text_overflow: TextOverflow::default(),
            cut_placeholder: default_cut_placeholder(),
            wrap_around: false,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_min_id() -> u32 {
    MIN_ID
}

fn default_max_id() -> u32 {
    MAX_ID
}

fn default_z_index() -> i32 {
    -1
}

fn default_cell_width() -> u32 {
    8
}

fn default_cell_height() -> u32 {
    16
}

fn default_cell_size() -> Size {
    Size::Px(256)
}

fn default_cut_placeholder() -> String {
    " …".to_string()
}

/// Trait for configuration storage
pub trait ConfigStorage: Send + Sync {
    /// Load configuration from file
    fn load(&self) -> Result<Config>;

    /// Save configuration to file
    fn save(&self, config: &Config) -> Result<()>;

    /// Get the config file path
    fn path(&self) -> &PathBuf;

    /// Create default configuration file if it doesn't exist
    fn create_default(&self) -> Result<()>;
}

/// TOML-based implementation of ConfigStorage
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigStorage { path }
    }
}

impl ConfigStorage for TomlConfigStorage {
    fn load(&self) -> Result<Config> {
        use anyhow::Context;
        use std::fs;

        if !self.path.exists() {
            log::info!(
                "Config file not found at {:?}, creating default configuration",
                self.path
            );
            self.create_default()?;
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", self.path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {:?}", self.path))?;

        log::info!("Loaded configuration from {:?}", self.path);
        log::debug!(
            "Config: medium={:?}, timeout={}ms, ids {}..={}",
            config.protocol.medium,
            config.protocol.timeout_ms,
            config.protocol.min_id,
            config.protocol.max_id
        );

        Ok(config)
    }

    fn save(&self, config: &Config) -> Result<()> {
        use anyhow::Context;
        use std::fs;

        let toml_str =
            toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        fs::write(&self.path, toml_str)
            .with_context(|| format!("Failed to write config to {:?}", self.path))?;

        log::debug!("Saved configuration to {:?}", self.path);

        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn create_default(&self) -> Result<()> {
        use anyhow::Context;
        use std::fs;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Use the example config compiled into the binary
        let example_config = include_str!("../../pixgrid.toml.example");

        fs::write(&self.path, example_config)
            .with_context(|| format!("Failed to create default config at {:?}", self.path))?;

        log::info!("Created default configuration at {:?}", self.path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(!config.general.raise_errors);
        assert!(config.general.print_errors);
        assert_eq!(config.protocol.timeout(), Duration::from_secs(3));
        assert_eq!(config.protocol.min_id, 1);
        assert_eq!(config.protocol.max_id, u32::MAX);
        assert_eq!(config.protocol.medium, Medium::TempFile);
        assert_eq!(config.protocol.z_index, -1);
        assert_eq!(config.resize.resample, Resample::Lanczos);
        assert_eq!(config.grid.column_width, Size::Px(256));
        assert_eq!(config.grid.cut_placeholder, " …");
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
        [protocol]
        medium = "direct"
        timeout_ms = 500

        [grid]
        column_width = "20t"
        row_height = 128
        text_overflow = "shorten"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.protocol.medium, Medium::Direct);
        assert_eq!(config.protocol.timeout_ms, 500);
        assert_eq!(config.protocol.max_id, u32::MAX);
        assert_eq!(config.grid.column_width, Size::Cells(20));
        assert_eq!(config.grid.row_height, Size::Px(128));
        assert_eq!(config.grid.text_overflow, TextOverflow::Shorten);
        assert!(config.general.print_errors);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(include_str!("../../pixgrid.toml.example")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol.medium, Medium::TempFile);
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        let mut config = Config::default();
        config.protocol.min_id = 0;
        assert!(config.validate().is_err());

        config.protocol.min_id = 10;
        config.protocol.max_id = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TomlConfigStorage::new(dir.path().join("nested/pixgrid.toml"));

        let config = storage.load().unwrap();
        assert!(storage.path().exists());
        assert_eq!(config.protocol.timeout_ms, 3000);

        // Second load reads the file that was just written
        let again = storage.load().unwrap();
        assert_eq!(again.grid.cut_placeholder, " …");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TomlConfigStorage::new(dir.path().join("pixgrid.toml"));

        let mut config = Config::default();
        config.grid.column_width = Size::Cells(12);
        config.resize.stretch = true;
        storage.save(&config).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.grid.column_width, Size::Cells(12));
        assert!(loaded.resize.stretch);
    }
}
