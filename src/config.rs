use anyhow::{anyhow, Context, Result};
use log::{info, LevelFilter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;

use crate::controller::Layout;
use crate::simulator::SimulatorConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // Seed file; the built-in demo data is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    pub layout: Layout,
    pub log_level: String,
    pub simulator: SimulatorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_path: None,
            layout: Layout::Wide,
            log_level: "info".to_string(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Settings {
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

static SETTINGS_PATH_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Point settings at a specific file for the rest of the process. Only the
/// first call wins.
pub fn set_settings_path_override(path: PathBuf) -> bool {
    SETTINGS_PATH_OVERRIDE.set(path).is_ok()
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("parley");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn get_settings_path() -> Result<PathBuf> {
    if let Some(path) = SETTINGS_PATH_OVERRIDE.get() {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("settings.json"))
}

/// Load settings from the default location, falling back to defaults when
/// the file does not exist yet.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(get_settings_path()?)
}

pub fn load_settings_from(path: PathBuf) -> Result<Settings> {
    if !path.exists() {
        info!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let mut file = File::open(&path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let settings: Settings = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid settings file {}", path.display()))?;
    settings
        .simulator
        .validate()
        .with_context(|| format!("Invalid simulator settings in {}", path.display()))?;
    info!("Loaded settings from {}", path.display());

    Ok(settings)
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, get_settings_path()?)
}

pub fn save_settings_to(settings: &Settings, path: PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(&path)?;
    serde_json::to_writer_pretty(file, settings)?;

    info!("Settings saved to {}", path.display());
    Ok(())
}
