//! Configuration module for the harvester
//!
//! Handles loading and validating settings from YAML files and environment variables.
//! Settings are installed once at startup and read-only afterwards.

mod settings;

pub use settings::*;

use anyhow::Result;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing::info;

/// Global settings instance
static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Install the process-wide settings
pub fn init(settings: Settings) -> Result<&'static Settings> {
    settings.validate()?;
    SETTINGS
        .set(settings)
        .map_err(|_| anyhow::anyhow!("Settings already initialized"))?;
    Ok(get())
}

/// Get a reference to the global settings
pub fn get() -> &'static Settings {
    SETTINGS.get().expect("Settings not initialized")
}

/// Load settings from file or use defaults
pub fn load() -> Result<Settings> {
    // Check environment variable first
    if let Ok(path) = std::env::var("HARVEST_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        info!("Loading settings from: {}", path.display());
        let mut settings = Settings::from_file(&path)?;
        settings.merge_env();
        return Ok(settings);
    }

    let paths = [
        Some(PathBuf::from("harvest.yml")),
        Some(PathBuf::from("config/harvest.yml")),
        dirs::config_dir().map(|p| p.join("image-harvester/harvest.yml")),
    ];

    for path in paths.iter().flatten() {
        if path.exists() {
            info!("Loading settings from: {}", path.display());
            let mut settings = Settings::from_file(path)?;
            settings.merge_env();
            return Ok(settings);
        }
    }

    info!("No settings file found, using defaults");
    let mut settings = Settings::default();
    settings.merge_env();
    Ok(settings)
}
