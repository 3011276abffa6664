//! Configuration loading for Herald
//!
//! Provides utilities for locating and loading configuration files from the
//! shared Herald config directory (~/.config/herald/), plus the data
//! directory where the processed-message database lives.
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory used under the platform config/data roots
const APP_DIR: &str = "herald";

/// Initialize the Herald config directory.
///
/// Creates ~/.config/herald/ if it doesn't exist.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the Herald config directory (~/.config/herald/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the Herald data directory (~/.local/share/herald/ on Linux)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the Herald config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Get the path to a file within the Herald data directory
pub fn data_path(filename: &str) -> Option<PathBuf> {
    data_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON config file from the Herald config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the Herald config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the Herald config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Ensure the Herald data directory exists
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = data_dir().context("Could not determine data directory")?;
    ensure_dir(&dir)?;
    Ok(dir)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// Save a value as pretty-printed JSON to an arbitrary path
///
/// Parent directories are created as needed.
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
