//! Application settings loading from config.toml
//!
//! This module provides the handful of tunables the operators adjust per
//! deployment: the similarity threshold for sell-price imports, the default
//! low-stock alarm, and how many unmatched names an import report lists.
//! A missing config.toml is not an error; every field has a default.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Minimum similarity percent (0-100) for fuzzy sell-price mapping
    pub sell_price_threshold: f64,
    /// Low-stock alarm used for products without their own alarm value
    pub low_stock_threshold: i32,
    /// Maximum number of unmatched names listed in an import outcome
    pub unmatched_report_cap: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sell_price_threshold: 96.0,
            low_stock_threshold: 5,
            unmatched_report_cap: 50,
        }
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file exists but cannot be read, or if the TOML
/// syntax is invalid.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from the default location (./config.toml), falling back to
/// defaults when the file does not exist.
pub fn load_default_settings() -> Result<Settings> {
    if Path::new("config.toml").exists() {
        load_settings("config.toml")
    } else {
        Ok(Settings::default())
    }
}
