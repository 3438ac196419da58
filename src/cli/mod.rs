pub mod completions;
pub mod config;
pub mod export_cgns;
pub mod list;

use std::path::Path;

use anyhow::{Context, Result};
use cfdbox::config::Config;

/// Loads the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Config::load().context("loading configuration"),
    }
}
