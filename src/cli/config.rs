//! CLI command for managing cfdbox configuration.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use cfdbox::config::Config;

use super::load_config;

#[derive(Args)]
#[command(about = "Manage cfdbox configuration")]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration, including environment overrides
    Show,

    /// Show the configuration file path
    Path,

    /// Write a commented configuration template
    Init {
        /// Overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self, config_path: Option<&Path>) -> Result<()> {
        match &self.action {
            ConfigAction::Show => self.show_config(config_path),
            ConfigAction::Path => self.show_path(config_path),
            ConfigAction::Init { force } => self.init_config(config_path, *force),
        }
    }

    fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf> {
        match config_path {
            Some(path) => Ok(path.to_path_buf()),
            None => Config::default_path()
                .ok_or_else(|| anyhow!("Could not determine config directory; pass --config")),
        }
    }

    fn show_config(&self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;

        println!("Transport:");
        match config.transport_config() {
            Ok(transport) => {
                println!("  Server:       {}", transport.server);
                println!("  User:         {}", transport.user);
                println!("  Port:         {}", transport.port);
                println!("  Password:     (set)");
            }
            Err(e) => println!("  {}", e),
        }
        println!("  Max attempts: {}", config.transport.max_attempts);
        println!("  Timeout:      {}s", config.transport.timeout_secs);
        println!(
            "  Retry delay:  {}ms (max {}ms)",
            config.transport.retry_delay_ms, config.transport.max_retry_delay_ms
        );
        println!();
        println!("Tools:");
        println!("  Export:       {}", config.tools.export);
        println!("  Gzip:         {}", config.tools.gzip);
        println!();
        println!("Local tmp dir:  {}", config.local_tmp_dir().display());

        Ok(())
    }

    fn show_path(&self, config_path: Option<&Path>) -> Result<()> {
        let path = Self::resolve_path(config_path)?;
        println!("{}", path.display());
        if !path.exists() {
            println!("(file does not exist yet; create it with: cfdbox config init)");
        }
        Ok(())
    }

    fn init_config(&self, config_path: Option<&Path>, force: bool) -> Result<()> {
        let path = Self::resolve_path(config_path)?;
        if path.exists() && !force {
            return Err(anyhow!(
                "Configuration file already exists: {}\nUse --force to overwrite",
                path.display()
            ));
        }

        Config::write_template(&path)?;
        println!("Wrote configuration template to {}", path.display());
        Ok(())
    }
}
