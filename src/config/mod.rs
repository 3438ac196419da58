//! Configuration management for cfdbox.
//!
//! Settings are read once at process start and handed down explicitly; nothing
//! below the CLI consults the environment on its own.
//!
//! # Configuration File Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/cfdbox/config.yml`
//! - macOS: `~/Library/Application Support/cfdbox/config.yml`
//! - Windows: `C:\Users\<User>\AppData\Roaming\cfdbox\config.yml`
//!
//! # Example Configuration
//!
//! ```yaml
//! sftp:
//!   server: "nas.example.com"
//!   user: "cfd"
//!   port: 22
//! transport:
//!   max_attempts: 5
//!   timeout_secs: 30
//! tools:
//!   export: "/opt/ansys/v182/CFX/bin/cfx5export"
//!   gzip: "gzip"
//! defaults:
//!   local_tmp_dir: "/scratch/cfd/tmp"
//! ```
//!
//! The `SFTP_SERVER`, `SFTP_USER`, `SFTP_PASSWORD` and `SFTP_PORT`
//! environment variables take precedence over the `sftp` section.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default SSH port
const DEFAULT_SSH_PORT: u16 = 22;

/// Default number of connection handshakes before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default SSH connection timeout in seconds
const DEFAULT_TIMEOUT: u64 = 30;

const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 5000;

const DEFAULT_EXPORT_TOOL: &str = "cfx5export";
const DEFAULT_GZIP_TOOL: &str = "gzip";

pub const ENV_SERVER: &str = "SFTP_SERVER";
pub const ENV_USER: &str = "SFTP_USER";
pub const ENV_PASSWORD: &str = "SFTP_PASSWORD";
pub const ENV_PORT: &str = "SFTP_PORT";

/// Template written by `cfdbox config init`.
pub const CONFIG_TEMPLATE: &str = "\
# cfdbox configuration
#
# SFTP_SERVER, SFTP_USER, SFTP_PASSWORD and SFTP_PORT override the sftp section.
sftp:
  server: \"nas.example.com\"
  user: \"cfd\"
  # password: \"secret\"
  port: 22
transport:
  max_attempts: 5
  timeout_secs: 30
  retry_delay_ms: 500
  max_retry_delay_ms: 5000
tools:
  export: \"cfx5export\"
  gzip: \"gzip\"
# defaults:
#   local_tmp_dir: \"/scratch/tmp\"
";

/// Main configuration structure for cfdbox.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Remote file store credentials
    #[serde(default)]
    pub sftp: SftpSettings,

    /// Connection behaviour
    #[serde(default)]
    pub transport: TransportSettings,

    /// External executables
    #[serde(default)]
    pub tools: ToolSettings,

    /// Default settings that apply when not overridden on the command line
    #[serde(default)]
    pub defaults: DefaultSettings,
}

/// Credentials as they appear in the configuration file. Any field may be
/// left out and supplied through the environment instead.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SftpSettings {
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    /// Number of handshakes attempted before a connection is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// TCP connect and read/write timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Delay before the first retry; doubled on every further retry
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_export_tool")]
    pub export: String,

    #[serde(default = "default_gzip_tool")]
    pub gzip: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSettings {
    /// Root under which run directories are created
    pub local_tmp_dir: Option<PathBuf>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_max_retry_delay() -> u64 {
    DEFAULT_MAX_RETRY_DELAY_MS
}

fn default_export_tool() -> String {
    DEFAULT_EXPORT_TOOL.to_string()
}

fn default_gzip_tool() -> String {
    DEFAULT_GZIP_TOOL.to_string()
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_secs: DEFAULT_TIMEOUT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            export: default_export_tool(),
            gzip: default_gzip_tool(),
        }
    }
}

impl Config {
    /// Returns the default configuration file path for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cfdbox").join("config.yml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns `Ok(Config::default())` if no config file exists.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Loads configuration from a specific file path.
    ///
    /// Returns `Ok(Config::default())` if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read config file {}: {}\n\n\
                     Suggestions:\n\
                     • Check file permissions: ls -la {}\n\
                     • Try recreating with: cfdbox config init --force",
                    path.display(),
                    e,
                    path.display()
                ),
            ))
        })?;

        Self::parse(&contents).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse config file {}: {}\n\n\
                 Suggestions:\n\
                 • Check YAML syntax in the config file\n\
                 • Verify indentation uses spaces, not tabs",
                path.display(),
                e
            ))
        })
    }

    /// Parses configuration from YAML text.
    pub fn parse(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Writes the commented template to `path`, creating parent directories.
    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, CONFIG_TEMPLATE)?;
        Ok(())
    }

    /// Root under which run directories are created, falling back to
    /// `$HOME/tmp`.
    pub fn local_tmp_dir(&self) -> PathBuf {
        self.defaults.local_tmp_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/"))
                .join("tmp")
        })
    }

    /// Builds the transport configuration from the process environment.
    pub fn transport_config(&self) -> Result<TransportConfig> {
        self.transport_config_with(|key| std::env::var(key).ok())
    }

    /// Builds the transport configuration, consulting `lookup` for the
    /// `SFTP_*` overrides.
    ///
    /// Missing credentials are a configuration error, as is a port that is
    /// not an integer.
    pub fn transport_config_with<F>(&self, lookup: F) -> Result<TransportConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let server = lookup(ENV_SERVER).or_else(|| self.sftp.server.clone());
        let user = lookup(ENV_USER).or_else(|| self.sftp.user.clone());
        let password = lookup(ENV_PASSWORD)
            .map(SecretString::new)
            .or_else(|| self.sftp.password.clone());

        let (server, user, password) = match (server, user, password) {
            (Some(server), Some(user), Some(password)) => (server, user, password),
            _ => {
                return Err(Error::Configuration(format!(
                    "sftp support is not available: ${}, ${} and ${} are required \
                     (or the sftp section of the config file)",
                    ENV_SERVER, ENV_USER, ENV_PASSWORD
                )))
            }
        };

        let port = match lookup(ENV_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                Error::Configuration(format!("{} is not an integer: {}", ENV_PORT, raw))
            })?,
            None => self.sftp.port.unwrap_or(DEFAULT_SSH_PORT),
        };

        Ok(TransportConfig {
            server,
            user,
            password,
            port,
            timeout_secs: self.transport.timeout_secs,
        })
    }
}

/// Connection parameters for one remote file store.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub server: String,
    pub user: String,
    pub password: SecretString,
    pub port: u16,
    pub timeout_secs: u64,
}

impl TransportConfig {
    pub fn new(server: &str, user: &str, password: &str) -> Self {
        Self {
            server: server.to_string(),
            user: user.to_string(),
            password: SecretString::new(password.to_string()),
            port: DEFAULT_SSH_PORT,
            timeout_secs: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the connection string (user@server (port N)).
    pub fn connection_string(&self) -> String {
        format!("{}@{} (port {})", self.user, self.server, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.transport.max_attempts, 5);
        assert_eq!(config.tools.export, "cfx5export");
        assert_eq!(config.tools.gzip, "gzip");
        assert!(config.sftp.server.is_none());
    }

    #[test]
    fn test_transport_config_from_env() {
        let config = Config::default();
        let transport = config
            .transport_config_with(env(&[
                (ENV_SERVER, "nas"),
                (ENV_USER, "cfd"),
                (ENV_PASSWORD, "hunter2"),
            ]))
            .unwrap();

        assert_eq!(transport.server, "nas");
        assert_eq!(transport.user, "cfd");
        assert_eq!(transport.password(), "hunter2");
        assert_eq!(transport.port, 22);
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let config = Config::default();
        let err = config
            .transport_config_with(env(&[(ENV_SERVER, "nas"), (ENV_USER, "cfd")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn test_bad_port_is_configuration_error() {
        let config = Config::default();
        let err = config
            .transport_config_with(env(&[
                (ENV_SERVER, "nas"),
                (ENV_USER, "cfd"),
                (ENV_PASSWORD, "pw"),
                (ENV_PORT, "twenty-two"),
            ]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("twenty-two"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = Config::parse(
            "sftp:\n  server: file-host\n  user: file-user\n  password: file-pw\n  port: 2200\n",
        )
        .unwrap();

        let from_file = config.transport_config_with(env(&[])).unwrap();
        assert_eq!(from_file.server, "file-host");
        assert_eq!(from_file.port, 2200);

        let overridden = config
            .transport_config_with(env(&[(ENV_SERVER, "env-host"), (ENV_PORT, "2222")]))
            .unwrap();
        assert_eq!(overridden.server, "env-host");
        assert_eq!(overridden.user, "file-user");
        assert_eq!(overridden.port, 2222);
    }

    #[test]
    fn test_template_parses() {
        let config = Config::parse(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.sftp.server.as_deref(), Some("nas.example.com"));
        assert!(config.sftp.password.is_none());
        assert_eq!(config.transport.retry_delay_ms, 500);
    }

    #[test]
    fn test_debug_hides_password() {
        let transport = TransportConfig::new("nas", "cfd", "hunter2");
        assert!(!format!("{:?}", transport).contains("hunter2"));
        assert_eq!(transport.connection_string(), "cfd@nas (port 22)");
    }
}
