//! Server configuration loaded from a TOML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database file path. Defaults to `~/.wordquest/wordquest.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthSettings,

    /// Optional admin account bootstrapped at startup.
    #[serde(default)]
    pub admin: Option<AdminBootstrap>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            database_path: None,
            auth: AuthSettings::default(),
            admin: None,
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Session lifetime in days. 0 means sessions never expire.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,

    /// Create an account automatically when login names an unknown user.
    ///
    /// This is a demo convenience, not an auth model: anyone who can reach
    /// the server can mint accounts. Disable for anything non-throwaway.
    #[serde(default = "default_auto_provision")]
    pub auto_provision: bool,

    /// Password assumed when a register/login request omits one.
    #[serde(default = "default_demo_password")]
    pub default_password: String,

    /// bcrypt work factor for stored password hashes.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_ttl_days: default_token_ttl_days(),
            auto_provision: default_auto_provision(),
            default_password: default_demo_password(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Admin account created (or promoted) when the server starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_token_ttl_days() -> i64 {
    30
}

fn default_auto_provision() -> bool {
    true
}

fn default_demo_password() -> String {
    "demo123".to_string()
}

fn default_bcrypt_cost() -> u32 {
    10
}

impl Config {
    /// Directory for config and database files (`~/.wordquest`).
    pub fn global_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wordquest")
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        Self::global_data_dir().join("config.toml")
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Load the given file, or fall back to defaults when no file exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| Self::global_data_dir().join("wordquest.db"))
    }

    /// Write a commented starter config file.
    pub fn write_starter(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("Config already exists: {} (use --force to overwrite)", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        std::fs::write(path, STARTER_CONFIG)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

const STARTER_CONFIG: &str = r#"# wordquest server configuration

bind_addr = "127.0.0.1"
port = 5000
# database_path = "/var/lib/wordquest/wordquest.db"

[auth]
# Session lifetime in days; 0 disables expiry.
token_ttl_days = 30
# Auto-create accounts on login with an unknown username (demo behavior).
auto_provision = true
default_password = "demo123"
bcrypt_cost = 10

# Uncomment to bootstrap an admin account at startup.
# [admin]
# username = "admin"
# password = "change-me"
# email = "admin@example.com"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.auth.token_ttl_days, 30);
        assert!(config.auth.auto_provision);
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_starter_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        Config::write_starter(&path, false).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.auth.default_password, "demo123");

        // Refuses to clobber without force.
        assert!(Config::write_starter(&path, false).is_err());
        Config::write_starter(&path, true).unwrap();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 8080\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.auth.bcrypt_cost, 10);
    }
}
