use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "missionterm";
const CONFIG_FILE: &str = "config.toml";
const CLIENT_SECRET_FILE: &str = "client_secret.json";
const TOKEN_CACHE_FILE: &str = "tokens.json";
const LOG_FILE: &str = "missionterm.log";

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "MISSIONTERM_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub account: AccountConfig,
    pub backend: BackendConfig,
    pub triage: TriageConfig,
    pub log: LogConfig,
    /// Directory holding the config file and the OAuth files
    #[serde(skip)]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// The account's own address, excluded from reply recipients
    pub email: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            email: "me@example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Gmail,
    #[default]
    Demo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Domains never grouped by the "archive similar" prompt, on top of the
    /// built-in public providers
    pub extra_skip_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn client_secret_path(&self) -> PathBuf {
        self.dir.join(CLIENT_SECRET_FILE)
    }

    pub fn token_cache_path(&self) -> PathBuf {
        self.dir.join(TOKEN_CACHE_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }
}

/// Returns the configuration directory path
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .context("Failed to determine config directory")
}

/// Returns the path to the default config file
pub fn config_path() -> Result<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Ensures the directory exists
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {:?}", dir))?;
    }
    Ok(())
}

/// Loads the config.
///
/// An explicit path must exist. The default location falls back to the
/// built-in defaults (demo backend) when no file is there yet.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (config_path()?, false),
    };
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    if !path.exists() {
        if required {
            anyhow::bail!("Config file not found at {:?}", path);
        }
        return Ok(Config {
            dir,
            ..Config::default()
        });
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    let mut config = parse_config(&content)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    config.dir = dir;
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content)?;
    config.account.email = config.account.email.trim().to_string();
    if config.account.email.is_empty() {
        anyhow::bail!("[account] email must not be empty");
    }
    Ok(config)
}
