//! Configuration for herald paths and pacing.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (HERALD_HOME, HERALD_DIRECTORY_URL)
//! 2. Config file (.herald/config.yaml)
//! 3. Defaults (~/.herald, localhost directory service)
//!
//! Config file discovery:
//! - Searches current directory and parents for .herald/config.yaml
//! - The home path in the config file is relative to the .herald/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::Pacing;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_DIRECTORY_URL: &str = "http://localhost:8000";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub directory_url: Option<String>,
    #[serde(default)]
    pub pacing: Option<PacingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to the config file)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    pub item_delay_ms: Option<u64>,
    pub batch_delay_ms: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to herald home (engine state)
    pub home: PathBuf,

    /// Base URL of the identity service
    pub directory_url: String,

    /// Delivery pacing
    pub pacing: Pacing,

    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Quota ledger location ($HERALD_HOME/quota.json)
    pub fn quota_path(&self) -> PathBuf {
        self.home.join("quota.json")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".herald").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn pacing_from(config: Option<&PacingConfig>) -> Pacing {
    let defaults = Pacing::default();

    Pacing {
        item_delay: config
            .and_then(|p| p.item_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.item_delay),
        batch_delay: config
            .and_then(|p| p.batch_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.batch_delay),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".herald");

    // Check for config file
    let config_file = find_config_file();

    let (home, directory_url, pacing) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // Resolve home path
        let home = if let Ok(env_home) = std::env::var("HERALD_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            // home is relative to the .herald/ directory
            let herald_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(herald_dir, home_path)
        } else {
            default_home.clone()
        };

        let directory_url = std::env::var("HERALD_DIRECTORY_URL")
            .ok()
            .or(config.directory_url)
            .unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string());

        (home, directory_url, pacing_from(config.pacing.as_ref()))
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("HERALD_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let directory_url = std::env::var("HERALD_DIRECTORY_URL")
            .unwrap_or_else(|_| DEFAULT_DIRECTORY_URL.to_string());

        (home, directory_url, Pacing::default())
    };

    Ok(ResolvedConfig {
        home,
        directory_url,
        pacing,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
