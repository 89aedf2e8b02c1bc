//! TOML configuration.
//!
//! Every section has defaults, so an empty or missing file is valid.
//! Lookup order: explicit path, `ANT_CONFIG`, `./ant.toml`, compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AntConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl AntConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the configuration to use.
    ///
    /// An explicit path must load. `ANT_CONFIG` and `./ant.toml` fall back to
    /// defaults with a warning.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var("ANT_CONFIG") {
            let path = PathBuf::from(env_path);
            match Self::load(&path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "ANT_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new("ant.toml");
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tests in flight at once. 1 reproduces strictly sequential execution.
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console filter directive, overridden by `RUST_LOG`.
    pub console_level: String,
    /// Append log records to this file. An empty path disables file logging.
    pub file: Option<PathBuf>,
    /// Filter directive for the file log.
    pub file_level: String,
    /// Write the file log as JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "error".to_string(),
            file: Some(PathBuf::from("ant.log")),
            // Per-test field lines are emitted at trace.
            file_level: "debug,ant=trace".to_string(),
            json: false,
        }
    }
}

/// Paths of the host utilities the system collaborators drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ping: String,
    pub traceroute: String,
    /// IPv6 variants, used where the host tools have no `-6` switch (macOS, BSD).
    pub ping6: String,
    pub traceroute6: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ping: "ping".to_string(),
            traceroute: "traceroute".to_string(),
            ping6: "ping6".to_string(),
            traceroute6: "traceroute6".to_string(),
        }
    }
}
