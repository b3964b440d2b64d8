use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reconcile::ReconcileStrategy;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const API_URL_ENV: &str = "TASKDECK_API_URL";
pub const RECONCILE_ENV: &str = "TASKDECK_RECONCILE";
pub const HOME_ENV: &str = "TASKDECK_HOME";

const CONFIG_FILE_NAME: &str = "config.json";
const LOG_FILE_NAME: &str = "taskdeck.log";

/// Optional settings stored in `config.json` under the taskdeck home.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FileSettings {
    pub api_url: Option<String>,
    pub reconcile: Option<ReconcileStrategy>,
}

/// Resolved once at startup. Priority: explicit override > environment >
/// config file > default.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub reconcile: ReconcileStrategy,
    pub home_dir: PathBuf,
}

/// Values that win over everything else, typically from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub reconcile: Option<ReconcileStrategy>,
}

impl Config {
    pub fn load(overrides: Overrides) -> Result<Self> {
        let home_dir = match std::env::var(HOME_ENV) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = dirs::home_dir()
                    .ok_or_else(|| anyhow!("Could not determine home directory"))?;
                home.join(".taskdeck")
            }
        };

        let env = EnvSettings {
            api_url: std::env::var(API_URL_ENV).ok().filter(|v| !v.is_empty()),
            reconcile: std::env::var(RECONCILE_ENV).ok().filter(|v| !v.is_empty()),
        };

        Self::resolve(home_dir, overrides, env)
    }

    fn resolve(home_dir: PathBuf, overrides: Overrides, env: EnvSettings) -> Result<Self> {
        let file = read_settings(&home_dir.join(CONFIG_FILE_NAME))?;

        let api_url = overrides
            .api_url
            .or(env.api_url)
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let env_reconcile = env
            .reconcile
            .map(|v| v.parse::<ReconcileStrategy>())
            .transpose()
            .with_context(|| format!("invalid {}", RECONCILE_ENV))?;
        let reconcile = overrides
            .reconcile
            .or(env_reconcile)
            .or(file.reconcile)
            .unwrap_or_default();

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            reconcile,
            home_dir,
        })
    }

    pub fn log_file(&self) -> PathBuf {
        self.home_dir.join(LOG_FILE_NAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.home_dir.join(CONFIG_FILE_NAME)
    }
}

struct EnvSettings {
    api_url: Option<String>,
    reconcile: Option<String>,
}

fn read_settings(path: &Path) -> Result<FileSettings> {
    if !path.exists() {
        return Ok(FileSettings::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    debug!(path = %path.display(), "loaded settings file");
    Ok(settings)
}
