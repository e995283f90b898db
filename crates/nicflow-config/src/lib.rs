pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{ApiSettings, NicflowConfig, RetrySettings, TimeoutSettings};

use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "NICFLOW_CONFIG";
const CANDIDATES: [&str; 2] = ["nicflow.local.yaml", "nicflow.yaml"];

/// Locate the nicflow config file
///
/// Search order:
/// 1. `NICFLOW_CONFIG` environment variable (must exist when set)
/// 2. current directory: nicflow.local.yaml, nicflow.yaml
/// 3. ./.nicflow/ with the same names
/// 4. ~/.config/nicflow/nicflow.yaml
///
/// Returns `None` when no file exists; built-in defaults apply then.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(&config_path);
        if !path.exists() {
            return Err(ConfigError::ConfigFileNotFound(config_path));
        }
        return Ok(Some(path));
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = first_existing(&current_dir) {
        return Ok(Some(path));
    }

    if let Some(path) = first_existing(&current_dir.join(".nicflow")) {
        return Ok(Some(path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("nicflow").join("nicflow.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Parse and validate a config file
pub fn load_config_from(path: &Path) -> Result<NicflowConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: NicflowConfig = if content.trim().is_empty() {
        NicflowConfig::default()
    } else {
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?
    };
    config.validate()?;
    Ok(config)
}

/// Discover and load the config, falling back to defaults
pub fn load_config() -> Result<NicflowConfig> {
    match find_config_file()? {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            load_config_from(&path)
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Ok(NicflowConfig::default())
        }
    }
}
