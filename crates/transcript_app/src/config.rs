use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use thiserror::Error;
use transcript_engine::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

/// Loads engine settings from a RON file, or defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    engine_info!("loaded config from {:?}", path);
    Ok(config)
}
