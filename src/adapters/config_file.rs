//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] for any validated serde document.  A missing
//! file yields the document's default; a present but unreadable or invalid
//! file is an error, never silently replaced.

use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::Validate;

pub struct JsonConfigFile<C> {
    path: PathBuf,
    _doc: PhantomData<fn() -> C>,
}

impl<C> JsonConfigFile<C> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<C> ConfigPort<C> for JsonConfigFile<C>
where
    C: Serialize + DeserializeOwned + Default + Validate,
{
    fn load(&self) -> Result<C, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Config: {} not found, using defaults", self.path.display());
                let config = C::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                warn!("Config: cannot read {}: {e}", self.path.display());
                return Err(ConfigError::IoError);
            }
        };
        let config: C = serde_json::from_str(&text).map_err(|e| {
            warn!("Config: {} is not valid: {e}", self.path.display());
            ConfigError::Corrupted
        })?;
        config.validate()?;
        info!("Config: loaded {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &C) -> Result<(), ConfigError> {
        config.validate()?;
        let text = serde_json::to_string_pretty(config).map_err(|_| ConfigError::Corrupted)?;
        // Write-then-rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|_| ConfigError::IoError)?;
        fs::rename(&tmp, &self.path).map_err(|_| ConfigError::IoError)?;
        info!("Config: saved {}", self.path.display());
        Ok(())
    }
}
