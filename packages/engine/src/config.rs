//! Engine configuration.

use std::{fs, io, path};

use serde::{Deserialize, Serialize};

use preftree_core_store::{Error, Limits, Result};

/// Switches that govern how a `Session` carries out mutations.
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```rust
/// use preftree_engine::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{"dry_run": true}"#).unwrap();
/// assert!(config.dry_run);
/// assert!(config.destructive_actions);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// When false, removals are refused and moves leave the source in place.
    pub destructive_actions: bool,
    /// Flush the affected node after every successful mutation.
    pub flush_after_mutation: bool,
    /// Describe mutations instead of performing them.
    pub dry_run: bool,
    pub limits: Limits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            destructive_actions: true,
            flush_after_mutation: true,
            dry_run: false,
            limits: Limits::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<EngineConfig> {
        serde_json::from_str(text)
            .map_err(|err| Error::validation(format!("invalid configuration: {}", err)))
    }

    pub fn load(file: &path::Path) -> Result<EngineConfig> {
        let text = fs::read_to_string(file).map_err(|err| {
            Error::store_with(format!("cannot read config {}", file.display()), err)
        })?;
        Self::from_json(&text)
    }

    /// Like `load`, but a missing file gives the defaults.
    pub fn load_or_default(file: &path::Path) -> Result<EngineConfig> {
        match fs::metadata(file) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", file.display());
                Ok(EngineConfig::default())
            }
            _ => Self::load(file),
        }
    }
}
