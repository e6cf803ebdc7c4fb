use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sn_bus::BusOptions;
use sn_core::NarrativeError;

use crate::{map_cli_config_invalid, map_cli_config_read};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "storynet.toml";
pub(crate) const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    /// Used when `RUST_LOG` is unset.
    pub(crate) log_filter: String,
    pub(crate) max_steps_per_notify: usize,
    pub(crate) max_drain_ticks: usize,
    /// Answer AI dialogue and decision requests automatically in `play`.
    pub(crate) auto_ai: bool,
    /// Initial world state JSON for `play`.
    pub(crate) state_file: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        let options = BusOptions::default();
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            max_steps_per_notify: options.engine.max_iterations,
            max_drain_ticks: options.max_drain_ticks,
            auto_ai: true,
            state_file: None,
        }
    }
}

impl CliConfig {
    /// Reads `explicit`, or `storynet.toml` in the working directory when it
    /// exists. Returns the file the config came from.
    pub(crate) fn load(explicit: Option<&str>) -> Result<(Self, Option<PathBuf>), NarrativeError> {
        let path = match explicit {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(NarrativeError::new(
                        "CLI_CONFIG_NOT_FOUND",
                        format!("Config file does not exist: {}", path.display()),
                    ));
                }
                path
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !path.is_file() {
                    return Ok((Self::default(), None));
                }
                path
            }
        };

        let config = Self::from_file(&path)?;
        Ok((config, Some(path)))
    }

    pub(crate) fn from_file(path: &Path) -> Result<Self, NarrativeError> {
        let raw = fs::read_to_string(path).map_err(map_cli_config_read)?;
        Self::from_toml_str(&raw)
    }

    pub(crate) fn from_toml_str(raw: &str) -> Result<Self, NarrativeError> {
        let config: Self = toml::from_str(raw).map_err(map_cli_config_invalid)?;
        if config.max_steps_per_notify == 0 {
            return Err(NarrativeError::new(
                "CLI_CONFIG_INVALID",
                "max_steps_per_notify must be at least 1",
            ));
        }
        Ok(config)
    }

    pub(crate) fn bus_options(&self) -> BusOptions {
        let mut options = BusOptions {
            max_drain_ticks: self.max_drain_ticks,
            ..BusOptions::default()
        };
        options.engine.max_iterations = self.max_steps_per_notify;
        options
    }
}
