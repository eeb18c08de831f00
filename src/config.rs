//! Calculator configuration
//!
//! Read from a TOML file; every key is optional.
//!
//! ```toml
//! precision = 8
//! prompt = "> "
//! history_file = ".pcalc_history"
//! startup_scripts = ["constants.pc"]
//! imperial = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostics::CalcError;
use crate::quantity::DEFAULT_PRECISION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculatorConfig {
    /// Significant digits when printing quantities
    pub precision: usize,
    pub prompt: String,
    pub history_file: Option<PathBuf>,
    /// Scripts read before the first command
    pub startup_scripts: Vec<PathBuf>,
    /// Register the imperial system and its conversion from SI
    pub imperial: bool,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            prompt: "pc> ".to_string(),
            history_file: None,
            startup_scripts: Vec::new(),
            imperial: true,
        }
    }
}

impl CalculatorConfig {
    pub fn from_toml(text: &str) -> Result<Self, CalcError> {
        let config: CalculatorConfig = toml::from_str(text).map_err(|e| CalcError::Config {
            reason: e.message().to_string(),
        })?;
        config.validate()
    }

    pub fn load(path: &Path) -> Result<Self, CalcError> {
        let text = std::fs::read_to_string(path).map_err(|e| CalcError::Config {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml(&text)
    }

    fn validate(self) -> Result<Self, CalcError> {
        if !(1..=17).contains(&self.precision) {
            return Err(CalcError::Config {
                reason: format!("precision must be between 1 and 17, got {}", self.precision),
            });
        }
        Ok(self)
    }
}
