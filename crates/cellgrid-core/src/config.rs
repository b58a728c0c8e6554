//! Spreadsheet configuration.
//!
//! ```toml
//! max_range_cells = 1000000
//!
//! [eval]
//! text_precision = 6
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetError};
use cellgrid_engine::engine::EvalOptions;

/// Largest number of cells a single formula's ranges may cover.
pub const DEFAULT_MAX_RANGE_CELLS: u64 = 1_000_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Formulas whose ranges cover more cells are rejected.
    pub max_range_cells: u64,
    pub eval: EvalOptions,
}

impl Default for SheetConfig {
    fn default() -> Self {
        SheetConfig {
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
            eval: EvalOptions::default(),
        }
    }
}

impl SheetConfig {
    /// Parse a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| SheetError::Config(err.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| SheetError::Config(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SheetConfig::from_toml_str("").unwrap();
        assert_eq!(config, SheetConfig::default());
        assert_eq!(config.max_range_cells, 1_000_000);
        assert_eq!(config.eval.text_precision, 6);
    }

    #[test]
    fn test_partial_config() {
        let config = SheetConfig::from_toml_str("[eval]\ntext_precision = 2\n").unwrap();
        assert_eq!(config.eval.text_precision, 2);
        assert_eq!(config.max_range_cells, DEFAULT_MAX_RANGE_CELLS);

        let config = SheetConfig::from_toml_str("max_range_cells = 50").unwrap();
        assert_eq!(config.max_range_cells, 50);
        assert_eq!(config.eval.text_precision, 6);
    }

    #[test]
    fn test_invalid_config() {
        let err = SheetConfig::from_toml_str("max_range_cells = \"lots\"").unwrap_err();
        assert!(matches!(err, SheetError::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SheetConfig {
            max_range_cells: 10,
            eval: EvalOptions { text_precision: 3 },
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(SheetConfig::from_toml_str(&text).unwrap(), config);
    }
}
