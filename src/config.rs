//! VM configuration: recursion limit, default timezone, and the embedder's
//! clock epoch. Loadable from a TOML file so hosts can tune limits without a
//! recompile, the way the rest of this corpus treats ambient configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Default soft recursion limit, in activation frames, before the evaluator
/// raises `stack-overflow` (§4.4 "Reentrancy and recursion").
pub const DEFAULT_MAX_RECURSION: usize = 4_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Soft limit on nested `perform` activations.
    pub max_recursion: usize,
    /// IANA zone name new Dates without an explicit location are created in.
    pub default_timezone: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_recursion: DEFAULT_MAX_RECURSION,
            default_timezone: "UTC".to_owned(),
        }
    }
}

impl VmConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, EvalError> {
        toml::from_str(src).map_err(|err| EvalError::Io(format!("invalid vm config: {err}")))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, EvalError> {
        let contents =
            fs::read_to_string(path).map_err(|err| EvalError::Io(format!("{err}")))?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_recursion_limit() {
        let cfg = VmConfig::default();
        assert_eq!(cfg.max_recursion, DEFAULT_MAX_RECURSION);
        assert_eq!(cfg.default_timezone, "UTC");
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = VmConfig::from_toml_str("max_recursion = 100\n").unwrap();
        assert_eq!(cfg.max_recursion, 100);
        assert_eq!(cfg.default_timezone, "UTC");
    }
}
