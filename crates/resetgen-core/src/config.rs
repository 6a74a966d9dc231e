use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::PreserveRules;
use crate::error::{Error, Result};
use crate::text::DEFAULT_ERROR_TAIL_CHARS;

/// Settings read from a `resetgen.toml` file.
///
/// Every section is optional; missing values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Schemas scanned for application tables. Empty means all user schemas.
    pub schemas: Vec<String>,
    pub preserve: PreserveRules,
    pub self_test: SelfTestConfig,
    /// Characters of database error output kept in reported failures.
    pub error_tail_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTestConfig {
    pub timeout_secs: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            schemas: Vec::new(),
            preserve: PreserveRules::default(),
            self_test: SelfTestConfig::default(),
            error_tail_chars: DEFAULT_ERROR_TAIL_CHARS,
        }
    }
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl SelfTestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ResetConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ResetConfig =
            toml::from_str(content).map_err(|err| Error::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load `path` when given, otherwise return defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.self_test.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "self_test.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.error_tail_chars == 0 {
            return Err(Error::InvalidConfig(
                "error_tail_chars must be greater than zero".to_string(),
            ));
        }
        let patterns = self
            .preserve
            .prefixes
            .iter()
            .chain(&self.preserve.suffixes)
            .chain(&self.preserve.exact);
        for pattern in patterns {
            if pattern.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "preserve patterns must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
