//! Harness configuration via `fidelity.toml`
//!
//! A test suite drops a `fidelity.toml` next to its fixtures to add
//! normalization rules for releases the built-in rules do not know about, or
//! to use a different ordering key. Without a file the built-in defaults
//! apply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use strata_fidelity_core::{FidelityError, Result, ORDERING_KEY};

use crate::normalize::NormalizationRuleSet;

/// Config file name looked up in a fixture directory.
pub const CONFIG_FILE_NAME: &str = "fidelity.toml";

/// Harness configuration loaded from `fidelity.toml`.
///
/// Rule tables in the file extend the built-in rule sets; an entry for a key
/// that already has a built-in rule replaces it. Set
/// `replace_builtin_rules = true` to start from empty sets instead.
///
/// # Example
///
/// ```toml
/// ordering_key = "_id"
///
/// [capture.avgObjSize]
/// action = { coerce-type = "integer" }
/// note = "double in 2.4, int in 2.6"
///
/// [compare.systemFlags]
/// action = "ignore"
/// note = "gone as of 2.7.1"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityConfig {
    /// Field documents are ordered by when captured.
    #[serde(default = "default_ordering_key")]
    pub ordering_key: String,
    /// Use only the rules in this file, without the built-ins.
    #[serde(default)]
    pub replace_builtin_rules: bool,
    /// Rules applied to statistics when a snapshot is taken.
    #[serde(default)]
    pub capture: NormalizationRuleSet,
    /// Rules applied to both sides of a metadata comparison.
    #[serde(default)]
    pub compare: NormalizationRuleSet,
}

fn default_ordering_key() -> String {
    ORDERING_KEY.to_string()
}

impl Default for FidelityConfig {
    fn default() -> Self {
        Self {
            ordering_key: default_ordering_key(),
            replace_builtin_rules: false,
            capture: NormalizationRuleSet::capture_defaults(),
            compare: NormalizationRuleSet::comparison_defaults(),
        }
    }
}

impl FidelityConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata fidelity harness configuration
#
# Field that orders documents in a snapshot (default: "_id").
# The persistence helper assigns it a counter starting at 0.
ordering_key = "_id"

# Rules below extend the built-in rules; a key listed here replaces the
# built-in rule for that key. Set to true to use only the rules in this file.
replace_builtin_rules = false

# Rules applied to collection statistics when a snapshot is taken.
# Actions: "ignore", "drop-if-default", { coerce-type = "integer" | "float" }
# [capture.avgObjSize]
# action = { coerce-type = "integer" }
# note = "double in 2.4, int in 2.6"

# Rules applied to both sides of a metadata comparison.
# [compare.lastExtentSize]
# action = "ignore"
# note = "allocation strategy changed"
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Config`] if the text does not parse or the
    /// ordering key is empty.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: FidelityConfig = toml::from_str(content)
            .map_err(|e| FidelityError::Config(format!("Failed to parse config: {}", e)))?;
        parsed.resolve()
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FidelityError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            FidelityError::Config(msg) => {
                FidelityError::Config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Load `fidelity.toml` from `dir`, or the defaults when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Config`] if the file exists but is invalid.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file into `dir` if it does not already exist.
    ///
    /// Returns the path of the file, whether it was created or already existed.
    pub fn write_default(dir: &Path) -> Result<PathBuf> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            std::fs::write(&path, Self::default_toml()).map_err(|e| {
                FidelityError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(path)
    }

    /// Merge file rules over the built-ins and validate.
    fn resolve(mut self) -> Result<Self> {
        if self.ordering_key.is_empty() {
            return Err(FidelityError::Config(
                "ordering_key must not be empty".to_string(),
            ));
        }
        if !self.replace_builtin_rules {
            let mut capture = NormalizationRuleSet::capture_defaults();
            capture.extend(std::mem::take(&mut self.capture));
            self.capture = capture;

            let mut compare = NormalizationRuleSet::comparison_defaults();
            compare.extend(std::mem::take(&mut self.compare));
            self.compare = compare;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{RuleAction, ValueType};
    use strata_fidelity_core::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_carries_builtin_rules() {
        let config = FidelityConfig::default();
        assert_eq!(config.ordering_key, "_id");
        assert_eq!(config.capture, NormalizationRuleSet::capture_defaults());
        assert_eq!(config.compare, NormalizationRuleSet::comparison_defaults());
    }

    #[test]
    fn test_default_toml_parses_to_default() {
        let config = FidelityConfig::from_toml_str(FidelityConfig::default_toml()).unwrap();
        assert_eq!(config, FidelityConfig::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(FidelityConfig::from_toml_str("").unwrap(), FidelityConfig::default());
    }

    #[test]
    fn test_file_rules_extend_builtins() {
        let config = FidelityConfig::from_toml_str(
            r#"
[compare.lastExtentSize]
action = "ignore"
note = "allocation strategy changed"

[compare.capped]
action = "ignore"

[capture.size]
action = { coerce-type = "float" }
"#,
        )
        .unwrap();
        assert_eq!(config.compare.len(), 7);
        assert_eq!(
            config.compare.get("lastExtentSize").and_then(|r| r.note.as_deref()),
            Some("allocation strategy changed")
        );
        assert_eq!(
            config.compare.get("capped").map(|r| r.action),
            Some(RuleAction::Ignore)
        );
        assert_eq!(
            config.capture.get("size").map(|r| r.action),
            Some(RuleAction::CoerceType(ValueType::Float))
        );
        assert!(config.capture.get("avgObjSize").is_some());
    }

    #[test]
    fn test_replace_builtin_rules() {
        let config = FidelityConfig::from_toml_str(
            r#"
replace_builtin_rules = true

[compare.systemFlags]
action = "ignore"
"#,
        )
        .unwrap();
        assert!(config.capture.is_empty());
        assert_eq!(config.compare.len(), 1);
    }

    #[test]
    fn test_invalid_content_is_config_error() {
        let err = FidelityConfig::from_toml_str("[compare.x]\naction = \"shred\"\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = FidelityConfig::from_toml_str("ordering_key = \"\"").unwrap_err();
        assert!(err.to_string().contains("ordering_key"));
    }

    #[test]
    fn test_write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = FidelityConfig::write_default(dir.path()).unwrap();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
        assert_eq!(FidelityConfig::from_file(&path).unwrap(), FidelityConfig::default());
    }

    #[test]
    fn test_write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "ordering_key = \"seq\"\n").unwrap();

        FidelityConfig::write_default(dir.path()).unwrap();

        let config = FidelityConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.ordering_key, "seq");
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = FidelityConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, FidelityConfig::default());
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = FidelityConfig::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
