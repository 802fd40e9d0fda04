//! Engine configuration
//!
//! Loads settings from YAML configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Avalonia XML namespace, the default when a document declares none
pub const AVALONIA_NAMESPACE: &str = "https://github.com/avaloniaui";

/// XAML 2006 language namespace (`x:`)
pub const XAML_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";

/// File names searched by [`EngineConfig::load_default`], in order
pub const CONFIG_FILE_NAMES: [&str; 3] = [
    ".xaml-intellisense.yaml",
    ".xaml-intellisense.yml",
    "xaml-intellisense.yaml",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Main engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace URIs
    pub namespaces: NamespaceSettings,
    /// Completion behaviour
    pub completion: CompletionSettings,
}

/// Well-known namespace URIs
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NamespaceSettings {
    /// Namespace of unprefixed elements when the root declares no `xmlns`
    pub default: String,
    /// Namespace that carries the `x:` directives
    pub xaml: String,
}

/// Completion settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Cap on returned completions, applied after ranking
    pub max_results: Option<usize>,
    /// Setter target when no enclosing Style or ControlTheme names one
    pub default_setter_target: String,
}

impl Default for NamespaceSettings {
    fn default() -> Self {
        Self {
            default: AVALONIA_NAMESPACE.to_string(),
            xaml: XAML_NAMESPACE.to_string(),
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            max_results: None,
            default_setter_target: "Control".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Path of the first config file present in `dir`
    pub fn find(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration from the default locations in `dir`
    ///
    /// Falls back to the defaults when no file exists or it fails to load.
    pub fn load_default(dir: &Path) -> Self {
        let Some(path) = Self::find(dir) else {
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                tracing::debug!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.namespaces.default, AVALONIA_NAMESPACE);
        assert_eq!(config.namespaces.xaml, XAML_NAMESPACE);
        assert_eq!(config.completion.max_results, None);
        assert_eq!(config.completion.default_setter_target, "Control");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml("completion:\n  max_results: 20\n").unwrap();
        assert_eq!(config.completion.max_results, Some(20));
        assert_eq!(config.completion.default_setter_target, "Control");
        assert_eq!(config.namespaces.default, AVALONIA_NAMESPACE);
    }

    #[test]
    fn test_empty_yaml() {
        let config = EngineConfig::from_yaml("").unwrap();
        assert_eq!(config.namespaces.xaml, XAML_NAMESPACE);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = EngineConfig::from_yaml("completion: [1, 2");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = EngineConfig::load(&temp.path().join("nope.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_default_search_order() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("xaml-intellisense.yaml"),
            "completion:\n  default_setter_target: Border\n",
        )
        .unwrap();
        fs::write(
            temp.path().join(".xaml-intellisense.yml"),
            "completion:\n  default_setter_target: Panel\n",
        )
        .unwrap();

        let config = EngineConfig::load_default(temp.path());
        assert_eq!(config.completion.default_setter_target, "Panel");
    }

    #[test]
    fn test_load_default_without_file() {
        let temp = TempDir::new().unwrap();
        assert!(EngineConfig::find(temp.path()).is_none());
        let config = EngineConfig::load_default(temp.path());
        assert_eq!(config.completion.default_setter_target, "Control");
    }

    #[test]
    fn test_load_default_ignores_broken_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".xaml-intellisense.yaml"), "namespaces: [").unwrap();
        let config = EngineConfig::load_default(temp.path());
        assert_eq!(config.namespaces.default, AVALONIA_NAMESPACE);
    }
}
