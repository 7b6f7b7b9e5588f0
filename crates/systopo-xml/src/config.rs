//! Exchange format settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlConfig {
    /// Name of the document element
    #[serde(default = "default_root_element")]
    pub root_element: String,
    /// Spaces per nesting level; 0 writes a compact single line
    #[serde(default = "default_indent")]
    pub indent: usize,
    /// Emit the `<data-paths>` section
    #[serde(default = "default_true")]
    pub include_data_paths: bool,
    /// Emit the `<?xml ...?>` header
    #[serde(default = "default_true")]
    pub declaration: bool,
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            root_element: default_root_element(),
            indent: default_indent(),
            include_data_paths: true,
            declaration: true,
        }
    }
}

fn default_root_element() -> String {
    "sys-sage".to_string()
}

fn default_indent() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl XmlConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded exchange format configuration");
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = XmlConfig::from_toml("").unwrap();
        assert_eq!(config, XmlConfig::default());
        assert_eq!(config.root_element, "sys-sage");
        assert_eq!(config.indent, 2);
        assert!(config.include_data_paths);
        assert!(config.declaration);
    }

    #[test]
    fn test_partial_override() {
        let config = XmlConfig::from_toml(
            r#"
indent = 0
include_data_paths = false
"#,
        )
        .unwrap();
        assert_eq!(config.indent, 0);
        assert!(!config.include_data_paths);
        assert_eq!(config.root_element, "sys-sage");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            XmlConfig::from_toml("indent = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xml.toml");
        let config = XmlConfig {
            root_element: "machine".to_string(),
            indent: 4,
            include_data_paths: false,
            declaration: false,
        };
        config.to_file(&path).unwrap();
        assert_eq!(XmlConfig::from_file(&path).unwrap(), config);
        assert!(matches!(
            XmlConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
