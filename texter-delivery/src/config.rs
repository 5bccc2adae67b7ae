//! Texter configuration, read from RON.
//!
//! ```ron
//! (
//!     delivery_method: "file",
//!     raise_delivery_errors: false,
//!     default: (charset: "ISO-8859-1", to: ["+15550001"]),
//!     transports: {
//!         "file": {"location": "/var/spool/texts"},
//!     },
//! )
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use texter_common::{Recipients, Settings};
use thiserror::Error;

use crate::texter::DEFAULT_QUEUE_NAME;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TEXTER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./texter.config.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("{CONFIG_ENV} points to a missing file: {0}")]
    Missing(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DefaultOptions {
    pub charset: Option<String>,
    pub to: Option<Recipients>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TexterConfig {
    /// Name of a registered delivery method to select.
    pub delivery_method: Option<String>,
    pub perform_deliveries: bool,
    pub raise_delivery_errors: bool,
    pub deliver_later_queue_name: String,
    pub default: DefaultOptions,
    /// Settings layered over each named method's registered defaults.
    pub transports: HashMap<String, Settings>,
}

impl Default for TexterConfig {
    fn default() -> Self {
        Self {
            delivery_method: None,
            perform_deliveries: true,
            raise_delivery_errors: true,
            deliver_later_queue_name: DEFAULT_QUEUE_NAME.to_string(),
            default: DefaultOptions::default(),
            transports: HashMap::new(),
        }
    }
}

impl FromStr for TexterConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .from_str(s)?)
    }
}

impl TexterConfig {
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is not a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// Load the file named by `TEXTER_CONFIG`, else `./texter.config.ron`,
    /// else fall back to the defaults.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] if `TEXTER_CONFIG` names a file that does
    /// not exist, or any error from [`TexterConfig::from_file`].
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::Missing(path));
            }
            return Self::from_file(path);
        }

        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config: TexterConfig = "()".parse().unwrap();
        assert_eq!(config, TexterConfig::default());
        assert!(config.perform_deliveries);
        assert!(config.raise_delivery_errors);
        assert_eq!(config.deliver_later_queue_name, "texters");
    }

    #[test]
    fn test_full_config() {
        let config: TexterConfig = r#"(
            delivery_method: "file",
            perform_deliveries: false,
            raise_delivery_errors: false,
            deliver_later_queue_name: "sms",
            default: (charset: "ISO-8859-1", to: "+15550001"),
            transports: {
                "file": {"location": "/var/spool/texts"},
            },
        )"#
        .parse()
        .unwrap();

        assert_eq!(config.delivery_method.as_deref(), Some("file"));
        assert!(!config.perform_deliveries);
        assert!(!config.raise_delivery_errors);
        assert_eq!(config.deliver_later_queue_name, "sms");
        assert_eq!(config.default.charset.as_deref(), Some("ISO-8859-1"));
        assert_eq!(
            config.default.to,
            Some(Recipients::from(vec!["+15550001".to_string()]))
        );
        assert_eq!(
            config.transports["file"].get("location"),
            Some(&json!("/var/spool/texts"))
        );
    }

    #[test]
    fn test_invalid_config() {
        let error = "(perform_deliveries: \"yes\")"
            .parse::<TexterConfig>()
            .unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texter.config.ron");
        std::fs::write(&path, "(delivery_method: \"test\")").unwrap();

        let config = TexterConfig::from_file(&path).unwrap();
        assert_eq!(config.delivery_method.as_deref(), Some("test"));

        let error = TexterConfig::from_file(dir.path().join("missing.ron")).unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
