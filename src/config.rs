//! Configuration management for sfcd

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which bus the broker lives on
    pub bus: BusConfig,
    /// Broker daemon settings
    pub broker: BrokerConfig,
    /// Client-side dispatch settings
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Session or system bus
    pub kind: BusKind,
    /// Well-known name the broker owns
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolkitKind {
    /// Platform file dialog
    #[default]
    System,
    /// In-memory dialogs that never appear
    Headless,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Native toolkit the broker drives
    pub toolkit: ToolkitKind,
    /// Name of the thread running native dialogs
    pub ui_thread_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Remote when confined, local otherwise
    #[default]
    Auto,
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Local or brokered dialogs
    pub dispatch: DispatchMode,
    /// Retry a call once over a fresh connection when the broker drops
    pub reconnect: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::Session,
            name: "org.sfcd.FileChooser".to_string(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            toolkit: ToolkitKind::System,
            ui_thread_name: "sfcd-ui".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Auto,
            reconnect: true,
        }
    }
}

impl Config {
    /// Get default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sfcd")
            .join("config.toml")
    }

    /// Load configuration from file, falling back to defaults when it is missing
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.bus.kind, BusKind::Session);
        assert_eq!(config.bus.name, "org.sfcd.FileChooser");
        assert_eq!(config.broker.toolkit, ToolkitKind::System);
        assert_eq!(config.client.dispatch, DispatchMode::Auto);
        assert!(config.client.reconnect);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[bus]\nkind = \"system\"\n\n[broker]\ntoolkit = \"headless\"\n\n[client]\ndispatch = \"remote\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.bus.kind, BusKind::System);
        assert_eq!(config.bus.name, "org.sfcd.FileChooser");
        assert_eq!(config.broker.toolkit, ToolkitKind::Headless);
        assert_eq!(config.broker.ui_thread_name, "sfcd-ui");
        assert_eq!(config.client.dispatch, DispatchMode::Remote);
        assert!(config.client.reconnect);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[client]\ndispatch = \"sideways\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
