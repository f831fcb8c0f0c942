//! Manager configuration
//!
//! Loaded from YAML. Every field has a default so a partial (or empty) file
//! is valid.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::driver::joystick::DEFAULT_JOYSTICK_DEADZONE;

/// Which device backend the binary drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Scripted in-process pads
    #[default]
    Virtual,
    /// gilrs event backend (feature `gilrs`)
    Gilrs,
    /// XInput polled backend (feature `xinput`)
    Xinput,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "virtual" => Ok(Self::Virtual),
            "gilrs" => Ok(Self::Gilrs),
            "xinput" => Ok(Self::Xinput),
            other => Err(format!("unknown backend '{other}' (expected virtual, gilrs or xinput)")),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ManagerConfig {
    pub backend: BackendKind,
    /// Treat every device as a generic joystick
    pub force_joystick: bool,
    /// Serve the handheld's built-in controls through its daemon
    pub use_enhanced_deck_driver: bool,
    /// The handheld runs in gaming mode; its pad is rejected otherwise
    pub deck_gaming_mode: bool,
    /// Type namespaces that are never loaded (e.g. `razer_mouse`)
    pub denied_namespaces: Vec<String>,
    pub tick_rate_hz: u32,
    /// Per-controller config store; defaults to the app data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_store: Option<PathBuf>,
    /// Deadzone for every axis of a generic joystick
    pub default_joystick_deadzone: f32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            force_joystick: false,
            use_enhanced_deck_driver: true,
            deck_gaming_mode: false,
            denied_namespaces: Vec::new(),
            tick_rate_hz: 60,
            config_store: None,
            default_joystick_deadzone: DEFAULT_JOYSTICK_DEADZONE,
        }
    }
}

impl ManagerConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document parses as null
        let config: ManagerConfig = if contents.trim().is_empty() {
            ManagerConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            bail!("tick_rate_hz must be between 1 and 1000, got {}", self.tick_rate_hz);
        }
        if !(0.0..1.0).contains(&self.default_joystick_deadzone) {
            bail!(
                "default_joystick_deadzone must be in [0, 1), got {}",
                self.default_joystick_deadzone
            );
        }
        Ok(())
    }

    pub fn is_namespace_denied(&self, namespace: &str) -> bool {
        self.denied_namespaces.iter().any(|denied| denied == namespace)
    }

    /// JSON schema of the config file, for editor completion
    pub fn json_schema() -> Result<String> {
        let schema = schemars::schema_for!(ManagerConfig);
        serde_json::to_string_pretty(&schema).context("Failed to serialize config schema")
    }
}
