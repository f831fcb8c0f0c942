//! Per-capability controller settings
//!
//! Each config-bearing component keeps a live config next to the default it was
//! created with, so it can be reset or diffed. Configs are exchanged with the
//! outside world as `serde_json::Value` documents keyed by component id.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::component::{Component, ComponentId, TypedComponent};

/// Range checks a settings document must pass before it goes live
pub trait ConfigRules {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Object-safe view of a component's serializable settings
pub trait ConfigHolder {
    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Replace the live config with the document's contents
    ///
    /// Documents failing [`ConfigRules::validate`] are rejected. On error the
    /// live config is left untouched.
    fn deserialize(&mut self, value: &serde_json::Value) -> Result<(), serde_json::Error>;

    fn reset_to_default(&mut self);

    fn is_default(&self) -> bool;
}

/// Live config paired with its default
#[derive(Debug, Clone, PartialEq)]
pub struct Config<T> {
    pub config: T,
    pub default: T,
}

impl<T: Clone> Config<T> {
    pub fn new(default: T) -> Self {
        Self {
            config: default.clone(),
            default,
        }
    }
}

impl<T> ConfigHolder for Config<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + ConfigRules,
{
    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.config)
    }

    fn deserialize(&mut self, value: &serde_json::Value) -> Result<(), serde_json::Error> {
        let config: T = serde_json::from_value(value.clone())?;
        config.validate().map_err(serde::de::Error::custom)?;
        self.config = config;
        Ok(())
    }

    fn reset_to_default(&mut self) {
        self.config = self.default.clone();
    }

    fn is_default(&self) -> bool {
        self.config == self.default
    }
}

/// Settings every controller has, regardless of its drivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericControllerConfig {
    /// User-chosen display name
    pub nickname: Option<String>,
    /// Controller is ignored by gameplay bindings when disabled
    pub disabled: bool,
    /// Show button guides on screen while this controller is active
    pub show_screen_guides: bool,
    /// Ticks of inactivity before the controller is considered idle
    pub idle_timeout_ticks: u32,
}

impl Default for GenericControllerConfig {
    fn default() -> Self {
        Self {
            nickname: None,
            disabled: false,
            show_screen_guides: true,
            idle_timeout_ticks: 20 * 60,
        }
    }
}

impl ConfigRules for GenericControllerConfig {}

/// Component wrapper for [`GenericControllerConfig`]
#[derive(Debug, Clone)]
pub struct GenericConfigComponent {
    pub config: Config<GenericControllerConfig>,
}

impl GenericConfigComponent {
    pub fn new() -> Self {
        Self {
            config: Config::new(GenericControllerConfig::default()),
        }
    }
}

impl Default for GenericConfigComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for GenericConfigComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }

    fn config(&self) -> Option<&dyn ConfigHolder> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigHolder> {
        Some(&mut self.config)
    }
}

impl TypedComponent for GenericConfigComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:config/generic");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let mut config = Config::new(GenericControllerConfig::default());
        config.deserialize(&json!({ "nickname": "Player Two" })).unwrap();

        assert_eq!(config.config.nickname.as_deref(), Some("Player Two"));
        assert!(config.config.show_screen_guides);
        assert!(!config.is_default());

        config.reset_to_default();
        assert!(config.is_default());
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Percent(u8);

    impl ConfigRules for Percent {
        fn validate(&self) -> Result<(), String> {
            if self.0 > 100 {
                return Err(format!("{} is over 100", self.0));
            }
            Ok(())
        }
    }

    #[test]
    fn test_rule_violation_keeps_previous_config() {
        let mut config = Config::new(Percent(40));
        config.deserialize(&json!(75)).unwrap();
        assert_eq!(config.config, Percent(75));

        let err = config.deserialize(&json!(250)).unwrap_err();
        assert!(err.to_string().contains("250 is over 100"));
        assert_eq!(config.config, Percent(75));
    }

    #[test]
    fn test_bad_document_keeps_previous_config() {
        let mut config = Config::new(GenericControllerConfig::default());
        config.config.disabled = true;

        assert!(config.deserialize(&json!({ "disabled": "yes" })).is_err());
        assert!(config.config.disabled);
    }
}
