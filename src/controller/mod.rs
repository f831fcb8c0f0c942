//! Controller entities
//!
//! A [`ControllerEntity`] is one connected physical device: its immutable
//! identity, the capability components its drivers installed, and the driver
//! chain that keeps those components fed every tick.

pub mod battery;
pub mod component;
pub mod config;
pub mod gyro;
pub mod info;
pub mod input;
pub mod keyboard;
pub mod rumble;
pub mod touchpad;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::driver::{Driver, DriverError, DriverId};
use crate::hid::ControllerType;
use crate::manager::id::UniqueControllerId;

pub use battery::{BatteryComponent, PowerState};
pub use component::{Component, ComponentError, ComponentId, ComponentRegistry, TypedComponent};
pub use config::{Config, ConfigHolder, GenericConfigComponent, GenericControllerConfig};
pub use gyro::{GyroComponent, GyroConfig, GyroState};
pub use info::{ControllerInfo, DriverNameComponent, GuidComponent, UidComponent};
pub use input::{ControllerState, InputComponent, InputConfig, InputId};
pub use keyboard::NativeKeyboardComponent;
pub use rumble::{RumbleChannel, RumbleComponent, RumbleConfig, RumbleEffect, RumbleState};
pub use touchpad::{Finger, Touchpad, Touchpads};

/// Errors raised while building an entity
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Component(#[from] ComponentError),
}

pub struct ControllerEntity {
    info: ControllerInfo,
    components: ComponentRegistry,
    driver: Option<Box<dyn Driver>>,
    closed: bool,
}

impl ControllerEntity {
    /// Build an entity and let `driver` populate it
    ///
    /// The generic config is installed before the driver runs. If population or
    /// validation fails the driver is closed before the error is returned.
    pub fn create(info: ControllerInfo, mut driver: Box<dyn Driver>) -> Result<Self, EntityError> {
        let mut entity = Self {
            info,
            components: ComponentRegistry::new(),
            driver: None,
            closed: false,
        };
        entity.set_component(GenericConfigComponent::new());

        let populated = driver
            .add_components(&mut entity)
            .map_err(EntityError::from)
            .and_then(|()| entity.finalize_components().map_err(EntityError::from));

        if let Err(e) = populated {
            if let Err(close_err) = driver.close() {
                warn!("Failed to close driver after aborted creation: {}", close_err);
            }
            return Err(e);
        }

        debug!(
            "Created {} with components {:?} via {}",
            entity.info.id,
            entity.components,
            driver.name()
        );
        entity.driver = Some(driver);
        Ok(entity)
    }

    pub fn info(&self) -> &ControllerInfo {
        &self.info
    }

    pub fn id(&self) -> UniqueControllerId {
        self.info.id
    }

    pub fn controller_type(&self) -> &ControllerType {
        &self.info.controller_type
    }

    /// Insert or replace a component installed by the entity itself
    pub fn set_component<T: Component + 'static>(&mut self, component: T) {
        self.components.insert(None, Box::new(component));
    }

    /// Insert or replace a component on behalf of a driver
    pub fn set_component_from<T: Component + 'static>(&mut self, driver: DriverId, component: T) {
        self.components.insert(Some(driver), Box::new(component));
    }

    pub fn component<T: TypedComponent + 'static>(&self) -> Option<&T> {
        self.components.typed::<T>()
    }

    pub fn component_mut<T: TypedComponent + 'static>(&mut self) -> Option<&mut T> {
        self.components.typed_mut::<T>()
    }

    /// Mutable access only if `driver` installed the component
    pub fn owned_component_mut<T: TypedComponent + 'static>(&mut self, driver: DriverId) -> Option<&mut T> {
        self.components.owned_mut::<T>(driver)
    }

    pub fn get_component(&self, id: &ComponentId) -> Option<&dyn Component> {
        self.components.get(id)
    }

    pub fn has_component(&self, id: &ComponentId) -> bool {
        self.components.contains(id)
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Validate every component once the driver chain populated the entity
    pub fn finalize_components(&mut self) -> Result<(), ComponentError> {
        let mut result = Ok(());
        self.components.for_each_mut(|component| {
            if result.is_ok() {
                result = component.finalise();
            }
        });
        result
    }

    /// Run the driver chain, then close the frame on every component
    pub fn update(&mut self, out_of_focus: bool) {
        if self.closed {
            return;
        }

        if let Some(mut driver) = self.driver.take() {
            driver.update(self, out_of_focus);
            self.driver = Some(driver);
        }

        self.components.for_each_mut(|component| component.tick_finished());
    }

    /// Release driver resources; later calls are ignored
    pub fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            warn!("Controller {} closed twice", self.info.id);
            return Ok(());
        }
        self.closed = true;

        match self.driver.as_mut() {
            Some(driver) => driver.close(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Config documents of every config-bearing component, keyed by component id
    pub fn serialize_configs(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for id in self.components.ids() {
            let Some(holder) = self.components.get(&id).and_then(|c| c.config()) else {
                continue;
            };
            match holder.serialize() {
                Ok(value) => {
                    map.insert(id.to_string(), value);
                },
                Err(e) => warn!("Failed to serialize config {} for {}: {}", id, self.info.id, e),
            }
        }
        map
    }

    /// Apply config documents by component id
    ///
    /// Missing keys and malformed documents are logged and leave the component
    /// at its current config. Unknown keys are ignored. Returns how many
    /// components were updated.
    pub fn deserialize_configs(&mut self, configs: &Map<String, Value>) -> usize {
        let mut applied = 0;
        for id in self.components.ids() {
            let Some(holder) = self.components.get_mut(&id).and_then(|c| c.config_mut()) else {
                continue;
            };

            match configs.get(id.as_str()) {
                Some(value) => match holder.deserialize(value) {
                    Ok(()) => applied += 1,
                    Err(e) => warn!("Invalid config {} for {}: {}", id, self.info.id, e),
                },
                None => warn!("No config section {} for {}", id, self.info.id),
            }
        }
        applied
    }

    pub fn reset_to_default_config(&mut self) {
        self.components.for_each_mut(|component| {
            if let Some(holder) = component.config_mut() {
                holder.reset_to_default();
            }
        });
    }

    /// Nickname, then type name, then driver-reported name
    pub fn name(&self) -> String {
        let nickname = self
            .generic_config()
            .and_then(|c| c.nickname.as_deref())
            .filter(|n| !n.is_empty());
        let type_name = Some(self.info.controller_type.friendly_name.as_str()).filter(|n| !n.is_empty());
        let driver_name = self.driver_name().filter(|n| !n.is_empty());

        nickname
            .or(type_name)
            .or(driver_name)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Controller {}", self.info.id))
    }

    pub fn uid(&self) -> Option<&str> {
        self.component::<UidComponent>().map(|c| c.0.as_str())
    }

    pub fn guid(&self) -> Option<&str> {
        self.component::<GuidComponent>().map(|c| c.0.as_str())
    }

    pub fn driver_name(&self) -> Option<&str> {
        self.component::<DriverNameComponent>().map(|c| c.0.as_str())
    }

    pub fn generic_config(&self) -> Option<&GenericControllerConfig> {
        self.component::<GenericConfigComponent>().map(|c| &c.config.config)
    }

    pub fn generic_config_mut(&mut self) -> Option<&mut GenericControllerConfig> {
        self.component_mut::<GenericConfigComponent>().map(|c| &mut c.config.config)
    }

    pub fn input(&self) -> Option<&InputComponent> {
        self.component()
    }

    pub fn input_mut(&mut self) -> Option<&mut InputComponent> {
        self.component_mut()
    }

    pub fn gyro(&self) -> Option<&GyroComponent> {
        self.component()
    }

    pub fn rumble(&self) -> Option<&RumbleComponent> {
        self.component()
    }

    pub fn rumble_mut(&mut self) -> Option<&mut RumbleComponent> {
        self.component_mut()
    }

    pub fn touchpad(&self) -> Option<&Touchpads> {
        self.component()
    }

    pub fn battery(&self) -> Option<&BatteryComponent> {
        self.component()
    }

    pub fn keyboard(&self) -> Option<&NativeKeyboardComponent> {
        self.component()
    }

    /// One-line summary for logs
    pub fn describe(&self) -> String {
        format!(
            "{} ({}, {}, {})",
            self.name(),
            self.uid().unwrap_or("no uid"),
            self.info.controller_type.namespace,
            self.driver
                .as_ref()
                .map(|d| d.name())
                .unwrap_or_else(|| "no driver".to_string()),
        )
    }
}

impl std::fmt::Debug for ControllerEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerEntity")
            .field("id", &self.info.id)
            .field("components", &self.components)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
