//! Controller lifecycle
//!
//! The manager discovers devices through a [`ControllerBackend`], decides
//! whether to accept them, builds each accepted device's driver chain and
//! owns the resulting entities. Everything happens on the caller's thread:
//! `tick` drains hot-plug events before it updates any entity, so the
//! connected maps are never touched concurrently.

pub mod events;
pub mod id;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, error, info, warn};

use crate::backend::{BackendError, ControllerBackend, DeviceKind, HotplugEvent};
use crate::config::ManagerConfig;
use crate::controller::{ControllerEntity, ControllerInfo, EntityError, UidComponent};
use crate::driver::deck::{DeckApiFactory, PollerSettings};
use crate::driver::{
    ComponentAdderDriver, CompoundDriver, DeckApi, DeckDriver, DeckError, Driver, GamepadDriver, JoystickDriver,
};
use crate::hid::{create_uid, ControllerTypeRegistry, HidIdentifier, HidInfo};
use crate::persistence::ControllerConfigStore;

pub use events::{ControllerEvent, ControllerListener};
pub use id::UniqueControllerId;

/// Builds an extra driver layered above the backend driver, if it applies
pub type DriverLayer = Box<dyn FnMut(UniqueControllerId, &HidInfo) -> Option<Box<dyn Driver>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The type table marks the model as not a controller
    DontLoad,
    DeniedNamespace(String),
    /// Handheld pads only load in gaming mode
    DeckNotInGamingMode,
    AlreadyRegistered,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DontLoad => write!(f, "type prevents loading"),
            Self::DeniedNamespace(ns) => write!(f, "namespace '{ns}' is denied"),
            Self::DeckNotInGamingMode => write!(f, "handheld is not in gaming mode"),
            Self::AlreadyRegistered => write!(f, "already registered"),
        }
    }
}

/// Context logged when creating a controller fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationDiagnostic {
    pub id: UniqueControllerId,
    pub controller_type: String,
    pub hid_path: Option<String>,
    /// Whether the device was matched by vendor/product
    pub hid_identified: bool,
    pub system_name: Option<String>,
    pub error: String,
}

impl fmt::Display for CreationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "controller {} (type: {}, HID path: {}, HID identified: {}, system name: {}): {}",
            self.id,
            self.controller_type,
            self.hid_path.as_deref().unwrap_or("N/A"),
            self.hid_identified,
            self.system_name.as_deref().unwrap_or("N/A"),
            self.error
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationResult {
    Created(String),
    Rejected(RejectReason),
    Failed(CreationDiagnostic),
}

impl CreationResult {
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Created(uid) => Some(uid),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CreationError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error("uid {0} is already connected")]
    DuplicateUid(String),
}

pub struct ControllerManager<B: ControllerBackend> {
    backend: B,
    config: ManagerConfig,
    types: ControllerTypeRegistry,

    by_id: HashMap<UniqueControllerId, String>,
    by_uid: BTreeMap<String, ControllerEntity>,
    hid_by_uid: HashMap<String, HidInfo>,

    deck_api: Option<DeckApiFactory>,
    deck_settings: PollerSettings,
    /// Set on the first deck driver attempt, successful or not
    deck_claimed: bool,

    layers: Vec<DriverLayer>,
    store: ControllerConfigStore,
    listeners: Vec<ControllerListener>,
}

impl<B: ControllerBackend> ControllerManager<B> {
    pub fn new(backend: B, config: ManagerConfig) -> Self {
        debug!("Controller manager using {} backend", backend.name());
        Self {
            backend,
            config,
            types: ControllerTypeRegistry::embedded().clone(),
            by_id: HashMap::new(),
            by_uid: BTreeMap::new(),
            hid_by_uid: HashMap::new(),
            deck_api: None,
            deck_settings: PollerSettings::default(),
            deck_claimed: false,
            layers: Vec::new(),
            store: ControllerConfigStore::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_type_registry(mut self, types: ControllerTypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn with_store(mut self, store: ControllerConfigStore) -> Self {
        self.store = store;
        self
    }

    /// How to reach the handheld daemon; without it the deck is served by the backend driver
    pub fn with_deck_api(
        mut self,
        factory: impl FnMut() -> Result<Box<dyn DeckApi>, DeckError> + 'static,
    ) -> Self {
        self.deck_api = Some(Box::new(factory));
        self
    }

    pub fn with_deck_poller_settings(mut self, settings: PollerSettings) -> Self {
        self.deck_settings = settings;
        self
    }

    /// Layer an extra driver above the backend driver of matching devices
    pub fn add_driver_layer(
        &mut self,
        layer: impl FnMut(UniqueControllerId, &HidInfo) -> Option<Box<dyn Driver>> + 'static,
    ) {
        self.layers.push(Box::new(layer));
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&ControllerEvent, &ControllerEntity) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &ControllerConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ControllerConfigStore {
        &mut self.store
    }

    /// Create controllers for every device present right now
    pub fn discover_controllers(&mut self) {
        debug!("Discovering controllers...");
        for id in self.backend.enumerate() {
            let hid_info = self.classify(id);
            if let CreationResult::Created(uid) = self.try_create(id, hid_info) {
                self.on_connected(&uid, false);
            }
        }
    }

    /// Process hot-plug, then update every controller
    pub fn tick(&mut self, out_of_focus: bool) {
        for event in self.backend.pump() {
            match event {
                HotplugEvent::Connected(id) => {
                    debug!("Device added: {}", id);
                    let hid_info = self.classify(id);
                    if let CreationResult::Created(uid) = self.try_create(id, hid_info) {
                        self.on_connected(&uid, true);
                    }
                },
                HotplugEvent::Disconnected(id) => {
                    debug!("Device removed: {}", id);
                    match self.by_id.get(&id).cloned() {
                        Some(uid) => self.on_removed(&uid),
                        None => warn!("Controller removed but not found: {}", id),
                    }
                },
            }
        }

        for (uid, entity) in self.by_uid.iter_mut() {
            entity.update(out_of_focus);
            let event = ControllerEvent::StateUpdated { uid: uid.clone() };
            events::emit(&mut self.listeners, &event, entity);
        }

        self.backend.finish_frame();
    }

    /// Identify a device by its vendor/product ids
    pub fn classify(&self, id: UniqueControllerId) -> HidInfo {
        let hid = match self.backend.describe(id) {
            Ok(descriptor) => descriptor.hid,
            Err(e) => {
                debug!("Could not describe {}: {}", id, e);
                None
            },
        };

        let controller_type = hid
            .as_ref()
            .and_then(|hid| hid.identifier)
            .map(|identifier| self.types.controller_type(identifier))
            .unwrap_or_default();
        HidInfo::new(controller_type, hid)
    }

    /// Guarded controller construction; never panics, failures are logged
    pub fn try_create(&mut self, id: UniqueControllerId, hid_info: HidInfo) -> CreationResult {
        if self.by_id.contains_key(&id) {
            warn!("Tried to create controller that is already initialised: {}", id);
            return CreationResult::Rejected(RejectReason::AlreadyRegistered);
        }

        let controller_type = &hid_info.controller_type;
        if controller_type.dont_load {
            debug!("Preventing load of controller {} because its type prevents loading", id);
            return CreationResult::Rejected(RejectReason::DontLoad);
        }
        if self.config.is_namespace_denied(&controller_type.namespace) {
            info!(
                "Preventing load of controller {} because namespace '{}' is denied",
                id, controller_type.namespace
            );
            return CreationResult::Rejected(RejectReason::DeniedNamespace(controller_type.namespace.clone()));
        }
        if controller_type.is_deck() && !self.config.deck_gaming_mode {
            info!("Preventing load of controller {} because the handheld is not in gaming mode", id);
            return CreationResult::Rejected(RejectReason::DeckNotInGamingMode);
        }

        match self.create_controller(id, &hid_info) {
            Ok(uid) => CreationResult::Created(uid),
            Err(CreationError::DuplicateUid(uid)) => {
                warn!("Controller {} resolved to uid {} which is already connected", id, uid);
                CreationResult::Rejected(RejectReason::AlreadyRegistered)
            },
            Err(e) => {
                let diagnostic = CreationDiagnostic {
                    id,
                    controller_type: hid_info.controller_type.namespace.clone(),
                    hid_path: hid_info.path().map(str::to_string),
                    hid_identified: hid_info.identifier().is_some(),
                    system_name: self.backend.system_name(id),
                    error: e.to_string(),
                };
                error!("Failed to create {}", diagnostic);
                CreationResult::Failed(diagnostic)
            },
        }
    }

    fn create_controller(&mut self, id: UniqueControllerId, hid_info: &HidInfo) -> Result<String, CreationError> {
        debug!("Creating controller: {}", id);
        let descriptor = self.backend.describe(id)?;
        let controller_type = &hid_info.controller_type;

        let is_gamepad = matches!(descriptor.kind, DeviceKind::Gamepad)
            && !self.config.force_joystick
            && !controller_type.force_joystick;
        debug!("Controller is gamepad: {}", is_gamepad);

        let mut drivers: Vec<Box<dyn Driver>> = Vec::new();

        if controller_type.is_deck() && self.config.use_enhanced_deck_driver && !self.deck_claimed {
            if let Some(factory) = self.deck_api.as_mut() {
                debug!("Controller {} is a deck candidate", id);
                self.deck_claimed = true;
                match factory() {
                    Ok(api) => {
                        let driver = DeckDriver::new(api, controller_type.mapping_id.clone())
                            .with_settings(self.deck_settings);
                        drivers.push(Box::new(driver));
                        debug!("Controller {} reserved for the deck driver", id);
                    },
                    Err(e) => error!("Failed to create deck driver: {}", e),
                }
            }
        }

        for layer in &mut self.layers {
            if let Some(driver) = layer(id, hid_info) {
                drivers.push(driver);
            }
        }

        let source = self.backend.source();
        if is_gamepad {
            drivers.push(Box::new(GamepadDriver::new(
                id,
                source,
                descriptor.clone(),
                controller_type.mapping_id.clone(),
            )));
        } else {
            drivers.push(Box::new(
                JoystickDriver::new(id, source, descriptor.clone())
                    .with_default_deadzone(self.config.default_joystick_deadzone),
            ));
        }

        let identifier = hid_info.identifier();
        let generated_uid = create_uid(identifier, identifier.map_or(0, |hid| self.count_matching_hid(hid)), id);
        let uid_for_adder = generated_uid.clone();
        drivers.push(Box::new(ComponentAdderDriver::new("UidAdder", move |entity, driver| {
            entity.set_component_from(driver, UidComponent(uid_for_adder.clone()));
            Ok(())
        })));

        let compound = CompoundDriver::new(drivers);
        debug!("Drivers: {}", compound.name());

        let info = ControllerInfo::new(id, controller_type.clone(), hid_info.hid.clone());
        let mut entity = ControllerEntity::create(info, Box::new(compound))?;

        let uid = entity.uid().map(str::to_string).unwrap_or(generated_uid);
        if self.by_uid.contains_key(&uid) {
            if let Err(e) = entity.close() {
                warn!("Failed to close duplicate controller {}: {}", id, e);
            }
            return Err(CreationError::DuplicateUid(uid));
        }

        self.by_id.insert(id, uid.clone());
        self.hid_by_uid.insert(uid.clone(), hid_info.clone());
        self.by_uid.insert(uid.clone(), entity);
        Ok(uid)
    }

    /// Connected controllers sharing a vendor/product pair
    fn count_matching_hid(&self, hid: HidIdentifier) -> usize {
        self.by_uid
            .values()
            .filter(|entity| {
                entity
                    .info()
                    .hid
                    .as_ref()
                    .and_then(|device| device.identifier)
                    == Some(hid)
            })
            .count()
    }

    fn on_connected(&mut self, uid: &str, hotplug: bool) {
        let Some(entity) = self.by_uid.get_mut(uid) else {
            return;
        };

        let new_controller = !self.store.apply(uid, entity);
        if new_controller {
            self.store.record(uid, entity);
        }

        info!("Controller connected: {}", entity.describe());
        let event = ControllerEvent::Connected {
            uid: uid.to_string(),
            hotplug,
            new_controller,
        };
        events::emit(&mut self.listeners, &event, entity);
    }

    fn on_removed(&mut self, uid: &str) {
        let Some(entity) = self.remove_controller(uid) else {
            return;
        };
        info!("Controller disconnected: {}", entity.describe());

        self.store.record(uid, &entity);
        let event = ControllerEvent::Disconnected { uid: uid.to_string() };
        events::emit(&mut self.listeners, &event, &entity);
    }

    fn remove_controller(&mut self, uid: &str) -> Option<ControllerEntity> {
        let mut entity = self.by_uid.remove(uid)?;

        if let Err(e) = entity.close() {
            error!("Failed to close controller {}: {}", uid, e);
        }
        self.by_id.remove(&entity.id());
        if self.hid_by_uid.remove(uid).is_some() {
            debug!("Released HID reservation of {}", uid);
        }
        Some(entity)
    }

    /// Tear down and rebuild a controller with a new classification
    ///
    /// Returns `None` if `uid` is not connected.
    pub fn reinit_controller(&mut self, uid: &str, hid_info: HidInfo) -> Option<CreationResult> {
        let id = self.by_uid.get(uid)?.id();
        self.on_removed(uid);

        let result = self.try_create(id, hid_info);
        if let CreationResult::Created(new_uid) = &result {
            self.on_connected(new_uid, true);
        }
        Some(result)
    }

    /// Close and forget a controller without emitting events
    pub fn close_controller(&mut self, uid: &str) -> bool {
        self.remove_controller(uid).is_some()
    }

    /// Connected controllers in uid order
    pub fn connected_controllers(&self) -> impl Iterator<Item = &ControllerEntity> {
        self.by_uid.values()
    }

    pub fn controller_count(&self) -> usize {
        self.by_uid.len()
    }

    pub fn controller(&self, uid: &str) -> Option<&ControllerEntity> {
        self.by_uid.get(uid)
    }

    pub fn controller_mut(&mut self, uid: &str) -> Option<&mut ControllerEntity> {
        self.by_uid.get_mut(uid)
    }

    pub fn controller_by_id(&self, id: UniqueControllerId) -> Option<&ControllerEntity> {
        self.by_id.get(&id).and_then(|uid| self.by_uid.get(uid))
    }

    pub fn is_controller_connected(&self, uid: &str) -> bool {
        self.by_uid.contains_key(uid)
    }

    /// Classification the controller was created with
    pub fn hid_info(&self, uid: &str) -> Option<&HidInfo> {
        self.hid_by_uid.get(uid)
    }

    /// Whether the backend sees any device, connected to the manager or not
    pub fn probe_connected_controllers(&self) -> bool {
        self.backend.has_devices()
    }

    pub fn is_deck_claimed(&self) -> bool {
        self.deck_claimed
    }

    /// Close every controller, saving their configs into the store
    pub fn close(&mut self) {
        let uids: Vec<String> = self.by_uid.keys().cloned().collect();
        for uid in uids {
            if let Some(entity) = self.remove_controller(&uid) {
                self.store.record(&uid, &entity);
            }
        }
        debug!("Controller manager closed");
    }
}
