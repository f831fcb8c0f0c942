//! Identity components: uid, hardware GUID and driver-reported name

use super::component::{Component, ComponentId, TypedComponent};
use crate::hid::{ControllerType, HidDevice};
use crate::manager::id::UniqueControllerId;

/// Immutable identity of a device, fixed at creation
#[derive(Debug, Clone)]
pub struct ControllerInfo {
    pub id: UniqueControllerId,
    pub controller_type: ControllerType,
    pub hid: Option<HidDevice>,
}

impl ControllerInfo {
    pub fn new(id: UniqueControllerId, controller_type: ControllerType, hid: Option<HidDevice>) -> Self {
        Self {
            id,
            controller_type,
            hid,
        }
    }
}

/// Stable per-device identifier used as the config key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidComponent(pub String);

impl Component for UidComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }
}

impl TypedComponent for UidComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:uid");
}

/// Hardware GUID as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidComponent(pub String);

impl Component for GuidComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }
}

impl TypedComponent for GuidComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:guid");
}

/// Device name as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverNameComponent(pub String);

impl Component for DriverNameComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }
}

impl TypedComponent for DriverNameComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:driver_name");
}
