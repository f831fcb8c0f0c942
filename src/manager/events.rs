//! Lifecycle notifications for code outside the core

use crate::controller::ControllerEntity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// `hotplug` is false for controllers found during discovery;
    /// `new_controller` is true when no saved config existed for the uid
    Connected {
        uid: String,
        hotplug: bool,
        new_controller: bool,
    },
    Disconnected {
        uid: String,
    },
    /// Emitted after every tick's update of the controller
    StateUpdated {
        uid: String,
    },
}

impl ControllerEvent {
    pub fn uid(&self) -> &str {
        match self {
            Self::Connected { uid, .. } | Self::Disconnected { uid } | Self::StateUpdated { uid } => uid,
        }
    }
}

/// Receives every event with the controller it concerns
///
/// For `Disconnected` the entity is already closed.
pub type ControllerListener = Box<dyn FnMut(&ControllerEvent, &ControllerEntity)>;

pub(crate) fn emit(listeners: &mut [ControllerListener], event: &ControllerEvent, entity: &ControllerEntity) {
    for listener in listeners.iter_mut() {
        listener(event, entity);
    }
}
