//! Capability components and the keyed registry that holds them
//!
//! Every capability of a controller (inputs, gyro, rumble, ...) is a component
//! stored under a [`ComponentId`]. Lookups are typed: asking for a component
//! that is missing, or stored under the id with a different concrete type,
//! yields `None` rather than an error.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use super::config::ConfigHolder;
use crate::driver::DriverId;

/// Capability identifier, e.g. `controlhub:input`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Cow<'static, str>);

impl ComponentId {
    /// Create an id from a static string (usable in `const` position)
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// Create an id from an owned string
    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while validating components
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("component {component} has no deadzone for group '{group}'")]
    MissingDeadzone { component: ComponentId, group: String },

    #[error("component {component} is invalid: {message}")]
    Invalid {
        component: ComponentId,
        message: String,
    },
}

/// Object-safe access to `Any` for downcasting stored components
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A capability attached to a controller entity
pub trait Component: AsAny + Send {
    /// Registry key of this component
    fn id(&self) -> ComponentId;

    /// Validate cross-component invariants once every driver has populated the entity
    fn finalise(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called by the entity after its driver chain finished updating for this tick
    fn tick_finished(&mut self) {}

    /// Serializable settings carried by this component, if any
    fn config(&self) -> Option<&dyn ConfigHolder> {
        None
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigHolder> {
        None
    }
}

/// A component type with a fixed registry key
pub trait TypedComponent: Component + Sized {
    const ID: ComponentId;
}

struct ComponentSlot {
    /// Driver that installed the component (`None` for entity-installed components)
    owner: Option<DriverId>,
    component: Box<dyn Component>,
}

/// Keyed bag of components; at most one component per id
#[derive(Default)]
pub struct ComponentRegistry {
    slots: HashMap<ComponentId, ComponentSlot>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the component stored under its id
    pub fn insert(&mut self, owner: Option<DriverId>, component: Box<dyn Component>) {
        let id = component.id();
        self.slots.insert(id, ComponentSlot { owner, component });
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn get(&self, id: &ComponentId) -> Option<&dyn Component> {
        self.slots.get(id).map(|slot| slot.component.as_ref())
    }

    pub fn get_mut(&mut self, id: &ComponentId) -> Option<&mut (dyn Component + 'static)> {
        self.slots.get_mut(id).map(|slot| slot.component.as_mut())
    }

    pub fn typed<T: TypedComponent + 'static>(&self) -> Option<&T> {
        self.slots
            .get(&T::ID)
            .and_then(|slot| slot.component.as_ref().as_any().downcast_ref::<T>())
    }

    pub fn typed_mut<T: TypedComponent + 'static>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&T::ID)
            .and_then(|slot| slot.component.as_mut().as_any_mut().downcast_mut::<T>())
    }

    /// Mutable access restricted to the driver that installed the component
    pub fn owned_mut<T: TypedComponent + 'static>(&mut self, owner: DriverId) -> Option<&mut T> {
        self.slots
            .get_mut(&T::ID)
            .filter(|slot| slot.owner == Some(owner))
            .and_then(|slot| slot.component.as_mut().as_any_mut().downcast_mut::<T>())
    }

    pub fn owner_of(&self, id: &ComponentId) -> Option<DriverId> {
        self.slots.get(id).and_then(|slot| slot.owner)
    }

    /// Component ids in sorted order
    pub fn ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<_> = self.slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut dyn Component)) {
        for slot in self.slots.values_mut() {
            f(slot.component.as_mut());
        }
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(u32);

    impl Component for Marker {
        fn id(&self) -> ComponentId {
            Self::ID
        }
    }

    impl TypedComponent for Marker {
        const ID: ComponentId = ComponentId::from_static("test:marker");
    }

    struct Imposter;

    impl Component for Imposter {
        fn id(&self) -> ComponentId {
            Marker::ID
        }
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut registry = ComponentRegistry::new();
        registry.insert(None, Box::new(Marker(1)));
        registry.insert(None, Box::new(Marker(2)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.typed::<Marker>().unwrap().0, 2);
    }

    #[test]
    fn test_type_mismatch_is_absent() {
        let mut registry = ComponentRegistry::new();
        registry.insert(None, Box::new(Imposter));

        assert!(registry.contains(&Marker::ID));
        assert!(registry.typed::<Marker>().is_none());
    }

    #[test]
    fn test_owned_access_checks_installer() {
        let first = DriverId::next();
        let second = DriverId::next();

        let mut registry = ComponentRegistry::new();
        registry.insert(Some(first), Box::new(Marker(1)));
        assert!(registry.owned_mut::<Marker>(first).is_some());

        registry.insert(Some(second), Box::new(Marker(2)));
        assert!(registry.owned_mut::<Marker>(first).is_none());
        assert_eq!(registry.owned_mut::<Marker>(second).unwrap().0, 2);
        assert_eq!(registry.owner_of(&Marker::ID), Some(second));
    }
}
