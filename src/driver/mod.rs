//! Drivers populate controller entities and feed them every tick
//!
//! A controller's drivers are composed into one [`CompoundDriver`]. Components
//! are added in reverse list order so drivers earlier in the list (the more
//! specialized ones) install last and win; updates and closing run in list
//! order.

pub mod deck;
pub mod gamepad;
pub mod joystick;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, trace, warn};

use crate::backend::BackendError;
use crate::controller::ControllerEntity;
use crate::manager::id::UniqueControllerId;

pub use deck::{DeckApi, DeckDriver, DeckError, DeckReport};
pub use gamepad::GamepadDriver;
pub use joystick::JoystickDriver;

/// Identity of a driver instance, used to tag the components it installs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId(u64);

static NEXT_DRIVER_ID: AtomicU64 = AtomicU64::new(1);

impl DriverId {
    pub fn next() -> Self {
        Self(NEXT_DRIVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "driver#{}", self.0)
    }
}

/// Consecutive failed reads before a driver logs at warn level
pub const READ_FAILURE_WARN_AFTER: u32 = 60;

/// Streak of failed device reads; warns once per streak
#[derive(Debug, Default)]
pub struct ReadFailures {
    streak: u32,
}

impl ReadFailures {
    /// Pass a read result through, counting failures
    pub fn observe<T>(&mut self, device: UniqueControllerId, result: Result<T, BackendError>) -> Option<T> {
        match result {
            Ok(value) => {
                if self.streak > 0 {
                    debug!("{} recovered after {} failed reads", device, self.streak);
                }
                self.streak = 0;
                Some(value)
            },
            Err(e) => {
                self.streak += 1;
                if self.streak == READ_FAILURE_WARN_AFTER {
                    warn!("{} has failed {} reads in a row: {}", device, self.streak, e);
                } else {
                    trace!("Read failed on {}: {}", device, e);
                }
                None
            },
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error("driver {driver} failed: {message}")]
    Failed { driver: String, message: String },
}

impl DriverError {
    pub fn failed(driver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            driver: driver.into(),
            message: message.into(),
        }
    }
}

pub trait Driver {
    fn id(&self) -> DriverId;

    /// Short name for diagnostics
    fn name(&self) -> String;

    /// Install this driver's components on a freshly created entity
    fn add_components(&mut self, _entity: &mut ControllerEntity) -> Result<(), DriverError> {
        Ok(())
    }

    /// Push this tick's samples into owned components; must not block
    fn update(&mut self, _entity: &mut ControllerEntity, _out_of_focus: bool) {}

    /// Release native resources
    fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Ordered composition of drivers, treated as one
pub struct CompoundDriver {
    id: DriverId,
    drivers: Vec<Box<dyn Driver>>,
}

impl CompoundDriver {
    pub fn new(drivers: Vec<Box<dyn Driver>>) -> Self {
        Self {
            id: DriverId::next(),
            drivers,
        }
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl Driver for CompoundDriver {
    fn id(&self) -> DriverId {
        self.id
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.drivers.iter().map(|d| d.name()).collect();
        format!("CompoundDriver{{{}}}", names.join(","))
    }

    fn add_components(&mut self, entity: &mut ControllerEntity) -> Result<(), DriverError> {
        for driver in self.drivers.iter_mut().rev() {
            debug!("{} adding components", driver.name());
            driver.add_components(entity)?;
        }
        Ok(())
    }

    fn update(&mut self, entity: &mut ControllerEntity, out_of_focus: bool) {
        for driver in &mut self.drivers {
            driver.update(entity, out_of_focus);
        }
    }

    /// Close every sub-driver, returning the first failure
    fn close(&mut self) -> Result<(), DriverError> {
        let mut first_error = None;
        for driver in &mut self.drivers {
            if let Err(e) = driver.close() {
                error!("Failed to close {}: {}", driver.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

type ComponentAdder = Box<dyn FnMut(&mut ControllerEntity, DriverId) -> Result<(), DriverError>>;

/// Driver that only installs components, built from a closure
pub struct ComponentAdderDriver {
    id: DriverId,
    name: String,
    adder: ComponentAdder,
}

impl ComponentAdderDriver {
    pub fn new(
        name: impl Into<String>,
        adder: impl FnMut(&mut ControllerEntity, DriverId) -> Result<(), DriverError> + 'static,
    ) -> Self {
        Self {
            id: DriverId::next(),
            name: name.into(),
            adder: Box::new(adder),
        }
    }
}

impl Driver for ComponentAdderDriver {
    fn id(&self) -> DriverId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn add_components(&mut self, entity: &mut ControllerEntity) -> Result<(), DriverError> {
        (self.adder)(entity, self.id)
    }
}
