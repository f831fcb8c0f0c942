//! controlhub - controller discovery, driver composition and input normalization
//!
//! A [`manager::ControllerManager`] watches a device [`backend`], classifies
//! each device through the [`hid`] type table, and builds a
//! [`controller::ControllerEntity`] whose capability components are filled
//! by a chain of [`driver`]s. Game code reads normalized state through the
//! entity accessors or resolves it with [`binding`].

pub mod backend;
pub mod binding;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod driver;
pub mod hid;
pub mod manager;
pub mod paths;
pub mod persistence;

pub use config::{BackendKind, ManagerConfig};
pub use controller::ControllerEntity;
pub use manager::{ControllerEvent, ControllerManager, CreationResult};
