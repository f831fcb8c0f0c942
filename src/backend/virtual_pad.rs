//! Scriptable in-process devices
//!
//! `VirtualPads` behaves as both a polled and an event source: every pad is a
//! slot for polling and an instance for events. Keys are never reused, so a
//! reconnect always looks like a new device. Used by the demo binary and tests.

use std::collections::BTreeMap;

use tracing::debug;

use super::{
    BackendError, DeviceDescriptor, DeviceSource, EventQueue, EventSource, HotplugEvent, PollSource, RawReport,
};
use crate::controller::{RumbleChannel, RumbleState};
use crate::manager::id::UniqueControllerId;

pub const VIRTUAL_SOURCE: &str = "virtual";

#[derive(Debug)]
struct VirtualPad {
    descriptor: DeviceDescriptor,
    report: RawReport,
    fail_reads: bool,
    /// Upcoming rumble writes that fail
    failing_rumble: u32,
    rumble: Vec<(RumbleChannel, RumbleState)>,
}

#[derive(Debug, Default)]
pub struct VirtualPads {
    pads: BTreeMap<u64, VirtualPad>,
    next_key: u64,
    pending: Vec<HotplugEvent>,
}

impl VirtualPads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in a pad; returns its key (slot and instance id)
    pub fn connect(&mut self, descriptor: DeviceDescriptor) -> u64 {
        let key = self.next_key;
        self.next_key += 1;

        let report = match descriptor.kind {
            super::DeviceKind::Gamepad => RawReport::gamepad(),
            super::DeviceKind::Joystick { buttons, axes, hats } => RawReport::joystick(buttons, axes, hats),
        };

        debug!("Virtual pad {} connected: {}", key, descriptor.name);
        self.pads.insert(
            key,
            VirtualPad {
                descriptor,
                report,
                fail_reads: false,
                failing_rumble: 0,
                rumble: Vec::new(),
            },
        );
        self.pending
            .push(HotplugEvent::Connected(UniqueControllerId::queued(VIRTUAL_SOURCE, key)));
        key
    }

    /// Unplug a pad; returns `false` if it was not connected
    pub fn disconnect(&mut self, key: u64) -> bool {
        if self.pads.remove(&key).is_none() {
            return false;
        }
        debug!("Virtual pad {} disconnected", key);
        self.pending
            .push(HotplugEvent::Disconnected(UniqueControllerId::queued(VIRTUAL_SOURCE, key)));
        true
    }

    pub fn is_connected(&self, key: u64) -> bool {
        self.pads.contains_key(&key)
    }

    pub fn set_report(&mut self, key: u64, report: RawReport) -> bool {
        self.pads
            .get_mut(&key)
            .map(|pad| pad.report = report)
            .is_some()
    }

    pub fn update_report(&mut self, key: u64, f: impl FnOnce(&mut RawReport)) -> bool {
        self.pads.get_mut(&key).map(|pad| f(&mut pad.report)).is_some()
    }

    /// Make reads fail with a native error, simulating a flaky device
    pub fn set_fail_reads(&mut self, key: u64, fail: bool) {
        if let Some(pad) = self.pads.get_mut(&key) {
            pad.fail_reads = fail;
        }
    }

    /// Make the next `count` rumble writes fail; failed writes are not logged
    pub fn fail_next_rumble(&mut self, key: u64, count: u32) {
        if let Some(pad) = self.pads.get_mut(&key) {
            pad.failing_rumble = count;
        }
    }

    /// Rumble commands the pad received, oldest first
    pub fn rumble_log(&self, key: u64) -> Vec<(RumbleChannel, RumbleState)> {
        self.pads
            .get(&key)
            .map(|pad| pad.rumble.clone())
            .unwrap_or_default()
    }

    fn key(&self, id: UniqueControllerId) -> Result<u64, BackendError> {
        match id {
            UniqueControllerId::Polled { source, slot } if source == VIRTUAL_SOURCE => Ok(slot as u64),
            UniqueControllerId::Queued { source, instance } if source == VIRTUAL_SOURCE => Ok(instance),
            other => Err(BackendError::UnknownDevice(other)),
        }
    }

    fn pad_mut(&mut self, id: UniqueControllerId) -> Result<&mut VirtualPad, BackendError> {
        let key = self.key(id)?;
        self.pads.get_mut(&key).ok_or(BackendError::Disconnected(id))
    }
}

impl DeviceSource for VirtualPads {
    fn name(&self) -> &'static str {
        VIRTUAL_SOURCE
    }

    fn describe(&self, id: UniqueControllerId) -> Result<DeviceDescriptor, BackendError> {
        let key = self.key(id)?;
        self.pads
            .get(&key)
            .map(|pad| pad.descriptor.clone())
            .ok_or(BackendError::Disconnected(id))
    }

    fn read(&mut self, id: UniqueControllerId) -> Result<RawReport, BackendError> {
        let pad = self.pad_mut(id)?;
        if pad.fail_reads {
            return Err(BackendError::Native(format!("read failed for {id}")));
        }
        Ok(pad.report.clone())
    }

    fn set_rumble(
        &mut self,
        id: UniqueControllerId,
        channel: RumbleChannel,
        state: RumbleState,
    ) -> Result<(), BackendError> {
        let pad = self.pad_mut(id)?;
        if pad.failing_rumble > 0 {
            pad.failing_rumble -= 1;
            return Err(BackendError::Native(format!("rumble write failed for {id}")));
        }
        pad.rumble.push((channel, state));
        Ok(())
    }
}

impl PollSource for VirtualPads {
    fn present(&mut self) -> Vec<usize> {
        // Hot-plug notifications are only meaningful to event consumers
        self.pending.clear();
        self.pads.keys().map(|key| *key as usize).collect()
    }
}

impl EventSource for VirtualPads {
    fn pump(&mut self, queue: &EventQueue) {
        for event in self.pending.drain(..) {
            queue.push(event);
        }
    }

    fn connected(&self) -> Vec<UniqueControllerId> {
        self.pads
            .keys()
            .map(|key| UniqueControllerId::queued(VIRTUAL_SOURCE, *key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GamepadButton;

    #[test]
    fn test_reads_follow_scripted_report() {
        let mut pads = VirtualPads::new();
        let key = pads.connect(DeviceDescriptor::gamepad("Pad"));
        let id = UniqueControllerId::polled(VIRTUAL_SOURCE, key as usize);

        pads.update_report(key, |r| r.set_button(GamepadButton::South, true));
        assert!(pads.read(id).unwrap().button(GamepadButton::South));

        pads.set_fail_reads(key, true);
        assert!(matches!(pads.read(id), Err(BackendError::Native(_))));
    }

    #[test]
    fn test_foreign_and_missing_ids() {
        let mut pads = VirtualPads::new();
        let key = pads.connect(DeviceDescriptor::gamepad("Pad"));

        assert!(matches!(
            pads.read(UniqueControllerId::polled("xinput", 0)),
            Err(BackendError::UnknownDevice(_))
        ));

        pads.disconnect(key);
        assert!(matches!(
            pads.describe(UniqueControllerId::queued(VIRTUAL_SOURCE, key)),
            Err(BackendError::Disconnected(_))
        ));
        assert!(!pads.disconnect(key));
    }

    #[test]
    fn test_keys_are_not_reused() {
        let mut pads = VirtualPads::new();
        let first = pads.connect(DeviceDescriptor::gamepad("Pad"));
        pads.disconnect(first);
        assert_ne!(pads.connect(DeviceDescriptor::gamepad("Pad")), first);
    }
}
