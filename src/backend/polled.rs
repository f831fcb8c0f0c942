//! Backend for sources without native hot-plug events

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{BackendError, ControllerBackend, DeviceDescriptor, HotplugEvent, PollSource, SharedSource};
use crate::manager::id::UniqueControllerId;

/// Synthesizes connect/disconnect events by diffing occupied slots each pump
pub struct PolledBackend<S: PollSource + 'static> {
    source: Arc<Mutex<S>>,
    known: BTreeSet<usize>,
}

impl<S: PollSource + 'static> PolledBackend<S> {
    pub fn new(source: Arc<Mutex<S>>) -> Self {
        Self {
            source,
            known: BTreeSet::new(),
        }
    }

    pub fn from_source(source: S) -> Self {
        Self::new(Arc::new(Mutex::new(source)))
    }

    /// Typed handle to the underlying source
    pub fn inner(&self) -> Arc<Mutex<S>> {
        self.source.clone()
    }
}

impl<S: PollSource + 'static> ControllerBackend for PolledBackend<S> {
    fn name(&self) -> &'static str {
        self.source.lock().name()
    }

    fn enumerate(&mut self) -> Vec<UniqueControllerId> {
        let (name, present) = {
            let mut source = self.source.lock();
            (source.name(), source.present())
        };
        // Discovery counts as seen so the next pump does not re-announce them
        self.known.extend(present.iter().copied());
        present.into_iter().map(|slot| UniqueControllerId::polled(name, slot)).collect()
    }

    fn pump(&mut self) -> Vec<HotplugEvent> {
        let (name, present) = {
            let mut source = self.source.lock();
            let name = source.name();
            (name, source.present().into_iter().collect::<BTreeSet<_>>())
        };

        let mut events = Vec::new();
        for slot in self.known.difference(&present) {
            debug!("{} slot {} vacated", name, slot);
            events.push(HotplugEvent::Disconnected(UniqueControllerId::polled(name, *slot)));
        }
        for slot in present.difference(&self.known) {
            debug!("{} slot {} occupied", name, slot);
            events.push(HotplugEvent::Connected(UniqueControllerId::polled(name, *slot)));
        }

        self.known = present;
        events
    }

    fn has_devices(&self) -> bool {
        !self.source.lock().present().is_empty()
    }

    fn describe(&self, id: UniqueControllerId) -> Result<DeviceDescriptor, BackendError> {
        self.source.lock().describe(id)
    }

    fn source(&self) -> SharedSource {
        self.source.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VirtualPads;

    #[test]
    fn test_pump_diffs_slots() {
        let pads = Arc::new(Mutex::new(VirtualPads::new()));
        let mut backend = PolledBackend::new(pads.clone());
        assert!(backend.pump().is_empty());

        let slot = pads.lock().connect(DeviceDescriptor::gamepad("Pad"));
        let events = backend.pump();
        assert_eq!(events, vec![HotplugEvent::Connected(UniqueControllerId::polled("virtual", slot as usize))]);
        assert!(backend.pump().is_empty());

        pads.lock().disconnect(slot);
        assert_eq!(
            backend.pump(),
            vec![HotplugEvent::Disconnected(UniqueControllerId::polled("virtual", slot as usize))]
        );
    }

    #[test]
    fn test_enumerate_suppresses_duplicate_connect() {
        let pads = Arc::new(Mutex::new(VirtualPads::new()));
        pads.lock().connect(DeviceDescriptor::gamepad("Pad"));

        let mut backend = PolledBackend::new(pads);
        assert_eq!(backend.enumerate().len(), 1);
        assert!(backend.pump().is_empty());
    }
}
