//! Backend for sources that announce hot-plug through native events
//!
//! Native callbacks (possibly on other threads) push into an [`EventQueue`];
//! the manager's tick drains it completely before updating entities.

use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{BackendError, ControllerBackend, DeviceDescriptor, EventSource, HotplugEvent, SharedSource};
use crate::manager::id::UniqueControllerId;

/// Cloneable producer half of an [`EventQueue`]
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<HotplugEvent>,
}

impl EventSender {
    pub fn send(&self, event: HotplugEvent) {
        if self.tx.send(event).is_err() {
            warn!("Hot-plug event dropped, queue closed: {:?}", event);
        }
    }
}

/// Multi-producer queue of hot-plug events
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<HotplugEvent>,
    rx: Receiver<HotplugEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender { tx: self.tx.clone() }
    }

    pub fn push(&self, event: HotplugEvent) {
        // Both halves live in self, so the channel cannot be disconnected here
        let _ = self.tx.send(event);
    }

    /// Take every queued event in arrival order
    pub fn drain(&self) -> Vec<HotplugEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub struct QueuedBackend<S: EventSource + 'static> {
    source: Arc<Mutex<S>>,
    queue: EventQueue,
}

impl<S: EventSource + 'static> QueuedBackend<S> {
    pub fn new(source: Arc<Mutex<S>>) -> Self {
        Self {
            source,
            queue: EventQueue::new(),
        }
    }

    pub fn from_source(source: S) -> Self {
        Self::new(Arc::new(Mutex::new(source)))
    }

    pub fn inner(&self) -> Arc<Mutex<S>> {
        self.source.clone()
    }

    /// Producer handle for callbacks outside the source's pump
    pub fn sender(&self) -> EventSender {
        self.queue.sender()
    }
}

impl<S: EventSource + 'static> ControllerBackend for QueuedBackend<S> {
    fn name(&self) -> &'static str {
        self.source.lock().name()
    }

    fn enumerate(&mut self) -> Vec<UniqueControllerId> {
        // Connect events raised before discovery describe the same devices
        let mut source = self.source.lock();
        source.pump(&self.queue);
        let stale = self.queue.drain();
        if !stale.is_empty() {
            debug!("Discarded {} hot-plug events superseded by discovery", stale.len());
        }
        source.connected()
    }

    fn pump(&mut self) -> Vec<HotplugEvent> {
        self.source.lock().pump(&self.queue);
        self.queue.drain()
    }

    fn has_devices(&self) -> bool {
        !self.source.lock().connected().is_empty()
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
    fn test_queue_preserves_order_across_senders() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        let a = UniqueControllerId::queued("test", 1);
        let b = UniqueControllerId::queued("test", 2);

        sender.send(HotplugEvent::Connected(a));
        queue.push(HotplugEvent::Connected(b));
        std::thread::spawn(move || sender.send(HotplugEvent::Disconnected(a)))
            .join()
            .unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(
            queue.drain(),
            vec![
                HotplugEvent::Connected(a),
                HotplugEvent::Connected(b),
                HotplugEvent::Disconnected(a),
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pump_forwards_source_events() {
        let pads = Arc::new(Mutex::new(VirtualPads::new()));
        let mut backend = QueuedBackend::new(pads.clone());

        let key = pads.lock().connect(crate::backend::DeviceDescriptor::gamepad("Pad"));
        pads.lock().disconnect(key);

        let id = UniqueControllerId::queued("virtual", key);
        assert_eq!(
            backend.pump(),
            vec![HotplugEvent::Connected(id), HotplugEvent::Disconnected(id)]
        );
        assert!(backend.pump().is_empty());
    }

    #[test]
    fn test_enumerate_drops_pending_connects() {
        let pads = Arc::new(Mutex::new(VirtualPads::new()));
        pads.lock().connect(crate::backend::DeviceDescriptor::gamepad("Pad"));

        let mut backend = QueuedBackend::new(pads);
        assert_eq!(backend.enumerate().len(), 1);
        assert!(backend.pump().is_empty());
    }
}
