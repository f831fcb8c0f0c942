use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::backend::{DeviceDescriptor, GamepadAxis, PolledBackend, QueuedBackend, VirtualPads};
use crate::controller::input::GamepadInputs;
use crate::controller::PowerState;
use crate::driver::deck::{deck_uid, DeckReport, DECK_DRIVER_NAME};
use crate::driver::DriverError;
use crate::hid::{HidDevice, HidIdentifier};

type Pads = Arc<Mutex<VirtualPads>>;

const DUALSENSE: HidIdentifier = HidIdentifier::new(0x054C, 0x0CE6);
const DECK: HidIdentifier = HidIdentifier::new(0x28DE, 0x1205);
const RAZER_MOUSE: HidIdentifier = HidIdentifier::new(0x1532, 0x0037);
const T16000M: HidIdentifier = HidIdentifier::new(0x044F, 0xB10A);

fn dualsense() -> DeviceDescriptor {
    DeviceDescriptor::gamepad("DualSense Wireless Controller")
        .with_hid(HidDevice::new(DUALSENSE).with_path("/dev/hidraw3"))
        .with_guid("030000004c050000e60c000000016800")
        .with_gyro()
        .with_battery()
        .with_touchpad(2)
}

fn pad_with(name: &str, hid: HidIdentifier) -> DeviceDescriptor {
    DeviceDescriptor::gamepad(name).with_hid(HidDevice::new(hid))
}

fn polled(pads: Pads) -> PolledBackend<VirtualPads> {
    PolledBackend::new(pads)
}

fn queued(pads: Pads) -> QueuedBackend<VirtualPads> {
    QueuedBackend::new(pads)
}

fn manager_with<B: ControllerBackend>(
    make: fn(Pads) -> B,
    config: ManagerConfig,
) -> (Pads, ControllerManager<B>) {
    let pads: Pads = Arc::new(Mutex::new(VirtualPads::new()));
    let manager = ControllerManager::new(make(pads.clone()), config);
    (pads, manager)
}

fn record_events<B: ControllerBackend>(manager: &mut ControllerManager<B>) -> Rc<RefCell<Vec<ControllerEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    manager.add_listener(move |event, _| sink.borrow_mut().push(event.clone()));
    events
}

fn lifecycle_events(events: &RefCell<Vec<ControllerEvent>>) -> Vec<ControllerEvent> {
    events
        .borrow()
        .iter()
        .filter(|e| !matches!(e, ControllerEvent::StateUpdated { .. }))
        .cloned()
        .collect()
}

fn only_uid<B: ControllerBackend>(manager: &ControllerManager<B>) -> String {
    let uids: Vec<String> = manager
        .connected_controllers()
        .filter_map(|c| c.uid().map(str::to_string))
        .collect();
    assert_eq!(uids.len(), 1, "expected exactly one controller, got {uids:?}");
    uids[0].clone()
}

/// Deck daemon that always reports an idle handheld
struct IdleDeck;

impl DeckApi for IdleDeck {
    fn poll(&mut self, _timeout: Duration) -> Result<DeckReport, DeckError> {
        std::thread::sleep(Duration::from_millis(2));
        Ok(DeckReport::default())
    }
}

fn hotplug_lifecycle<B: ControllerBackend>(make: fn(Pads) -> B) {
    let (pads, mut manager) = manager_with(make, ManagerConfig::default());
    let events = record_events(&mut manager);

    let key = pads.lock().connect(dualsense());
    manager.discover_controllers();

    let uid = only_uid(&manager);
    assert_eq!(uid.len(), 32);
    assert!(uid.chars().all(|c| c.is_ascii_hexdigit()));

    let controller = manager.controller(&uid).unwrap();
    assert_eq!(controller.controller_type().namespace, "dualsense");
    assert_eq!(controller.driver_name(), Some("DualSense Wireless Controller"));
    let input = controller.input().unwrap();
    assert!(input.is_definitely_gamepad());
    assert!(input.supports(&GamepadInputs::LEFT_TRIGGER_AXIS));
    assert!(input.supports(&GamepadInputs::RIGHT_TRIGGER_AXIS));
    assert_eq!(input.mapping_id(), Some("playstation"));
    assert!(controller.gyro().is_some());
    assert!(controller.touchpad().is_some());

    pads.lock().update_report(key, |report| {
        report.set_axis(GamepadAxis::RightTrigger, 0.75);
        report.battery = Some(PowerState::Charging(40));
    });
    manager.tick(false);
    let controller = manager.controller(&uid).unwrap();
    assert!((controller.input().unwrap().analogue_now(&GamepadInputs::RIGHT_TRIGGER_AXIS) - 0.75).abs() < 1e-6);

    manager
        .controller_mut(&uid)
        .unwrap()
        .generic_config_mut()
        .unwrap()
        .nickname = Some("Couch pad".to_string());

    pads.lock().disconnect(key);
    manager.tick(false);
    assert_eq!(manager.controller_count(), 0);
    assert!(!manager.is_controller_connected(&uid));
    assert!(manager.hid_info(&uid).is_none());
    assert_eq!(manager.store().get(&uid).unwrap().name, "Couch pad");

    pads.lock().connect(dualsense());
    manager.tick(false);
    assert_eq!(only_uid(&manager), uid, "reconnect must reuse the uid");
    assert_eq!(manager.controller(&uid).unwrap().name(), "Couch pad");

    assert_eq!(
        lifecycle_events(&events),
        vec![
            ControllerEvent::Connected {
                uid: uid.clone(),
                hotplug: false,
                new_controller: true,
            },
            ControllerEvent::Disconnected { uid: uid.clone() },
            ControllerEvent::Connected {
                uid: uid.clone(),
                hotplug: true,
                new_controller: false,
            },
        ]
    );

    manager.close();
}

#[test]
fn test_hotplug_lifecycle_polled() {
    hotplug_lifecycle(polled);
}

#[test]
fn test_hotplug_lifecycle_queued() {
    hotplug_lifecycle(queued);
}

fn create_is_idempotent<B: ControllerBackend>(make: fn(Pads) -> B) {
    let (pads, mut manager) = manager_with(make, ManagerConfig::default());
    pads.lock().connect(dualsense());
    manager.discover_controllers();

    let uid = only_uid(&manager);
    let id = manager.controller(&uid).unwrap().id();
    let hid_info = manager.classify(id);

    assert_eq!(
        manager.try_create(id, hid_info),
        CreationResult::Rejected(RejectReason::AlreadyRegistered)
    );
    assert_eq!(manager.controller_count(), 1);
    assert!(!manager.controller(&uid).unwrap().is_closed());
    manager.close();
}

#[test]
fn test_create_is_idempotent_polled() {
    create_is_idempotent(polled);
}

#[test]
fn test_create_is_idempotent_queued() {
    create_is_idempotent(queued);
}

fn failing_driver_is_isolated<B: ControllerBackend>(make: fn(Pads) -> B) {
    let (pads, mut manager) = manager_with(make, ManagerConfig::default());
    manager.add_driver_layer(|_, hid_info| {
        if hid_info.controller_type.namespace != "dualsense" {
            return None;
        }
        let broken = ComponentAdderDriver::new("Broken", |_, _| {
            Err(DriverError::failed("Broken", "firmware handshake failed"))
        });
        Some(Box::new(broken) as Box<dyn Driver>)
    });

    let key = pads.lock().connect(dualsense());
    pads.lock().connect(pad_with("Xbox Series X|S Controller", HidIdentifier::new(0x045E, 0x0B12)));

    let ids = manager.backend.enumerate();
    let mut failed = Vec::new();
    for id in ids {
        let hid_info = manager.classify(id);
        if let CreationResult::Failed(diagnostic) = manager.try_create(id, hid_info) {
            failed.push(diagnostic);
        }
    }

    assert_eq!(failed.len(), 1);
    let diagnostic = &failed[0];
    assert_eq!(diagnostic.controller_type, "dualsense");
    assert!(diagnostic.hid_identified);
    assert_eq!(diagnostic.hid_path.as_deref(), Some("/dev/hidraw3"));
    assert_eq!(diagnostic.system_name.as_deref(), Some("DualSense Wireless Controller"));
    assert!(diagnostic.error.contains("firmware handshake failed"));
    assert!(diagnostic.to_string().contains("HID identified: true"));

    // The other pad is unaffected and the broken one stays out
    let uid = only_uid(&manager);
    assert_eq!(manager.controller(&uid).unwrap().controller_type().namespace, "xbox_series");

    pads.lock().disconnect(key);
    manager.tick(false);
    assert_eq!(manager.controller_count(), 1);
    manager.close();
}

#[test]
fn test_failing_driver_is_isolated_polled() {
    failing_driver_is_isolated(polled);
}

#[test]
fn test_failing_driver_is_isolated_queued() {
    failing_driver_is_isolated(queued);
}

#[test]
fn test_vanished_device_fails_creation() {
    let (_pads, mut manager) = manager_with(queued, ManagerConfig::default());
    let ghost = UniqueControllerId::queued("virtual", 42);

    let result = manager.try_create(ghost, HidInfo::default());
    let CreationResult::Failed(diagnostic) = result else {
        panic!("expected failure, got {result:?}");
    };
    assert!(!diagnostic.hid_identified);
    assert_eq!(diagnostic.controller_type, "unknown");
    assert_eq!(manager.controller_count(), 0);
}

fn rejections<B: ControllerBackend>(make: fn(Pads) -> B) {
    let config = ManagerConfig {
        denied_namespaces: vec!["switch_pro".to_string()],
        ..ManagerConfig::default()
    };
    let (pads, mut manager) = manager_with(make, config);

    pads.lock().connect(pad_with("DeathAdder", RAZER_MOUSE));
    pads.lock().connect(pad_with("Pro Controller", HidIdentifier::new(0x057E, 0x2009)));
    pads.lock().connect(pad_with("Steam Deck", DECK));
    manager.discover_controllers();
    assert_eq!(manager.controller_count(), 0);

    let mut reasons: Vec<RejectReason> = manager
        .backend
        .enumerate()
        .into_iter()
        .map(|id| {
            let hid_info = manager.classify(id);
            match manager.try_create(id, hid_info) {
                CreationResult::Rejected(reason) => reason,
                other => panic!("expected rejection, got {other:?}"),
            }
        })
        .collect();
    reasons.sort_by_key(|r| r.to_string());

    assert_eq!(
        reasons,
        vec![
            RejectReason::DeckNotInGamingMode,
            RejectReason::DeniedNamespace("switch_pro".to_string()),
            RejectReason::DontLoad,
        ]
    );
}

#[test]
fn test_rejections_polled() {
    rejections(polled);
}

#[test]
fn test_rejections_queued() {
    rejections(queued);
}

#[test]
fn test_deck_driver_claimed_once() {
    let config = ManagerConfig {
        deck_gaming_mode: true,
        ..ManagerConfig::default()
    };
    let (pads, manager) = manager_with(queued, config);
    let mut manager = manager
        .with_deck_api(|| Ok(Box::new(IdleDeck) as Box<dyn DeckApi>))
        .with_deck_poller_settings(PollerSettings {
            poll_timeout: Duration::from_millis(10),
            timeout_backoff: Duration::from_millis(1),
            close_timeout: Duration::from_secs(2),
        });

    pads.lock().connect(pad_with("Steam Deck", DECK));
    pads.lock().connect(pad_with("Steam Deck", DECK));
    manager.discover_controllers();
    manager.tick(false);

    assert_eq!(manager.controller_count(), 2);
    assert!(manager.is_deck_claimed());

    let deck = manager.controller(&deck_uid()).unwrap();
    assert_eq!(deck.driver_name(), Some(DECK_DRIVER_NAME));
    assert!(deck.keyboard().is_some());
    assert!(deck.battery().is_none());

    let others: Vec<&ControllerEntity> = manager
        .connected_controllers()
        .filter(|c| c.uid() != Some(deck_uid().as_str()))
        .collect();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].driver_name(), Some("Steam Deck"));
    assert!(others[0].keyboard().is_none());

    manager.close();
    assert_eq!(manager.controller_count(), 0);
    assert_eq!(manager.store().len(), 2);
}

#[test]
fn test_deck_without_daemon_uses_backend_driver() {
    let config = ManagerConfig {
        deck_gaming_mode: true,
        ..ManagerConfig::default()
    };
    let attempts = Rc::new(Cell::new(0));
    let counter = attempts.clone();
    let (pads, manager) = manager_with(polled, config);
    let mut manager = manager.with_deck_api(move || {
        counter.set(counter.get() + 1);
        Err(DeckError::Unavailable("no daemon".to_string()))
    });

    pads.lock().connect(pad_with("Steam Deck", DECK));
    manager.discover_controllers();

    let uid = only_uid(&manager);
    assert_ne!(uid, deck_uid());
    assert!(manager.is_deck_claimed());

    // A failed attempt still uses up the claim
    pads.lock().connect(pad_with("Steam Deck", DECK));
    manager.tick(false);
    assert_eq!(manager.controller_count(), 2);
    assert_eq!(attempts.get(), 1);
}

#[test]
fn test_identical_models_get_distinct_uids() {
    let (pads, mut manager) = manager_with(polled, ManagerConfig::default());
    pads.lock().connect(dualsense());
    pads.lock().connect(dualsense());
    manager.discover_controllers();

    let uids: Vec<&str> = manager.connected_controllers().filter_map(|c| c.uid()).collect();
    assert_eq!(uids.len(), 2);
    assert_ne!(uids[0], uids[1]);
}

#[test]
fn test_unidentified_device_uses_fallback_uid() {
    let (pads, mut manager) = manager_with(queued, ManagerConfig::default());
    let key = pads.lock().connect(DeviceDescriptor::joystick("Arcade Stick", 8, 2, 1));
    manager.discover_controllers();

    let uid = only_uid(&manager);
    assert_eq!(uid, format!("unknown-uid-queued:virtual/{key}"));
    assert!(!manager.controller(&uid).unwrap().input().unwrap().is_definitely_gamepad());
}

#[test]
fn test_force_joystick_by_type_and_config() {
    let (pads, mut manager) = manager_with(polled, ManagerConfig::default());
    pads.lock().connect(pad_with("T.16000M", T16000M));
    manager.discover_controllers();
    let uid = only_uid(&manager);
    assert!(!manager.controller(&uid).unwrap().input().unwrap().is_definitely_gamepad());

    let config = ManagerConfig {
        force_joystick: true,
        ..ManagerConfig::default()
    };
    let (pads, mut manager) = manager_with(polled, config);
    pads.lock().connect(dualsense());
    manager.discover_controllers();
    let uid = only_uid(&manager);
    assert!(!manager.controller(&uid).unwrap().input().unwrap().is_definitely_gamepad());
}

#[test]
fn test_reinit_rebuilds_controller() {
    let (pads, mut manager) = manager_with(queued, ManagerConfig::default());
    let events = record_events(&mut manager);
    pads.lock().connect(dualsense());
    manager.discover_controllers();
    let uid = only_uid(&manager);

    let mut hid_info = manager.hid_info(&uid).unwrap().clone();
    hid_info.controller_type.force_joystick = true;

    assert_eq!(
        manager.reinit_controller(&uid, hid_info),
        Some(CreationResult::Created(uid.clone()))
    );
    let controller = manager.controller(&uid).unwrap();
    assert!(!controller.input().unwrap().is_definitely_gamepad());
    assert!(manager.hid_info(&uid).unwrap().controller_type.force_joystick);

    assert_eq!(lifecycle_events(&events).len(), 3);
    assert!(manager.reinit_controller("missing", HidInfo::default()).is_none());
}

#[test]
fn test_close_controller_is_silent() {
    let (pads, mut manager) = manager_with(polled, ManagerConfig::default());
    let events = record_events(&mut manager);
    pads.lock().connect(dualsense());
    manager.discover_controllers();
    let uid = only_uid(&manager);

    assert!(manager.close_controller(&uid));
    assert!(!manager.close_controller(&uid));
    assert_eq!(lifecycle_events(&events).len(), 1);
    assert!(manager.probe_connected_controllers());
}

#[test]
fn test_probe_does_not_consume_hotplug() {
    let (pads, mut manager) = manager_with(queued, ManagerConfig::default());
    assert!(!manager.probe_connected_controllers());

    pads.lock().connect(dualsense());
    assert!(manager.probe_connected_controllers());
    manager.tick(false);
    assert_eq!(manager.controller_count(), 1);
}

#[test]
fn test_unknown_disconnect_is_ignored() {
    let (pads, mut manager) = manager_with(queued, ManagerConfig::default());
    let key = pads.lock().connect(pad_with("DeathAdder", RAZER_MOUSE));
    manager.tick(false);
    assert_eq!(manager.controller_count(), 0);

    pads.lock().disconnect(key);
    manager.tick(false);
    assert_eq!(manager.controller_count(), 0);
}

#[test]
fn test_state_updated_follows_every_tick() {
    let (pads, mut manager) = manager_with(polled, ManagerConfig::default());
    pads.lock().connect(dualsense());
    pads.lock().connect(pad_with("Xbox Series X|S Controller", HidIdentifier::new(0x045E, 0x0B12)));
    manager.discover_controllers();
    let events = record_events(&mut manager);

    manager.tick(false);
    manager.tick(true);

    let updated: Vec<String> = events.borrow().iter().map(|e| e.uid().to_string()).collect();
    let mut expected: Vec<String> = manager.connected_controllers().filter_map(|c| c.uid().map(str::to_string)).collect();
    expected.extend(expected.clone());
    assert_eq!(updated, expected);
}

#[test]
fn test_store_restores_configs_on_discovery() {
    let (pads, mut manager) = manager_with(polled, ManagerConfig::default());
    pads.lock().connect(dualsense());
    manager.discover_controllers();
    let uid = only_uid(&manager);
    manager
        .controller_mut(&uid)
        .unwrap()
        .input_mut()
        .unwrap()
        .settings_mut()
        .button_activation_threshold = 0.9;
    manager.close();
    let store = manager.store().clone();

    let (pads, manager) = manager_with(queued, ManagerConfig::default());
    let mut manager = manager.with_store(store);
    let events = record_events(&mut manager);
    pads.lock().connect(dualsense());
    manager.discover_controllers();

    assert_eq!(only_uid(&manager), uid);
    let input = manager.controller(&uid).unwrap().input().unwrap();
    assert_eq!(input.settings().button_activation_threshold, 0.9);
    assert_eq!(
        lifecycle_events(&events),
        vec![ControllerEvent::Connected {
            uid,
            hotplug: false,
            new_controller: false,
        }]
    );
}
