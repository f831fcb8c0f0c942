//! Terminal report of connected controllers (`--diagnostics`)

use colored::*;

use crate::backend::ControllerBackend;
use crate::controller::ControllerEntity;
use crate::manager::ControllerManager;

/// Capability names of a controller, in a fixed order
pub fn capabilities(entity: &ControllerEntity) -> Vec<String> {
    let mut caps = Vec::new();

    if let Some(input) = entity.input() {
        let layout = if input.is_definitely_gamepad() { "gamepad" } else { "joystick" };
        caps.push(format!("input:{layout}"));
    }
    if entity.gyro().is_some() {
        caps.push("gyro".to_string());
    }
    if let Some(rumble) = entity.rumble() {
        caps.push(format!("rumble:{}", rumble.channels().len()));
    }
    if let Some(touchpads) = entity.touchpad() {
        caps.push(format!("touchpad:{}", touchpads.len()));
    }
    if let Some(battery) = entity.battery() {
        match battery.state().percent() {
            Some(percent) => caps.push(format!("battery:{percent}%")),
            None => caps.push("battery".to_string()),
        }
    }
    if entity.keyboard().is_some() {
        caps.push("keyboard".to_string());
    }
    caps
}

/// Print every connected controller with its capabilities
pub fn print_controllers<B: ControllerBackend>(manager: &ControllerManager<B>) {
    println!("\n{}", "=== Connected Controllers ===".bold().cyan());
    println!("  Backend: {}", manager.backend().name().green());

    if manager.controller_count() == 0 {
        println!("  {}", "No controllers connected".dimmed());
        return;
    }

    for entity in manager.connected_controllers() {
        println!("\n  {}", entity.name().bright_white());
        println!("    UID:     {}", entity.uid().unwrap_or("-").yellow());
        println!("    Type:    {}", entity.controller_type().namespace.cyan());
        println!("    Driver:  {}", entity.driver_name().unwrap_or("-"));
        if let Some(guid) = entity.guid() {
            println!("    GUID:    {}", guid.dimmed());
        }
        if let Some(hid) = entity.info().hid.as_ref().and_then(|hid| hid.identifier) {
            println!("    HID:     {}", hid.to_string().green());
        }
        println!("    Caps:    {}", capabilities(entity).join(", "));
    }

    println!(
        "\n  {} controller(s), {} saved config(s)",
        manager.controller_count().to_string().green(),
        manager.store().len().to_string().green()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{BatteryComponent, ControllerInfo, InputComponent, PowerState};
    use crate::driver::ComponentAdderDriver;
    use crate::hid::ControllerType;
    use crate::manager::UniqueControllerId;

    #[test]
    fn test_capabilities_listing() {
        let driver = ComponentAdderDriver::new("caps", |entity, id| {
            entity.set_component_from(id, InputComponent::gamepad(None));
            let mut battery = BatteryComponent::new();
            battery.set_state(PowerState::Depleting(55));
            entity.set_component_from(id, battery);
            Ok(())
        });
        let info = ControllerInfo::new(UniqueControllerId::polled("test", 0), ControllerType::unknown(), None);
        let entity = ControllerEntity::create(info, Box::new(driver)).unwrap();

        assert_eq!(capabilities(&entity), vec!["input:gamepad", "battery:55%"]);
    }
}
