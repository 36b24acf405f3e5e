use twicon::core::session::SessionController;
use twicon::infrastructure::sim::{SimBus, SimDeviceConfig};
use twicon::infrastructure::terminal::ScriptedConsole;
use twicon::{DeviceMode, TwiconConfig};

/// End-to-end console scenarios driven through a scripted terminal
/// and the simulated device.

fn test_config() -> TwiconConfig {
    let mut config = TwiconConfig::default();
    // Keep the settling delays out of the test runtime.
    config.global.mode_switch_delay_ms = 1;
    config.global.rotation_delay_ms = 5;
    config.global.scan_pause_ms = 1;
    config
}

fn controller_with(
    script: &str,
    sim: SimDeviceConfig,
) -> (SessionController<ScriptedConsole>, SimBus) {
    let bus = SimBus::new(sim);
    let console = ScriptedConsole::new(script);
    let controller = SessionController::new(
        console,
        Box::new(bus.clone()),
        Box::new(bus.clone()),
        test_config(),
        vec![0x0C, 0x94, 0x00, 0x00],
    );
    (controller, bus)
}

#[tokio::test]
async fn test_absent_device_then_status_then_erase() {
    // The device ignores the first five scans, then answers at
    // address 8 in bootloader mode. The operator asks for the status
    // report and then erases the firmware.
    let (mut controller, bus) = controller_with(
        "ve",
        SimDeviceConfig {
            address: 8,
            boot_delay_scans: 5,
            ..SimDeviceConfig::default()
        },
    );
    controller.run().await.unwrap();

    let counters = bus.counters().await;
    assert!(counters.scans >= 6, "expected five misses plus the hit");
    assert!(counters.status_fetches >= 1);
    assert_eq!(counters.erases, 1);

    let output = controller.console().output();
    assert!(output.contains("device active at address [8]"));
    assert!(output.contains("'v' version"), "bootloader menu expected");
    assert!(output.contains("Get bootloader version"));
    assert!(output.contains("Timonel v1.6"));
    // Erase tears the handle down and re-discovers.
    assert!(output.contains("Delete app firmware"));
    assert!(output.contains("Waiting for device"));
}

#[tokio::test]
async fn test_application_mode_menu_and_blink() {
    let (mut controller, bus) = controller_with(
        "as",
        SimDeviceConfig {
            initial_mode: DeviceMode::Application,
            ..SimDeviceConfig::default()
        },
    );
    controller.run().await.unwrap();

    let output = controller.console().output();
    assert!(output.contains("USER APPLICATION"));
    assert!(output.contains("Application command"));
    assert!(output.contains("Starting blink"));
    assert!(output.contains("Stopping blink"));
    assert!(output.contains(" > OK!"));
    assert_eq!(bus.counters().await.commands, 2);
}

#[tokio::test]
async fn test_reset_returns_device_to_bootloader() {
    let (mut controller, bus) = controller_with(
        "z",
        SimDeviceConfig {
            initial_mode: DeviceMode::Application,
            ..SimDeviceConfig::default()
        },
    );
    controller.run().await.unwrap();

    assert_eq!(bus.mode().await, DeviceMode::Bootloader);
    let output = controller.console().output();
    assert!(output.contains("going back to bootloader"));
    // The handle was recycled: a fresh discovery ran and the header
    // was redrawn for the new mode.
    assert!(output.contains("Waiting for device"));
    assert!(output.contains("[ BOOTLOADER ]"));
}

#[tokio::test]
async fn test_restart_console_reinitializes_session() {
    let (mut controller, _bus) = controller_with("z", SimDeviceConfig::default());
    controller.run().await.unwrap();

    let output = controller.console().output();
    assert!(output.contains("Resetting the console"));
    let banners = output
        .matches("Waiting until a TWI slave device is detected")
        .count();
    assert_eq!(banners, 2, "restart should start a whole new session");
}

#[tokio::test]
async fn test_unknown_key_prints_diagnostic_and_touches_nothing() {
    let (mut controller, bus) = controller_with("x", SimDeviceConfig::default());
    controller.run().await.unwrap();

    let output = controller.console().output();
    assert!(output.contains("Command '120' unknown"));
    let counters = bus.counters().await;
    assert_eq!(counters.uploads, 0);
    assert_eq!(counters.erases, 0);
    assert_eq!(counters.runs, 0);
    assert_eq!(counters.commands, 0);
}

#[tokio::test]
async fn test_run_application_switches_mode_and_menu() {
    // Upload at page 0, then run: the device switches to application
    // mode and the next menu reflects it.
    let (mut controller, bus) = controller_with("wr", SimDeviceConfig::default());
    controller.run().await.unwrap();

    assert_eq!(bus.mode().await, DeviceMode::Application);
    let counters = bus.counters().await;
    assert_eq!(counters.uploads, 1);
    assert_eq!(counters.runs, 1);

    let output = controller.console().output();
    assert!(output.contains("press 'r' to run the user app"));
    assert!(output.contains("Bootloader exit successful"));
    assert!(output.contains("Application command"));
}

#[cfg(feature = "setpgaddr")]
#[tokio::test]
async fn test_page_address_validation() {
    // bootloader_start 0x1C00 and page size 64 put the exclusive top
    // at 7104; both 7104 and the 0xFFFF sentinel must be rejected.
    let (mut controller, _bus) = controller_with("b7104\rb65535\r", SimDeviceConfig::default());
    controller.run().await.unwrap();

    assert_eq!(controller.state().page_addr, 0);
    let output = controller.console().output();
    assert!(output.contains("must be below 7104"));
}

#[cfg(feature = "setpgaddr")]
#[tokio::test]
async fn test_page_address_accepted_and_used_for_upload() {
    let (mut controller, bus) = controller_with("b128\rw", SimDeviceConfig::default());
    controller.run().await.unwrap();

    assert_eq!(controller.state().page_addr, 128);
    assert_eq!(bus.counters().await.uploads, 1);
    let output = controller.console().output();
    assert!(output.contains("Flash memory page base address: 128"));
    assert!(output.contains("successful"));
}

#[cfg(feature = "eeprom")]
#[tokio::test]
async fn test_eeprom_write_validation_and_read_back() {
    // First attempt exceeds the configured top (511) and is rejected;
    // the second writes 42 at address 5, then the full read shows it.
    let (mut controller, _bus) =
        controller_with("p600\rp5\r42\ro", SimDeviceConfig::default());
    controller.run().await.unwrap();

    let output = controller.console().output();
    assert!(output.contains("highest EEPROM address available is 511"));
    assert!(output.contains("Writing 42 to EEPROM address 0x0005"));
    assert!(output.contains("005=42"));
}

#[cfg(feature = "memdump")]
#[tokio::test]
async fn test_memory_dump_renders_addressed_lines() {
    let (mut controller, _bus) = controller_with("m", SimDeviceConfig::default());
    controller.run().await.unwrap();

    let output = controller.console().output();
    assert!(output.contains("0000: FF"));
    assert!(output.contains("0020: "));
    assert!(output.contains("1FE0: "));
}
