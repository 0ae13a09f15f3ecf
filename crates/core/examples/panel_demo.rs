//! Example walking through a panel session against the in-memory backend
//!
//! Run with: cargo run --package soundpanel-core --example panel_demo

use soundpanel_core::domain::{
    ConfigBus, ConfigSyncController, Device, DeviceLabel, DeviceSet, ModuleConfig,
    ModuleConfigClient, PanelConfig, VolumeSetting,
};
use soundpanel_infra::{MemoryBackend, TracingNotifier};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("soundpanel_core=debug,soundpanel_infra=debug,info")
        .init();

    println!("=== soundpanel demo ===\n");

    // 1. Settings, with a short recording window so the demo stays quick
    let mut config = PanelConfig::default();
    config.module.recording_window_secs = 1;
    config.simulator.volume_ceiling = 90;

    // 2. Backend and bus
    let snapshot = ModuleConfig {
        devices: DeviceSet {
            playback: vec![
                Device::new("bcm2835").with_name("Raspberry pi soundcard").enabled(true),
                Device::new("usb").with_name("USB Audio"),
            ]
            .into(),
            capture: vec![Device::new("usb").with_name("USB Audio")].into(),
        },
        volumes: VolumeSetting::new(75, 50),
        config: None,
    };
    let bus = Arc::new(ConfigBus::new());
    let backend = Arc::new(
        MemoryBackend::new(config.module.name.clone(), snapshot)
            .with_settings(config.simulator.clone())
            .with_recording_window(config.module.recording_window())
            .with_bus(bus.clone()),
    );

    // 3. Controller
    let client = ModuleConfigClient::new(backend.clone(), config.module.name.clone())
        .with_timeouts(config.module.timeouts());
    let controller = ConfigSyncController::new(client, backend.clone(), Arc::new(TracingNotifier), bus)
        .with_recording_window(config.module.recording_window());

    controller.init().await?;
    let view = controller.view();
    println!(
        "1. Loaded {} playback devices, current: {:?}",
        view.playback_devices().len(),
        view.current_device().map(|d| d.label.as_str())
    );

    // 4. Volumes above the ceiling come back clamped
    controller.update_volumes(95, 40);
    controller.set_volumes().await?;
    println!("2. Volumes after save: {:?}", controller.view().volumes());

    // 5. Switch device
    controller.choose_device(&DeviceLabel::new("usb"))?;
    controller.set_device().await?;
    println!(
        "3. Current device after switch: {:?}",
        controller.view().current_device().map(|d| d.label.as_str())
    );

    // 6. Tests
    controller.test_playing().await?;
    controller.test_recording().await?;

    // 7. Change made elsewhere
    let mut pushed = backend.snapshot();
    pushed.volumes = VolumeSetting::new(10, 10);
    backend.replace_snapshot(pushed);
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("4. Volumes after external change: {:?}", controller.view().volumes());

    controller.teardown();
    println!("\n=== Demo Complete ===");
    Ok(())
}
