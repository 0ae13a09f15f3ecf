//! Integration tests for the audio panel
//!
//! These tests run the controller against the in-memory backend and cover
//! full action sequences: initial load, saving volumes, switching devices,
//! test actions, failures and out-of-band config changes.

use soundpanel_core::domain::{
    CommandTimeouts, ConfigBus, ConfigSyncController, Device, DeviceLabel, DeviceSet,
    ModuleConfig, ModuleConfigClient, ModuleConfigSource, PanelError, RpcError,
    SimulatorSettings, SyncState, ViewModel, VolumeSetting,
};
use soundpanel_infra::{MemoryBackend, Notice, NoticeLevel, NoticeLog};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const SIMPLE: &str = r#"{"devices":{"playback":[{"label":"hw:0","enabled":true}],"capture":[]},
                         "volumes":{"playback":50,"capture":30}}"#;

struct Panel {
    controller: Arc<ConfigSyncController>,
    backend: Arc<MemoryBackend>,
    notices: Arc<NoticeLog>,
    bus: Arc<ConfigBus>,
}

fn two_devices() -> ModuleConfig {
    ModuleConfig {
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
    }
}

fn panel_with(snapshot: ModuleConfig, settings: SimulatorSettings) -> Panel {
    let bus = Arc::new(ConfigBus::new());
    let backend = Arc::new(
        MemoryBackend::new("audio", snapshot)
            .with_settings(settings)
            .with_bus(bus.clone()),
    );
    let notices = Arc::new(NoticeLog::new());
    let client = ModuleConfigClient::new(backend.clone(), "audio");
    let controller = Arc::new(ConfigSyncController::new(
        client,
        backend.clone(),
        notices.clone(),
        bus.clone(),
    ));

    Panel {
        controller,
        backend,
        notices,
        bus,
    }
}

fn panel(snapshot: ModuleConfig) -> Panel {
    panel_with(snapshot, SimulatorSettings::default())
}

/// Wait until the controller's view satisfies `check`
async fn wait_for_view(controller: &ConfigSyncController, check: impl Fn(&ViewModel) -> bool) -> ViewModel {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = controller.view();
            if check(&view) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("view never reached the expected state")
}

fn levels(notices: &[Notice]) -> Vec<NoticeLevel> {
    notices.iter().map(|n| n.level).collect()
}

// ============================================================================
// INITIAL LOAD
// ============================================================================

#[tokio::test]
async fn test_init_populates_view() {
    let panel = panel(ModuleConfig::from_json(SIMPLE).unwrap());
    assert_eq!(panel.controller.state(), SyncState::Uninitialized);

    panel.controller.init().await.unwrap();

    let view = panel.controller.view();
    assert_eq!(view.volume_playback(), Some(50));
    assert_eq!(view.volume_capture(), Some(30));
    assert_eq!(view.current_device().unwrap().label.as_str(), "hw:0");
    assert_eq!(panel.controller.state(), SyncState::Ready);
}

#[tokio::test]
async fn test_init_failure_stays_uninitialized() {
    let panel = panel(two_devices());
    panel.backend.set_offline(true);

    let err = panel.controller.init().await.unwrap_err();

    assert!(matches!(err, PanelError::Rpc(RpcError::Transport(_))));
    assert_eq!(panel.controller.state(), SyncState::Uninitialized);
    assert_eq!(levels(&panel.notices.drain()), vec![NoticeLevel::Error]);
}

#[tokio::test]
async fn test_keyed_device_map_is_flattened() {
    let snapshot = ModuleConfig::from_json(
        r#"{"devices":{"playback":{"usb":{"label":"usb"},"bcm2835":{"label":"bcm2835","enabled":true}},
                       "capture":{}},
            "volumes":{"playback":10,"capture":null}}"#,
    )
    .unwrap();
    let panel = panel(snapshot);

    panel.controller.init().await.unwrap();

    let view = panel.controller.view();
    let labels: Vec<_> = view.playback_devices().iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, vec!["usb", "bcm2835"]);
    assert_eq!(view.current_device().unwrap().label.as_str(), "bcm2835");
    assert_eq!(view.volume_capture(), None);
}

// ============================================================================
// VOLUMES
// ============================================================================

#[tokio::test]
async fn test_backend_clamped_volume_wins() {
    let panel = panel_with(
        two_devices(),
        SimulatorSettings {
            volume_ceiling: 70,
            push_changes: false,
        },
    );
    panel.controller.init().await.unwrap();

    panel.controller.update_volumes(80, 60);
    panel.controller.set_volumes().await.unwrap();

    assert_eq!(panel.controller.view().volumes(), VolumeSetting::new(70, 60));
    assert_eq!(
        panel.notices.drain(),
        vec![Notice {
            level: NoticeLevel::Success,
            message: "Volume saved successfully".to_string(),
        }]
    );
    let sent = panel.backend.sent_commands();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command, "set_volumes");
}

#[tokio::test]
async fn test_failed_volume_save_keeps_view() {
    let panel = panel(two_devices());
    panel.controller.init().await.unwrap();
    panel.backend.set_offline(true);

    panel.controller.update_volumes(10, 10);
    let before = panel.controller.view();
    let err = panel.controller.set_volumes().await.unwrap_err();

    assert!(matches!(err, PanelError::Rpc(_)));
    assert_eq!(panel.controller.view(), before);
    assert_eq!(panel.controller.state(), SyncState::Ready);
    assert_eq!(levels(&panel.notices.drain()), vec![NoticeLevel::Error]);
}

// ============================================================================
// DEVICE SELECTION
// ============================================================================

#[tokio::test]
async fn test_set_device_reloads_config() {
    let panel = panel_with(
        two_devices(),
        SimulatorSettings {
            volume_ceiling: 100,
            push_changes: false,
        },
    );
    panel.controller.init().await.unwrap();
    let old = panel.controller.view().current_device().cloned().unwrap();
    assert_eq!(old.label.as_str(), "bcm2835");

    panel.controller.choose_device(&DeviceLabel::new("usb")).unwrap();
    panel.controller.set_device().await.unwrap();

    let view = panel.controller.view();
    let current = view.current_device().unwrap();
    assert_eq!(current.label.as_str(), "usb");
    assert!(current.enabled);
    assert!(!view.playback_devices()[0].enabled);

    let sent = panel.backend.sent_commands();
    assert_eq!(sent[0].command, "select_device");
    assert_eq!(sent[0].timeout, Some(Duration::from_secs(30)));
    assert_eq!(levels(&panel.notices.drain()), vec![NoticeLevel::Success]);
}

#[tokio::test]
async fn test_set_device_without_selection() {
    let mut snapshot = two_devices();
    for device in snapshot.devices.playback.iter_mut() {
        device.enabled = false;
    }
    let panel = panel(snapshot);
    panel.controller.init().await.unwrap();
    let before = panel.controller.view();

    let err = panel.controller.set_device().await.unwrap_err();

    assert!(matches!(err, PanelError::NoDeviceSelected));
    assert!(panel.backend.sent_commands().is_empty());
    assert_eq!(panel.controller.view(), before);
    assert_eq!(
        panel.notices.drain(),
        vec![Notice {
            level: NoticeLevel::Info,
            message: "Please select a device".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_rejected_device_switch_is_reported() {
    let mut snapshot = two_devices();
    snapshot.devices.playback.iter_mut().for_each(|d| {
        if d.label.as_str() == "usb" {
            d.installed = false;
        }
    });
    let panel = panel(snapshot);
    panel.controller.init().await.unwrap();
    panel.controller.choose_device(&DeviceLabel::new("usb")).unwrap();

    let err = panel.controller.set_device().await.unwrap_err();

    assert!(matches!(err, PanelError::Rpc(RpcError::Rejected { .. })));
    let notices = panel.notices.drain();
    assert_eq!(levels(&notices), vec![NoticeLevel::Error]);
    assert!(notices[0].message.contains("not to be installed"));
}

// ============================================================================
// TEST ACTIONS
// ============================================================================

#[tokio::test]
async fn test_playing_acknowledged() {
    let panel = panel(two_devices());
    panel.controller.init().await.unwrap();
    let before = panel.controller.view();

    panel.controller.test_playing().await.unwrap();

    assert_eq!(panel.controller.view(), before);
    assert_eq!(
        panel.notices.drain()[0].message,
        "You should have heard a sound"
    );
}

#[tokio::test]
async fn test_playing_failure_is_reported() {
    let panel = panel(two_devices());
    panel.controller.init().await.unwrap();
    let before = panel.controller.view();
    panel.backend.set_offline(true);

    let err = panel.controller.test_playing().await.unwrap_err();

    assert!(matches!(err, PanelError::Rpc(RpcError::Transport(_))));
    assert_eq!(panel.controller.view(), before);
    assert_eq!(panel.controller.state(), SyncState::Ready);
    let notices = panel.notices.drain();
    assert_eq!(levels(&notices), vec![NoticeLevel::Error]);
    assert!(notices[0].message.starts_with("Unable to play test sound"));
}

#[tokio::test(start_paused = true)]
async fn test_recording_reports_progress_first() {
    let panel = panel(two_devices());
    panel.controller.init().await.unwrap();

    let controller = panel.controller.clone();
    let task = tokio::spawn(async move { controller.test_recording().await });

    // The recording window is five seconds; check midway
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        panel.controller.state(),
        SyncState::Pending(soundpanel_core::domain::PanelAction::TestRecording)
    );
    assert_eq!(
        panel.notices.snapshot(),
        vec![Notice {
            level: NoticeLevel::Loading,
            message: "Recording 5 seconds...".to_string(),
        }]
    );

    task.await.unwrap().unwrap();
    assert_eq!(
        levels(&panel.notices.drain()),
        vec![NoticeLevel::Loading, NoticeLevel::Success]
    );
    assert_eq!(panel.controller.state(), SyncState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_recording_times_out() {
    let bus = Arc::new(ConfigBus::new());
    let backend = Arc::new(
        MemoryBackend::new("audio", two_devices()).with_recording_window(Duration::from_secs(60)),
    );
    let notices = Arc::new(NoticeLog::new());
    let client = ModuleConfigClient::new(backend.clone(), "audio").with_timeouts(CommandTimeouts::default());
    let controller = ConfigSyncController::new(client, backend, notices.clone(), bus);

    let err = controller.test_recording().await.unwrap_err();

    match err {
        PanelError::Rpc(RpcError::Timeout { command, after }) => {
            assert_eq!(command, "test_recording");
            assert_eq!(after, Duration::from_secs(30));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(
        levels(&notices.drain()),
        vec![NoticeLevel::Loading, NoticeLevel::Error]
    );
}

// ============================================================================
// CONFIG CHANGE NOTIFICATIONS
// ============================================================================

#[tokio::test]
async fn test_external_change_replaces_view() {
    let panel = panel(two_devices());
    panel.controller.init().await.unwrap();

    let mut pushed = two_devices();
    pushed.volumes = VolumeSetting::new(5, 6);
    for device in pushed.devices.playback.iter_mut() {
        device.enabled = device.label.as_str() == "usb";
    }
    panel.backend.replace_snapshot(pushed);

    let view = wait_for_view(&panel.controller, |v| v.volumes() == VolumeSetting::new(5, 6)).await;
    assert_eq!(view.current_device().unwrap().label.as_str(), "usb");
}

#[tokio::test]
async fn test_null_change_leaves_view() {
    let panel = panel(two_devices());
    panel.controller.init().await.unwrap();
    let before = panel.controller.view();

    let empty = panel.bus.publish("audio", None);
    // Changes arrive in order, so seeing this one means the empty one was consumed
    let mut marker = two_devices();
    marker.volumes = VolumeSetting::new(1, 2);
    let marked = panel.bus.publish("audio", Some(marker));

    let view = wait_for_view(&panel.controller, |v| v.revision() == Some(marked)).await;

    assert!(empty < marked);
    assert_eq!(view.playback_devices(), before.playback_devices());
    assert_eq!(view.capture_devices(), before.capture_devices());
    assert_eq!(view.current_device(), before.current_device());
    assert_eq!(view.volumes(), VolumeSetting::new(1, 2));
}

#[tokio::test]
async fn test_device_switch_push_and_reload_agree() {
    let panel = panel(two_devices());
    panel.controller.init().await.unwrap();
    panel.controller.choose_device(&DeviceLabel::new("usb")).unwrap();

    panel.controller.set_device().await.unwrap();

    let view = wait_for_view(&panel.controller, |v| {
        v.current_device().is_some_and(|d| d.label.as_str() == "usb")
    })
    .await;
    assert_eq!(view.playback_devices().len(), 2);
}

/// Config source that holds its reply until released
struct GatedSource {
    snapshot: ModuleConfig,
    gate: Notify,
}

#[async_trait::async_trait]
impl ModuleConfigSource for GatedSource {
    async fn get_module_config(&self, _module: &str) -> Result<ModuleConfig, RpcError> {
        self.gate.notified().await;
        Ok(self.snapshot.clone())
    }

    async fn reload_module_config(&self, module: &str) -> Result<ModuleConfig, RpcError> {
        self.get_module_config(module).await
    }
}

#[tokio::test]
async fn test_stale_fetch_does_not_overwrite_newer_push() {
    let bus = Arc::new(ConfigBus::new());
    let backend = Arc::new(MemoryBackend::new("audio", two_devices()));
    let source = Arc::new(GatedSource {
        snapshot: ModuleConfig::from_json(SIMPLE).unwrap(),
        gate: Notify::new(),
    });
    let controller = Arc::new(ConfigSyncController::new(
        ModuleConfigClient::new(backend, "audio"),
        source.clone(),
        Arc::new(NoticeLog::new()),
        bus.clone(),
    ));

    let init = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.init().await })
    };
    // Let init subscribe and issue its request
    wait_until_subscribed(&bus).await;

    bus.publish("audio", Some(two_devices()));
    wait_for_view(&controller, |v| v.playback_devices().len() == 2).await;

    source.gate.notify_one();
    init.await.unwrap().unwrap();

    let view = controller.view();
    assert_eq!(view.playback_devices().len(), 2);
    assert_eq!(view.volumes(), VolumeSetting::new(75, 50));
}

async fn wait_until_subscribed(bus: &ConfigBus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("controller never subscribed");
}
