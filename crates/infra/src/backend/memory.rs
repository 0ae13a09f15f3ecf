//! In-memory audio module
//!
//! Implements both panel seams, [`RpcTransport`] and [`ModuleConfigSource`],
//! over a snapshot held in memory. Commands behave like the real module:
//! parameters are validated, volumes are clamped, selecting a device moves
//! the `enabled` flag and records the driver, and the recording test blocks
//! for the recording window. Request timeouts are enforced the way a network
//! transport would.

use serde::Deserialize;
use serde_json::{json, Value};
use soundpanel_core::domain::audio::{DeviceLabel, DeviceSelection, ModuleConfig, VolumeSetting};
use soundpanel_core::domain::bus::ConfigBus;
use soundpanel_core::domain::config::SimulatorSettings;
use soundpanel_core::domain::rpc::{
    CommandRequest, CommandResponse, ModuleConfigSource, Result, RpcError, RpcTransport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Audio module simulated in memory
pub struct MemoryBackend {
    module: String,
    snapshot: Mutex<ModuleConfig>,
    settings: SimulatorSettings,
    default_timeout: Duration,
    recording_window: Duration,
    bus: Option<Arc<ConfigBus>>,
    offline: AtomicBool,
    sent: Mutex<Vec<CommandRequest>>,
}

#[derive(Deserialize)]
struct VolumeParams {
    playback: Option<Value>,
    capture: Option<Value>,
}

#[derive(Deserialize)]
struct SelectParams {
    driver_name: Option<String>,
}

impl MemoryBackend {
    pub fn new(module: impl Into<String>, snapshot: ModuleConfig) -> Self {
        Self {
            module: module.into(),
            snapshot: Mutex::new(snapshot),
            settings: SimulatorSettings::default(),
            default_timeout: Duration::from_secs(5),
            recording_window: Duration::from_secs(5),
            bus: None,
            offline: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_settings(mut self, settings: SimulatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Timeout applied to requests that do not carry their own
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_recording_window(mut self, window: Duration) -> Self {
        self.recording_window = window;
        self
    }

    /// Publish snapshot changes on `bus`
    pub fn with_bus(mut self, bus: Arc<ConfigBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> ModuleConfig {
        self.lock_snapshot().clone()
    }

    /// Replace the snapshot, as if changed from elsewhere, and announce it
    pub fn replace_snapshot(&self, config: ModuleConfig) {
        *self.lock_snapshot() = config.clone();
        info!(module = %self.module, "Snapshot replaced");
        if let Some(bus) = &self.bus {
            bus.publish(&self.module, Some(config));
        }
    }

    /// Make every call fail with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Commands received so far, oldest first
    pub fn sent_commands(&self) -> Vec<CommandRequest> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, ModuleConfig> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_reachable(&self, module: &str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RpcError::Transport("backend unreachable".to_string()));
        }
        if module != self.module {
            return Err(RpcError::Transport(format!("module {} is not loaded", module)));
        }
        Ok(())
    }

    fn announce(&self, snapshot: ModuleConfig) {
        if !self.settings.push_changes {
            return;
        }
        if let Some(bus) = &self.bus {
            bus.publish(&self.module, Some(snapshot));
        }
    }

    async fn handle(&self, request: &CommandRequest) -> CommandResponse {
        let params = request.params.clone().unwrap_or(Value::Null);
        match request.command.as_str() {
            "set_volumes" => self.set_volumes(params),
            "select_device" => self.select_device(params),
            "test_playing" => {
                debug!("Playing test sound");
                CommandResponse::ok(Value::Null)
            }
            "test_recording" => {
                debug!(window = ?self.recording_window, "Recording test sound");
                tokio::time::sleep(self.recording_window).await;
                CommandResponse::ok(Value::Null)
            }
            other => CommandResponse::rejected(format!("Unknown command {}", other)),
        }
    }

    fn set_volumes(&self, params: Value) -> CommandResponse {
        let params: VolumeParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(_) => return CommandResponse::rejected("Parameter \"volume\" is missing"),
        };

        let playback = match self.level("playback", params.playback) {
            Ok(level) => level,
            Err(response) => return response,
        };
        let capture = match self.level("capture", params.capture) {
            Ok(level) => level,
            Err(response) => return response,
        };

        let volumes = VolumeSetting::new(playback, capture);
        let snapshot = {
            let mut snapshot = self.lock_snapshot();
            snapshot.volumes = volumes;
            snapshot.clone()
        };
        debug!(playback, capture, "Volumes applied");
        self.announce(snapshot);

        CommandResponse::ok(json!({ "playback": playback, "capture": capture }))
    }

    fn level(&self, name: &str, value: Option<Value>) -> std::result::Result<u32, CommandResponse> {
        let value = value
            .filter(|v| !v.is_null())
            .ok_or_else(|| CommandResponse::rejected(format!("Parameter \"{}\" is missing", name)))?;
        let level = value.as_u64().ok_or_else(|| {
            CommandResponse::rejected(format!("Parameter \"{}\" must be a positive integer", name))
        })?;
        let ceiling = u64::from(self.settings.volume_ceiling);
        Ok(level.min(ceiling) as u32)
    }

    fn select_device(&self, params: Value) -> CommandResponse {
        let driver = match serde_json::from_value::<SelectParams>(params) {
            Ok(SelectParams {
                driver_name: Some(name),
            }) => name,
            _ => return CommandResponse::rejected("Parameter \"driver_name\" is missing"),
        };
        if driver.is_empty() {
            return CommandResponse::rejected(format!(
                "Parameter \"driver_name\" is invalid (specified=\"{}\")",
                driver
            ));
        }

        let label = DeviceLabel::new(driver);
        let snapshot = {
            let mut snapshot = self.lock_snapshot();
            let target = snapshot
                .devices
                .playback
                .iter()
                .find(|device| device.label == label)
                .map(|device| device.installed);

            match target {
                None => return CommandResponse::rejected("Specified driver does not exist"),
                Some(false) => {
                    return CommandResponse::rejected(
                        "Can't select device because its driver seems not to be installed",
                    )
                }
                Some(true) => {}
            }

            let devices = &mut snapshot.devices;
            for device in devices.playback.iter_mut().chain(devices.capture.iter_mut()) {
                device.enabled = device.label == label;
            }
            snapshot.config = Some(DeviceSelection {
                driver: Some(label.clone()),
            });
            snapshot.clone()
        };

        info!(%label, "Default audio device switched");
        self.announce(snapshot);
        CommandResponse::ok(Value::Null)
    }
}

#[async_trait::async_trait]
impl RpcTransport for MemoryBackend {
    async fn send_command(&self, request: CommandRequest) -> Result<CommandResponse> {
        self.ensure_reachable(&request.module)?;
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        match tokio::time::timeout(timeout, self.handle(&request)).await {
            Ok(response) => {
                if response.error {
                    warn!(command = %request.command, message = ?response.message, "Command rejected");
                }
                Ok(response)
            }
            Err(_) => Err(RpcError::Timeout {
                command: request.command.clone(),
                after: timeout,
            }),
        }
    }
}

#[async_trait::async_trait]
impl ModuleConfigSource for MemoryBackend {
    async fn get_module_config(&self, module: &str) -> Result<ModuleConfig> {
        self.ensure_reachable(module)?;
        Ok(self.snapshot())
    }

    async fn reload_module_config(&self, module: &str) -> Result<ModuleConfig> {
        self.ensure_reachable(module)?;
        Ok(self.snapshot())
    }
}
