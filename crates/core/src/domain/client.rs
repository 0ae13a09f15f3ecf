//! Module config client
//!
//! Maps the four panel intents onto the audio module's remote commands.
//! The client holds no state beyond its routing settings and passes every
//! failure through untouched.

use crate::domain::audio::{DeviceLabel, VolumeSetting};
use crate::domain::rpc::{CommandRequest, Result, RpcError, RpcTransport};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Timeout classes used by audio commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTimeouts {
    /// Applied to quick commands
    pub default: Duration,
    /// Applied to commands that block on the backend (device switch, recording)
    pub extended: Duration,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(5),
            extended: Duration::from_secs(30),
        }
    }
}

/// Remote commands understood by the audio module
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    SetVolumes { playback: u32, capture: u32 },
    SelectDevice { label: DeviceLabel },
    TestPlaying,
    TestRecording,
}

impl AudioCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AudioCommand::SetVolumes { .. } => "set_volumes",
            AudioCommand::SelectDevice { .. } => "select_device",
            AudioCommand::TestPlaying => "test_playing",
            AudioCommand::TestRecording => "test_recording",
        }
    }

    pub fn params(&self) -> Option<Value> {
        match self {
            AudioCommand::SetVolumes { playback, capture } => {
                Some(json!({ "playback": playback, "capture": capture }))
            }
            AudioCommand::SelectDevice { label } => Some(json!({ "driver_name": label })),
            AudioCommand::TestPlaying | AudioCommand::TestRecording => None,
        }
    }

    /// Selecting a device may restart the backend audio service and
    /// recording blocks for the capture window.
    pub fn timeout(&self, timeouts: &CommandTimeouts) -> Duration {
        match self {
            AudioCommand::SelectDevice { .. } | AudioCommand::TestRecording => timeouts.extended,
            AudioCommand::SetVolumes { .. } | AudioCommand::TestPlaying => timeouts.default,
        }
    }

    fn into_request(self, module: &str, timeouts: &CommandTimeouts) -> CommandRequest {
        let mut request =
            CommandRequest::new(self.name(), module).with_timeout(self.timeout(timeouts));
        if let Some(params) = self.params() {
            request = request.with_params(params);
        }
        request
    }
}

/// Stateless proxy from panel intents to audio module commands
#[derive(Clone)]
pub struct ModuleConfigClient {
    transport: Arc<dyn RpcTransport>,
    module: String,
    timeouts: CommandTimeouts,
}

impl ModuleConfigClient {
    pub fn new(transport: Arc<dyn RpcTransport>, module: impl Into<String>) -> Self {
        Self {
            transport,
            module: module.into(),
            timeouts: CommandTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: CommandTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn timeouts(&self) -> &CommandTimeouts {
        &self.timeouts
    }

    /// Send new levels, returning the values the backend actually applied
    #[instrument(skip(self))]
    pub async fn set_volumes(&self, playback: u32, capture: u32) -> Result<VolumeSetting> {
        let data = self
            .execute(AudioCommand::SetVolumes { playback, capture })
            .await?;
        serde_json::from_value(data).map_err(|source| RpcError::Decode {
            command: "set_volumes".to_string(),
            source,
        })
    }

    #[instrument(skip(self))]
    pub async fn select_device(&self, label: &DeviceLabel) -> Result<()> {
        self.execute(AudioCommand::SelectDevice {
            label: label.clone(),
        })
        .await
        .map(|_| ())
    }

    pub async fn test_playing(&self) -> Result<()> {
        self.execute(AudioCommand::TestPlaying).await.map(|_| ())
    }

    pub async fn test_recording(&self) -> Result<()> {
        self.execute(AudioCommand::TestRecording).await.map(|_| ())
    }

    async fn execute(&self, command: AudioCommand) -> Result<Value> {
        let name = command.name();
        let request = command.into_request(&self.module, &self.timeouts);
        debug!(command = name, module = %self.module, timeout = ?request.timeout, "Sending command");

        let response = self.transport.send_command(request).await?;
        response.into_data(name)
    }
}
