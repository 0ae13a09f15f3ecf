//! Audio module snapshot model
//!
//! These types mirror the configuration the backend reports for its audio
//! module. The panel never builds devices itself; everything here is
//! deserialized from backend payloads and treated as a read-only snapshot.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Canonical identity of an audio device
///
/// The backend knows devices by their driver label, which is also the
/// value it expects back as `driver_name` when switching devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceLabel(String);

impl DeviceLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// A hardware audio endpoint reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub label: DeviceLabel,

    /// Sound card name, when the driver exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether this device is the current default
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_installed")]
    pub installed: bool,

    /// Driver specific details, passed through untouched
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub device: Value,
}

fn default_installed() -> bool {
    true
}

impl Device {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: DeviceLabel::new(label),
            name: None,
            enabled: false,
            installed: true,
            device: Value::Null,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Ordered list of devices
///
/// Some backends deliver devices as an object keyed by identifier instead
/// of an array. Both shapes flatten to the same ordered sequence, keeping
/// the order the entries appear in the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeviceList(Vec<Device>);

impl DeviceList {
    pub fn new(devices: Vec<Device>) -> Self {
        Self(devices)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Device] {
        &self.0
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Device> {
        self.0.iter_mut()
    }

    pub fn into_vec(self) -> Vec<Device> {
        self.0
    }
}

impl From<Vec<Device>> for DeviceList {
    fn from(devices: Vec<Device>) -> Self {
        Self(devices)
    }
}

impl<'de> Deserialize<'de> for DeviceList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Sequence(Vec<Device>),
            Keyed(serde_json::Map<String, Value>),
        }

        match Shape::deserialize(deserializer)? {
            Shape::Sequence(devices) => Ok(Self(devices)),
            // Entries keyed by identifier may leave the label implicit
            Shape::Keyed(map) => map
                .into_iter()
                .map(|(key, mut entry)| {
                    if let Value::Object(fields) = &mut entry {
                        fields.entry("label").or_insert(Value::String(key));
                    }
                    serde_json::from_value(entry)
                })
                .collect::<Result<Vec<Device>, _>>()
                .map(Self)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Playback and capture device collections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSet {
    #[serde(default)]
    pub playback: DeviceList,
    #[serde(default)]
    pub capture: DeviceList,
}

/// Playback and capture volume levels
///
/// A level is `None` when the backend has no active driver to read it from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSetting {
    pub playback: Option<u32>,
    pub capture: Option<u32>,
}

impl VolumeSetting {
    pub fn new(playback: u32, capture: u32) -> Self {
        Self {
            playback: Some(playback),
            capture: Some(capture),
        }
    }

    /// Both levels, if the backend reported them
    pub fn levels(&self) -> Option<(u32, u32)> {
        Some((self.playback?, self.capture?))
    }
}

/// Selection recorded in the backend module config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelection {
    /// Label of the driver the backend considers selected
    #[serde(default)]
    pub driver: Option<DeviceLabel>,
}

/// Complete audio module configuration as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub devices: DeviceSet,

    #[serde(default)]
    pub volumes: VolumeSetting,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DeviceSelection>,
}

impl ModuleConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
