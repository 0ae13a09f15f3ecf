//! Panel view model
//!
//! Derived projection of the latest module configuration snapshot. The
//! current device is kept as an index into the playback list so it can never
//! drift from the devices being displayed.

use crate::domain::audio::{Device, DeviceLabel, ModuleConfig, VolumeSetting};
use crate::domain::bus::Revision;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    playback_devices: Vec<Device>,
    capture_devices: Vec<Device>,
    volumes: VolumeSetting,
    current: Option<usize>,
    revision: Option<Revision>,
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a view model from a single snapshot
    pub fn from_config(config: &ModuleConfig) -> Self {
        let mut view = Self::new();
        view.set_config(config);
        view
    }

    pub fn playback_devices(&self) -> &[Device] {
        &self.playback_devices
    }

    pub fn capture_devices(&self) -> &[Device] {
        &self.capture_devices
    }

    pub fn volumes(&self) -> VolumeSetting {
        self.volumes
    }

    pub fn volume_playback(&self) -> Option<u32> {
        self.volumes.playback
    }

    pub fn volume_capture(&self) -> Option<u32> {
        self.volumes.capture
    }

    pub fn current_device(&self) -> Option<&Device> {
        self.current.map(|index| &self.playback_devices[index])
    }

    /// Revision of the last snapshot applied, `None` before the first load
    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    pub fn is_loaded(&self) -> bool {
        self.revision.is_some()
    }

    /// Levels edited by the user, sent on the next volume save
    pub fn set_volume_levels(&mut self, playback: u32, capture: u32) {
        self.volumes = VolumeSetting::new(playback, capture);
    }

    /// Pick a playback device as the current one
    ///
    /// Returns `None` and leaves the selection unchanged when no playback
    /// device carries that label.
    pub fn select(&mut self, label: &DeviceLabel) -> Option<&Device> {
        let index = self
            .playback_devices
            .iter()
            .position(|device| &device.label == label)?;
        self.current = Some(index);
        Some(&self.playback_devices[index])
    }

    pub fn clear_selection(&mut self) {
        self.current = None;
    }

    /// Replace the view with a normalized copy of `config`
    ///
    /// The current device is the first playback device matching the
    /// backend's recorded driver when the snapshot carries one, otherwise
    /// the first playback device flagged `enabled`.
    pub fn set_config(&mut self, config: &ModuleConfig) {
        self.playback_devices = config.devices.playback.as_slice().to_vec();
        self.capture_devices = config.devices.capture.as_slice().to_vec();
        self.volumes = config.volumes;

        let recorded = config
            .config
            .as_ref()
            .and_then(|selection| selection.driver.as_ref());

        self.current = match recorded {
            Some(driver) => self
                .playback_devices
                .iter()
                .position(|device| &device.label == driver),
            None => self.playback_devices.iter().position(|device| device.enabled),
        };

        debug!(
            playback = self.playback_devices.len(),
            capture = self.capture_devices.len(),
            current = ?self.current_device().map(|d| d.label.as_str()),
            "View model normalized"
        );
    }

    /// Apply a snapshot unless a newer one has already been applied
    ///
    /// Returns whether the snapshot was applied.
    pub fn apply(&mut self, config: &ModuleConfig, revision: Revision) -> bool {
        if self.is_stale(revision) {
            debug!(revision = revision.value(), "Discarding stale snapshot");
            return false;
        }
        self.set_config(config);
        self.revision = Some(revision);
        true
    }

    /// Overwrite the volume levels with authoritative backend values
    ///
    /// Skipped when a snapshot newer than the request has been applied in
    /// the meantime, since it already carries fresher levels.
    pub fn merge_volumes(&mut self, volumes: VolumeSetting, revision: Revision) -> bool {
        if self.is_stale(revision) {
            debug!(revision = revision.value(), "Discarding stale volume result");
            return false;
        }
        self.volumes = volumes;
        // Levels alone do not make a loaded view
        if self.revision.is_some() {
            self.revision = Some(revision);
        }
        true
    }

    fn is_stale(&self, revision: Revision) -> bool {
        self.revision.is_some_and(|applied| revision < applied)
    }
}
