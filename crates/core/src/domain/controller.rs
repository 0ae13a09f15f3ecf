//! Config synchronization controller
//!
//! Owns the panel [`ViewModel`], loads it from the backend, keeps it in step
//! with config changes published on the [`ConfigBus`], and runs the
//! user-facing command sequences.
//!
//! Actions are not serialized: several may be in flight at once, and bus
//! notifications can land while they are. Every snapshot and command result
//! carries a [`Revision`] taken when it was requested, so a result that was
//! requested before a newer snapshot arrived is dropped instead of
//! overwriting it.

use crate::domain::audio::DeviceLabel;
use crate::domain::bus::{ConfigBus, ConfigChange, ConfigSubscription, Revision, RevisionClock};
use crate::domain::client::ModuleConfigClient;
use crate::domain::notify::Notifier;
use crate::domain::rpc::{ModuleConfigSource, RpcError};
use crate::domain::view::ViewModel;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, PanelError>;

/// Errors surfaced by panel actions
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("No device selected")]
    NoDeviceSelected,

    #[error("No volume levels to save")]
    MissingVolumes,

    #[error("Module configuration not loaded")]
    NotLoaded,

    #[error("Unknown playback device: {0}")]
    UnknownDevice(DeviceLabel),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// User actions the controller runs against the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    SetVolumes,
    SetDevice,
    TestPlaying,
    TestRecording,
}

/// Lifecycle of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No snapshot applied yet
    Uninitialized,
    Ready,
    /// At least one action is in flight; holds the most recent one
    Pending(PanelAction),
}

const VOLUMES_SAVED: &str = "Volume saved successfully";
const SELECT_PROMPT: &str = "Please select a device";
const NOT_LOADED: &str = "Audio configuration is not loaded yet";
const DEVICE_CHANGED: &str = "Audio device changed. Audio may restart in a few seconds";
const PLAYING_DONE: &str = "You should have heard a sound";
const RECORDING_DONE: &str = "You should have heard your recording";

/// State reachable from the subscription task
struct Shared {
    module: String,
    view: RwLock<ViewModel>,
    in_flight: Mutex<Vec<PanelAction>>,
}

impl Shared {
    fn view(&self) -> RwLockReadGuard<'_, ViewModel> {
        self.view.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn view_mut(&self) -> RwLockWriteGuard<'_, ViewModel> {
        self.view.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, Vec<PanelAction>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_change(&self, change: &ConfigChange) -> bool {
        if change.module != self.module {
            return false;
        }
        match &change.config {
            Some(config) => self.view_mut().apply(config, change.revision),
            None => {
                debug!(module = %self.module, "Ignoring empty config change");
                false
            }
        }
    }
}

/// Marks an action in flight for as long as it lives
struct PendingGuard<'a> {
    shared: &'a Shared,
    action: PanelAction,
}

impl<'a> PendingGuard<'a> {
    fn enter(shared: &'a Shared, action: PanelAction) -> Self {
        shared.in_flight().push(action);
        Self { shared, action }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.shared.in_flight();
        if let Some(index) = in_flight.iter().rposition(|a| *a == self.action) {
            in_flight.remove(index);
        }
    }
}

/// Coordinator between the panel view and the backend audio module
pub struct ConfigSyncController {
    client: ModuleConfigClient,
    source: Arc<dyn ModuleConfigSource>,
    notifier: Arc<dyn Notifier>,
    bus: Arc<ConfigBus>,
    clock: Arc<RevisionClock>,
    recording_window: Duration,
    shared: Arc<Shared>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigSyncController {
    pub fn new(
        client: ModuleConfigClient,
        source: Arc<dyn ModuleConfigSource>,
        notifier: Arc<dyn Notifier>,
        bus: Arc<ConfigBus>,
    ) -> Self {
        let shared = Arc::new(Shared {
            module: client.module().to_string(),
            view: RwLock::new(ViewModel::new()),
            in_flight: Mutex::new(Vec::new()),
        });

        Self {
            client,
            source,
            notifier,
            clock: bus.clock(),
            bus,
            recording_window: Duration::from_secs(5),
            shared,
            subscription: Mutex::new(None),
        }
    }

    /// Length of the backend recording test, used in the progress message
    pub fn with_recording_window(mut self, window: Duration) -> Self {
        self.recording_window = window;
        self
    }

    pub fn module(&self) -> &str {
        &self.shared.module
    }

    pub fn state(&self) -> SyncState {
        if let Some(action) = self.shared.in_flight().last() {
            return SyncState::Pending(*action);
        }
        if self.shared.view().is_loaded() {
            SyncState::Ready
        } else {
            SyncState::Uninitialized
        }
    }

    /// Copy of the current view model
    pub fn view(&self) -> ViewModel {
        self.shared.view().clone()
    }

    /// Edit the volume levels that the next [`Self::set_volumes`] will send
    pub fn update_volumes(&self, playback: u32, capture: u32) {
        self.shared.view_mut().set_volume_levels(playback, capture);
    }

    /// Pick the playback device that the next [`Self::set_device`] will select
    pub fn choose_device(&self, label: &DeviceLabel) -> Result<()> {
        let mut view = self.shared.view_mut();
        if view.select(label).is_none() {
            return Err(PanelError::UnknownDevice(label.clone()));
        }
        Ok(())
    }

    /// Subscribe to config changes and load the current configuration
    ///
    /// Must run inside a tokio runtime. A failed load leaves the controller
    /// uninitialized; nothing is retried.
    #[instrument(skip(self), fields(module = %self.shared.module))]
    pub async fn init(&self) -> Result<()> {
        if !self.is_subscribed() {
            self.subscribe();
        }

        let revision = self.clock.tick();
        match self.source.get_module_config(&self.shared.module).await {
            Ok(config) => {
                let applied = self.shared.view_mut().apply(&config, revision);
                info!(applied, "Module configuration loaded");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to load module configuration");
                self.notifier
                    .error(&format!("Unable to load audio configuration: {}", e));
                Err(e.into())
            }
        }
    }

    /// Start listening for config changes, replacing any previous listener
    pub fn subscribe(&self) {
        let subscription = self.bus.subscribe(&self.shared.module);
        let handle = tokio::spawn(watch_changes(subscription, Arc::clone(&self.shared)));

        let mut slot = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
        debug!(module = %self.shared.module, "Subscribed to config changes");
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the config change subscription
    pub fn teardown(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!(module = %self.shared.module, "Unsubscribed from config changes");
        }
    }

    /// Apply a config change directly, as the subscription would
    ///
    /// Returns whether the view model was replaced.
    pub fn handle_change(&self, change: &ConfigChange) -> bool {
        self.shared.apply_change(change)
    }

    /// Save the volume levels currently held by the view model
    #[instrument(skip(self))]
    pub async fn set_volumes(&self) -> Result<()> {
        let (loaded, levels) = {
            let view = self.shared.view();
            (view.is_loaded(), view.volumes().levels())
        };
        if !loaded {
            self.notifier.info(NOT_LOADED);
            return Err(PanelError::NotLoaded);
        }
        let Some((playback, capture)) = levels else {
            self.notifier.info("No volume to save");
            return Err(PanelError::MissingVolumes);
        };

        let _pending = PendingGuard::enter(&self.shared, PanelAction::SetVolumes);
        let revision = self.clock.tick();

        match self.client.set_volumes(playback, capture).await {
            Ok(volumes) => {
                let merged = self.shared.view_mut().merge_volumes(volumes, revision);
                debug!(merged, ?volumes, "Volumes saved");
                self.notifier.success(VOLUMES_SAVED);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Unable to save volumes", e)),
        }
    }

    /// Make the current device the backend default, then reload the config
    #[instrument(skip(self))]
    pub async fn set_device(&self) -> Result<()> {
        let label = self
            .shared
            .view()
            .current_device()
            .map(|device| device.label.clone());
        let Some(label) = label else {
            self.notifier.info(SELECT_PROMPT);
            return Err(PanelError::NoDeviceSelected);
        };

        let _pending = PendingGuard::enter(&self.shared, PanelAction::SetDevice);

        if let Err(e) = self.client.select_device(&label).await {
            return Err(self.report_failure("Unable to change audio device", e));
        }

        // The switch can change which levels are authoritative, so take a
        // full snapshot rather than patching the view
        match self.reload().await {
            Ok(_) => {
                info!(%label, "Audio device changed");
                self.notifier.success(DEVICE_CHANGED);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Audio device changed but reloading configuration failed", e)),
        }
    }

    pub async fn test_playing(&self) -> Result<()> {
        let _pending = PendingGuard::enter(&self.shared, PanelAction::TestPlaying);

        match self.client.test_playing().await {
            Ok(()) => {
                self.notifier.success(PLAYING_DONE);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Unable to play test sound", e)),
        }
    }

    pub async fn test_recording(&self) -> Result<()> {
        let _pending = PendingGuard::enter(&self.shared, PanelAction::TestRecording);
        self.notifier.loading(&format!(
            "Recording {} seconds...",
            self.recording_window.as_secs_f64()
        ));

        match self.client.test_recording().await {
            Ok(()) => {
                self.notifier.success(RECORDING_DONE);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Unable to test recording", e)),
        }
    }

    /// Fetch a fresh snapshot and apply it
    ///
    /// Returns the revision the snapshot was requested at.
    pub async fn reload(&self) -> std::result::Result<Revision, RpcError> {
        let revision = self.clock.tick();
        let config = self
            .source
            .reload_module_config(&self.shared.module)
            .await?;
        let applied = self.shared.view_mut().apply(&config, revision);
        debug!(applied, revision = revision.value(), "Module configuration reloaded");
        Ok(revision)
    }

    fn report_failure(&self, context: &str, e: RpcError) -> PanelError {
        warn!(error = %e, "{}", context);
        self.notifier.error(&format!("{}: {}", context, e));
        e.into()
    }
}

impl Drop for ConfigSyncController {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn watch_changes(mut subscription: ConfigSubscription, shared: Arc<Shared>) {
    while let Some(change) = subscription.recv().await {
        let applied = shared.apply_change(&change);
        debug!(
            module = subscription.module(),
            revision = change.revision.value(),
            applied,
            "Config change received"
        );
    }
    debug!(module = subscription.module(), "Config bus closed");
}
