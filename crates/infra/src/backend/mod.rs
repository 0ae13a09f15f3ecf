//! Simulated audio backend
//!
//! Stands in for the remote audio module so the panel can be driven
//! without a device:
//! - `memory`: command handling and config snapshots held in memory
//! - `watcher`: pushes edits of a snapshot file into the backend

pub mod memory;
pub mod watcher;

pub use memory::MemoryBackend;
pub use watcher::SnapshotWatcher;

use soundpanel_core::domain::audio::ModuleConfig;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors raised while feeding the simulated backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Read a module config snapshot from a JSON file
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub async fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<ModuleConfig> {
    let contents = tokio::fs::read_to_string(path.as_ref()).await?;
    let config = ModuleConfig::from_json(&contents)?;
    debug!(
        playback = config.devices.playback.len(),
        capture = config.devices.capture.len(),
        "Snapshot loaded"
    );
    Ok(config)
}
