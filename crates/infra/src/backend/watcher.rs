//! Snapshot file watcher
//!
//! Watches a JSON snapshot file and pushes every valid revision of it into
//! a [`MemoryBackend`], which announces it on the config bus. This is how a
//! change made outside the panel reaches it.

use super::{MemoryBackend, Result};
use notify::Watcher;
use soundpanel_core::domain::audio::ModuleConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct SnapshotWatcher {
    _watcher: notify::RecommendedWatcher,
    path: PathBuf,
}

impl SnapshotWatcher {
    /// Start watching `path`
    ///
    /// The parent directory is watched so that editors replacing the file
    /// (write to temp, rename) are picked up as well.
    pub fn new(path: impl Into<PathBuf>, backend: Arc<MemoryBackend>) -> Result<Self> {
        let path = path.into();
        let file_name = path.file_name().map(|n| n.to_os_string());
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let target = path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!(error = %e, "Snapshot watch error");
                    return;
                }
            };
            if !matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_)
            ) {
                return;
            }
            if !event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name)
            {
                return;
            }

            match read_snapshot(&target) {
                Ok(config) => backend.replace_snapshot(config),
                // Editors often save in several steps; the next event brings a complete file
                Err(e) => warn!(path = %target.display(), error = %e, "Ignoring unreadable snapshot"),
            }
        })?;

        watcher.watch(&dir, notify::RecursiveMode::NonRecursive)?;

        info!(path = %path.display(), "Snapshot watcher started");

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_snapshot(path: &Path) -> Result<ModuleConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config = ModuleConfig::from_json(&contents)?;
    debug!(path = %path.display(), "Snapshot file parsed");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundpanel_core::domain::bus::ConfigBus;
    use std::time::Duration;
    use tempfile::TempDir;

    const FIRST: &str = r#"{"devices":{"playback":[{"label":"hw:0","enabled":true}],"capture":[]},
                            "volumes":{"playback":50,"capture":30}}"#;
    const SECOND: &str = r#"{"devices":{"playback":[{"label":"hw:0"},{"label":"hw:1","enabled":true}],"capture":[]},
                             "volumes":{"playback":20,"capture":10}}"#;

    #[tokio::test]
    async fn test_file_edit_is_published() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audio.json");
        std::fs::write(&path, FIRST).unwrap();

        let bus = Arc::new(ConfigBus::new());
        let backend = Arc::new(
            MemoryBackend::new("audio", ModuleConfig::from_json(FIRST).unwrap()).with_bus(bus.clone()),
        );
        let mut subscription = bus.subscribe("audio");
        let _watcher = SnapshotWatcher::new(&path, backend.clone()).unwrap();

        std::fs::write(&path, SECOND).unwrap();

        let change = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let change = subscription.recv().await.unwrap();
                if change.config.as_ref().is_some_and(|c| c.devices.playback.len() == 2) {
                    return change;
                }
            }
        })
        .await
        .expect("watcher did not publish the edited snapshot");

        assert_eq!(change.config.unwrap().volumes.playback, Some(20));
        assert_eq!(backend.snapshot().devices.playback.len(), 2);
    }
}
