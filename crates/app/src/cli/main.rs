//! soundpanel CLI
//!
//! Drives the audio panel against a simulated backend whose state lives in
//! a JSON snapshot file. Mutating commands write the resulting snapshot back
//! to that file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use soundpanel_core::domain::{
    ConfigBus, ConfigManager, ConfigSyncController, DeviceLabel, ModuleConfigClient, PanelConfig,
    ViewModel,
};
use soundpanel_infra::{load_snapshot, MemoryBackend, NoticeLog, SnapshotWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "soundpanel")]
#[command(about = "Audio device and volume panel", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON snapshot holding the simulated audio module state
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Panel configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Print devices, volumes and the current device
    Show,
    /// Save playback and capture volumes
    SetVolumes {
        #[arg(long)]
        playback: u32,
        #[arg(long)]
        capture: u32,
    },
    /// Make a playback device the default
    Select {
        /// Device label
        label: String,
    },
    /// Play a test sound
    TestPlaying,
    /// Record a few seconds and play them back
    TestRecording,
    /// Follow edits of the snapshot file until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let config = load_config(cli.config.as_deref()).await?;
    let snapshot = load_snapshot(&cli.snapshot)
        .await
        .with_context(|| format!("reading snapshot {}", cli.snapshot.display()))?;

    let module = config.module.name.clone();
    let bus = Arc::new(ConfigBus::new());
    let backend = Arc::new(
        MemoryBackend::new(module.clone(), snapshot)
            .with_settings(config.simulator.clone())
            .with_default_timeout(config.module.timeouts().default)
            .with_recording_window(config.module.recording_window())
            .with_bus(bus.clone()),
    );
    let notices = Arc::new(NoticeLog::new());

    let client = ModuleConfigClient::new(backend.clone(), module)
        .with_timeouts(config.module.timeouts());
    let controller = ConfigSyncController::new(client, backend.clone(), notices.clone(), bus.clone())
        .with_recording_window(config.module.recording_window());

    if let Err(e) = controller.init().await {
        print_notices(&notices);
        return Err(e.into());
    }

    let (outcome, mutated) = match cli.action {
        Action::Show => (Ok(()), false),
        Action::SetVolumes { playback, capture } => {
            controller.update_volumes(playback, capture);
            (controller.set_volumes().await, true)
        }
        Action::Select { label } => {
            controller.choose_device(&DeviceLabel::new(label))?;
            (controller.set_device().await, true)
        }
        Action::TestPlaying => (controller.test_playing().await, false),
        Action::TestRecording => (controller.test_recording().await, false),
        Action::Watch => {
            watch(&controller, &bus, backend.clone(), &cli.snapshot, &notices).await?;
            return Ok(());
        }
    };

    print_notices(&notices);
    outcome?;

    if mutated {
        save_snapshot(&cli.snapshot, &backend).await?;
    }

    print!("{}", render(&controller.view()));
    Ok(())
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<PanelConfig> {
    match path {
        Some(path) => PanelConfig::load_from_file(path)
            .await
            .with_context(|| format!("reading config {}", path.display())),
        None => {
            let manager = ConfigManager::new(ConfigManager::default_config_dir()?);
            Ok(manager.load().await)
        }
    }
}

async fn save_snapshot(path: &Path, backend: &MemoryBackend) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&backend.snapshot())?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing snapshot {}", path.display()))?;
    info!(path = %path.display(), "Snapshot saved");
    Ok(())
}

async fn watch(
    controller: &ConfigSyncController,
    bus: &ConfigBus,
    backend: Arc<MemoryBackend>,
    path: &Path,
    notices: &NoticeLog,
) -> anyhow::Result<()> {
    // Drive changes by hand so each one is printed after it is applied
    controller.teardown();
    let mut subscription = bus.subscribe(controller.module());
    let _watcher = SnapshotWatcher::new(path, backend)?;

    print!("{}", render(&controller.view()));
    loop {
        tokio::select! {
            change = subscription.recv() => {
                let Some(change) = change else { break };
                let applied = controller.handle_change(&change);
                debug!(revision = change.revision.value(), applied, "Snapshot change");
                if applied {
                    println!("--- revision {}", change.revision.value());
                    print!("{}", render(&controller.view()));
                }
                print_notices(notices);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}

fn print_notices(notices: &NoticeLog) {
    for notice in notices.drain() {
        println!("[{}] {}", notice.level, notice.message);
    }
}

fn render(view: &ViewModel) -> String {
    let current = view.current_device().map(|d| d.label.clone());
    let mut out = String::new();

    out.push_str("Playback devices:\n");
    for device in view.playback_devices() {
        let marker = if Some(&device.label) == current.as_ref() { '*' } else { ' ' };
        let name = device.name.as_deref().unwrap_or("");
        out.push_str(&format!("  {} {} {}\n", marker, device.label, name));
    }
    out.push_str("Capture devices:\n");
    for device in view.capture_devices() {
        out.push_str(&format!("    {}\n", device.label));
    }

    let level = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    out.push_str(&format!(
        "Volumes: playback {} / capture {}\n",
        level(view.volume_playback()),
        level(view.volume_capture())
    ));
    out
}
