//! Domain entities and synchronization rules

pub mod audio;
pub mod bus;
pub mod client;
pub mod config;
pub mod controller;
pub mod notify;
pub mod rpc;
pub mod view;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{Device, DeviceLabel, DeviceList, DeviceSelection, DeviceSet, ModuleConfig, VolumeSetting};
pub use bus::{ConfigBus, ConfigChange, ConfigSubscription, Revision, RevisionClock};
pub use client::{AudioCommand, CommandTimeouts, ModuleConfigClient};
pub use config::{ConfigError, ConfigManager, ModuleSettings, PanelConfig, SimulatorSettings};
pub use controller::{ConfigSyncController, PanelAction, PanelError, SyncState};
pub use notify::Notifier;
pub use rpc::{CommandRequest, CommandResponse, ModuleConfigSource, RpcError, RpcTransport};
pub use view::ViewModel;
