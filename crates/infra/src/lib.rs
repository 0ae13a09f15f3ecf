//! Infrastructure for soundpanel
//!
//! Collaborators the panel core only knows as traits: an in-memory audio
//! backend, a watcher feeding snapshot files into it, and notifiers.

pub mod backend;
pub mod toast;

pub use backend::{load_snapshot, BackendError, MemoryBackend, SnapshotWatcher};
pub use toast::{Notice, NoticeLevel, NoticeLog, TracingNotifier};
