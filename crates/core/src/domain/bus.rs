//! Config change notifications
//!
//! Any part of the application can publish a new module configuration on
//! the [`ConfigBus`]. Subscribers register for a single module name and
//! receive every change for it, stamped with a [`Revision`] so that
//! consumers can tell a stale snapshot from a fresh one.

use crate::domain::audio::ModuleConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const BUS_CAPACITY: usize = 32;

/// Position of a snapshot in the global publication order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Monotonic source of revisions shared by publishers and fetchers
#[derive(Debug, Default)]
pub struct RevisionClock {
    next: AtomicU64,
}

impl RevisionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next revision; every call returns a strictly greater value
    pub fn tick(&self) -> Revision {
        Revision(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// A published configuration change
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub module: String,
    pub revision: Revision,
    /// `None` when the module config was cleared
    pub config: Option<Arc<ModuleConfig>>,
}

/// Publish/subscribe channel for module configuration changes
pub struct ConfigBus {
    tx: broadcast::Sender<ConfigChange>,
    clock: Arc<RevisionClock>,
}

impl Default for ConfigBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            clock: Arc::new(RevisionClock::new()),
        }
    }

    /// Clock stamping every snapshot that flows through this bus
    pub fn clock(&self) -> Arc<RevisionClock> {
        Arc::clone(&self.clock)
    }

    /// Publish a change for `module`, returning the revision it was stamped with
    pub fn publish(&self, module: &str, config: Option<ModuleConfig>) -> Revision {
        let revision = self.clock.tick();
        let change = ConfigChange {
            module: module.to_string(),
            revision,
            config: config.map(Arc::new),
        };

        // Sending only fails when nobody listens, which is fine
        match self.tx.send(change) {
            Ok(receivers) => debug!(module, revision = revision.value(), receivers, "Config change published"),
            Err(_) => debug!(module, revision = revision.value(), "Config change published without subscribers"),
        }

        revision
    }

    /// Subscribe to changes of a single module
    pub fn subscribe(&self, module: &str) -> ConfigSubscription {
        ConfigSubscription {
            module: module.to_string(),
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a module subscription
///
/// Dropping the subscription unregisters it from the bus.
pub struct ConfigSubscription {
    module: String,
    rx: broadcast::Receiver<ConfigChange>,
}

impl ConfigSubscription {
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Wait for the next change of this module
    ///
    /// Returns `None` once the bus is gone. Changes dropped because this
    /// subscriber lagged behind are skipped; the next delivered snapshot is
    /// newer than any of them anyway.
    pub async fn recv(&mut self) -> Option<ConfigChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.module == self.module => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(module = %self.module, skipped, "Config subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
