use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::BackendHostSetting;

// -----------------------------------------------------------------------------
// ----- BackendSlots ----------------------------------------------------------

/// Caps the number of clients holding a session on one backend at `capacity`.
#[derive(Debug)]
pub struct BackendSlots {
    backend: Arc<BackendHostSetting>,
    slots: Arc<Semaphore>,
}

// -----------------------------------------------------------------------------
// ----- BackendSlots: Static --------------------------------------------------

impl BackendSlots {
    pub fn new(backend: Arc<BackendHostSetting>) -> Self {
        let capacity = backend.capacity.max(1) as usize;
        Self {
            backend,
            slots: Arc::new(Semaphore::new(capacity)),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- BackendSlots: Public --------------------------------------------------

impl BackendSlots {
    pub fn backend(&self) -> &Arc<BackendHostSetting> {
        &self.backend
    }

    /// A slot held until the permit drops, or `None` when all are taken.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.slots.clone().try_acquire_owned().ok()
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
