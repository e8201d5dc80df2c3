//! Save status of one editing session.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::{
    runtime::Handle,
    sync::{broadcast, watch},
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Dirty,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn label(self) -> &'static str {
        match self {
            SaveStatus::Idle => "No changes",
            SaveStatus::Dirty => "Editing...",
            SaveStatus::Saving => "Saving",
            SaveStatus::Saved => "Saved",
            SaveStatus::Error => "Save failed",
        }
    }

    /// Dirty or saving: there is work not yet settled.
    pub fn is_pending(self) -> bool {
        matches!(self, SaveStatus::Dirty | SaveStatus::Saving)
    }
}

/// Session-scoped status value. `Saved` and `Error` fall back to `Idle`
/// after their reset delay unless another status is set first.
#[derive(Clone)]
pub struct SaveStatusCell {
    inner: Arc<StatusInner>,
}

struct StatusInner {
    current: watch::Sender<SaveStatus>,
    transitions: broadcast::Sender<SaveStatus>,
    generation: AtomicU64,
    saved_reset: Duration,
    error_reset: Duration,
}

impl SaveStatusCell {
    pub fn new(saved_reset: Duration, error_reset: Duration) -> Self {
        let (current, _) = watch::channel(SaveStatus::Idle);
        let (transitions, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(StatusInner {
                current,
                transitions,
                generation: AtomicU64::new(0),
                saved_reset,
                error_reset,
            }),
        }
    }

    pub fn get(&self) -> SaveStatus {
        *self.inner.current.borrow()
    }

    pub fn set(&self, next: SaveStatus) {
        let mut generation = 0;
        self.inner.current.send_modify(|status| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *status = next;
        });
        let _ = self.inner.transitions.send(next);
        debug!(status = ?next, "save status");

        let delay = match next {
            SaveStatus::Saved => self.inner.saved_reset,
            SaveStatus::Error => self.inner.error_reset,
            _ => return,
        };
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let reset = inner.current.send_if_modified(|status| {
                if inner.generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *status = SaveStatus::Idle;
                true
            });
            if reset {
                let _ = inner.transitions.send(SaveStatus::Idle);
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.current.subscribe()
    }

    /// Every status change in order, including transient ones.
    pub fn transitions(&self) -> broadcast::Receiver<SaveStatus> {
        self.inner.transitions.subscribe()
    }

    /// Waits until nothing is dirty or in flight.
    pub async fn settled(&self) -> SaveStatus {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|status| !status.is_pending()).await {
            Ok(status) => *status,
            Err(_) => self.get(),
        };
        settled
    }
}

impl Default for SaveStatusCell {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(3))
    }
}
