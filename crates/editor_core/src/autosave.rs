//! Debounced, coalescing persistence of layout payloads.
//!
//! A payload handed to [`AutosaveCoordinator::schedule`] replaces any
//! payload still waiting for the settle delay. At most one save request per
//! session is in flight; payloads arriving meanwhile wait for it to settle
//! and are then saved by a fresh debounce round.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{PageId, ResponsiveBlockLayout},
    protocol::{Notification, NotificationKind, SaveLayoutRequest},
};
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    backend::{ErrorReporter, NotificationSink, PageBackend},
    error::EditorError,
    status::{SaveStatus, SaveStatusCell},
};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(600);
pub const DEFAULT_STATUS_RESET: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveSettings {
    pub settle_delay: Duration,
    pub saved_reset: Duration,
    pub error_reset: Duration,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            saved_reset: DEFAULT_STATUS_RESET,
            error_reset: DEFAULT_STATUS_RESET,
        }
    }
}

impl AutosaveSettings {
    pub fn status_cell(&self) -> SaveStatusCell {
        SaveStatusCell::new(self.saved_reset, self.error_reset)
    }
}

/// Messages accepted by [`AutosaveCoordinator::attach`], processed in send order.
#[derive(Debug)]
pub enum AutosaveRequest {
    Save(Vec<ResponsiveBlockLayout>),
    /// Answered once every earlier request has settled.
    Flush(oneshot::Sender<()>),
}

pub struct AutosaveCoordinator {
    page_id: PageId,
    backend: Arc<dyn PageBackend>,
    notifier: Arc<dyn NotificationSink>,
    reporter: Arc<dyn ErrorReporter>,
    status: SaveStatusCell,
    settle_delay: Duration,
    inner: Mutex<AutosaveState>,
}

#[derive(Default)]
struct AutosaveState {
    pending: Option<Vec<ResponsiveBlockLayout>>,
    timer: Option<JoinHandle<()>>,
    round: u64,
    in_flight: bool,
    last_saved: Option<Vec<ResponsiveBlockLayout>>,
}

impl AutosaveState {
    fn settled(&self) -> bool {
        self.timer.is_none() && !self.in_flight && self.pending.is_none()
    }
}

impl AutosaveCoordinator {
    pub fn new(
        page_id: PageId,
        backend: Arc<dyn PageBackend>,
        notifier: Arc<dyn NotificationSink>,
        reporter: Arc<dyn ErrorReporter>,
        status: SaveStatusCell,
        settings: AutosaveSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            page_id,
            backend,
            notifier,
            reporter,
            status,
            settle_delay: settings.settle_delay,
            inner: Mutex::new(AutosaveState::default()),
        })
    }

    pub fn status(&self) -> &SaveStatusCell {
        &self.status
    }

    /// Queues `payload` as the latest state to persist.
    pub async fn schedule(self: &Arc<Self>, payload: Vec<ResponsiveBlockLayout>) {
        let mut state = self.inner.lock().await;
        debug!(page_id = %self.page_id, blocks = payload.len(), in_flight = state.in_flight, "layout change queued");
        state.pending = Some(payload);
        self.status.set(SaveStatus::Dirty);
        if !state.in_flight {
            self.arm(&mut state);
        }
    }

    /// Spawns the intake loop for a commit channel. The loop ends when every
    /// sender is dropped.
    pub fn attach(
        self: &Arc<Self>,
        mut requests: mpsc::UnboundedReceiver<AutosaveRequest>,
    ) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                match request {
                    AutosaveRequest::Save(payload) => coordinator.schedule(payload).await,
                    AutosaveRequest::Flush(done) => {
                        let coordinator = Arc::clone(&coordinator);
                        tokio::spawn(async move {
                            coordinator.flush().await;
                            let _ = done.send(());
                        });
                    }
                }
            }
        })
    }

    /// Waits until no payload is waiting, debouncing, or in flight.
    pub async fn flush(&self) {
        let mut changes = self.status.subscribe();
        loop {
            if self.inner.lock().await.settled() {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Last payload the backend accepted.
    pub async fn last_saved(&self) -> Option<Vec<ResponsiveBlockLayout>> {
        self.inner.lock().await.last_saved.clone()
    }

    fn arm(self: &Arc<Self>, state: &mut AutosaveState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.round += 1;
        let round = state.round;
        let coordinator = Arc::clone(self);
        let delay = self.settle_delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.save(round).await;
        }));
    }

    async fn save(self: Arc<Self>, round: u64) {
        let payload = {
            let mut state = self.inner.lock().await;
            if state.round != round || state.in_flight {
                return;
            }
            // From here on the request runs to completion; nothing aborts it.
            state.timer = None;
            let Some(payload) = state.pending.take() else {
                return;
            };
            state.in_flight = true;
            self.status.set(SaveStatus::Saving);
            payload
        };

        info!(page_id = %self.page_id, blocks = payload.len(), "saving layout");
        let result = self
            .backend
            .save_layout(SaveLayoutRequest {
                page_id: self.page_id.clone(),
                placements: payload.clone(),
            })
            .await
            .map_err(EditorError::from);

        let mut state = self.inner.lock().await;
        state.in_flight = false;
        let outcome = match result {
            Ok(()) => {
                state.last_saved = Some(payload);
                SaveStatus::Saved
            }
            Err(err) => {
                warn!(page_id = %self.page_id, "layout save failed: {err}");
                self.reporter.capture("save_layout", &err);
                self.notifier.add(
                    Notification::new(NotificationKind::Error, "Failed to save layout")
                        .with_description(err.reason()),
                );
                SaveStatus::Error
            }
        };

        if state.pending.is_some() {
            self.status.set(SaveStatus::Dirty);
            self.arm(&mut state);
        } else {
            self.status.set(outcome);
        }
    }
}

#[cfg(test)]
#[path = "tests/autosave_tests.rs"]
mod tests;
