//! Collaborator seams: persistence calls, user-facing notifications and error tracking.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{
    domain::Block,
    error::{ApiError, ErrorCode},
    protocol::{
        CreateBlockRequest, DeleteBlockRequest, Notification, NotificationKind,
        ReorderBlocksRequest, SaveLayoutRequest,
    },
};
use tracing::{error, info, warn};

use crate::error::EditorError;

#[async_trait]
pub trait PageBackend: Send + Sync {
    async fn save_layout(&self, request: SaveLayoutRequest) -> Result<(), ApiError>;
    async fn create_block(&self, request: CreateBlockRequest) -> Result<Block, ApiError>;
    async fn delete_block(&self, request: DeleteBlockRequest) -> Result<(), ApiError>;
    async fn reorder_blocks(&self, request: ReorderBlocksRequest) -> Result<(), ApiError>;
}

pub struct MissingPageBackend;

#[async_trait]
impl PageBackend for MissingPageBackend {
    async fn save_layout(&self, request: SaveLayoutRequest) -> Result<(), ApiError> {
        Err(unavailable(format!("save layout for page {}", request.page_id)))
    }

    async fn create_block(&self, request: CreateBlockRequest) -> Result<Block, ApiError> {
        Err(unavailable(format!("create block on page {}", request.page_id)))
    }

    async fn delete_block(&self, request: DeleteBlockRequest) -> Result<(), ApiError> {
        Err(unavailable(format!("delete block {}", request.block_id)))
    }

    async fn reorder_blocks(&self, request: ReorderBlocksRequest) -> Result<(), ApiError> {
        Err(unavailable(format!("reorder blocks on page {}", request.page_id)))
    }
}

fn unavailable(what: String) -> ApiError {
    ApiError::new(
        ErrorCode::Transport,
        format!("persistence backend unavailable: {what}"),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u64);

pub trait NotificationSink: Send + Sync {
    fn add(&self, notification: Notification) -> NotificationId;
    fn update(&self, id: NotificationId, notification: Notification);
}

/// Writes notifications to the log instead of a UI.
#[derive(Default)]
pub struct TracingNotifier {
    next_id: AtomicU64,
}

impl TracingNotifier {
    fn log(id: NotificationId, notification: &Notification) {
        let description = notification.description.as_deref().unwrap_or_default();
        match notification.kind {
            NotificationKind::Error => {
                warn!(id = id.0, title = %notification.title, description, "notification")
            }
            _ => info!(id = id.0, title = %notification.title, description, "notification"),
        }
    }
}

impl NotificationSink for TracingNotifier {
    fn add(&self, notification: Notification) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Self::log(id, &notification);
        id
    }

    fn update(&self, id: NotificationId, notification: Notification) {
        Self::log(id, &notification);
    }
}

pub trait ErrorReporter: Send + Sync {
    fn capture(&self, operation: &'static str, err: &EditorError);
}

pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn capture(&self, operation: &'static str, err: &EditorError) {
        error!(operation, code = ?err.code(), "editor operation failed: {err}");
    }
}

/// The external services one editing session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn PageBackend>,
    pub notifier: Arc<dyn NotificationSink>,
    pub reporter: Arc<dyn ErrorReporter>,
}

impl Collaborators {
    pub fn new(backend: Arc<dyn PageBackend>) -> Self {
        Self {
            backend,
            notifier: Arc::new(TracingNotifier::default()),
            reporter: Arc::new(TracingErrorReporter),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(MissingPageBackend))
    }
}
