//! Responsive block-grid editing for one page: layout building, grid events,
//! debounced autosave and block create/delete/reorder.
//!
//! ```text
//! grid events ──▶ GridLayoutController ──(commit channel)──▶ AutosaveCoordinator ──▶ PageBackend
//!                        ▲                                                        ▲
//!                        └──── resync ◀── BlockLifecycle ─────────────────────────┘
//! ```

pub mod autosave;
pub mod backend;
pub mod controller;
pub mod coords;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod normalizer;
pub mod session;
pub mod status;

#[cfg(test)]
#[path = "tests/fakes.rs"]
mod fakes;

pub use autosave::{AutosaveCoordinator, AutosaveRequest, AutosaveSettings};
pub use backend::{
    Collaborators, ErrorReporter, MissingPageBackend, NotificationId, NotificationSink,
    PageBackend, TracingErrorReporter, TracingNotifier,
};
pub use controller::{GridLayoutController, LayoutChange};
pub use error::{EditorError, ValidationError};
pub use layout::{GridItem, LayoutInput, ResponsiveLayoutInputs, ResponsiveLayouts};
pub use lifecycle::BlockLifecycle;
pub use session::{EditorSession, PageContext};
pub use status::{SaveStatus, SaveStatusCell};
