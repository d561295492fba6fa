//! One-way status notifications from the core to the presentation layer.
//!
//! Inject an [`Arc<dyn StatusCallback>`] via
//! [`crate::config::ChatConfigBuilder::status_callback`] to receive progress
//! strings ("Reading file…", "Asking OpenAI…"), the document-loaded event and
//! the task-menu trigger.
//!
//! The core never waits on a callback and never looks at a return value:
//! notifications are fire-and-forget. Hosts that prefer message passing can
//! use [`ChannelStatusCallback`], which forwards every event into an unbounded
//! Tokio channel and silently drops events once the receiver is gone.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfchat::{ChannelStatusCallback, StatusCallback, StatusChannel, StatusEvent};
//! use std::sync::Arc;
//!
//! let (cb, mut rx) = ChannelStatusCallback::new();
//! let channel = StatusChannel::new(Some(cb as Arc<dyn StatusCallback>));
//! channel.status("Parsing PDF...");
//! assert_eq!(rx.try_recv().unwrap(), StatusEvent::Status("Parsing PDF...".into()));
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives notifications from the core.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` and must not
/// block: they are called inline from async code.
pub trait StatusCallback: Send + Sync {
    /// A progress or error line suitable for a status bar.
    fn on_status(&self, message: &str) {
        let _ = message;
    }

    /// A document was loaded successfully.
    ///
    /// # Arguments
    /// * `name`: display name of the document (file name)
    fn on_document_loaded(&self, name: &str) {
        let _ = name;
    }

    /// The user asked for the task menu.
    fn on_task_menu_requested(&self) {}
}

/// A no-op implementation for callers that don't need notifications.
pub struct NoopStatusCallback;

impl StatusCallback for NoopStatusCallback {}

/// Owned form of a notification, used by [`ChannelStatusCallback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum StatusEvent {
    Status(String),
    DocumentLoaded(String),
    TaskMenuRequested,
}

/// Forwards every notification into an unbounded channel.
pub struct ChannelStatusCallback {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelStatusCallback {
    /// Create the callback together with its receiving end.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, event: StatusEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl StatusCallback for ChannelStatusCallback {
    fn on_status(&self, message: &str) {
        self.send(StatusEvent::Status(message.to_string()));
    }

    fn on_document_loaded(&self, name: &str) {
        self.send(StatusEvent::DocumentLoaded(name.to_string()));
    }

    fn on_task_menu_requested(&self) {
        self.send(StatusEvent::TaskMenuRequested);
    }
}

/// The write side used by the store, router and session.
///
/// Cheap to clone; an empty channel discards everything.
#[derive(Clone, Default)]
pub struct StatusChannel {
    callback: Option<Arc<dyn StatusCallback>>,
}

impl StatusChannel {
    pub fn new(callback: Option<Arc<dyn StatusCallback>>) -> Self {
        Self { callback }
    }

    pub fn status(&self, message: impl AsRef<str>) {
        if let Some(ref cb) = self.callback {
            cb.on_status(message.as_ref());
        }
    }

    pub fn document_loaded(&self, name: &str) {
        if let Some(ref cb) = self.callback {
            cb.on_document_loaded(name);
        }
    }

    pub fn task_menu_requested(&self) {
        if let Some(ref cb) = self.callback {
            cb.on_task_menu_requested();
        }
    }
}

impl std::fmt::Debug for StatusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusChannel")
            .field("callback", &self.callback.as_ref().map(|_| "<dyn StatusCallback>"))
            .finish()
    }
}
