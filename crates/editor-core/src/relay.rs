//! HostRelay trait for the channel to the host application.
//!
//! Implementations:
//! - `RecordingRelay` (in `testing`) - records saves for tests
//! - `JsComponentRelay` (in editor-wasm) - wraps the host's `ComponentRelay`

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::note::NoteRef;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Relay not connected")]
    NotConnected,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Relay error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Capability requested from the host when the channel opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Receive the currently active note and its updates.
    #[serde(rename = "stream-context-item")]
    StreamContextItem,
}

impl Permission {
    pub fn name(self) -> &'static str {
        match self {
            Permission::StreamContextItem => "stream-context-item",
        }
    }
}

/// Hook the host runs immediately before it reads a note for persistence.
pub type PresaveHook<N> = Box<dyn FnOnce(&N)>;

/// Consumer invoked for every push of the active note.
pub type NoteConsumer<N> = Box<dyn Fn(N)>;

/// Outbound surface of the host channel.
pub trait HostRelay {
    type Note: NoteRef;

    /// Host platform name (e.g. "web", "desktop"), if reported.
    fn platform(&self) -> Option<String>;

    /// Register the consumer for active-note pushes.
    fn stream_note(&self, consumer: NoteConsumer<Self::Note>) -> Result<()>;

    /// Persist `note`, running `presave` on it first.
    ///
    /// Implementations must run the hook before reading any note field.
    fn save_with_presave(&self, note: Self::Note, presave: PresaveHook<Self::Note>) -> Result<()>;
}

/// Inbound messages from the host.
#[derive(Debug, Clone)]
pub enum HostEvent<N> {
    /// Channel handshake completed.
    Ready,
    /// Host asks for a preferred content height.
    ContentHeightRequest,
    /// Set of active themes changed.
    ThemesChanged { active_themes: Vec<String> },
    /// Active note was delivered or updated.
    NotePushed(N),
}

impl<N> HostEvent<N> {
    /// Event kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            HostEvent::Ready => "ready",
            HostEvent::ContentHeightRequest => "content-height-request",
            HostEvent::ThemesChanged { .. } => "themes-changed",
            HostEvent::NotePushed(_) => "note-pushed",
        }
    }
}

/// Reply to an inbound host message.
#[derive(Debug, Clone, PartialEq)]
pub enum HostReply {
    Ack,
    /// Preferred height; `None` defers to the host's default sizing.
    ContentHeight(Option<f64>),
}
