//! Host note model and the `NoteRef` abstraction.
//!
//! Notes are owned by the host application. The plugin only ever holds a
//! *reference* to one: cloning a `NoteRef` clones the reference, so a pre-save
//! hook writes into exactly the object the host will persist.
//!
//! Implementations:
//! - `SharedNote` - `Rc<RefCell<Note>>`, used natively and in tests
//! - `JsNote` (in editor-wasm) - the host's JS object, accessed via `Reflect`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("Note write failed: {0}")]
    Write(String),
}

pub type Result<T> = std::result::Result<T, NoteError>;

/// Opaque per-plugin metadata stored on a note.
pub type ClientData = Value;

/// Content object of a host note.
///
/// Previews are derived by the host from `text`; the plugin clears them on
/// every save so the host regenerates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteContent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub preview_plain: Option<String>,
    #[serde(default)]
    pub preview_html: Option<String>,
    /// Fields the plugin does not interpret (title, references, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A host note as delivered by the note stream.
///
/// Wire format: `{"uuid":"..","content":{"text":".."},"clientData":{..},"isMetadataUpdate":false}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub uuid: String,
    #[serde(default)]
    pub content: NoteContent,
    #[serde(default)]
    pub client_data: Option<ClientData>,
    #[serde(default)]
    pub is_metadata_update: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    pub fn new(uuid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            content: NoteContent {
                text: text.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Mark this push as carrying metadata changes only.
    pub fn metadata_only(mut self) -> Self {
        self.is_metadata_update = true;
        self
    }

    pub fn with_client_data(mut self, client_data: ClientData) -> Self {
        self.client_data = Some(client_data);
        self
    }

    pub fn with_previews(mut self, plain: &str, html: &str) -> Self {
        self.content.preview_plain = Some(plain.to_string());
        self.content.preview_html = Some(html.to_string());
        self
    }

    /// Parse a note from its JSON wire format.
    pub fn from_json(data: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Values written into a note by the pre-save hook.
#[derive(Debug, Clone, PartialEq)]
pub struct PresaveUpdate<C> {
    pub text: String,
    pub client_data: Option<C>,
}

/// Reference to a host-owned note.
///
/// `Clone` must produce another reference to the same underlying note.
pub trait NoteRef: Clone {
    /// Client-data representation (JSON value natively, `JsValue` in WASM).
    type ClientData: Clone;

    /// Stable identifier of the note.
    fn uuid(&self) -> String;

    /// Stored text (`content.text`), empty when absent.
    fn text(&self) -> String;

    fn client_data(&self) -> Option<Self::ClientData>;

    /// Whether this push only changed non-text attributes.
    fn is_metadata_update(&self) -> bool;

    /// Write text and client-data and clear both preview fields.
    fn apply_presave(&self, update: PresaveUpdate<Self::ClientData>) -> Result<()>;

    /// True when both references point at the same note object.
    fn same_object(&self, other: &Self) -> bool;
}

/// A note shared between the host double and the plugin.
#[derive(Debug, Clone, Default)]
pub struct SharedNote(Rc<RefCell<Note>>);

impl SharedNote {
    pub fn new(note: Note) -> Self {
        Self(Rc::new(RefCell::new(note)))
    }

    /// Snapshot of the current note state.
    pub fn snapshot(&self) -> Note {
        self.0.borrow().clone()
    }
}

impl From<Note> for SharedNote {
    fn from(note: Note) -> Self {
        Self::new(note)
    }
}

impl NoteRef for SharedNote {
    type ClientData = ClientData;

    fn uuid(&self) -> String {
        self.0.borrow().uuid.clone()
    }

    fn text(&self) -> String {
        self.0.borrow().content.text.clone()
    }

    fn client_data(&self) -> Option<ClientData> {
        self.0.borrow().client_data.clone()
    }

    fn is_metadata_update(&self) -> bool {
        self.0.borrow().is_metadata_update
    }

    fn apply_presave(&self, update: PresaveUpdate<ClientData>) -> Result<()> {
        let mut note = self.0.borrow_mut();
        note.content.text = update.text;
        note.client_data = update.client_data;
        note.content.preview_plain = None;
        note.content.preview_html = None;
        Ok(())
    }

    fn same_object(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
