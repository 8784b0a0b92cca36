//! Session context: the active note and the synchronization baseline.
//!
//! `SessionContext` decides what a note push means for the editor. It never
//! touches the widget itself; the plugin acts on the returned [`NoteUpdate`].

use crate::note::{NoteRef, PresaveUpdate};

/// What a pushed note requires of the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteUpdate {
    /// Only non-text attributes changed.
    MetadataOnly,
    /// Text matches the last value pushed into or pulled from the editor.
    Unchanged,
    /// Text must be written into the editor.
    Apply(String),
}

/// Held note plus the last-known text and identifier.
pub struct SessionContext<N: NoteRef> {
    note: Option<N>,
    client_data: Option<N::ClientData>,
    last_text: Option<String>,
    last_uuid: Option<String>,
}

impl<N: NoteRef> Default for SessionContext<N> {
    fn default() -> Self {
        Self {
            note: None,
            client_data: None,
            last_text: None,
            last_uuid: None,
        }
    }
}

impl<N: NoteRef> SessionContext<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take in a pushed note and decide whether the editor needs updating.
    pub fn receive(&mut self, note: N) -> NoteUpdate {
        let uuid = note.uuid();
        if self.last_uuid.as_deref() != Some(uuid.as_str()) {
            tracing::debug!("Active note changed to {}, resetting baseline", uuid);
            self.last_text = None;
            self.last_uuid = Some(uuid);
        }

        self.client_data = note.client_data();
        let metadata_only = note.is_metadata_update();
        let text = note.text();
        self.note = Some(note);

        if metadata_only {
            NoteUpdate::MetadataOnly
        } else if self.last_text.as_deref() == Some(text.as_str()) {
            NoteUpdate::Unchanged
        } else {
            NoteUpdate::Apply(text)
        }
    }

    /// Reference to the held note, for capture by a save.
    pub fn active_note(&self) -> Option<N> {
        self.note.clone()
    }

    pub fn active_uuid(&self) -> Option<&str> {
        self.last_uuid.as_deref()
    }

    /// Text the widget should start with.
    pub fn initial_text(&self) -> String {
        self.note.as_ref().map(NoteRef::text).unwrap_or_default()
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    /// Record text as being in sync with the editor.
    pub fn record_text(&mut self, text: &str) {
        self.last_text = Some(text.to_string());
    }

    /// Pre-save values for freshly edited text, with the held client data.
    pub fn presave_update(&self, text: String) -> PresaveUpdate<N::ClientData> {
        PresaveUpdate {
            text,
            client_data: self.client_data.clone(),
        }
    }

    /// Record text written into note `uuid` by a pre-save hook.
    ///
    /// Ignored once another note has become active.
    pub fn record_saved(&mut self, uuid: &str, text: &str) {
        if self.active_uuid() == Some(uuid) {
            self.record_text(text);
        }
    }
}
