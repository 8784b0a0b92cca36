//! In-memory host relay and editor widget for tests.
//!
//! All doubles are cheap handles over shared state: clone one before handing
//! it to the plugin and keep the clone to drive and inspect it.

use async_trait::async_trait;
use futures::channel::oneshot;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::WidgetInit;
use crate::editor::{ChangeListener, EditorError, EditorMount, EditorWidget, Result};
use crate::note::{Note, SharedNote};
use crate::relay::{self, HostRelay, NoteConsumer, PresaveHook, RelayError};
use crate::theme::ThemeMode;

// ========== Editor widget ==========

#[derive(Default)]
struct EditorState {
    text: RefCell<String>,
    theme: Cell<Option<ThemeMode>>,
    listener: RefCell<Option<ChangeListener>>,
    writes: RefCell<Vec<String>>,
    layouts: Cell<usize>,
    fail_next_write: Cell<bool>,
}

/// In-memory editor widget.
#[derive(Clone, Default)]
pub struct InMemoryEditor(Rc<EditorState>);

impl InMemoryEditor {
    pub fn new(text: &str) -> Self {
        let editor = Self::default();
        *editor.0.text.borrow_mut() = text.to_string();
        editor
    }

    pub fn set_listener(&self, listener: ChangeListener) {
        *self.0.listener.borrow_mut() = Some(listener);
    }

    /// Current text.
    pub fn text(&self) -> String {
        self.0.text.borrow().clone()
    }

    pub fn theme(&self) -> Option<ThemeMode> {
        self.0.theme.get()
    }

    /// Texts written through `set_value`, in order.
    pub fn writes(&self) -> Vec<String> {
        self.0.writes.borrow().clone()
    }

    pub fn layout_count(&self) -> usize {
        self.0.layouts.get()
    }

    pub fn fail_next_write(&self) {
        self.0.fail_next_write.set(true);
    }

    /// Simulate the user typing `suffix` at the end of the document.
    pub fn type_text(&self, suffix: &str) {
        self.0.text.borrow_mut().push_str(suffix);
        self.notify();
    }

    fn notify(&self) {
        let listener = self.0.listener.borrow().clone();
        if let Some(listener) = listener {
            listener();
        }
    }
}

impl EditorWidget for InMemoryEditor {
    fn value(&self) -> Result<String> {
        Ok(self.text())
    }

    fn set_value(&self, text: &str) -> Result<()> {
        if self.0.fail_next_write.replace(false) {
            return Err(EditorError::Operation("write rejected".into()));
        }
        *self.0.text.borrow_mut() = text.to_string();
        self.0.writes.borrow_mut().push(text.to_string());
        // The real widget fires its change event synchronously on setValue.
        self.notify();
        Ok(())
    }

    fn set_theme(&self, mode: ThemeMode) -> Result<()> {
        self.0.theme.set(Some(mode));
        Ok(())
    }

    fn layout(&self) {
        self.0.layouts.set(self.0.layouts.get() + 1);
    }
}

// ========== Editor mount ==========

#[derive(Default)]
struct MountState {
    platforms: RefCell<Vec<String>>,
    inits: RefCell<Vec<WidgetInit>>,
    widgets: RefCell<Vec<InMemoryEditor>>,
    gate: RefCell<Option<oneshot::Receiver<std::result::Result<(), String>>>>,
}

/// Mount that builds `InMemoryEditor`s, optionally waiting on a gate.
#[derive(Clone, Default)]
pub struct InMemoryMount(Rc<MountState>);

/// Completes a gated load.
pub struct MountGate(oneshot::Sender<std::result::Result<(), String>>);

impl MountGate {
    pub fn open(self) {
        let _ = self.0.send(Ok(()));
    }

    pub fn fail(self, reason: &str) {
        let _ = self.0.send(Err(reason.to_string()));
    }
}

impl InMemoryMount {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mount whose next load waits until the gate is opened.
    pub fn gated() -> (Self, MountGate) {
        let (tx, rx) = oneshot::channel();
        let mount = Self::default();
        *mount.0.gate.borrow_mut() = Some(rx);
        (mount, MountGate(tx))
    }

    /// Install a new gate for the next load.
    pub fn gate_next(&self) -> MountGate {
        let (tx, rx) = oneshot::channel();
        *self.0.gate.borrow_mut() = Some(rx);
        MountGate(tx)
    }

    pub fn platforms(&self) -> Vec<String> {
        self.0.platforms.borrow().clone()
    }

    pub fn inits(&self) -> Vec<WidgetInit> {
        self.0.inits.borrow().clone()
    }

    pub fn widget_count(&self) -> usize {
        self.0.widgets.borrow().len()
    }

    /// Handle to the most recently created widget.
    pub fn widget(&self) -> Option<InMemoryEditor> {
        self.0.widgets.borrow().last().cloned()
    }
}

#[async_trait(?Send)]
impl EditorMount for InMemoryMount {
    type Widget = InMemoryEditor;

    fn mark_platform(&self, platform: &str) {
        self.0.platforms.borrow_mut().push(platform.to_string());
    }

    async fn load(&self, init: WidgetInit, on_change: ChangeListener) -> Result<InMemoryEditor> {
        self.0.inits.borrow_mut().push(init.clone());

        let gate = self.0.gate.borrow_mut().take();
        if let Some(gate) = gate {
            match gate.await {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => return Err(EditorError::LoadFailed(reason)),
                Err(_) => return Err(EditorError::LoadFailed("gate dropped".into())),
            }
        }

        let widget = InMemoryEditor::new(&init.value);
        widget.0.theme.set(Some(if init.theme == ThemeMode::Dark.editor_theme() {
            ThemeMode::Dark
        } else {
            ThemeMode::Light
        }));
        widget.set_listener(on_change);
        self.0.widgets.borrow_mut().push(widget.clone());
        Ok(widget)
    }
}

// ========== Host relay ==========

#[derive(Default)]
struct RelayState {
    platform: RefCell<Option<String>>,
    consumer: RefCell<Option<Rc<dyn Fn(SharedNote)>>>,
    saved: RefCell<Vec<SharedNote>>,
    pending: RefCell<Vec<(SharedNote, PresaveHook<SharedNote>)>>,
    defer_presave: Cell<bool>,
    fail_saves: Cell<bool>,
}

/// Host relay double that records every save.
#[derive(Clone, Default)]
pub struct RecordingRelay(Rc<RelayState>);

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(platform: &str) -> Self {
        let relay = Self::default();
        *relay.0.platform.borrow_mut() = Some(platform.to_string());
        relay
    }

    /// Push a note to the registered consumer. Returns the host's reference.
    pub fn push(&self, note: Note) -> SharedNote {
        let shared = SharedNote::new(note);
        self.push_ref(shared.clone());
        shared
    }

    /// Push an existing note reference.
    pub fn push_ref(&self, note: SharedNote) {
        let consumer = self.0.consumer.borrow().clone();
        if let Some(consumer) = consumer {
            consumer(note);
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.0.consumer.borrow().is_some()
    }

    /// Queue pre-save hooks instead of running them on save.
    pub fn defer_presave(&self, defer: bool) {
        self.0.defer_presave.set(defer);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.0.fail_saves.set(fail);
    }

    /// Run queued hooks and persist their notes.
    pub fn flush(&self) {
        let pending: Vec<_> = self.0.pending.borrow_mut().drain(..).collect();
        for (note, presave) in pending {
            presave(&note);
            self.0.saved.borrow_mut().push(note);
        }
    }

    /// Notes as persisted, in save order.
    pub fn saves(&self) -> Vec<Note> {
        self.0.saved.borrow().iter().map(SharedNote::snapshot).collect()
    }

    /// Note references that were persisted.
    pub fn saved_refs(&self) -> Vec<SharedNote> {
        self.0.saved.borrow().clone()
    }
}

impl HostRelay for RecordingRelay {
    type Note = SharedNote;

    fn platform(&self) -> Option<String> {
        self.0.platform.borrow().clone()
    }

    fn stream_note(&self, consumer: NoteConsumer<SharedNote>) -> relay::Result<()> {
        *self.0.consumer.borrow_mut() = Some(Rc::from(consumer));
        Ok(())
    }

    fn save_with_presave(
        &self,
        note: SharedNote,
        presave: PresaveHook<SharedNote>,
    ) -> relay::Result<()> {
        if self.0.fail_saves.get() {
            return Err(RelayError::SaveFailed("host rejected save".into()));
        }
        if self.0.defer_presave.get() {
            self.0.pending.borrow_mut().push((note, presave));
            return Ok(());
        }
        presave(&note);
        self.0.saved.borrow_mut().push(note);
        Ok(())
    }
}
