//! Plugin: coordinates the host relay, the session context and the editor.
//!
//! All plugin state lives in one `Plugin` value. Host messages arrive through
//! [`Plugin::handle`]; local edits arrive through the change listener the
//! plugin hands to the editor mount.
//!
//! # Re-entrancy
//!
//! Writing host text into the widget fires the widget's change listener
//! synchronously, which re-enters the plugin. No `RefCell` borrow of the
//! session is held across that call, and the listener checks the suppressor
//! before touching any other state.

use futures::task::{LocalFutureObj, LocalSpawn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;

use crate::config::{ConfigError, PluginConfig, WidgetInit};
use crate::editor::{EditorAdapter, EditorError, EditorMount, Suppressor};
use crate::events::{EventBus, PluginEvent, Subscription};
use crate::note::{NoteError, NoteRef};
use crate::relay::{HostEvent, HostRelay, HostReply, PresaveHook, RelayError};
use crate::session::{NoteUpdate, SessionContext};
use crate::theme::ThemeMode;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Note error: {0}")]
    Note(#[from] NoteError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn editor load: {0}")]
    Spawn(String),
}

pub type Result<T> = std::result::Result<T, PluginError>;

struct Inner<R: HostRelay, M: EditorMount> {
    relay: R,
    mount: M,
    config: PluginConfig,
    session: RefCell<SessionContext<R::Note>>,
    editor: RefCell<EditorAdapter<M::Widget>>,
    suppressor: Suppressor,
    events: Rc<EventBus>,
    spawner: Rc<dyn LocalSpawn>,
}

/// The editor plugin.
///
/// Cloning yields another handle to the same plugin.
pub struct Plugin<R: HostRelay, M: EditorMount> {
    inner: Rc<Inner<R, M>>,
}

impl<R: HostRelay, M: EditorMount> Clone for Plugin<R, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a plugin, for callbacks the plugin itself owns.
pub struct WeakPlugin<R: HostRelay, M: EditorMount> {
    inner: Weak<Inner<R, M>>,
}

impl<R: HostRelay, M: EditorMount> Clone for WeakPlugin<R, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<R, M> WeakPlugin<R, M>
where
    R: HostRelay + 'static,
    M: EditorMount + 'static,
{
    pub fn upgrade(&self) -> Option<Plugin<R, M>> {
        Plugin::from_weak(&self.inner)
    }
}

impl<R, M> Plugin<R, M>
where
    R: HostRelay + 'static,
    M: EditorMount + 'static,
{
    pub fn new(
        relay: R,
        mount: M,
        config: PluginConfig,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Result<Self> {
        config.validate()?;

        let suppressor = Suppressor::new();
        Ok(Self {
            inner: Rc::new(Inner {
                relay,
                mount,
                config,
                session: RefCell::new(SessionContext::new()),
                editor: RefCell::new(EditorAdapter::new(suppressor.clone())),
                suppressor,
                events: Rc::new(EventBus::new()),
                spawner,
            }),
        })
    }

    fn from_weak(weak: &Weak<Inner<R, M>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn downgrade(&self) -> WeakPlugin<R, M> {
        WeakPlugin {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Register for active-note pushes on the relay.
    pub fn connect(&self) -> Result<()> {
        let weak = Rc::downgrade(&self.inner);
        self.inner.relay.stream_note(Box::new(move |note| {
            if let Some(plugin) = Self::from_weak(&weak) {
                if let Err(e) = plugin.handle(HostEvent::NotePushed(note)) {
                    tracing::warn!("Failed to handle note push: {}", e);
                }
            }
        }))?;
        tracing::debug!(
            "Relay connected with permissions {:?}",
            self.inner.config.permissions
        );
        Ok(())
    }

    pub fn config(&self) -> &PluginConfig {
        &self.inner.config
    }

    pub fn relay(&self) -> &R {
        &self.inner.relay
    }

    /// Dispatch one inbound host message.
    pub fn handle(&self, event: HostEvent<R::Note>) -> Result<HostReply> {
        tracing::debug!("Host event: {}", event.kind());
        match event {
            HostEvent::Ready => {
                self.on_ready()?;
                Ok(HostReply::Ack)
            }
            HostEvent::ContentHeightRequest => Ok(HostReply::ContentHeight(self.content_height())),
            HostEvent::ThemesChanged { active_themes } => {
                self.on_themes_change(active_themes.as_slice())?;
                Ok(HostReply::Ack)
            }
            HostEvent::NotePushed(note) => {
                self.on_note(note)?;
                Ok(HostReply::Ack)
            }
        }
    }

    /// Host handshake completed: tag the platform and start loading the editor.
    pub fn on_ready(&self) -> Result<()> {
        if let Some(platform) = self.inner.relay.platform().filter(|p| !p.is_empty()) {
            self.inner.mount.mark_platform(&platform);
        }

        if !self.inner.editor.borrow_mut().begin_loading() {
            tracing::debug!("Ready received again, editor already loading or mounted");
            return Ok(());
        }

        let plugin = self.clone();
        let load = async move {
            if let Err(e) = plugin.mount_editor().await {
                tracing::warn!("Editor failed to load: {}", e);
            }
        };
        self.inner
            .spawner
            .spawn_local_obj(LocalFutureObj::new(Box::pin(load)))
            .map_err(|e| {
                self.inner.editor.borrow_mut().fail(e.to_string());
                PluginError::Spawn(e.to_string())
            })
    }

    /// Build the widget and bring it in line with the held note and theme.
    ///
    /// Notes pushed while loading are absorbed into the session; the latest
    /// held text is applied once the widget exists.
    pub async fn mount_editor(&self) -> Result<()> {
        let initial = self.inner.session.borrow().initial_text();
        let mode = self.inner.editor.borrow().theme();
        let init = WidgetInit::new(&self.inner.config.editor, initial.clone(), mode);

        let weak = Rc::downgrade(&self.inner);
        let on_change = Rc::new(move || {
            if let Some(plugin) = Self::from_weak(&weak) {
                if let Err(e) = plugin.on_local_edit() {
                    tracing::warn!("Failed to save note: {}", e);
                }
            }
        });

        let widget = match self.inner.mount.load(init, on_change).await {
            Ok(widget) => widget,
            Err(e) => {
                self.inner.editor.borrow_mut().fail(e.to_string());
                return Err(e.into());
            }
        };
        self.inner.editor.borrow_mut().attach(widget);
        tracing::info!("Editor mounted");
        self.inner.events.emit(PluginEvent::editor_mounted());

        let current_mode = self.inner.editor.borrow().theme();
        if current_mode != mode {
            self.inner.editor.borrow_mut().set_theme(current_mode)?;
        }

        let held = self.inner.session.borrow().initial_text();
        if held != initial {
            self.inner.editor.borrow().apply_text(&held)?;
        }
        self.inner.session.borrow_mut().record_text(&held);
        Ok(())
    }

    /// The plugin has no preferred height.
    pub fn content_height(&self) -> Option<f64> {
        None
    }

    /// Resolve the display mode and apply it to the editor.
    pub fn on_themes_change<S: AsRef<str>>(&self, active_themes: &[S]) -> Result<ThemeMode> {
        let mode = self.inner.config.dark_themes.resolve(active_themes);
        let previous = self.inner.editor.borrow().theme();
        self.inner.editor.borrow_mut().set_theme(mode)?;

        if previous != mode {
            tracing::info!("Theme changed to {}", mode);
            self.inner.events.emit(PluginEvent::theme_changed(mode));
        }
        Ok(mode)
    }

    /// Take in a pushed note and update the editor if its text changed.
    pub fn on_note(&self, note: R::Note) -> Result<()> {
        let uuid = note.uuid();
        let metadata_only = note.is_metadata_update();
        let update = self.inner.session.borrow_mut().receive(note);
        self.inner
            .events
            .emit(PluginEvent::note_received(&uuid, metadata_only));

        match update {
            NoteUpdate::MetadataOnly | NoteUpdate::Unchanged => Ok(()),
            NoteUpdate::Apply(text) => self.apply_host_text(&uuid, &text),
        }
    }

    fn apply_host_text(&self, uuid: &str, text: &str) -> Result<()> {
        {
            let editor = self.inner.editor.borrow();
            if !editor.is_ready() {
                tracing::debug!("Editor {}; holding note {}", editor.state().name(), uuid);
                return Ok(());
            }
            editor.apply_text(text)?;
        }
        self.inner.session.borrow_mut().record_text(text);
        self.inner.events.emit(PluginEvent::text_applied(uuid));
        Ok(())
    }

    /// Save the held note after a local edit.
    ///
    /// The held note, the editor text and the client data are captured before
    /// the save is requested; the pre-save hook writes them into that captured
    /// reference even if another note has been pushed by the time the host
    /// runs it.
    pub fn on_local_edit(&self) -> Result<()> {
        if self.inner.suppressor.is_suppressed() {
            return Ok(());
        }

        let Some(note) = self.inner.session.borrow().active_note() else {
            tracing::debug!("Edit before any note was received, not saving");
            return Ok(());
        };
        let uuid = note.uuid();
        let text = self.inner.editor.borrow().value()?;
        let update = self.inner.session.borrow().presave_update(text);

        let weak = Rc::downgrade(&self.inner);
        let saved_uuid = uuid.clone();
        let presave: PresaveHook<R::Note> = Box::new(move |target: &R::Note| {
            let Some(plugin) = Self::from_weak(&weak) else {
                return;
            };
            plugin
                .inner
                .session
                .borrow_mut()
                .record_saved(&saved_uuid, &update.text);
            if let Err(e) = target.apply_presave(update) {
                tracing::warn!("Pre-save failed for {}: {}", target.uuid(), e);
            }
        });

        self.inner.relay.save_with_presave(note, presave)?;
        self.inner.events.emit(PluginEvent::save_requested(&uuid));
        Ok(())
    }

    /// Window was resized.
    pub fn relayout(&self) {
        self.inner.editor.borrow().relayout();
    }

    /// Subscribe to plugin events. Drop the subscription to unsubscribe.
    pub fn subscribe(&self, callback: impl Fn(PluginEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    pub fn theme(&self) -> ThemeMode {
        self.inner.editor.borrow().theme()
    }

    pub fn active_uuid(&self) -> Option<String> {
        self.inner.session.borrow().active_uuid().map(str::to_string)
    }

    pub fn last_text(&self) -> Option<String> {
        self.inner.session.borrow().last_text().map(str::to_string)
    }

    pub fn is_editor_ready(&self) -> bool {
        self.inner.editor.borrow().is_ready()
    }

    pub fn editor_state(&self) -> &'static str {
        self.inner.editor.borrow().state().name()
    }

    /// Text currently shown by the editor.
    pub fn editor_value(&self) -> Result<String> {
        Ok(self.inner.editor.borrow().value()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;
    use crate::testing::{InMemoryMount, RecordingRelay};
    use futures::executor::LocalPool;
    use serde_json::json;

    struct Harness {
        pool: LocalPool,
        relay: RecordingRelay,
        mount: InMemoryMount,
        plugin: Plugin<RecordingRelay, InMemoryMount>,
    }

    fn harness_with(relay: RecordingRelay, mount: InMemoryMount) -> Harness {
        let pool = LocalPool::new();
        let plugin = Plugin::new(
            relay.clone(),
            mount.clone(),
            PluginConfig::default(),
            Rc::new(pool.spawner()),
        )
        .unwrap();
        plugin.connect().unwrap();
        Harness {
            pool,
            relay,
            mount,
            plugin,
        }
    }

    fn ready_harness() -> Harness {
        let mut h = harness_with(RecordingRelay::new(), InMemoryMount::new());
        h.plugin.handle(HostEvent::Ready).unwrap();
        h.pool.run_until_stalled();
        h
    }

    #[test]
    fn test_connect_registers_stream() {
        let h = harness_with(RecordingRelay::new(), InMemoryMount::new());
        assert!(h.relay.is_streaming());
    }

    #[test]
    fn test_content_height_has_no_opinion() {
        let h = harness_with(RecordingRelay::new(), InMemoryMount::new());
        assert_eq!(
            h.plugin.handle(HostEvent::ContentHeightRequest).unwrap(),
            HostReply::ContentHeight(None)
        );
    }

    #[test]
    fn test_ready_marks_platform_and_mounts() {
        let mut h = harness_with(RecordingRelay::with_platform("desktop"), InMemoryMount::new());
        assert_eq!(h.plugin.editor_state(), "detached");

        h.plugin.handle(HostEvent::Ready).unwrap();
        assert_eq!(h.plugin.editor_state(), "loading");
        h.pool.run_until_stalled();

        assert!(h.plugin.is_editor_ready());
        assert_eq!(h.mount.platforms(), vec!["desktop".to_string()]);
    }

    #[test]
    fn test_second_ready_does_not_remount() {
        let mut h = ready_harness();
        h.plugin.handle(HostEvent::Ready).unwrap();
        h.pool.run_until_stalled();

        assert_eq!(h.mount.widget_count(), 1);
    }

    #[test]
    fn test_host_push_does_not_trigger_save() {
        let h = ready_harness();
        h.relay.push(Note::new("a", "hello"));

        let widget = h.mount.widget().unwrap();
        assert_eq!(widget.writes(), vec!["hello".to_string()]);
        assert!(h.relay.saves().is_empty());
    }

    #[test]
    fn test_local_edit_saves_with_previews_cleared() {
        let h = ready_harness();
        h.relay.push(
            Note::new("a", "hello")
                .with_client_data(json!({"pos": 1}))
                .with_previews("hello", "<p>hello</p>"),
        );

        h.mount.widget().unwrap().type_text("!");

        let saves = h.relay.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].content.text, "hello!");
        assert_eq!(saves[0].content.preview_plain, None);
        assert_eq!(saves[0].content.preview_html, None);
        assert_eq!(saves[0].client_data, Some(json!({"pos": 1})));
        assert_eq!(h.plugin.last_text().as_deref(), Some("hello!"));
    }

    #[test]
    fn test_edit_before_any_note_is_ignored() {
        let h = ready_harness();
        h.mount.widget().unwrap().type_text("orphan");
        assert!(h.relay.saves().is_empty());
    }

    #[test]
    fn test_save_failure_is_reported() {
        let h = ready_harness();
        h.relay.push(Note::new("a", "x"));
        h.relay.fail_saves(true);

        let err = h.plugin.on_local_edit().unwrap_err();
        assert!(matches!(err, PluginError::Relay(RelayError::SaveFailed(_))));
    }

    #[test]
    fn test_failed_load_allows_retry() {
        let (mount, gate) = InMemoryMount::gated();
        let mut h = harness_with(RecordingRelay::new(), mount);

        h.plugin.handle(HostEvent::Ready).unwrap();
        gate.fail("offline");
        h.pool.run_until_stalled();
        assert_eq!(h.plugin.editor_state(), "failed");

        let retry = h.mount.gate_next();
        h.plugin.handle(HostEvent::Ready).unwrap();
        h.pool.run_until_stalled();
        assert_eq!(h.plugin.editor_state(), "loading");

        retry.open();
        h.pool.run_until_stalled();
        assert!(h.plugin.is_editor_ready());
        assert_eq!(h.mount.widget_count(), 1);
    }

    #[test]
    fn test_weak_handle_does_not_keep_plugin_alive() {
        let h = harness_with(RecordingRelay::new(), InMemoryMount::new());
        let weak = h.plugin.downgrade();
        assert!(weak.upgrade().is_some());

        drop(h);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_relayout_reaches_widget() {
        let h = ready_harness();
        h.plugin.relayout();
        h.plugin.relayout();
        assert_eq!(h.mount.widget().unwrap().layout_count(), 2);
    }

    #[test]
    fn test_events_published() {
        let h = ready_harness();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _sub = h.plugin.subscribe(move |event| seen_clone.borrow_mut().push(event));

        h.relay.push(Note::new("a", "hello"));
        h.mount.widget().unwrap().type_text(" world");

        let kinds: Vec<_> = seen
            .borrow()
            .iter()
            .map(|event| match event {
                PluginEvent::NoteReceived { .. } => "received",
                PluginEvent::TextApplied { .. } => "applied",
                PluginEvent::SaveRequested { .. } => "save",
                PluginEvent::EditorMounted { .. } => "mounted",
                PluginEvent::ThemeChanged { .. } => "theme",
            })
            .collect();
        assert_eq!(kinds, vec!["received", "applied", "save"]);
    }
}
