//! Editor adapter: lifecycle of the lazily loaded text-editing widget.
//!
//! The widget library is loaded out-of-band, so the adapter moves through
//! `Detached` → `Loading` → `Ready`. Host-driven writes go through
//! [`EditorAdapter::apply_text`], which holds a [`SuppressionGuard`] for the
//! duration of the write so change events raised by it are not mistaken for
//! user edits.

use async_trait::async_trait;
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

use crate::config::WidgetInit;
use crate::theme::ThemeMode;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Editor not ready")]
    NotReady,

    #[error("Editor failed to load: {0}")]
    LoadFailed(String),

    #[error("Editor operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Callback the widget invokes whenever its content changes.
pub type ChangeListener = Rc<dyn Fn()>;

/// A live text-editing widget.
pub trait EditorWidget {
    /// Current text.
    fn value(&self) -> Result<String>;

    /// Replace the text. May synchronously fire the change listener.
    fn set_value(&self, text: &str) -> Result<()>;

    fn set_theme(&self, mode: ThemeMode) -> Result<()>;

    /// Recompute layout after the container was resized.
    fn layout(&self);
}

/// Page-side factory for the widget.
#[async_trait(?Send)]
pub trait EditorMount {
    type Widget: EditorWidget;

    /// Tag the page with the host platform (used for styling).
    fn mark_platform(&self, platform: &str);

    /// Load the widget library and create the widget.
    ///
    /// `on_change` must be registered as the widget's content-change listener.
    async fn load(&self, init: WidgetInit, on_change: ChangeListener) -> Result<Self::Widget>;
}

/// Shared flag marking host-originated edits in progress.
#[derive(Debug, Clone, Default)]
pub struct Suppressor(Rc<Cell<bool>>);

impl Suppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress change handling until the returned guard is dropped.
    pub fn suppress(&self) -> SuppressionGuard {
        let previous = self.0.replace(true);
        SuppressionGuard {
            flag: Rc::clone(&self.0),
            previous,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.0.get()
    }
}

/// Scoped suppression token; restores the previous state on drop.
#[must_use = "suppression ends when the guard is dropped"]
pub struct SuppressionGuard {
    flag: Rc<Cell<bool>>,
    previous: bool,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// Lifecycle state of the widget.
pub enum EditorState<W> {
    Detached,
    Loading,
    Ready(W),
    Failed(String),
}

impl<W> EditorState<W> {
    pub fn name(&self) -> &'static str {
        match self {
            EditorState::Detached => "detached",
            EditorState::Loading => "loading",
            EditorState::Ready(_) => "ready",
            EditorState::Failed(_) => "failed",
        }
    }
}

/// Owns the widget and the current display theme.
pub struct EditorAdapter<W> {
    state: EditorState<W>,
    mode: ThemeMode,
    suppressor: Suppressor,
}

impl<W: EditorWidget> EditorAdapter<W> {
    pub fn new(suppressor: Suppressor) -> Self {
        Self {
            state: EditorState::Detached,
            mode: ThemeMode::default(),
            suppressor,
        }
    }

    pub fn state(&self) -> &EditorState<W> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EditorState::Ready(_))
    }

    pub fn widget(&self) -> Option<&W> {
        match &self.state {
            EditorState::Ready(widget) => Some(widget),
            _ => None,
        }
    }

    pub fn theme(&self) -> ThemeMode {
        self.mode
    }

    /// Move to `Loading`. Returns false if a widget exists or is being built.
    pub fn begin_loading(&mut self) -> bool {
        match self.state {
            EditorState::Detached | EditorState::Failed(_) => {
                self.state = EditorState::Loading;
                true
            }
            EditorState::Loading | EditorState::Ready(_) => false,
        }
    }

    /// Install the constructed widget.
    pub fn attach(&mut self, widget: W) {
        self.state = EditorState::Ready(widget);
    }

    pub fn fail(&mut self, reason: String) {
        self.state = EditorState::Failed(reason);
    }

    /// Record the display mode and update a live widget in place.
    pub fn set_theme(&mut self, mode: ThemeMode) -> Result<()> {
        self.mode = mode;
        match self.widget() {
            Some(widget) => widget.set_theme(mode),
            None => Ok(()),
        }
    }

    pub fn value(&self) -> Result<String> {
        self.widget().ok_or(EditorError::NotReady)?.value()
    }

    /// Write host-originated text with change handling suppressed.
    pub fn apply_text(&self, text: &str) -> Result<()> {
        let widget = self.widget().ok_or(EditorError::NotReady)?;
        let _guard = self.suppressor.suppress();
        widget.set_value(text)
    }

    pub fn relayout(&self) {
        if let Some(widget) = self.widget() {
            widget.layout();
        }
    }
}
