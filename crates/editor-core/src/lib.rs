//! editor-core: platform-independent logic for the markdown editor plugin.
//!
//! This crate provides:
//! - The host note model and the `NoteRef` reference abstraction
//! - Session context tracking the active note and the sync baseline
//! - The editor adapter lifecycle and scoped change suppression
//! - Light/dark theme resolution and plugin configuration
//! - `HostRelay` and `EditorMount`/`EditorWidget` trait seams
//! - `Plugin`, which coordinates all of the above

pub mod config;
pub mod editor;
pub mod events;
pub mod note;
pub mod plugin;
pub mod relay;
pub mod session;
pub mod testing;
pub mod theme;

pub use config::{ConfigError, EditorOptions, PluginConfig, WidgetInit};
pub use editor::{ChangeListener, EditorAdapter, EditorError, EditorMount, EditorWidget, Suppressor};
pub use events::{EventBus, PluginEvent, Subscription};
pub use note::{ClientData, Note, NoteError, NoteRef, PresaveUpdate, SharedNote};
pub use plugin::{Plugin, PluginError, WeakPlugin};
pub use relay::{HostEvent, HostRelay, HostReply, Permission, RelayError};
pub use session::{NoteUpdate, SessionContext};
pub use theme::{DarkThemes, ThemeMode};
