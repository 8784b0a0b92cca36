//! Plugin events for debug/monitoring and the `EventBus` that publishes them.
//!
//! The plugin runs on the page's single event thread, so the bus uses
//! `Rc`/`RefCell` and carries no `Send`/`Sync` bounds.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::theme::ThemeMode;

/// Events emitted while synchronizing the editor with the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PluginEvent {
    /// Host pushed the active note.
    NoteReceived {
        uuid: String,
        #[serde(rename = "metadataOnly")]
        metadata_only: bool,
        timestamp: f64,
    },
    /// Host text was written into the editor.
    TextApplied { uuid: String, timestamp: f64 },
    /// A local edit was handed to the host for saving.
    SaveRequested { uuid: String, timestamp: f64 },
    /// The editor widget finished loading.
    EditorMounted { timestamp: f64 },
    /// Display mode changed.
    ThemeChanged { mode: ThemeMode, timestamp: f64 },
}

impl PluginEvent {
    pub fn note_received(uuid: &str, metadata_only: bool) -> Self {
        PluginEvent::NoteReceived {
            uuid: uuid.to_string(),
            metadata_only,
            timestamp: now_millis(),
        }
    }

    pub fn text_applied(uuid: &str) -> Self {
        PluginEvent::TextApplied {
            uuid: uuid.to_string(),
            timestamp: now_millis(),
        }
    }

    pub fn save_requested(uuid: &str) -> Self {
        PluginEvent::SaveRequested {
            uuid: uuid.to_string(),
            timestamp: now_millis(),
        }
    }

    pub fn editor_mounted() -> Self {
        PluginEvent::EditorMounted {
            timestamp: now_millis(),
        }
    }

    pub fn theme_changed(mode: ThemeMode) -> Self {
        PluginEvent::ThemeChanged {
            mode,
            timestamp: now_millis(),
        }
    }
}

/// Milliseconds since Unix epoch (works in WASM).
fn now_millis() -> f64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Hold this value to keep receiving events, drop it to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Publishes plugin events to subscribers. Wrap in `Rc` to subscribe.
#[derive(Default)]
pub struct EventBus {
    callbacks: RefCell<Vec<(usize, Rc<dyn Fn(PluginEvent)>)>>,
    next_id: Cell<usize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(self: &Rc<Self>, callback: impl Fn(PluginEvent) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.callbacks.borrow_mut().push((id, Rc::new(callback)));
        Subscription {
            bus: Rc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // A callback may drop its own subscription while we are emitting.
        if let Ok(mut callbacks) = self.callbacks.try_borrow_mut() {
            callbacks.retain(|(i, _)| *i != id);
        }
    }

    pub fn emit(&self, event: PluginEvent) {
        // Snapshot so callbacks may subscribe while we iterate.
        let callbacks: Vec<_> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_emit() {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);

        let _sub = bus.subscribe(move |event| seen_clone.borrow_mut().push(event));
        bus.emit(PluginEvent::text_applied("a"));

        assert_eq!(seen.borrow().len(), 1);
        assert!(matches!(&seen.borrow()[0], PluginEvent::TextApplied { uuid, .. } if uuid == "a"));
    }

    #[test]
    fn test_subscription_unsubscribes_on_drop() {
        let bus = Rc::new(EventBus::new());
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);

        {
            let _sub = bus.subscribe(move |_| count_clone.set(count_clone.get() + 1));
            bus.emit(PluginEvent::editor_mounted());
        }
        bus.emit(PluginEvent::editor_mounted());

        assert_eq!(count.get(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = PluginEvent::note_received("a", true);
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"type\":\"noteReceived\""));
        assert!(json.contains("\"metadataOnly\":true"));
        assert!(json.contains("\"uuid\":\"a\""));

        let json = serde_json::to_string(&PluginEvent::theme_changed(ThemeMode::Dark)).unwrap();
        assert!(json.contains("\"mode\":\"dark\""));
    }
}
