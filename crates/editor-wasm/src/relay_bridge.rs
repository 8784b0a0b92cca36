//! JavaScript bridge to the host's `ComponentRelay`.
//!
//! Implements the `HostRelay` trait on top of the relay library the host page
//! loads. Inbound callbacks (`onReady`, `handleRequestForContentHeight`,
//! `onThemesChange`) are turned into `HostEvent`s and handed to whatever
//! handler the plugin attaches; events that arrive before a handler is
//! attached are queued and replayed.

use editor_core::note::{self, NoteError, NoteRef, PresaveUpdate};
use editor_core::relay::{
    self, HostEvent, HostRelay, HostReply, NoteConsumer, Permission, PresaveHook, RelayError,
};
use std::cell::{OnceCell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[wasm_bindgen]
extern "C" {
    /// The host's relay class (global `ComponentRelay`).
    #[derive(Clone)]
    pub type ComponentRelay;

    #[wasm_bindgen(constructor, catch)]
    fn new(options: &js_sys::Object) -> Result<ComponentRelay, JsValue>;

    #[wasm_bindgen(method, getter)]
    fn platform(this: &ComponentRelay) -> Option<String>;

    #[wasm_bindgen(method, getter)]
    fn component(this: &ComponentRelay) -> JsValue;

    #[wasm_bindgen(method, catch, js_name = streamContextItem)]
    fn stream_context_item(
        this: &ComponentRelay,
        callback: &js_sys::Function,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = saveItemWithPresave)]
    fn save_item_with_presave(
        this: &ComponentRelay,
        item: &JsValue,
        presave: &js_sys::Function,
    ) -> Result<(), JsValue>;
}

/// Extract a readable message from a thrown JS value.
pub(crate) fn js_error_message(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(err, &"message".into())
                .ok()
                .and_then(|v| v.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}

fn get(target: &JsValue, key: &str) -> JsValue {
    js_sys::Reflect::get(target, &key.into()).unwrap_or(JsValue::UNDEFINED)
}

fn set(target: &JsValue, key: &str, value: &JsValue) -> note::Result<()> {
    js_sys::Reflect::set(target, &key.into(), value)
        .map(|_| ())
        .map_err(|e| NoteError::Write(format!("{}: {}", key, js_error_message(&e))))
}

/// A host note object, held by reference.
#[derive(Clone, Debug)]
pub struct JsNote(JsValue);

impl JsNote {
    pub fn new(item: JsValue) -> Self {
        Self(item)
    }

    /// The wrapped host object.
    pub fn item(&self) -> &JsValue {
        &self.0
    }
}

impl NoteRef for JsNote {
    type ClientData = JsValue;

    fn uuid(&self) -> String {
        get(&self.0, "uuid").as_string().unwrap_or_default()
    }

    fn text(&self) -> String {
        get(&get(&self.0, "content"), "text")
            .as_string()
            .unwrap_or_default()
    }

    fn client_data(&self) -> Option<JsValue> {
        let value = get(&self.0, "clientData");
        if value.is_undefined() { None } else { Some(value) }
    }

    fn is_metadata_update(&self) -> bool {
        get(&self.0, "isMetadataUpdate").as_bool().unwrap_or(false)
    }

    fn apply_presave(&self, update: PresaveUpdate<JsValue>) -> note::Result<()> {
        let mut content = get(&self.0, "content");
        if !content.is_object() {
            content = js_sys::Object::new().into();
            set(&self.0, "content", &content)?;
        }
        set(&content, "text", &update.text.into())?;
        set(
            &self.0,
            "clientData",
            &update.client_data.unwrap_or(JsValue::UNDEFINED),
        )?;
        set(&content, "preview_plain", &JsValue::NULL)?;
        set(&content, "preview_html", &JsValue::NULL)?;
        Ok(())
    }

    fn same_object(&self, other: &Self) -> bool {
        js_sys::Object::is(&self.0, &other.0)
    }
}

/// Receiver for inbound host messages.
pub type HostHandler = Rc<dyn Fn(HostEvent<JsNote>) -> HostReply>;

#[derive(Default)]
struct Inbox {
    handler: RefCell<Option<HostHandler>>,
    pending: RefCell<Vec<HostEvent<JsNote>>>,
}

impl Inbox {
    fn deliver(&self, event: HostEvent<JsNote>) -> Option<HostReply> {
        let handler = self.handler.borrow().clone();
        match handler {
            Some(handler) => Some(handler(event)),
            None => {
                tracing::debug!("Queueing {} until the plugin is attached", event.kind());
                self.pending.borrow_mut().push(event);
                None
            }
        }
    }
}

/// `HostRelay` backed by the host's `ComponentRelay`.
pub struct JsComponentRelay {
    relay: ComponentRelay,
    inbox: Rc<Inbox>,
    // JS holds references to these for the lifetime of the relay.
    _on_ready: Closure<dyn FnMut()>,
    _on_height: Closure<dyn FnMut() -> JsValue>,
    _on_themes: Closure<dyn FnMut()>,
    stream: RefCell<Option<Closure<dyn FnMut(JsValue)>>>,
    // The host coalesces saves and only runs the latest hook, so each save
    // replaces (and frees) the previous one.
    presave: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl JsComponentRelay {
    /// Open the channel to the host, requesting `permissions`.
    pub fn connect(permissions: &[Permission]) -> relay::Result<Self> {
        let inbox = Rc::new(Inbox::default());
        let handle: Rc<OnceCell<ComponentRelay>> = Rc::new(OnceCell::new());

        let on_ready = {
            let inbox = Rc::clone(&inbox);
            Closure::<dyn FnMut()>::new(move || {
                inbox.deliver(HostEvent::Ready);
            })
        };

        let on_height = {
            let inbox = Rc::clone(&inbox);
            Closure::<dyn FnMut() -> JsValue>::new(move || {
                match inbox.deliver(HostEvent::ContentHeightRequest) {
                    Some(HostReply::ContentHeight(Some(height))) => JsValue::from_f64(height),
                    _ => JsValue::UNDEFINED,
                }
            })
        };

        let on_themes = {
            let inbox = Rc::clone(&inbox);
            let handle = Rc::clone(&handle);
            Closure::<dyn FnMut()>::new(move || {
                let active_themes = handle.get().map(read_active_themes).unwrap_or_default();
                inbox.deliver(HostEvent::ThemesChanged { active_themes });
            })
        };

        let initial_permissions = js_sys::Array::new();
        for permission in permissions {
            let entry = js_sys::Object::new();
            js_sys::Reflect::set(&entry, &"name".into(), &permission.name().into())
                .map_err(|e| RelayError::Other(js_error_message(&e)))?;
            initial_permissions.push(&entry);
        }

        let options = js_sys::Object::new();
        let window = web_sys::window().ok_or(RelayError::NotConnected)?;
        let entries: [(&str, &JsValue); 5] = [
            ("initialPermissions", initial_permissions.as_ref()),
            ("targetWindow", window.as_ref()),
            ("onReady", on_ready.as_ref()),
            ("handleRequestForContentHeight", on_height.as_ref()),
            ("onThemesChange", on_themes.as_ref()),
        ];
        for (key, value) in entries {
            js_sys::Reflect::set(&options, &key.into(), value)
                .map_err(|e| RelayError::Other(js_error_message(&e)))?;
        }

        let relay = ComponentRelay::new(&options)
            .map_err(|e| RelayError::Other(format!("ComponentRelay: {}", js_error_message(&e))))?;
        let _ = handle.set(relay.clone());

        tracing::debug!("Component relay created");
        Ok(Self {
            relay,
            inbox,
            _on_ready: on_ready,
            _on_height: on_height,
            _on_themes: on_themes,
            stream: RefCell::new(None),
            presave: RefCell::new(None),
        })
    }

    /// Route inbound host messages to `handler`, replaying queued ones.
    pub fn set_handler(&self, handler: HostHandler) {
        *self.inbox.handler.borrow_mut() = Some(Rc::clone(&handler));
        let pending: Vec<_> = self.inbox.pending.borrow_mut().drain(..).collect();
        for event in pending {
            handler(event);
        }
    }
}

/// Theme identifiers from `relay.component.activeThemes`.
fn read_active_themes(relay: &ComponentRelay) -> Vec<String> {
    let themes = get(&relay.component(), "activeThemes");
    if !js_sys::Array::is_array(&themes) {
        return Vec::new();
    }
    js_sys::Array::from(&themes)
        .iter()
        .filter_map(|theme| theme.as_string())
        .collect()
}

impl HostRelay for JsComponentRelay {
    type Note = JsNote;

    fn platform(&self) -> Option<String> {
        self.relay.platform()
    }

    fn stream_note(&self, consumer: NoteConsumer<JsNote>) -> relay::Result<()> {
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |item: JsValue| {
            consumer(JsNote(item));
        });
        self.relay
            .stream_context_item(callback.as_ref().unchecked_ref())
            .map_err(|e| RelayError::PermissionDenied(js_error_message(&e)))?;
        *self.stream.borrow_mut() = Some(callback);
        Ok(())
    }

    fn save_with_presave(&self, note: JsNote, presave: PresaveHook<JsNote>) -> relay::Result<()> {
        let target = note.clone();
        let hook = Closure::once(move || presave(&target));
        let result = self
            .relay
            .save_item_with_presave(&note.0, hook.as_ref().unchecked_ref())
            .map_err(|e| RelayError::SaveFailed(js_error_message(&e)));
        *self.presave.borrow_mut() = Some(hook);
        result
    }
}
