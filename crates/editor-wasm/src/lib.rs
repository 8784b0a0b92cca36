//! WASM bindings for editor-core.
//!
//! Provides the bridge between the host page (JavaScript) and the Rust plugin.
//!
//! # Architecture
//!
//! ```text
//! JavaScript                        WASM (Rust)
//! ──────────                        ───────────
//! ComponentRelay ──callbacks──> JsComponentRelay (impl HostRelay)
//!                                       │
//! monaco (AMD)  <──bindings──── MonacoMount (impl EditorMount)
//!                                       │
//!                                       ▼
//!                        Plugin<JsComponentRelay, MonacoMount>
//!                                       │
//!                                       ▼
//!                           WasmPlugin (exposed to JS)
//! ```
//!
//! **Note**: This crate only compiles for `wasm32` targets. When building for native
//! targets (e.g., during `cargo check --workspace`), this crate provides no exports.

#[cfg(target_arch = "wasm32")]
mod monaco_bridge;
#[cfg(target_arch = "wasm32")]
mod relay_bridge;

#[cfg(target_arch = "wasm32")]
pub use monaco_bridge::{MonacoMount, MonacoWidget};
#[cfg(target_arch = "wasm32")]
pub use relay_bridge::{JsComponentRelay, JsNote};

#[cfg(target_arch = "wasm32")]
mod wasm_impl {
    use super::*;
    use editor_core::{HostReply, Plugin, PluginConfig, PluginError};
    use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
    use std::cell::RefCell;
    use std::rc::Rc;
    use thiserror::Error;
    use tracing_subscriber::layer::SubscriberExt;
    use wasm_bindgen::prelude::*;

    type EditorPlugin = Plugin<JsComponentRelay, MonacoMount>;

    // ========== Callback Logger Layer ==========

    thread_local! {
        static LOGGER_CALLBACK: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
        /// The page's plugin. Kept here so JS callbacks outlive any JS handle.
        static ACTIVE_PLUGIN: RefCell<Option<EditorPlugin>> = const { RefCell::new(None) };
    }

    /// Forwards every tracing event to the JS logger callback.
    struct JsCallbackLayer;

    impl<S> tracing_subscriber::Layer<S> for JsCallbackLayer
    where
        S: tracing::Subscriber,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            LOGGER_CALLBACK.with(|cb| {
                let Some(callback) = cb.borrow().clone() else {
                    return;
                };
                let metadata = event.metadata();

                let mut visitor = MessageVisitor::default();
                event.record(&mut visitor);

                let timestamp = web_time::SystemTime::now()
                    .duration_since(web_time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as f64)
                    .unwrap_or(0.0);

                let js_event = js_sys::Object::new();
                let fields: [(&str, JsValue); 4] = [
                    ("level", metadata.level().as_str().into()),
                    ("target", metadata.target().into()),
                    ("message", visitor.finish().into()),
                    ("timestamp", timestamp.into()),
                ];
                for (key, value) in fields {
                    let _ = js_sys::Reflect::set(&js_event, &key.into(), &value);
                }

                let _ = callback.call1(&JsValue::NULL, &js_event);
            });
        }
    }

    /// Collects the `message` field and appends any others as `key=value`.
    #[derive(Default)]
    struct MessageVisitor {
        message: String,
        fields: Vec<String>,
    }

    impl MessageVisitor {
        fn finish(self) -> String {
            if self.fields.is_empty() {
                self.message
            } else if self.message.is_empty() {
                self.fields.join(" ")
            } else {
                format!("{} {}", self.message, self.fields.join(" "))
            }
        }
    }

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.message = format!("{:?}", value);
            } else {
                self.fields.push(format!("{}={:?}", field.name(), value));
            }
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            if field.name() == "message" {
                self.message = value.to_string();
            } else {
                self.fields.push(format!("{}={}", field.name(), value));
            }
        }
    }

    /// Initialize the WASM module (sets up panic hook and tracing).
    ///
    /// Accepts an optional configuration object:
    /// - `init()` - console-only logging (default)
    /// - `init({ logger: (event) => {...} })` - callback + console logging
    ///
    /// The logger callback receives events with: `{ level, target, message, timestamp }`
    #[wasm_bindgen]
    pub fn init(config: Option<js_sys::Object>) {
        console_error_panic_hook::set_once();

        let callback = config
            .as_ref()
            .and_then(|cfg| js_sys::Reflect::get(cfg, &"logger".into()).ok())
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok());

        let console_layer = tracing_wasm::WASMLayer::new(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(tracing::Level::DEBUG)
                .build(),
        );

        match callback {
            Some(cb) => {
                LOGGER_CALLBACK.with(|cell| *cell.borrow_mut() = Some(cb));
                let subscriber = tracing_subscriber::registry()
                    .with(JsCallbackLayer)
                    .with(console_layer);
                tracing::subscriber::set_global_default(subscriber).ok();
            }
            None => {
                let subscriber = tracing_subscriber::registry().with(console_layer);
                tracing::subscriber::set_global_default(subscriber).ok();
            }
        }

        tracing::info!("editor-wasm {} initialized", env!("CARGO_PKG_VERSION"));
    }

    /// Get version string
    #[wasm_bindgen]
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    // ========== Spawner ==========

    /// Runs futures on the browser's microtask queue.
    struct WasmSpawner;

    impl LocalSpawn for WasmSpawner {
        fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
            wasm_bindgen_futures::spawn_local(future);
            Ok(())
        }
    }

    // ========== Startup ==========

    #[derive(Debug, Error)]
    enum StartError {
        #[error("{0}")]
        Plugin(#[from] PluginError),

        #[error("Invalid configuration: {0}")]
        Config(String),

        #[error("Page error: {0}")]
        Page(String),
    }

    fn parse_config(config: JsValue) -> Result<PluginConfig, StartError> {
        if config.is_undefined() || config.is_null() {
            return Ok(PluginConfig::default());
        }
        serde_wasm_bindgen::from_value(config).map_err(|e| StartError::Config(e.to_string()))
    }

    fn try_start(config: JsValue) -> Result<EditorPlugin, StartError> {
        let config = parse_config(config)?;

        let relay = JsComponentRelay::connect(&config.permissions).map_err(PluginError::from)?;
        let mount = MonacoMount::new(config.loader_path.clone());
        let plugin = Plugin::new(relay, mount, config, Rc::new(WasmSpawner))?;

        let weak = plugin.downgrade();
        plugin.relay().set_handler(Rc::new(move |event| {
            let Some(plugin) = weak.upgrade() else {
                return HostReply::Ack;
            };
            let kind = event.kind();
            plugin.handle(event).unwrap_or_else(|e| {
                tracing::warn!("Failed to handle {}: {}", kind, e);
                HostReply::Ack
            })
        }));
        plugin.connect()?;

        let weak = plugin.downgrade();
        let on_resize = Closure::<dyn FnMut()>::new(move || {
            if let Some(plugin) = weak.upgrade() {
                plugin.relayout();
            }
        });
        let window = web_sys::window().ok_or_else(|| StartError::Page("No window".into()))?;
        window
            .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
            .map_err(|e| StartError::Page(relay_bridge::js_error_message(&e)))?;
        // Page-lifetime listener.
        on_resize.forget();

        Ok(plugin)
    }

    /// Start the plugin: connect to the host relay and wait for it to be ready.
    ///
    /// Call once the DOM has loaded. `config` is an optional partial
    /// `PluginConfig` object. Startup failures are logged, not thrown; the
    /// editor then simply does not appear.
    #[wasm_bindgen]
    pub fn start(config: JsValue) -> Option<WasmPlugin> {
        match try_start(config) {
            Ok(plugin) => {
                ACTIVE_PLUGIN.with(|cell| *cell.borrow_mut() = Some(plugin.clone()));
                Some(WasmPlugin { inner: plugin })
            }
            Err(e) => {
                tracing::warn!("Editor plugin failed to start: {}", e);
                None
            }
        }
    }

    // ========== WASM Subscription Handle ==========

    /// Subscription handle exposed to JavaScript.
    ///
    /// Call `dispose()` to unsubscribe, or let the JS garbage collector
    /// collect it.
    #[wasm_bindgen]
    pub struct WasmSubscription {
        inner: RefCell<Option<editor_core::Subscription>>,
    }

    #[wasm_bindgen]
    impl WasmSubscription {
        /// Unsubscribe from events. Safe to call multiple times.
        pub fn dispose(&self) {
            self.inner.borrow_mut().take();
        }
    }

    /// Handle to the running plugin.
    #[wasm_bindgen]
    pub struct WasmPlugin {
        inner: EditorPlugin,
    }

    #[wasm_bindgen]
    impl WasmPlugin {
        /// Subscribe to plugin events for monitoring.
        #[wasm_bindgen(js_name = subscribeEvents)]
        pub fn subscribe_events(&self, callback: js_sys::Function) -> WasmSubscription {
            let subscription = self.inner.subscribe(move |event| {
                let serializer = serde_wasm_bindgen::Serializer::json_compatible();
                if let Ok(js_event) = serde::Serialize::serialize(&event, &serializer) {
                    let _ = callback.call1(&JsValue::NULL, &js_event);
                }
            });
            WasmSubscription {
                inner: RefCell::new(Some(subscription)),
            }
        }

        /// Current display mode: "light" or "dark".
        #[wasm_bindgen(js_name = themeMode)]
        pub fn theme_mode(&self) -> String {
            self.inner.theme().to_string()
        }

        /// Identifier of the note being edited, if any.
        #[wasm_bindgen(js_name = activeNoteUuid)]
        pub fn active_note_uuid(&self) -> Option<String> {
            self.inner.active_uuid()
        }

        /// Editor lifecycle state: detached, loading, ready or failed.
        #[wasm_bindgen(js_name = editorState)]
        pub fn editor_state(&self) -> String {
            self.inner.editor_state().to_string()
        }

        /// Recompute the editor layout (e.g. after the host resized the frame).
        pub fn relayout(&self) {
            self.inner.relayout();
        }
    }
}

// Re-export wasm_impl contents at crate root for wasm32 targets
#[cfg(target_arch = "wasm32")]
pub use wasm_impl::*;
