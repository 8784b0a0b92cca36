//! Monaco editor bindings.
//!
//! The editor library is fetched through the page's AMD loader (`require`),
//! so loading is asynchronous: `MonacoMount::load` resolves once
//! `vs/editor/editor.main` is available and the editor has been created.

use async_trait::async_trait;
use editor_core::config::WidgetInit;
use editor_core::editor::{ChangeListener, EditorError, EditorMount, EditorWidget, Result};
use editor_core::ThemeMode;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::relay_bridge::js_error_message;

/// Element the editor is mounted into.
const CONTAINER_TAG: &str = "editor";
const EDITOR_MODULE: &str = "vs/editor/editor.main";

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = require, js_name = config)]
    fn require_config(config: &JsValue);

    #[wasm_bindgen(js_name = require)]
    fn require_modules(
        modules: &js_sys::Array,
        on_load: &js_sys::Function,
        on_error: &js_sys::Function,
    );

    pub type MonacoEditor;

    #[wasm_bindgen(js_namespace = ["monaco", "editor"], js_name = create, catch)]
    fn create_editor(
        container: &web_sys::Element,
        options: &JsValue,
    ) -> std::result::Result<MonacoEditor, JsValue>;

    #[wasm_bindgen(js_namespace = ["monaco", "editor"], js_name = setTheme)]
    fn set_global_theme(theme: &str);

    #[wasm_bindgen(method, js_name = getValue)]
    fn get_value(this: &MonacoEditor) -> String;

    #[wasm_bindgen(method, js_name = getModel)]
    fn get_model(this: &MonacoEditor) -> Option<TextModel>;

    #[wasm_bindgen(method)]
    fn layout(this: &MonacoEditor);

    pub type TextModel;

    #[wasm_bindgen(method, catch, js_name = setValue)]
    fn set_value(this: &TextModel, value: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = onDidChangeContent)]
    fn on_did_change_content(this: &TextModel, listener: &js_sys::Function) -> JsValue;
}

/// Convert a serializable value to a plain JS object (not a `Map`).
fn to_js_object<T: Serialize>(value: &T) -> Result<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| EditorError::Operation(e.to_string()))
}

/// Point the AMD loader at `loader_path` and wait for the editor module.
async fn load_editor_module(loader_path: &str) -> Result<()> {
    let config = serde_json::json!({ "paths": { "vs": loader_path } });
    require_config(&to_js_object(&config)?);

    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let modules = js_sys::Array::of1(&EDITOR_MODULE.into());
        require_modules(&modules, &resolve, &reject);
    });
    JsFuture::from(promise)
        .await
        .map_err(|e| EditorError::LoadFailed(js_error_message(&e)))?;

    tracing::debug!("Loaded {} from {}", EDITOR_MODULE, loader_path);
    Ok(())
}

/// Creates Monaco editors inside an `<editor>` element appended to `<body>`.
pub struct MonacoMount {
    loader_path: String,
}

impl MonacoMount {
    pub fn new(loader_path: impl Into<String>) -> Self {
        Self {
            loader_path: loader_path.into(),
        }
    }
}

fn document() -> Result<web_sys::Document> {
    web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| EditorError::Operation("No document".into()))
}

/// The `<editor>` element, created on first use and reused by later loads.
fn editor_container() -> Result<web_sys::Element> {
    let doc = document()?;
    let existing = doc
        .query_selector(CONTAINER_TAG)
        .map_err(|e| EditorError::Operation(js_error_message(&e)))?;
    if let Some(container) = existing {
        return Ok(container);
    }

    let body = doc
        .body()
        .ok_or_else(|| EditorError::Operation("No body element".into()))?;
    let container = doc
        .create_element(CONTAINER_TAG)
        .map_err(|e| EditorError::Operation(js_error_message(&e)))?;
    body.append_child(&container)
        .map_err(|e| EditorError::Operation(js_error_message(&e)))?;
    Ok(container)
}

#[async_trait(?Send)]
impl EditorMount for MonacoMount {
    type Widget = MonacoWidget;

    fn mark_platform(&self, platform: &str) {
        let Some(body) = document().ok().and_then(|doc| doc.body()) else {
            return;
        };
        if let Err(e) = body.class_list().add_1(platform) {
            tracing::warn!(
                "Failed to tag body with platform {}: {}",
                platform,
                js_error_message(&e)
            );
        }
    }

    async fn load(&self, init: WidgetInit, on_change: ChangeListener) -> Result<MonacoWidget> {
        let container = editor_container()?;
        load_editor_module(&self.loader_path).await?;

        let options = to_js_object(&init.to_widget_options())?;
        let editor = create_editor(&container, &options)
            .map_err(|e| EditorError::LoadFailed(js_error_message(&e)))?;
        let model = editor
            .get_model()
            .ok_or_else(|| EditorError::LoadFailed("Editor has no model".into()))?;

        let listener = Closure::<dyn FnMut(JsValue)>::new(move |_event: JsValue| on_change());
        model.on_did_change_content(listener.as_ref().unchecked_ref());

        Ok(MonacoWidget {
            editor,
            model,
            _listener: listener,
        })
    }
}

/// A live Monaco editor.
pub struct MonacoWidget {
    editor: MonacoEditor,
    model: TextModel,
    _listener: Closure<dyn FnMut(JsValue)>,
}

impl EditorWidget for MonacoWidget {
    fn value(&self) -> Result<String> {
        Ok(self.editor.get_value())
    }

    fn set_value(&self, text: &str) -> Result<()> {
        self.model
            .set_value(text)
            .map_err(|e| EditorError::Operation(js_error_message(&e)))
    }

    fn set_theme(&self, mode: ThemeMode) -> Result<()> {
        // Monaco themes are global to the page.
        set_global_theme(mode.editor_theme());
        Ok(())
    }

    fn layout(&self) {
        self.editor.layout();
    }
}
