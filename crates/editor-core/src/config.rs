//! Plugin configuration.
//!
//! Every field has a default; `PluginConfig::default()` is the configuration
//! the plugin ships with. The JS side may pass a partial object to override
//! individual values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::relay::Permission;
use crate::theme::{DarkThemes, ThemeMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one relay permission is required")]
    NoPermissions,

    #[error("Editor language must not be empty")]
    EmptyLanguage,

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

/// Main configuration for the plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Permissions requested from the host when the relay connects
    #[serde(default = "default_permissions")]
    pub permissions: Vec<Permission>,

    /// Theme identifiers that select the dark editor theme
    #[serde(default)]
    pub dark_themes: DarkThemes,

    /// Widget construction options
    #[serde(default)]
    pub editor: EditorOptions,

    /// Base path the AMD loader resolves `vs/...` modules from
    #[serde(default = "default_loader_path")]
    pub loader_path: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            permissions: default_permissions(),
            dark_themes: DarkThemes::default(),
            editor: EditorOptions::default(),
            loader_path: default_loader_path(),
        }
    }
}

impl PluginConfig {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.permissions.is_empty() {
            return Err(ConfigError::NoPermissions);
        }
        if self.editor.language.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        Ok(())
    }
}

fn default_permissions() -> Vec<Permission> {
    vec![Permission::StreamContextItem]
}

fn default_loader_path() -> String {
    "https://cdn.jsdelivr.net/npm/monaco-editor@0.50.0/min/vs".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WordWrap {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScrollbarVisibility {
    Auto,
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollbarOptions {
    #[serde(default = "default_scrollbar_size")]
    pub vertical_scrollbar_size: u32,
    #[serde(default = "default_scrollbar_size")]
    pub horizontal_scrollbar_size: u32,
    #[serde(default = "default_scrollbar_visibility")]
    pub vertical: ScrollbarVisibility,
    #[serde(default = "default_scrollbar_visibility")]
    pub horizontal: ScrollbarVisibility,
}

impl Default for ScrollbarOptions {
    fn default() -> Self {
        Self {
            vertical_scrollbar_size: default_scrollbar_size(),
            horizontal_scrollbar_size: default_scrollbar_size(),
            vertical: default_scrollbar_visibility(),
            horizontal: default_scrollbar_visibility(),
        }
    }
}

fn default_scrollbar_size() -> u32 {
    7
}

fn default_scrollbar_visibility() -> ScrollbarVisibility {
    ScrollbarVisibility::Auto
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimapOptions {
    pub enabled: bool,
}

/// Options the widget is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorOptions {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub line_numbers: bool,
    #[serde(default)]
    pub line_decorations_width: u32,
    #[serde(default)]
    pub line_numbers_min_chars: u32,
    #[serde(default = "default_minimap")]
    pub minimap: MinimapOptions,
    #[serde(default = "default_word_wrap")]
    pub word_wrap: WordWrap,
    #[serde(default)]
    pub scrollbar: ScrollbarOptions,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            language: default_language(),
            line_numbers: false,
            line_decorations_width: 0,
            line_numbers_min_chars: 0,
            minimap: default_minimap(),
            word_wrap: default_word_wrap(),
            scrollbar: ScrollbarOptions::default(),
        }
    }
}

fn default_language() -> String {
    "markdown".to_string()
}

fn default_minimap() -> MinimapOptions {
    MinimapOptions { enabled: false }
}

fn default_word_wrap() -> WordWrap {
    WordWrap::On
}

/// Everything the widget needs at construction time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetInit {
    /// Initial text (the held note's text, or empty)
    pub value: String,
    /// Editor theme name for the current mode
    pub theme: &'static str,
    #[serde(flatten)]
    pub options: EditorOptions,
}

impl WidgetInit {
    pub fn new(options: &EditorOptions, value: String, mode: ThemeMode) -> Self {
        Self {
            value,
            theme: mode.editor_theme(),
            options: options.clone(),
        }
    }

    /// JSON value of the widget's creation options.
    ///
    /// `lineNumbers` is rendered as the `"on"`/`"off"` string the widget expects.
    pub fn to_widget_options(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            let line_numbers = if self.options.line_numbers { "on" } else { "off" };
            obj.insert("lineNumbers".into(), line_numbers.into());
        }
        value
    }
}
