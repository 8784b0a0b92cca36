//! Light/dark display mode resolved from the host's active themes.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Host theme packages that render on a dark background.
pub const DEFAULT_DARK_THEMES: [&str; 3] = [
    "org.standardnotes.theme-focus",
    "org.standardnotes.theme-futura",
    "com.standardnotes.theme-proton",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    /// Name of the built-in editor theme for this mode.
    pub fn editor_theme(self) -> &'static str {
        match self {
            ThemeMode::Light => "vs",
            ThemeMode::Dark => "vs-dark",
        }
    }
}

impl Display for ThemeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        })
    }
}

/// Fixed allow-list of dark theme package identifiers.
///
/// The host may report themes either by package identifier or by the URL of
/// the theme's stylesheet, which embeds the identifier as a path segment. An
/// active theme matches when it, or one of its path segments, equals a listed
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DarkThemes(Vec<String>);

impl Default for DarkThemes {
    fn default() -> Self {
        Self(DEFAULT_DARK_THEMES.iter().map(|s| s.to_string()).collect())
    }
}

impl DarkThemes {
    pub fn new(identifiers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(identifiers.into_iter().map(Into::into).collect())
    }

    /// Resolve the display mode for a list of active theme entries.
    ///
    /// No active theme, or none on the allow-list, selects light.
    pub fn resolve<S: AsRef<str>>(&self, active_themes: &[S]) -> ThemeMode {
        let dark = active_themes.iter().any(|active| {
            let active = active.as_ref();
            active.split('/').any(|segment| self.is_listed(segment))
        });

        if dark { ThemeMode::Dark } else { ThemeMode::Light }
    }

    fn is_listed(&self, identifier: &str) -> bool {
        !identifier.is_empty() && self.0.iter().any(|id| id == identifier)
    }
}
