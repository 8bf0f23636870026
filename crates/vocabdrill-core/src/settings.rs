//! Display preferences and the per-user settings document.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::speech::SpeechSettings;
use crate::store::{KeyValueStore, StorageKeys};

/// Presentation toggles and pacing delays.
///
/// The delays only pace an interactive front end; skipping them never changes
/// what the engine does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub show_icon: bool,
    pub show_example: bool,
    pub auto_speak: bool,
    pub speak_delay_ms: u64,
    pub correct_display_ms: u64,
    pub wrong_display_ms: u64,
    /// Pause after a level-up/level-down message.
    pub transition_display_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_icon: true,
            show_example: true,
            auto_speak: true,
            speak_delay_ms: 300,
            correct_display_ms: 1500,
            wrong_display_ms: 2000,
            transition_display_ms: 2000,
        }
    }
}

/// Settings a user saved for themselves. Sections that are present replace
/// the application defaults wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplaySettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<SpeechSettings>,
}

impl UserSettings {
    /// Overlay these settings on application defaults.
    pub fn resolve(
        &self,
        display: &DisplaySettings,
        tts: &SpeechSettings,
    ) -> (DisplaySettings, SpeechSettings) {
        (
            self.display.clone().unwrap_or_else(|| display.clone()),
            self.tts.clone().unwrap_or_else(|| tts.clone()),
        )
    }
}

/// Load a user's settings; absent or corrupt documents yield empty settings.
pub fn load_user_settings(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
    user: &str,
) -> UserSettings {
    match store.get(&keys.settings(user)) {
        Ok(Some(doc)) => serde_json::from_str(&doc).unwrap_or_else(|e| {
            tracing::warn!("settings document for '{user}' is corrupt, ignoring: {e}");
            UserSettings::default()
        }),
        Ok(None) => UserSettings::default(),
        Err(e) => {
            tracing::warn!("failed to read settings for '{user}': {e}");
            UserSettings::default()
        }
    }
}

pub fn save_user_settings(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
    user: &str,
    settings: &UserSettings,
) -> Result<(), StoreError> {
    let doc = serde_json::to_string(settings)?;
    store.set(&keys.settings(user), &doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn present_sections_override_defaults() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();
        let saved = UserSettings {
            display: Some(DisplaySettings {
                auto_speak: false,
                ..Default::default()
            }),
            tts: None,
        };
        save_user_settings(&store, &keys, "amy", &saved).unwrap();

        let loaded = load_user_settings(&store, &keys, "amy");
        let (display, tts) =
            loaded.resolve(&DisplaySettings::default(), &SpeechSettings::default());
        assert!(!display.auto_speak);
        assert_eq!(tts, SpeechSettings::default());
    }

    #[test]
    fn corrupt_settings_are_ignored() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();
        store.set(&keys.settings("amy"), "not json").unwrap();
        assert_eq!(
            load_user_settings(&store, &keys, "amy"),
            UserSettings::default()
        );
    }

    #[test]
    fn partial_display_document_fills_defaults() {
        let parsed: UserSettings =
            serde_json::from_str(r#"{"display":{"show_icon":false}}"#).unwrap();
        let display = parsed.display.unwrap();
        assert!(!display.show_icon);
        assert_eq!(display.correct_display_ms, 1500);
    }
}
