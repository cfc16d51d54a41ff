//! Persisted user preferences
//!
//! Preferences live in a flat string key-value store. Each entry is read and
//! written independently and there is no schema versioning: malformed values
//! fall back to their defaults instead of failing.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::timer::DEFAULT_MINUTES;

/// Store key for the generation API credential
pub const KEY_CREDENTIAL: &str = "unstuck_gemini_key";
/// Store key for the completion sound flag
pub const KEY_SOUND: &str = "unstuck_sound";
/// Store key for the timer duration in minutes
pub const KEY_TIMER_DURATION: &str = "unstuck_timer_duration";
/// Store key for the light/dark theme
pub const KEY_THEME: &str = "unstuck_theme";

/// Errors from a preferences store
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("Failed to access preferences file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize preferences: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat string key-value storage
pub trait PrefStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;
    fn remove(&mut self, key: &str) -> Result<(), PrefsError>;
}

/// In-memory store, used by tests and as a fallback when no file is usable
#[derive(Debug, Default, Clone)]
pub struct MemoryPrefStore {
    entries: BTreeMap<String, String>,
}

impl MemoryPrefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl PrefStore for MemoryPrefStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PrefsError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON file store: one object of string entries, rewritten on every change
#[derive(Debug)]
pub struct FilePrefStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FilePrefStore {
    /// Open the store, treating a missing or unreadable file as empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(?path, "FilePrefStore::open: called");
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed preferences file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("FilePrefStore::open: no preferences file yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read preferences file");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    fn save(&self) -> Result<(), PrefsError> {
        debug!(path = %self.path.display(), "FilePrefStore::save: called");
        let io_err = |source| PrefsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content).map_err(io_err)
    }
}

impl PrefStore for FilePrefStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<(), PrefsError> {
        if self.entries.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }
}

/// Color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Parse a stored value; anything unrecognized means "follow the system"
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    /// Best guess at the terminal's background, from `COLORFGBG`
    pub fn system() -> Self {
        Self::from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
    }

    fn from_colorfgbg(value: Option<&str>) -> Self {
        let background = value
            .and_then(|v| v.rsplit(';').next())
            .and_then(|bg| bg.parse::<u8>().ok());
        match background {
            Some(7) | Some(9..=15) => Self::Light,
            _ => Self::Dark,
        }
    }

    /// Next explicit theme: flips the current choice, or the system one if unset
    pub fn toggled(current: Option<Self>, system: Self) -> Self {
        match current.unwrap_or(system) {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Preference values with their defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// API credential; `None` until the user supplies one
    pub credential: Option<String>,
    /// Play the chime when the timer finishes (default on)
    pub sound_enabled: bool,
    /// Timer length in whole minutes (default 15)
    pub timer_minutes: u32,
    /// Explicit theme; `None` follows the system
    pub theme: Option<Theme>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            credential: None,
            sound_enabled: true,
            timer_minutes: DEFAULT_MINUTES,
            theme: None,
        }
    }
}

impl Preferences {
    /// Read every entry, falling back silently on absent or malformed values
    pub fn load(store: &dyn PrefStore) -> Self {
        debug!("Preferences::load: called");
        let credential = store.get(KEY_CREDENTIAL).filter(|k| !k.trim().is_empty());
        let sound_enabled = store.get(KEY_SOUND).as_deref() != Some("false");
        let timer_minutes = store
            .get(KEY_TIMER_DURATION)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_MINUTES);
        let theme = store.get(KEY_THEME).as_deref().and_then(Theme::parse);

        Self {
            credential,
            sound_enabled,
            timer_minutes,
            theme,
        }
    }
}

/// Preferences backed by a store; every setter persists immediately
pub struct Prefs {
    store: Box<dyn PrefStore>,
    values: Preferences,
}

impl std::fmt::Debug for Prefs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefs")
            .field("has_credential", &self.values.credential.is_some())
            .field("sound_enabled", &self.values.sound_enabled)
            .field("timer_minutes", &self.values.timer_minutes)
            .field("theme", &self.values.theme)
            .finish()
    }
}

impl Prefs {
    pub fn new(store: Box<dyn PrefStore>) -> Self {
        let values = Preferences::load(store.as_ref());
        Self { store, values }
    }

    /// In-memory preferences starting from defaults
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryPrefStore::new()))
    }

    pub fn values(&self) -> &Preferences {
        &self.values
    }

    pub fn credential(&self) -> Option<&str> {
        self.values.credential.as_deref()
    }

    pub fn set_credential(&mut self, key: &str) -> Result<(), PrefsError> {
        debug!("Prefs::set_credential: called");
        let key = key.trim();
        if key.is_empty() {
            return self.clear_credential();
        }
        self.store.set(KEY_CREDENTIAL, key)?;
        self.values.credential = Some(key.to_string());
        Ok(())
    }

    pub fn clear_credential(&mut self) -> Result<(), PrefsError> {
        debug!("Prefs::clear_credential: called");
        self.store.remove(KEY_CREDENTIAL)?;
        self.values.credential = None;
        Ok(())
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) -> Result<(), PrefsError> {
        debug!(enabled, "Prefs::set_sound_enabled: called");
        self.store.set(KEY_SOUND, if enabled { "true" } else { "false" })?;
        self.values.sound_enabled = enabled;
        Ok(())
    }

    /// Store the timer length; zero is raised to one minute
    pub fn set_timer_minutes(&mut self, minutes: u32) -> Result<(), PrefsError> {
        let minutes = minutes.max(1);
        debug!(minutes, "Prefs::set_timer_minutes: called");
        self.store.set(KEY_TIMER_DURATION, &minutes.to_string())?;
        self.values.timer_minutes = minutes;
        Ok(())
    }

    /// Store an explicit theme, or `None` to follow the system again
    pub fn set_theme(&mut self, theme: Option<Theme>) -> Result<(), PrefsError> {
        debug!(?theme, "Prefs::set_theme: called");
        match theme {
            Some(t) => self.store.set(KEY_THEME, t.as_str())?,
            None => self.store.remove(KEY_THEME)?,
        }
        self.values.theme = theme;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_empty() {
        let prefs = Preferences::load(&MemoryPrefStore::new());
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.sound_enabled);
        assert_eq!(prefs.timer_minutes, 15);
        assert_eq!(prefs.theme, None);
        assert_eq!(prefs.credential, None);
    }

    #[test]
    fn test_sound_only_disabled_by_literal_false() {
        for (value, expected) in [("false", false), ("true", true), ("0", true), ("no", true), ("", true)] {
            let store = MemoryPrefStore::with_entries([(KEY_SOUND, value)]);
            assert_eq!(Preferences::load(&store).sound_enabled, expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_malformed_duration_falls_back() {
        for value in ["abc", "", "-5", "0", "1.5"] {
            let store = MemoryPrefStore::with_entries([(KEY_TIMER_DURATION, value)]);
            assert_eq!(Preferences::load(&store).timer_minutes, 15, "value {:?}", value);
        }
        let store = MemoryPrefStore::with_entries([(KEY_TIMER_DURATION, "25")]);
        assert_eq!(Preferences::load(&store).timer_minutes, 25);
    }

    #[test]
    fn test_theme_values() {
        let store = MemoryPrefStore::with_entries([(KEY_THEME, "light")]);
        assert_eq!(Preferences::load(&store).theme, Some(Theme::Light));
        let store = MemoryPrefStore::with_entries([(KEY_THEME, "purple")]);
        assert_eq!(Preferences::load(&store).theme, None);
    }

    #[test]
    fn test_blank_credential_is_absent() {
        let store = MemoryPrefStore::with_entries([(KEY_CREDENTIAL, "   ")]);
        assert_eq!(Preferences::load(&store).credential, None);
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::toggled(None, Theme::Dark), Theme::Light);
        assert_eq!(Theme::toggled(None, Theme::Light), Theme::Dark);
        assert_eq!(Theme::toggled(Some(Theme::Dark), Theme::Dark), Theme::Light);
        assert_eq!(Theme::toggled(Some(Theme::Light), Theme::Dark), Theme::Dark);
    }

    #[test]
    fn test_theme_from_colorfgbg() {
        assert_eq!(Theme::from_colorfgbg(Some("15;0")), Theme::Dark);
        assert_eq!(Theme::from_colorfgbg(Some("0;15")), Theme::Light);
        assert_eq!(Theme::from_colorfgbg(Some("0;default;15")), Theme::Light);
        assert_eq!(Theme::from_colorfgbg(None), Theme::Dark);
    }

    #[test]
    fn test_prefs_setters_persist() {
        let mut prefs = Prefs::in_memory();
        prefs.set_credential("  abc123  ").unwrap();
        prefs.set_sound_enabled(false).unwrap();
        prefs.set_timer_minutes(0).unwrap();
        prefs.set_theme(Some(Theme::Dark)).unwrap();

        assert_eq!(prefs.credential(), Some("abc123"));
        assert!(!prefs.values().sound_enabled);
        assert_eq!(prefs.values().timer_minutes, 1);
        assert_eq!(prefs.values().theme, Some(Theme::Dark));

        prefs.clear_credential().unwrap();
        prefs.set_theme(None).unwrap();
        assert_eq!(prefs.credential(), None);
        assert_eq!(prefs.values().theme, None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        {
            let mut prefs = Prefs::new(Box::new(FilePrefStore::open(&path)));
            prefs.set_credential("key-1").unwrap();
            prefs.set_timer_minutes(20).unwrap();
            prefs.set_sound_enabled(false).unwrap();
        }

        let reopened = Prefs::new(Box::new(FilePrefStore::open(&path)));
        assert_eq!(reopened.credential(), Some("key-1"));
        assert_eq!(reopened.values().timer_minutes, 20);
        assert!(!reopened.values().sound_enabled);
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "not json").unwrap();

        let store = FilePrefStore::open(&path);
        assert_eq!(store.get(KEY_CREDENTIAL), None);
        assert_eq!(Preferences::load(&store), Preferences::default());
    }
}
