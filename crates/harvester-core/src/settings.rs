use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";

/// Preferences that survive across sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Selector of the host's "next page" control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_button_selector: Option<String>,

    /// Display names for row fields, keyed by field name
    #[serde(default)]
    pub column_names: BTreeMap<String, String>,
}

/// Resolve the harvester home directory: the override if given, else `~/.harvester`
pub fn harvester_home(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".harvester"))
        .ok_or_else(|| Error::Settings("Could not determine home directory".to_string()))
}

/// JSON file holding [`Settings`]
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `<home>/settings.json`
    pub fn in_home(home: &Path) -> Self {
        Self::new(home.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields the defaults
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            tracing::debug!("No settings at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    /// Load, modify and save in one step
    pub fn update<F>(&self, f: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load()?;
        f(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::in_home(temp_dir.path());

        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_update_persists_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::in_home(&temp_dir.path().join("nested"));

        store
            .update(|s| {
                s.next_button_selector = Some("button[aria-label=\"Next\"]".to_string());
                s.column_names
                    .insert("Column_1_Text".to_string(), "Name".to_string());
            })
            .unwrap();

        let reloaded = SettingsStore::in_home(&temp_dir.path().join("nested"))
            .load()
            .unwrap();
        assert_eq!(
            reloaded.next_button_selector.as_deref(),
            Some("button[aria-label=\"Next\"]")
        );
        assert_eq!(reloaded.column_names["Column_1_Text"], "Name");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::in_home(temp_dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().is_err());
    }

    #[test]
    fn test_home_override() {
        let dir = PathBuf::from("/tmp/harvester-home");
        assert_eq!(harvester_home(Some(dir.clone())).unwrap(), dir);
    }
}
