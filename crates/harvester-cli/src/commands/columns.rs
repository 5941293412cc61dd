//! Column display names for save-mode exports
//!
//! Overrides are keyed by row field (`Column_1_Text`, `Website`, ...) and
//! stored in the settings file, so they apply to every later export.

use anyhow::{Result, bail};
use harvester_core::settings::SettingsStore;

pub fn list(store: &SettingsStore) -> Result<()> {
    let settings = store.load()?;

    if settings.column_names.is_empty() {
        println!("No column names set.");
        return Ok(());
    }

    println!("Column names:");
    for (key, name) in &settings.column_names {
        println!("  {} → {}", key, name);
    }
    Ok(())
}

pub fn set(store: &SettingsStore, key: &str, name: &str) -> Result<()> {
    let key = key.trim();
    let name = name.trim();
    if key.is_empty() || name.is_empty() {
        bail!("Column key and name must not be empty");
    }

    store.update(|s| {
        s.column_names.insert(key.to_string(), name.to_string());
    })?;
    println!("✅ {} will be exported as \"{}\"", key, name);
    Ok(())
}

pub fn remove(store: &SettingsStore, key: &str) -> Result<()> {
    let mut removed = false;
    store.update(|s| removed = s.column_names.remove(key).is_some())?;

    if !removed {
        bail!("No column name set for '{}'", key);
    }
    println!("✅ Removed column name for {}", key);
    Ok(())
}

pub fn clear(store: &SettingsStore) -> Result<()> {
    store.update(|s| s.column_names.clear())?;
    println!("✅ Cleared all column names");
    Ok(())
}
