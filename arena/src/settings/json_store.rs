use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, SettingsError};

/// Key-value store backed by one pretty-printed JSON object on disk.
/// Every call reads the file afresh; writes replace it whole.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), SettingsError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = JsonFileStore::new(path.clone());
        assert_eq!(store.get("groq_api_key").unwrap(), None);
        store.set("groq_api_key", "abc").unwrap();
        store.set("chessSettings", "{}").unwrap();

        let reopened = JsonFileStore::new(path);
        assert_eq!(reopened.get("groq_api_key").unwrap().as_deref(), Some("abc"));
        reopened.remove("groq_api_key").unwrap();
        assert_eq!(store.get("groq_api_key").unwrap(), None);
        assert_eq!(store.get("chessSettings").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFileStore::new(path);
        assert!(matches!(store.get("x"), Err(SettingsError::Json(_))));
    }
}
