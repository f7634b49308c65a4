//! Player settings and credentials over a simple key-value store.
//!
//! Keys: `chessSettings` holds both players as one JSON document and
//! `<service>_api_key` holds one credential per decision service.

mod json_store;

pub use json_store::JsonFileStore;

use std::collections::HashMap;
use std::sync::Mutex;

use agent::ServiceRegistry;
use chess::PlayerSide;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::player::PlayerConfig;

pub const SETTINGS_KEY: &str = "chessSettings";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The get/set capability settings are persisted through.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
    fn remove(&self, key: &str) -> Result<(), SettingsError>;
}

/// In-process store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.entries().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredPlayers {
    white: PlayerConfig,
    black: PlayerConfig,
}

/// Typed access to the arena's persisted settings.
pub struct Settings {
    store: Box<dyn KeyValueStore>,
    registry: ServiceRegistry,
}

impl Settings {
    pub fn new(store: Box<dyn KeyValueStore>, registry: ServiceRegistry) -> Self {
        Self { store, registry }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), ServiceRegistry::builtin())
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Players as stored, normalised against the catalog. Missing or
    /// unreadable settings give the defaults: White human, Black agent.
    pub fn players(&self) -> Result<[PlayerConfig; 2], SettingsError> {
        let stored = match self.store.get(SETTINGS_KEY)? {
            Some(raw) => match serde_json::from_str::<StoredPlayers>(&raw) {
                Ok(players) => Some(players),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable player settings");
                    None
                }
            },
            None => None,
        };
        let players = stored.unwrap_or_else(|| StoredPlayers {
            white: PlayerConfig::human(),
            black: PlayerConfig::agent_default(&self.registry),
        });
        Ok([
            players.white.normalized(&self.registry),
            players.black.normalized(&self.registry),
        ])
    }

    pub fn save_players(&self, players: &[PlayerConfig; 2]) -> Result<(), SettingsError> {
        let [white, black] = players.clone();
        let json = serde_json::to_string(&StoredPlayers { white, black })?;
        self.store.set(SETTINGS_KEY, &json)
    }

    /// Update one side and persist. Returns the normalised config.
    pub fn set_player(
        &self,
        side: PlayerSide,
        player: PlayerConfig,
    ) -> Result<PlayerConfig, SettingsError> {
        let mut players = self.players()?;
        players[side.index()] = player.normalized(&self.registry);
        self.save_players(&players)?;
        Ok(players[side.index()].clone())
    }

    fn credential_key(service: &str) -> String {
        format!("{service}_api_key")
    }

    /// The stored credential for `service`, else the service's API key
    /// environment variable.
    pub fn credential(&self, service: &str) -> Result<Option<String>, SettingsError> {
        if let Some(key) = self.store.get(&Self::credential_key(service))? {
            if !key.trim().is_empty() {
                return Ok(Some(key));
            }
        }
        let from_env = self
            .registry
            .get(service)
            .and_then(|profile| std::env::var(&profile.api_key_env).ok())
            .filter(|key| !key.trim().is_empty());
        if from_env.is_some() {
            debug!(service, "Using API key from environment");
        }
        Ok(from_env)
    }

    pub fn has_stored_credential(&self, service: &str) -> Result<bool, SettingsError> {
        Ok(self.store.get(&Self::credential_key(service))?.is_some())
    }

    pub fn set_credential(&self, service: &str, key: &str) -> Result<(), SettingsError> {
        self.store.set(&Self::credential_key(service), key.trim())
    }

    pub fn clear_credential(&self, service: &str) -> Result<(), SettingsError> {
        self.store.remove(&Self::credential_key(service))
    }
}
