//! Settings store capability
//!
//! Where collected secrets end up. The binary uses the system keyring
//! (keychain on macOS); tests and embedders can use [`MemorySettingsStore`].

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to open keyring entry '{key}': {source}")]
    Entry {
        key: String,
        #[source]
        source: keyring::Error,
    },

    #[error("Failed to store secret '{key}': {source}")]
    Store {
        key: String,
        #[source]
        source: keyring::Error,
    },

    #[error("Failed to read secret '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: keyring::Error,
    },
}

/// Key/value store for secrets. Shared across producer threads.
pub trait SettingsStore: Send + Sync {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), SettingsError>;

    /// `Ok(None)` when nothing is stored under `key`
    fn get_secret(&self, key: &str) -> Result<Option<String>, SettingsError>;
}

/// Name a collected key is stored under: `UPPER_SNAKE(service) + "_API_KEY"`.
///
/// ```ignore
/// assert_eq!(api_key_name("OpenAI"), "OPENAI_API_KEY");
/// assert_eq!(api_key_name("Google Maps"), "GOOGLE_MAPS_API_KEY");
/// ```
pub fn api_key_name(service_name: &str) -> String {
    let mut name = String::with_capacity(service_name.len() + 8);
    let mut pending_separator = false;

    for c in service_name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !name.is_empty() {
                name.push('_');
            }
            pending_separator = false;
            name.push(c.to_ascii_uppercase());
        } else {
            pending_separator = true;
        }
    }

    if name.is_empty() {
        "API_KEY".to_string()
    } else {
        name.push_str("_API_KEY");
        name
    }
}

/// Secrets in the system keyring under one service name
pub struct KeyringSettingsStore {
    service: String,
}

impl KeyringSettingsStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, SettingsError> {
        keyring::Entry::new(&self.service, key).map_err(|source| SettingsError::Entry {
            key: key.to_string(),
            source,
        })
    }
}

impl SettingsStore for KeyringSettingsStore {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|source| SettingsError::Store {
                key: key.to_string(),
                source,
            })?;

        info!(key, service = %self.service, "Stored secret");
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<Option<String>, SettingsError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!(key, "No entry found");
                Ok(None)
            }
            Err(source) => Err(SettingsError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.lock().get(key).cloned())
    }
}
