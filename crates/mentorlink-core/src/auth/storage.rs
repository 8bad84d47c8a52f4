use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;

/// Keychain service name the tokens are filed under
pub const SERVICE_NAME: &str = "mentorlink";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable key-value storage for secrets.
///
/// Each call is atomic for its single key. Implementations block, so keep
/// them fast; the keychain and in-memory backends both are.
pub trait SecureStorage: Send + Sync {
    /// Read a secret. A missing key is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a secret. Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Secrets in the OS keychain, one entry per key.
///
/// Every call is a blocking keychain round trip on the current thread.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage. Nothing survives the process; used headless and in tests.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SecureStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("jwt_token").unwrap(), None);

        storage.set("jwt_token", "abc").unwrap();
        assert_eq!(storage.get("jwt_token").unwrap().as_deref(), Some("abc"));

        storage.delete("jwt_token").unwrap();
        assert_eq!(storage.get("jwt_token").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_delete_missing_key() {
        let storage = MemoryStorage::new();
        assert!(storage.delete("never-set").is_ok());
    }
}
