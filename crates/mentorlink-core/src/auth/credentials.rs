use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::storage::{SecureStorage, StorageError};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "jwt_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, Default)]
struct TokenCache {
    access: Option<String>,
    refresh: Option<String>,
}

/// The access/refresh token pair, persisted in secure storage and cached in memory.
///
/// Storage is the source of truth on cold start; once a value is cached the
/// cache wins. Absence is never cached, so a token written to storage by
/// someone else is picked up on the next read.
pub struct CredentialStore {
    storage: Arc<dyn SecureStorage>,
    cache: Mutex<TokenCache>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self {
            storage,
            cache: Mutex::new(TokenCache::default()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, TokenCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hydrate the cache from storage.
    ///
    /// Never fails: a storage error is logged and the cache is left as it was,
    /// which on a cold start means signed out.
    pub fn initialize(&self) {
        let access = self.storage.get(ACCESS_TOKEN_KEY);
        let refresh = self.storage.get(REFRESH_TOKEN_KEY);

        match (access, refresh) {
            (Ok(access), Ok(refresh)) => {
                debug!(
                    has_access = access.is_some(),
                    has_refresh = refresh.is_some(),
                    "Credential cache hydrated"
                );
                let mut cache = self.cache();
                cache.access = access;
                cache.refresh = refresh;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to initialize auth tokens");
            }
        }
    }

    /// Persist a new access token, and the refresh token if one is given.
    ///
    /// `refresh_token: None` leaves any existing refresh token in place.
    /// The pair is written all or nothing: on error both tokens are as they
    /// were, in storage and in the cache.
    pub fn store(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), StorageError> {
        // Held across both writes so readers never see half a pair
        let mut cache = self.cache();
        let previous_access = match self.storage.get(ACCESS_TOKEN_KEY) {
            Ok(value) => value,
            Err(_) => cache.access.clone(),
        };

        self.storage.set(ACCESS_TOKEN_KEY, access_token)?;

        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.storage.set(REFRESH_TOKEN_KEY, refresh_token) {
                self.roll_back_access(previous_access.as_deref());
                return Err(e);
            }
            cache.refresh = Some(refresh_token.to_string());
        }
        cache.access = Some(access_token.to_string());

        debug!(refresh_updated = refresh_token.is_some(), "Tokens stored");
        Ok(())
    }

    fn roll_back_access(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(value) => self.storage.set(ACCESS_TOKEN_KEY, value),
            None => self.storage.delete(ACCESS_TOKEN_KEY),
        };
        if let Err(e) = restored {
            // Better no access token than one paired with a stale refresh token
            warn!(error = %e, "Failed to restore previous access token");
            if let Err(e) = self.storage.delete(ACCESS_TOKEN_KEY) {
                warn!(error = %e, "Failed to delete orphaned access token");
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY, |cache| &mut cache.access)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY, |cache| &mut cache.refresh)
    }

    fn read(&self, key: &str, slot: fn(&mut TokenCache) -> &mut Option<String>) -> Option<String> {
        if let Some(value) = slot(&mut self.cache()).clone() {
            return Some(value);
        }

        match self.storage.get(key) {
            Ok(Some(value)) => {
                *slot(&mut self.cache()) = Some(value.clone());
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read token from secure storage");
                None
            }
        }
    }

    /// Forget both tokens, in memory and in storage.
    ///
    /// Deletion failures are logged, not returned: signing out always succeeds
    /// locally.
    pub fn clear(&self) {
        {
            let mut cache = self.cache();
            cache.access = None;
            cache.refresh = None;
        }

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.delete(key) {
                warn!(key, error = %e, "Failed to delete token from secure storage");
            }
        }
        debug!("Tokens cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;
    use crate::testutil::FlakyStorage;

    fn memory_store() -> (Arc<MemoryStorage>, CredentialStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = CredentialStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (storage, store) = memory_store();
        storage.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "r1").unwrap();

        store.initialize();
        let first = (store.access_token(), store.refresh_token());
        store.initialize();
        let second = (store.access_token(), store.refresh_token());

        assert_eq!(first, second);
        assert_eq!(first, (Some("a1".to_string()), Some("r1".to_string())));
    }

    #[test]
    fn test_initialize_swallows_storage_failure() {
        let storage = Arc::new(FlakyStorage::new());
        storage.fail_reads(true);
        let store = CredentialStore::new(storage.clone());

        store.initialize();

        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn test_store_without_refresh_keeps_existing_refresh_token() {
        let (_, store) = memory_store();
        store.store("a1", Some("r1")).unwrap();
        store.store("a2", None).unwrap();

        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    }

    #[test]
    fn test_store_persists_to_storage() {
        let (storage, store) = memory_store();
        store.store("a1", Some("r1")).unwrap();

        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn test_store_failure_is_reported_and_not_cached() {
        let storage = Arc::new(FlakyStorage::new());
        storage.fail_writes(true);
        let store = CredentialStore::new(storage.clone());

        let result = store.store("a1", Some("r1"));

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn test_failed_refresh_write_rolls_back_access_token() {
        let storage = Arc::new(FlakyStorage::new());
        let store = CredentialStore::new(storage.clone());
        store.store("alice-access", Some("alice-ref")).unwrap();
        storage.fail_writes_to(REFRESH_TOKEN_KEY);

        let result = store.store("bob-access", Some("bob-ref"));

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(store.access_token().as_deref(), Some("alice-access"));
        assert_eq!(store.refresh_token().as_deref(), Some("alice-ref"));

        // A fresh store over the same storage sees the old pair too
        let restarted = CredentialStore::new(storage.clone());
        restarted.initialize();
        assert_eq!(restarted.access_token().as_deref(), Some("alice-access"));
        assert_eq!(restarted.refresh_token().as_deref(), Some("alice-ref"));
    }

    #[test]
    fn test_failed_refresh_write_on_cold_store_leaves_nothing() {
        let storage = Arc::new(FlakyStorage::new());
        storage.fail_writes_to(REFRESH_TOKEN_KEY);
        let store = CredentialStore::new(storage.clone());

        assert!(store.store("a1", Some("r1")).is_err());

        assert_eq!(store.access_token(), None);
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_absence_is_not_memoized() {
        let (storage, store) = memory_store();
        assert_eq!(store.access_token(), None);

        // Written behind the store's back
        storage.set(ACCESS_TOKEN_KEY, "external").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("external"));
    }

    #[test]
    fn test_cached_value_wins_over_storage() {
        let (storage, store) = memory_store();
        store.store("a1", None).unwrap();
        storage.delete(ACCESS_TOKEN_KEY).unwrap();

        assert_eq!(store.access_token().as_deref(), Some("a1"));
    }

    #[test]
    fn test_clear_removes_cache_and_storage() {
        let (storage, store) = memory_store();
        store.store("a1", Some("r1")).unwrap();

        store.clear();

        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_clear_tolerates_delete_failure() {
        let storage = Arc::new(FlakyStorage::new());
        let store = CredentialStore::new(storage.clone());
        store.store("a1", Some("r1")).unwrap();
        storage.fail_deletes(true);
        storage.fail_reads(true);

        store.clear();

        // Cache is empty and reads fall back to absent
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
    }
}
