//! Shared helpers for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::auth::{CredentialStore, MemoryStorage, SecureStorage, StorageError};

/// Mint an unsigned three-segment token carrying `claims`.
pub fn token_with_claims(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// A token for `user_id` expiring `minutes` from now (negative for the past).
pub fn token_expiring_in(minutes: i64, user_id: &str) -> String {
    let exp = (Utc::now() + Duration::minutes(minutes)).timestamp();
    token_with_claims(&json!({ "exp": exp, "userId": user_id }))
}

pub fn valid_token(user_id: &str) -> String {
    token_expiring_in(60, user_id)
}

pub fn expired_token(user_id: &str) -> String {
    token_expiring_in(-60, user_id)
}

pub fn memory_credentials() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(Arc::new(MemoryStorage::new())))
}

/// In-memory storage whose reads, writes and deletes can be made to fail,
/// either for every key or for writes to chosen keys.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    rejected_keys: Mutex<Vec<String>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Reject writes to `key` only.
    pub fn fail_writes_to(&self, key: &str) {
        self.rejected_keys
            .lock()
            .unwrap()
            .push(key.to_string());
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{op} rejected")));
        }
        Ok(())
    }
}

impl SecureStorage for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::check(&self.fail_writes, "write")?;
        if self.rejected_keys.lock().unwrap().iter().any(|k| k == key) {
            return Err(StorageError::Unavailable(format!("{key} write rejected")));
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        Self::check(&self.fail_deletes, "delete")?;
        self.inner.delete(key)
    }
}
