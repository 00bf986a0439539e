//! Durable client-side storage for the credential pair.
//!
//! Every backend is a plain key/value store over three fixed keys. The
//! session manager is the only component that writes through it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
#[cfg(unix)]
use std::{io::Write, os::unix::fs::OpenOptionsExt};

use keyring::Entry;
use thiserror::Error;
use tracing::{debug, warn};

use super::session::{CredentialPair, User};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Every key a signed-in session occupies.
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name
const SERVICE_NAME: &str = "bankdesk";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a key that is not present is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Store `access_token` only while `refresh_token` is still the stored
    /// refresh token. The check and the write must not interleave with
    /// `clear` or `save_session`. Returns whether the token was written.
    fn replace_access_token(&self, refresh_token: &str, access_token: &str) -> Result<bool, StoreError>;

    /// Remove every session key.
    fn clear(&self) -> Result<(), StoreError> {
        for key in SESSION_KEYS {
            self.remove(key)?;
        }
        Ok(())
    }

    /// The persisted pair, present only when both tokens are stored.
    fn load_pair(&self) -> Result<Option<CredentialPair>, StoreError> {
        let access = self.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.get(REFRESH_TOKEN_KEY)?;
        Ok(match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Some(CredentialPair {
                access_token,
                refresh_token,
            }),
            _ => None,
        })
    }

    /// The cached user identity. An entry that does not parse counts as absent.
    fn load_user(&self) -> Result<Option<User>, StoreError> {
        let Some(raw) = self.get(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Ignoring unparseable cached user");
                Ok(None)
            }
        }
    }

    fn save_session(&self, pair: &CredentialPair, user: &User) -> Result<(), StoreError> {
        self.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.set(REFRESH_TOKEN_KEY, &pair.refresh_token)?;
        self.set(USER_KEY, &serde_json::to_string(user)?)?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn replace_access_token(&self, refresh_token: &str, access_token: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.get(REFRESH_TOKEN_KEY).map(String::as_str) != Some(refresh_token) {
            return Ok(false);
        }
        entries.insert(ACCESS_TOKEN_KEY.to_string(), access_token.to_string());
        Ok(true)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in SESSION_KEYS {
            entries.remove(key);
        }
        Ok(())
    }

    fn save_session(&self, pair: &CredentialPair, user: &User) -> Result<(), StoreError> {
        let user = serde_json::to_string(user)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(ACCESS_TOKEN_KEY.to_string(), pair.access_token.clone());
        entries.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh_token.clone());
        entries.insert(USER_KEY.to_string(), user);
        Ok(())
    }
}

// ============================================================================
// Session file
// ============================================================================

/// Stores the session keys as one JSON object in the cache directory.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
                debug!(path = %self.path.display(), "Removed session file");
            }
            return Ok(());
        }
        let contents = serde_json::to_string_pretty(entries)?;
        secure_write(&self.path, &contents)?;
        Ok(())
    }
}

/// Write a file readable only by its owner.
fn secure_write(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    {
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?
            .write_all(content.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, content)?;
    }

    Ok(())
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }

    fn replace_access_token(&self, refresh_token: &str, access_token: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        if entries.get(REFRESH_TOKEN_KEY).map(String::as_str) != Some(refresh_token) {
            return Ok(false);
        }
        entries.insert(ACCESS_TOKEN_KEY.to_string(), access_token.to_string());
        self.write_entries(&entries)?;
        Ok(true)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_entries(&BTreeMap::new())
    }

    fn save_session(&self, pair: &CredentialPair, user: &User) -> Result<(), StoreError> {
        let user = serde_json::to_string(user)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        entries.insert(ACCESS_TOKEN_KEY.to_string(), pair.access_token.clone());
        entries.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh_token.clone());
        entries.insert(USER_KEY.to_string(), user);
        self.write_entries(&entries)
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// One keychain entry per session key.
///
/// The keychain has no transactions, so writes from this process are
/// serialized through `lock`.
pub struct KeyringStore {
    service: String,
    lock: Mutex<()>,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
            lock: Mutex::new(()),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.read(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.delete(key)
    }

    fn replace_access_token(&self, refresh_token: &str, access_token: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.read(REFRESH_TOKEN_KEY)?.as_deref() != Some(refresh_token) {
            return Ok(false);
        }
        self.entry(ACCESS_TOKEN_KEY)?.set_password(access_token)?;
        Ok(true)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        for key in SESSION_KEYS {
            self.delete(key)?;
        }
        Ok(())
    }

    fn save_session(&self, pair: &CredentialPair, user: &User) -> Result<(), StoreError> {
        let user = serde_json::to_string(user)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.entry(ACCESS_TOKEN_KEY)?.set_password(&pair.access_token)?;
        self.entry(REFRESH_TOKEN_KEY)?.set_password(&pair.refresh_token)?;
        self.entry(USER_KEY)?.set_password(&user)?;
        Ok(())
    }
}
