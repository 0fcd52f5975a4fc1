use crate::types::CredentialToken;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const KEYRING_SERVICE: &str = "ai.desk.session";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("OS keychain/secret service is unavailable")]
    Unavailable,
    #[error("stored token is malformed")]
    Malformed(#[from] serde_json::Error),
}

/// Durable home of the credential token. The session manager is its only writer.
pub trait TokenStore: Send + Sync + fmt::Debug {
    fn get(&self) -> Result<Option<CredentialToken>, TokenStoreError>;
    fn set(&self, token: &CredentialToken) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<CredentialToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CredentialToken) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CredentialToken>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<CredentialToken>, TokenStoreError> {
        Ok(self.lock().clone())
    }

    fn set(&self, token: &CredentialToken) -> Result<(), TokenStoreError> {
        *self.lock() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.lock() = None;
        Ok(())
    }
}

/// Token kept as JSON in the OS keychain, fronted by an in-process copy.
#[derive(Clone)]
pub struct KeyringTokenStore {
    user: String,
    in_memory: Arc<Mutex<Option<CredentialToken>>>,
}

impl fmt::Debug for KeyringTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyringTokenStore")
            .field("service", &KEYRING_SERVICE)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl KeyringTokenStore {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            user: storage_key.into(),
            in_memory: Arc::new(Mutex::new(None)),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(KEYRING_SERVICE, &self.user)
    }

    fn cached(&self) -> std::sync::MutexGuard<'_, Option<CredentialToken>> {
        self.in_memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_available(&self) -> bool {
        let Ok(entry) = self.entry() else {
            return false;
        };

        match entry.get_password() {
            Ok(_) => true,
            Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::BadEncoding(_)) => true,
            Err(keyring::Error::Ambiguous(_)) => true,
            Err(keyring::Error::NoStorageAccess(_)) => false,
            Err(keyring::Error::PlatformFailure(_)) => false,
            Err(_) => false,
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Result<Option<CredentialToken>, TokenStoreError> {
        if let Some(token) = self.cached().clone() {
            return Ok(Some(token));
        }

        let entry = self.entry().map_err(|_| TokenStoreError::Unavailable)?;

        match entry.get_password() {
            Ok(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Ok(None);
                }
                let token: CredentialToken = serde_json::from_str(raw)?;
                *self.cached() = Some(token.clone());
                Ok(Some(token))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::NoStorageAccess(_)) => Err(TokenStoreError::Unavailable),
            Err(keyring::Error::PlatformFailure(_)) => Err(TokenStoreError::Unavailable),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable keychain entry");
                Ok(None)
            }
        }
    }

    fn set(&self, token: &CredentialToken) -> Result<(), TokenStoreError> {
        let raw = serde_json::to_string(token)?;
        let entry = self.entry().map_err(|_| TokenStoreError::Unavailable)?;
        entry
            .set_password(&raw)
            .map_err(|_| TokenStoreError::Unavailable)?;
        *self.cached() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.cached() = None;
        if let Ok(entry) = self.entry() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to delete keychain entry");
                    return Err(TokenStoreError::Unavailable);
                }
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: i64) -> CredentialToken {
        CredentialToken {
            access_token: "abc".to_string(),
            expires_at,
            token_type: Some("bearer".to_string()),
        }
    }

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get().unwrap(), None);

        store.set(&token(100)).unwrap();
        assert_eq!(store.get().unwrap(), Some(token(100)));

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn clones_share_the_same_slot() {
        let store = MemoryTokenStore::with_token(token(5));
        let other = store.clone();
        other.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn persisted_token_uses_camel_case_fields() {
        let raw = serde_json::to_string(&token(42)).unwrap();
        assert_eq!(
            raw,
            r#"{"accessToken":"abc","expiresAt":42,"tokenType":"bearer"}"#
        );
    }
}
