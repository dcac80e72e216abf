use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::CredentialStore;
use crate::error::StorageError;
use crate::models::{TokenKeys, TokenPair};

/// Typed access to the token pair held in a `CredentialStore`.
///
/// This is the only place that knows the raw storage keys. Writes and removals
/// always touch both keys in one store operation.
///
/// Every write and clear bumps a generation counter shared by all clones.
/// A network call that will store a pair reads the generation before it
/// starts and stores with `write_pair_if`, so a pair obtained before a logout
/// can never land after it.
#[derive(Clone)]
pub struct TokenVault {
    store: Arc<dyn CredentialStore>,
    generation: Arc<Mutex<u64>>,
}

impl TokenVault {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        TokenVault {
            store,
            generation: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn generation(&self) -> u64 {
        *self.generation.lock().await
    }

    pub async fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get(TokenKeys::ACCESS).await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get(TokenKeys::REFRESH).await
    }

    /// Returns the stored pair, or `None` unless both halves are present.
    pub async fn read_pair(&self) -> Result<Option<TokenPair>, StorageError> {
        let access = self.access_token().await?;
        let refresh = self.refresh_token().await?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        })
    }

    pub async fn write_pair(&self, pair: &TokenPair) -> Result<(), StorageError> {
        let mut generation = self.generation.lock().await;
        self.store_pair(pair).await?;
        *generation += 1;
        Ok(())
    }

    /// Stores `pair` only if nothing was written or cleared since `expected`
    /// was read. Returns whether the pair was stored.
    pub async fn write_pair_if(
        &self,
        pair: &TokenPair,
        expected: u64,
    ) -> Result<bool, StorageError> {
        let mut generation = self.generation.lock().await;
        if *generation != expected {
            debug!(
                expected,
                current = *generation,
                "Token pair superseded; not storing"
            );
            return Ok(false);
        }
        self.store_pair(pair).await?;
        *generation += 1;
        Ok(true)
    }

    async fn store_pair(&self, pair: &TokenPair) -> Result<(), StorageError> {
        self.store
            .set_all(&[
                (TokenKeys::ACCESS, pair.access_token.as_str()),
                (TokenKeys::REFRESH, pair.refresh_token.as_str()),
            ])
            .await?;
        debug!(
            backend = self.store.backend_name(),
            "Stored new token pair"
        );
        Ok(())
    }

    /// Removes the pair. The generation moves on even if the store fails, so
    /// in-flight writes are refused either way.
    pub async fn clear_pair(&self) -> Result<(), StorageError> {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.store.remove_all(&TokenKeys::ALL).await?;
        debug!(backend = self.store.backend_name(), "Cleared token pair");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_pair_round_trips_through_store() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let vault = TokenVault::new(store.clone());

        vault.write_pair(&TokenPair::new("A0", "R0")).await.unwrap();

        assert_eq!(store.get("accessToken").await.unwrap().as_deref(), Some("A0"));
        assert_eq!(store.get("refreshToken").await.unwrap().as_deref(), Some("R0"));
        assert_eq!(
            vault.read_pair().await.unwrap(),
            Some(TokenPair::new("A0", "R0"))
        );
    }

    #[tokio::test]
    async fn test_half_pair_reads_as_none() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        store.set("accessToken", "A0").await.unwrap();

        let vault = TokenVault::new(store);
        assert_eq!(vault.read_pair().await.unwrap(), None);
        assert_eq!(vault.access_token().await.unwrap().as_deref(), Some("A0"));
    }

    #[tokio::test]
    async fn test_clear_pair_leaves_other_keys() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        store.set("language", "en").await.unwrap();
        let vault = TokenVault::new(store.clone());
        vault.write_pair(&TokenPair::new("A0", "R0")).await.unwrap();

        vault.clear_pair().await.unwrap();

        assert_eq!(vault.access_token().await.unwrap(), None);
        assert_eq!(vault.refresh_token().await.unwrap(), None);
        assert_eq!(store.get("language").await.unwrap().as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_write_after_clear_is_refused() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let vault = TokenVault::new(store);
        vault.write_pair(&TokenPair::new("A0", "R0")).await.unwrap();

        let started_at = vault.generation().await;
        vault.clone().clear_pair().await.unwrap();

        let stored = vault
            .write_pair_if(&TokenPair::new("A1", "R1"), started_at)
            .await
            .unwrap();
        assert!(!stored);
        assert_eq!(vault.read_pair().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_with_current_generation_is_stored() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        let vault = TokenVault::new(store);

        let started_at = vault.generation().await;
        assert!(vault
            .write_pair_if(&TokenPair::new("A1", "R1"), started_at)
            .await
            .unwrap());
        assert_eq!(vault.generation().await, started_at + 1);
        assert_eq!(
            vault.read_pair().await.unwrap(),
            Some(TokenPair::new("A1", "R1"))
        );
    }
}
