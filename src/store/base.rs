use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::StoreConfig;
use crate::error::StorageError;

/// The CredentialStore trait abstracts durable key/value persistence for tokens.
///
/// Implementations are deliberately dumb: no validation, no retries. Errors are
/// returned to the caller unchanged.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;

    /// Writes every entry as one logical operation.
    async fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError>;

    /// Removes every key as one logical operation.
    async fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError>;

    fn backend_name(&self) -> &str;
}

/// Creates a concrete store implementation based on the StoreConfig.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn CredentialStore>, StorageError> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory credential store; tokens will not survive a restart.");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::File(file_config) => {
            let store = FileStore::open(&file_config.path).await?;
            info!("Using file credential store at '{}'", file_config.path.display());
            Ok(Arc::new(store))
        }
    }
}
