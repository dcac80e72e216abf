pub mod base;
pub mod file_store;
pub mod memory_store;
pub mod vault;

// Re-export the primary store items so code outside can do
// "use crate::store::{CredentialStore, TokenVault};"
pub use base::{create_store, CredentialStore};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use vault::TokenVault;
