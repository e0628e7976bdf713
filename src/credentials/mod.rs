//! Credential persistence
//!
//! - [`record`]: the stored record and its authentication/expiry queries
//! - [`crypto`]: AES-256-GCM sealing of token fields
//! - [`key`]: where the encryption key comes from
//! - [`store`]: the JSON file on disk

pub mod crypto;
pub mod key;
pub mod record;
pub mod store;

pub use crypto::EncryptionKey;
pub use record::CredentialRecord;
pub use store::CredentialStore;
