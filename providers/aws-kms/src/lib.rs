//! AWS KMS implementation of the keyset-manager key store.

pub mod cryptography;
pub mod store;

pub use store::AwsKmsKeyStore;
