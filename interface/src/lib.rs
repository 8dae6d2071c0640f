//! Lifecycle management for asymmetric signing key pairs held in an external
//! key-management service.
//!
//! Keys rotate through three generations addressed by stable aliases:
//! `current` signs today, `next` is the pre-created standby that becomes
//! current on the following rotation, and `previous` keeps the outgoing key
//! available for verification until it is retired. The public halves of all
//! three generations can be exported as a JWK Set for signature verifiers.
//!
//! The [`store::KeyStore`] trait is the only boundary to the external
//! service; engines never depend on a concrete provider.

use std::error;

pub mod alias;
pub mod export;
pub mod rotation;
pub mod store;

pub use alias::{AliasResolver, Generation};
pub use export::{ExportConfig, KeySetExporter, SignatureAlgorithm};
pub use rotation::{RotateConfig, RotationEngine, RotationOutcome};
pub use store::{KeySpec, KeyStore, ManagedKey};

/// Errors thrown by a key store.
///
/// Absence is its own kind because callers branch on it: the rotation engine
/// turns `NotFound` into create-on-absence, while any provider failure aborts
/// the run.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
	#[error("alias or key not found: {0}")]
	NotFound(String),
	#[error("key store provider error")]
	Provider(#[source] Box<dyn error::Error + Send + Sync>),
}

impl KeyStoreError {
	pub fn provider(err: impl Into<Box<dyn error::Error + Send + Sync>>) -> Self {
		KeyStoreError::Provider(err.into())
	}
}

pub trait ToCanonicalString {
	fn to_canonical_string(&self) -> String;
}

pub trait TryFromCanonicalString: Sized {
	fn try_from_canonical_string(s: &str) -> Result<Self, String>;
}
