use crate::{KeyStoreError, ToCanonicalString, TryFromCanonicalString};
use chrono::{DateTime, Utc};
use std::future::Future;

/// A signing key pair held by the external key-management service.
///
/// Only the identifier and metadata live here; the private material never
/// leaves the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedKey {
	pub key_id: String,
	pub created_at: DateTime<Utc>,
}

/// A tag attached to keys at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTag {
	pub key: String,
	pub value: String,
}

impl KeyTag {
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self { key: key.into(), value: value.into() }
	}
}

/// Specification for newly created signing keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeySpec {
	#[default]
	Rsa2048,
	Rsa3072,
	Rsa4096,
	EccNistP256,
	EccNistP384,
	Other(String),
}

impl ToCanonicalString for KeySpec {
	fn to_canonical_string(&self) -> String {
		match self {
			KeySpec::Rsa2048 => "RSA_2048".to_string(),
			KeySpec::Rsa3072 => "RSA_3072".to_string(),
			KeySpec::Rsa4096 => "RSA_4096".to_string(),
			KeySpec::EccNistP256 => "ECC_NIST_P256".to_string(),
			KeySpec::EccNistP384 => "ECC_NIST_P384".to_string(),
			KeySpec::Other(s) => s.clone(),
		}
	}
}

impl TryFromCanonicalString for KeySpec {
	fn try_from_canonical_string(s: &str) -> Result<Self, String> {
		match s {
			"RSA_2048" => Ok(KeySpec::Rsa2048),
			"RSA_3072" => Ok(KeySpec::Rsa3072),
			"RSA_4096" => Ok(KeySpec::Rsa4096),
			"ECC_NIST_P256" => Ok(KeySpec::EccNistP256),
			"ECC_NIST_P384" => Ok(KeySpec::EccNistP384),
			_ => Ok(KeySpec::Other(s.to_string())),
		}
	}
}

/// Operations of the external key-management service used by the rotation
/// engine and the exporter.
///
/// Every call is synchronous from the caller's point of view and
/// single-attempt; retries are left to the caller. Absence of an alias or
/// key must be reported as [`KeyStoreError::NotFound`] so callers can branch
/// on it, and every other failure as [`KeyStoreError::Provider`].
/// Cancellation is carried by the returned futures: dropping one aborts the
/// call with no side effects beyond what the provider itself guarantees.
pub trait KeyStore {
	/// Looks up the key an alias currently resolves to.
	fn describe_by_alias(
		&self,
		alias: &str,
	) -> impl Future<Output = Result<ManagedKey, KeyStoreError>> + Send;

	/// Creates a new sign/verify key pair with the given specification and tags.
	fn create_signing_key(
		&self,
		spec: &KeySpec,
		tags: &[KeyTag],
	) -> impl Future<Output = Result<ManagedKey, KeyStoreError>> + Send;

	/// Fetches the DER-encoded (SPKI) public half of a key.
	fn get_public_key(
		&self,
		key_id: &str,
	) -> impl Future<Output = Result<Vec<u8>, KeyStoreError>> + Send;

	fn create_alias(
		&self,
		alias: &str,
		key_id: &str,
	) -> impl Future<Output = Result<(), KeyStoreError>> + Send;

	fn update_alias(
		&self,
		alias: &str,
		key_id: &str,
	) -> impl Future<Output = Result<(), KeyStoreError>> + Send;

	fn delete_alias(&self, alias: &str) -> impl Future<Output = Result<(), KeyStoreError>> + Send;

	/// Schedules provider-side deferred deletion of a key. Irreversible.
	fn schedule_deletion(
		&self,
		key_id: &str,
	) -> impl Future<Output = Result<(), KeyStoreError>> + Send;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_spec_canonical_strings_match_provider_names() {
		assert_eq!(KeySpec::default().to_canonical_string(), "RSA_2048");
		assert_eq!(KeySpec::EccNistP384.to_canonical_string(), "ECC_NIST_P384");
		assert_eq!(
			KeySpec::try_from_canonical_string("RSA_4096").unwrap(),
			KeySpec::Rsa4096
		);
	}

	#[test]
	fn unrecognized_key_specs_pass_through() {
		let spec = KeySpec::try_from_canonical_string("ECC_SECG_P256K1").unwrap();
		assert_eq!(spec, KeySpec::Other("ECC_SECG_P256K1".to_string()));
		assert_eq!(spec.to_canonical_string(), "ECC_SECG_P256K1");
	}
}
