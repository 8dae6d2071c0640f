use crate::cryptography;
use aws_sdk_kms::types::{KeyMetadata, Tag};
use aws_sdk_kms::Client;
use chrono::{DateTime, Utc};
use keyset_manager::store::{KeySpec, KeyStore, KeyTag, ManagedKey};
use keyset_manager::KeyStoreError;

/// Key store backed by AWS KMS.
///
/// Aliases are passed through verbatim; resolution from prefix and
/// generation happens in the interface crate. The KMS `NotFoundException`
/// maps to [`KeyStoreError::NotFound`] on every operation that can raise it,
/// all other SDK failures to [`KeyStoreError::Provider`].
pub struct AwsKmsKeyStore {
	client: Client,
}

impl AwsKmsKeyStore {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Creates a store from the ambient AWS configuration.
	pub async fn from_env() -> Self {
		let config = aws_config::load_from_env().await;
		Self::new(Client::new(&config))
	}
}

fn managed_key(meta: &KeyMetadata) -> Result<ManagedKey, KeyStoreError> {
	let created = meta.creation_date().ok_or_else(|| {
		KeyStoreError::provider(format!("key {} has no creation date", meta.key_id()))
	})?;
	let created_at = timestamp(created)?;
	Ok(ManagedKey { key_id: meta.key_id().to_string(), created_at })
}

fn timestamp(value: &aws_sdk_kms::primitives::DateTime) -> Result<DateTime<Utc>, KeyStoreError> {
	DateTime::from_timestamp(value.secs(), value.subsec_nanos())
		.ok_or_else(|| KeyStoreError::provider(format!("creation date out of range: {}", value)))
}

impl KeyStore for AwsKmsKeyStore {
	async fn describe_by_alias(&self, alias: &str) -> Result<ManagedKey, KeyStoreError> {
		let out = self.client.describe_key().key_id(alias).send().await.map_err(|err| {
			if err.as_service_error().is_some_and(|e| e.is_not_found_exception()) {
				KeyStoreError::NotFound(alias.to_string())
			} else {
				KeyStoreError::provider(err)
			}
		})?;
		let meta = out.key_metadata().ok_or_else(|| {
			KeyStoreError::provider(format!("describe key response for {alias} has no metadata"))
		})?;
		managed_key(meta)
	}

	async fn create_signing_key(
		&self,
		spec: &KeySpec,
		tags: &[KeyTag],
	) -> Result<ManagedKey, KeyStoreError> {
		let mut request = self
			.client
			.create_key()
			.key_spec(cryptography::kms_key_spec(spec))
			.key_usage(cryptography::key_usage_type());
		for tag in tags {
			let kms_tag = Tag::builder()
				.tag_key(tag.key.as_str())
				.tag_value(tag.value.as_str())
				.build()
				.map_err(KeyStoreError::provider)?;
			request = request.tags(kms_tag);
		}
		let out = request.send().await.map_err(KeyStoreError::provider)?;
		let meta = out
			.key_metadata()
			.ok_or_else(|| KeyStoreError::provider("create key response has no metadata"))?;
		managed_key(meta)
	}

	async fn get_public_key(&self, key_id: &str) -> Result<Vec<u8>, KeyStoreError> {
		let out = self.client.get_public_key().key_id(key_id).send().await.map_err(|err| {
			if err.as_service_error().is_some_and(|e| e.is_not_found_exception()) {
				KeyStoreError::NotFound(key_id.to_string())
			} else {
				KeyStoreError::provider(err)
			}
		})?;
		out.public_key().map(|blob| blob.as_ref().to_vec()).ok_or_else(|| {
			KeyStoreError::provider(format!("no public key material returned for {key_id}"))
		})
	}

	async fn create_alias(&self, alias: &str, key_id: &str) -> Result<(), KeyStoreError> {
		self.client
			.create_alias()
			.alias_name(alias)
			.target_key_id(key_id)
			.send()
			.await
			.map_err(KeyStoreError::provider)?;
		Ok(())
	}

	async fn update_alias(&self, alias: &str, key_id: &str) -> Result<(), KeyStoreError> {
		self.client
			.update_alias()
			.alias_name(alias)
			.target_key_id(key_id)
			.send()
			.await
			.map_err(|err| {
				if err.as_service_error().is_some_and(|e| e.is_not_found_exception()) {
					KeyStoreError::NotFound(alias.to_string())
				} else {
					KeyStoreError::provider(err)
				}
			})?;
		Ok(())
	}

	async fn delete_alias(&self, alias: &str) -> Result<(), KeyStoreError> {
		self.client.delete_alias().alias_name(alias).send().await.map_err(|err| {
			if err.as_service_error().is_some_and(|e| e.is_not_found_exception()) {
				KeyStoreError::NotFound(alias.to_string())
			} else {
				KeyStoreError::provider(err)
			}
		})?;
		Ok(())
	}

	async fn schedule_deletion(&self, key_id: &str) -> Result<(), KeyStoreError> {
		self.client.schedule_key_deletion().key_id(key_id).send().await.map_err(|err| {
			if err.as_service_error().is_some_and(|e| e.is_not_found_exception()) {
				KeyStoreError::NotFound(key_id.to_string())
			} else {
				KeyStoreError::provider(err)
			}
		})?;
		Ok(())
	}
}
