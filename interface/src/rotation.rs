use crate::alias::{AliasResolver, Generation};
use crate::store::{KeySpec, KeyStore, KeyTag, ManagedKey};
use crate::KeyStoreError;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

/// Tag attached to every key created by the engine.
const MANAGED_BY_TAG: (&str, &str) = ("ManagedBy", "keyset-manager");

/// Default minimum age of the current key before rotation proceeds.
pub const DEFAULT_MINIMUM_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct RotateConfig {
	/// Minimum age the current key must have to be considered for rotation.
	pub minimum_age: Duration,
	/// Rotate regardless of age.
	pub force: bool,
	/// Specification for keys created during this run.
	pub key_spec: KeySpec,
}

impl Default for RotateConfig {
	fn default() -> Self {
		Self { minimum_age: DEFAULT_MINIMUM_AGE, force: false, key_spec: KeySpec::default() }
	}
}

/// What happened to the key displaced from the previous generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retirement {
	/// No previous key existed before this run.
	NotRequired,
	Scheduled {
		key_id: String,
	},
	/// Scheduling failed after the new topology was already established.
	/// The rotation itself stands; the key must be cleaned up out of band.
	Failed {
		key_id: String,
		error: String,
	},
}

/// The result of one successful rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
	pub old_current: String,
	pub old_next: String,
	pub old_previous: Option<String>,
	/// The freshly created, never-promoted key now aliased as next.
	pub standby: String,
	pub retirement: Retirement,
}

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
	#[error("current key {key_id} is too young to rotate ({age:?} < {minimum_age:?})")]
	TooYoung { key_id: String, age: Duration, minimum_age: Duration },
	#[error("{op} failed for {id}")]
	Store {
		op: &'static str,
		id: String,
		#[source]
		source: KeyStoreError,
	},
}

impl RotationError {
	fn store(op: &'static str, id: impl Into<String>, source: KeyStoreError) -> Self {
		RotationError::Store { op, id: id.into(), source }
	}
}

/// Advances the three-generation key topology held in a [`KeyStore`].
///
/// On rotation the current key becomes previous, the next key becomes
/// current, and a brand-new standby key is created under the next alias.
/// The key displaced from previous is scheduled for deletion.
///
/// Step ordering is the correctness property: every mutation before the
/// final deletion is idempotent or additive, so a failed run leaves all key
/// material alias-reachable and is safe to re-invoke as is. Concurrent
/// rotations against the same prefix are not serialized here; deployments
/// must ensure a single writer per prefix.
pub struct RotationEngine<'a, S> {
	store: &'a S,
	resolver: AliasResolver,
}

impl<'a, S> RotationEngine<'a, S>
where
	S: KeyStore + Sync,
{
	pub fn new(store: &'a S, resolver: AliasResolver) -> Self {
		Self { store, resolver }
	}

	pub async fn rotate(&self, config: &RotateConfig) -> Result<RotationOutcome, RotationError> {
		let current = self.get_or_create(Generation::Current, &config.key_spec).await?;

		let age = (Utc::now() - current.created_at).to_std().unwrap_or_default();
		if age < config.minimum_age && !config.force {
			return Err(RotationError::TooYoung {
				key_id: current.key_id,
				age,
				minimum_age: config.minimum_age,
			});
		}

		// Absence of a previous key only means no rotation has completed yet.
		let previous_alias = self.resolver.resolve(Generation::Previous);
		let previous = match self.store.describe_by_alias(&previous_alias).await {
			Ok(key) => Some(key),
			Err(KeyStoreError::NotFound(_)) => None,
			Err(err) => return Err(RotationError::store("describe key", previous_alias, err)),
		};

		// Repoint previous at the outgoing current key before any other
		// mutation, so it stays reachable if a later step fails.
		self.upsert_alias(Generation::Previous, &current.key_id).await?;

		let next = self.get_or_create(Generation::Next, &config.key_spec).await?;

		self.upsert_alias(Generation::Current, &next.key_id).await?;

		// The old next key is now owned by current. Deleting and recreating
		// the next alias guarantees it never resolves to an already-promoted
		// key.
		let next_alias = self.resolver.resolve(Generation::Next);
		self.store
			.delete_alias(&next_alias)
			.await
			.map_err(|err| RotationError::store("delete alias", next_alias.clone(), err))?;
		let standby = self.get_or_create(Generation::Next, &config.key_spec).await?;

		// Scheduling deletion is the single irreversible step, so it runs
		// only after everything else has succeeded. A failure here no longer
		// invalidates the rotation.
		let retirement = match &previous {
			None => Retirement::NotRequired,
			// A re-run after an earlier partial failure can find the previous
			// alias already pointing at the outgoing current key; scheduling
			// deletion then would tear down a live generation.
			Some(prev) if prev.key_id == current.key_id => Retirement::NotRequired,
			Some(prev) => match self.store.schedule_deletion(&prev.key_id).await {
				Ok(()) => Retirement::Scheduled { key_id: prev.key_id.clone() },
				Err(err) => {
					warn!(
						key_id = %prev.key_id,
						error = %err,
						"failed to schedule deletion of retired key"
					);
					Retirement::Failed { key_id: prev.key_id.clone(), error: err.to_string() }
				}
			},
		};

		Ok(RotationOutcome {
			old_current: current.key_id,
			old_next: next.key_id,
			old_previous: previous.map(|key| key.key_id),
			standby: standby.key_id,
			retirement,
		})
	}

	/// Resolves a generation's key, creating and aliasing a fresh one when
	/// the alias does not exist yet.
	async fn get_or_create(
		&self,
		generation: Generation,
		spec: &KeySpec,
	) -> Result<ManagedKey, RotationError> {
		let alias = self.resolver.resolve(generation);
		match self.store.describe_by_alias(&alias).await {
			Ok(key) => Ok(key),
			Err(KeyStoreError::NotFound(_)) => {
				info!(alias = %alias, "key does not exist, creating");
				let tags = [KeyTag::new(MANAGED_BY_TAG.0, MANAGED_BY_TAG.1)];
				let key = self
					.store
					.create_signing_key(spec, &tags)
					.await
					.map_err(|err| RotationError::store("create key", alias.clone(), err))?;
				self.store
					.create_alias(&alias, &key.key_id)
					.await
					.map_err(|err| RotationError::store("create alias", alias.clone(), err))?;
				Ok(key)
			}
			Err(err) => Err(RotationError::store("describe key", alias, err)),
		}
	}

	/// Points an alias at a key, creating the alias when it does not exist.
	async fn upsert_alias(
		&self,
		generation: Generation,
		key_id: &str,
	) -> Result<(), RotationError> {
		let alias = self.resolver.resolve(generation);
		match self.store.update_alias(&alias, key_id).await {
			Ok(()) => Ok(()),
			Err(KeyStoreError::NotFound(_)) => self
				.store
				.create_alias(&alias, key_id)
				.await
				.map_err(|err| RotationError::store("create alias", alias.clone(), err)),
			Err(err) => Err(RotationError::store("update alias", alias, err)),
		}
	}
}
