//! In-memory [`KeyStore`] used to exercise the rotation and export engines
//! without a live provider.
//!
//! Supports backdating key creation times, attaching public key material for
//! export tests, and injecting a provider failure at an arbitrary call
//! offset so every intermediate state of a rotation can be observed.

use chrono::{DateTime, Duration, Utc};
use keyset_manager::store::{KeySpec, KeyStore, KeyTag, ManagedKey};
use keyset_manager::KeyStoreError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct KeyRecord {
	created_at: DateTime<Utc>,
	tags: Vec<KeyTag>,
	public_key: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
	keys: BTreeMap<String, KeyRecord>,
	aliases: BTreeMap<String, String>,
	pending_deletion: BTreeSet<String>,
	/// Every key id that was reachable through an alias at some point.
	ever_aliased: BTreeSet<String>,
	next_key: u64,
	calls: u64,
	fail_at_call: Option<u64>,
	fail_next_op: Option<&'static str>,
}

impl State {
	fn allocate_key_id(&mut self) -> String {
		self.next_key += 1;
		format!("key-{:04}", self.next_key)
	}

	fn tick(&mut self, op: &'static str) -> Result<(), KeyStoreError> {
		self.calls += 1;
		if self.fail_at_call == Some(self.calls) {
			self.fail_at_call = None;
			return Err(KeyStoreError::provider(format!("injected failure in {op}")));
		}
		if self.fail_next_op == Some(op) {
			self.fail_next_op = None;
			return Err(KeyStoreError::provider(format!("injected failure in {op}")));
		}
		Ok(())
	}
}

#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
	state: Mutex<State>,
}

impl InMemoryKeyStore {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().expect("state mutex poisoned")
	}

	/// Seeds a key of the given age and points `alias` at it.
	pub fn seed_key(&self, alias: &str, age: std::time::Duration) -> String {
		let mut state = self.lock();
		let key_id = state.allocate_key_id();
		let created_at = Utc::now() - Duration::from_std(age).expect("age out of range");
		state.keys.insert(
			key_id.clone(),
			KeyRecord { created_at, tags: Vec::new(), public_key: Vec::new() },
		);
		state.aliases.insert(alias.to_string(), key_id.clone());
		state.ever_aliased.insert(key_id.clone());
		key_id
	}

	/// Attaches DER public key material to an existing key.
	pub fn set_public_key(&self, key_id: &str, der: Vec<u8>) {
		self.lock().keys.get_mut(key_id).expect("no such key").public_key = der;
	}

	/// Fails the n-th store operation from now (1-based) with a provider
	/// error. Disarms after firing.
	pub fn fail_at_call(&self, nth: u64) {
		let mut state = self.lock();
		let fail_at = state.calls + nth;
		state.fail_at_call = Some(fail_at);
	}

	/// Fails the next occurrence of the named operation with a provider
	/// error. Disarms after firing.
	pub fn fail_next(&self, op: &'static str) {
		self.lock().fail_next_op = Some(op);
	}

	/// Number of store operations observed so far, including failed ones.
	pub fn calls(&self) -> u64 {
		self.lock().calls
	}

	pub fn key_for_alias(&self, alias: &str) -> Option<String> {
		self.lock().aliases.get(alias).cloned()
	}

	pub fn aliases(&self) -> BTreeMap<String, String> {
		self.lock().aliases.clone()
	}

	pub fn pending_deletion(&self) -> BTreeSet<String> {
		self.lock().pending_deletion.clone()
	}

	pub fn tags_for(&self, key_id: &str) -> Vec<KeyTag> {
		self.lock().keys.get(key_id).map(|record| record.tags.clone()).unwrap_or_default()
	}

	/// Keys that were once alias-reachable but are now neither aliased nor
	/// scheduled for deletion.
	pub fn orphans(&self) -> BTreeSet<String> {
		let state = self.lock();
		state
			.ever_aliased
			.iter()
			.filter(|key_id| {
				!state.aliases.values().any(|id| &id == key_id)
					&& !state.pending_deletion.contains(*key_id)
			})
			.cloned()
			.collect()
	}

	/// Asserts that every key which was ever reachable through an alias is
	/// still aliased or has its deletion scheduled.
	pub fn assert_no_orphans(&self) {
		let orphans = self.orphans();
		assert!(orphans.is_empty(), "keys became unreachable: {orphans:?}");
	}
}

impl KeyStore for InMemoryKeyStore {
	async fn describe_by_alias(&self, alias: &str) -> Result<ManagedKey, KeyStoreError> {
		let mut state = self.lock();
		state.tick("describe_by_alias")?;
		let key_id = state
			.aliases
			.get(alias)
			.ok_or_else(|| KeyStoreError::NotFound(alias.to_string()))?
			.clone();
		let record =
			state.keys.get(&key_id).ok_or_else(|| KeyStoreError::NotFound(key_id.clone()))?;
		Ok(ManagedKey { key_id, created_at: record.created_at })
	}

	async fn create_signing_key(
		&self,
		_spec: &KeySpec,
		tags: &[KeyTag],
	) -> Result<ManagedKey, KeyStoreError> {
		let mut state = self.lock();
		state.tick("create_signing_key")?;
		let key_id = state.allocate_key_id();
		let created_at = Utc::now();
		state.keys.insert(
			key_id.clone(),
			KeyRecord { created_at, tags: tags.to_vec(), public_key: Vec::new() },
		);
		Ok(ManagedKey { key_id, created_at })
	}

	async fn get_public_key(&self, key_id: &str) -> Result<Vec<u8>, KeyStoreError> {
		let mut state = self.lock();
		state.tick("get_public_key")?;
		let record =
			state.keys.get(key_id).ok_or_else(|| KeyStoreError::NotFound(key_id.to_string()))?;
		Ok(record.public_key.clone())
	}

	async fn create_alias(&self, alias: &str, key_id: &str) -> Result<(), KeyStoreError> {
		let mut state = self.lock();
		state.tick("create_alias")?;
		if state.aliases.contains_key(alias) {
			return Err(KeyStoreError::provider(format!("alias {alias} already exists")));
		}
		if !state.keys.contains_key(key_id) {
			return Err(KeyStoreError::NotFound(key_id.to_string()));
		}
		state.aliases.insert(alias.to_string(), key_id.to_string());
		state.ever_aliased.insert(key_id.to_string());
		Ok(())
	}

	async fn update_alias(&self, alias: &str, key_id: &str) -> Result<(), KeyStoreError> {
		let mut state = self.lock();
		state.tick("update_alias")?;
		if !state.aliases.contains_key(alias) {
			return Err(KeyStoreError::NotFound(alias.to_string()));
		}
		if !state.keys.contains_key(key_id) {
			return Err(KeyStoreError::NotFound(key_id.to_string()));
		}
		state.aliases.insert(alias.to_string(), key_id.to_string());
		state.ever_aliased.insert(key_id.to_string());
		Ok(())
	}

	async fn delete_alias(&self, alias: &str) -> Result<(), KeyStoreError> {
		let mut state = self.lock();
		state.tick("delete_alias")?;
		state.aliases.remove(alias).ok_or_else(|| KeyStoreError::NotFound(alias.to_string()))?;
		Ok(())
	}

	async fn schedule_deletion(&self, key_id: &str) -> Result<(), KeyStoreError> {
		let mut state = self.lock();
		state.tick("schedule_deletion")?;
		if !state.keys.contains_key(key_id) {
			return Err(KeyStoreError::NotFound(key_id.to_string()));
		}
		// Mirrors the reachability invariant of the engine: a referenced key
		// must never be scheduled for deletion.
		if state.aliases.values().any(|id| id == key_id) {
			return Err(KeyStoreError::provider(format!(
				"key {key_id} is still referenced by an alias"
			)));
		}
		state.pending_deletion.insert(key_id.to_string());
		Ok(())
	}
}
