use anyhow::{Context, Result};
use keyset_manager::rotation::{Retirement, RotateConfig, RotationEngine};
use keyset_manager::store::KeySpec;
use keyset_manager::AliasResolver;
use keyset_manager_aws_kms::AwsKmsKeyStore;
use std::time::Duration;
use tracing::{info, warn};

pub async fn run(
	prefix: &str,
	minimum_age: Duration,
	force: bool,
	key_spec: KeySpec,
) -> Result<()> {
	let store = AwsKmsKeyStore::from_env().await;
	let engine = RotationEngine::new(&store, AliasResolver::new(prefix));

	let config = RotateConfig { minimum_age, force, key_spec };
	let outcome = engine.rotate(&config).await.context("rotating keys")?;

	info!(
		old_current = %outcome.old_current,
		old_next = %outcome.old_next,
		standby = %outcome.standby,
		"rotated key generations"
	);
	match &outcome.retirement {
		Retirement::NotRequired => {}
		Retirement::Scheduled { key_id } => {
			info!(key_id = %key_id, "scheduled deletion of retired key");
		}
		Retirement::Failed { key_id, error } => {
			warn!(
				key_id = %key_id,
				error = %error,
				"rotation succeeded but the retired key could not be scheduled for deletion"
			);
		}
	}

	Ok(())
}
