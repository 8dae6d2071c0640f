use anyhow::{Context, Result};
use keyset_manager::export::{ExportConfig, KeySetExporter, SignatureAlgorithm};
use keyset_manager::AliasResolver;
use keyset_manager_aws_kms::AwsKmsKeyStore;
use std::io;

pub async fn run(prefix: &str, algorithm: SignatureAlgorithm) -> Result<()> {
	let store = AwsKmsKeyStore::from_env().await;
	let exporter = KeySetExporter::new(&store, AliasResolver::new(prefix));

	let set = exporter
		.export(&ExportConfig { algorithm })
		.await
		.context("exporting key set")?;

	serde_json::to_writer(io::stdout().lock(), &set).context("encoding JWKS")?;
	println!();

	Ok(())
}
