use anyhow::Result;
use clap::{Parser, Subcommand};
use keyset_manager::export::SignatureAlgorithm;
use keyset_manager::store::KeySpec;
use keyset_manager::TryFromCanonicalString;
use std::time::Duration;

pub mod export;
pub mod rotate;

#[derive(Parser, Debug)]
#[clap(name = "keyset-admin", about = "CLI for managing KMS-held signing key sets")]
pub struct CLI {
	#[clap(
		long,
		help = "Alias prefix to use when operating on keys; actual keys get aliases with '-current', '-next' and '-previous' suffixes"
	)]
	pub key_alias_prefix: String,

	#[clap(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Export the live key generations as a JWKS document on stdout
	Export {
		#[clap(
			long,
			value_parser = parse_algorithm,
			help = "Intended algorithm to use with the exported keys (e.g. RS256); must be provided explicitly to avoid algorithm confusion"
		)]
		algorithm: SignatureAlgorithm,
	},
	/// Rotate the key generations; will create new keys if necessary
	Rotate {
		#[clap(
			long,
			default_value = "24h",
			value_parser = parse_duration,
			help = "Minimum age the 'current' key must have to be considered for rotation"
		)]
		minimum_age: Duration,

		#[clap(long, help = "Force rotation of keys regardless of age")]
		force: bool,

		#[clap(
			long,
			default_value = "RSA_2048",
			value_parser = parse_key_spec,
			help = "Key specification to use for new keys"
		)]
		key_spec: KeySpec,
	},
}

impl CLI {
	pub async fn run(self) -> Result<()> {
		match self.command {
			Commands::Export { algorithm } => {
				export::run(&self.key_alias_prefix, algorithm).await
			}
			Commands::Rotate { minimum_age, force, key_spec } => {
				rotate::run(&self.key_alias_prefix, minimum_age, force, key_spec).await
			}
		}
	}
}

fn parse_algorithm(value: &str) -> Result<SignatureAlgorithm, String> {
	SignatureAlgorithm::try_from_canonical_string(value)
}

fn parse_key_spec(value: &str) -> Result<KeySpec, String> {
	KeySpec::try_from_canonical_string(value)
}

/// Parses durations of the form `<n>(s|m|h|d)`; a bare number is seconds.
fn parse_duration(value: &str) -> Result<Duration, String> {
	let value = value.trim();
	let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
		Some(split) => value.split_at(split),
		None => (value, "s"),
	};
	let number: u64 = number.parse().map_err(|_| format!("invalid duration: {value}"))?;
	let seconds = match unit {
		"s" => number,
		"m" => number * 60,
		"h" => number * 3600,
		"d" => number * 86_400,
		_ => return Err(format!("invalid duration unit in '{value}'; use s, m, h or d")),
	};
	Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn verify_cli() {
		CLI::command().debug_assert();
	}

	#[test]
	fn durations_parse_with_common_units() {
		assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
		assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
		assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
		assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
		assert!(parse_duration("1y").is_err());
		assert!(parse_duration("h").is_err());
	}

	#[test]
	fn rotate_defaults_match_the_documented_policy() {
		let cli = CLI::parse_from(["keyset-admin", "--key-alias-prefix", "svc", "rotate"]);
		match cli.command {
			Commands::Rotate { minimum_age, force, key_spec } => {
				assert_eq!(minimum_age, Duration::from_secs(86_400));
				assert!(!force);
				assert_eq!(key_spec, KeySpec::Rsa2048);
			}
			other => panic!("expected rotate, got {:?}", other),
		}
	}
}
