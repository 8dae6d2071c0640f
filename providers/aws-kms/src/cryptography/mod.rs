use aws_sdk_kms::types::{KeySpec as KmsKeySpec, KeyUsageType};
use keyset_manager::store::KeySpec;

/// Maps the provider-agnostic key specification to the AWS KMS [`KmsKeySpec`].
pub fn kms_key_spec(spec: &KeySpec) -> KmsKeySpec {
	match spec {
		KeySpec::Rsa2048 => KmsKeySpec::Rsa2048,
		KeySpec::Rsa3072 => KmsKeySpec::Rsa3072,
		KeySpec::Rsa4096 => KmsKeySpec::Rsa4096,
		KeySpec::EccNistP256 => KmsKeySpec::EccNistP256,
		KeySpec::EccNistP384 => KmsKeySpec::EccNistP384,
		KeySpec::Other(other) => KmsKeySpec::from(other.as_str()),
	}
}

/// Key usage for every key this tool creates.
pub fn key_usage_type() -> KeyUsageType {
	KeyUsageType::SignVerify
}
