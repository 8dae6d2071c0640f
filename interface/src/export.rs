use crate::alias::{AliasResolver, Generation};
use crate::store::KeyStore;
use crate::{KeyStoreError, ToCanonicalString, TryFromCanonicalString};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::jwk::{
	AlgorithmParameters, CommonParameters, EllipticCurve, EllipticCurveKeyParameters,
	EllipticCurveKeyType, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse, RSAKeyParameters, RSAKeyType,
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use spki::{ObjectIdentifier, SubjectPublicKeyInfoRef};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Signature algorithm the caller declares for the exported keys.
///
/// Never inferred from the key material: verifiers that trust an inferred
/// `alg` member are open to algorithm confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
	Rs256,
	Rs384,
	Rs512,
	Ps256,
	Ps384,
	Ps512,
	Es256,
	Es384,
}

impl SignatureAlgorithm {
	fn to_key_algorithm(self) -> KeyAlgorithm {
		match self {
			SignatureAlgorithm::Rs256 => KeyAlgorithm::RS256,
			SignatureAlgorithm::Rs384 => KeyAlgorithm::RS384,
			SignatureAlgorithm::Rs512 => KeyAlgorithm::RS512,
			SignatureAlgorithm::Ps256 => KeyAlgorithm::PS256,
			SignatureAlgorithm::Ps384 => KeyAlgorithm::PS384,
			SignatureAlgorithm::Ps512 => KeyAlgorithm::PS512,
			SignatureAlgorithm::Es256 => KeyAlgorithm::ES256,
			SignatureAlgorithm::Es384 => KeyAlgorithm::ES384,
		}
	}
}

impl ToCanonicalString for SignatureAlgorithm {
	fn to_canonical_string(&self) -> String {
		match self {
			SignatureAlgorithm::Rs256 => "RS256".to_string(),
			SignatureAlgorithm::Rs384 => "RS384".to_string(),
			SignatureAlgorithm::Rs512 => "RS512".to_string(),
			SignatureAlgorithm::Ps256 => "PS256".to_string(),
			SignatureAlgorithm::Ps384 => "PS384".to_string(),
			SignatureAlgorithm::Ps512 => "PS512".to_string(),
			SignatureAlgorithm::Es256 => "ES256".to_string(),
			SignatureAlgorithm::Es384 => "ES384".to_string(),
		}
	}
}

impl TryFromCanonicalString for SignatureAlgorithm {
	fn try_from_canonical_string(s: &str) -> Result<Self, String> {
		match s {
			"RS256" => Ok(SignatureAlgorithm::Rs256),
			"RS384" => Ok(SignatureAlgorithm::Rs384),
			"RS512" => Ok(SignatureAlgorithm::Rs512),
			"PS256" => Ok(SignatureAlgorithm::Ps256),
			"PS384" => Ok(SignatureAlgorithm::Ps384),
			"PS512" => Ok(SignatureAlgorithm::Ps512),
			"ES256" => Ok(SignatureAlgorithm::Es256),
			"ES384" => Ok(SignatureAlgorithm::Es384),
			_ => Err(format!("invalid signature algorithm: {}", s)),
		}
	}
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
	pub algorithm: SignatureAlgorithm,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
	#[error("{op} failed for {id}")]
	Store {
		op: &'static str,
		id: String,
		#[source]
		source: KeyStoreError,
	},
	#[error("unusable public key material for {id}")]
	Key {
		id: String,
		#[source]
		source: KeyMaterialError,
	},
}

/// Failures decoding provider-native public key material into a JWK.
#[derive(Debug, thiserror::Error)]
pub enum KeyMaterialError {
	#[error("malformed SPKI document")]
	Spki(#[source] spki::Error),
	#[error("malformed RSA public key")]
	Rsa(#[source] rsa::pkcs1::Error),
	#[error("invalid elliptic curve point")]
	Point(#[source] p256::elliptic_curve::Error),
	#[error("public key is not an affine point")]
	NonAffinePoint,
	#[error("unsupported key algorithm {0}")]
	UnsupportedAlgorithm(ObjectIdentifier),
	#[error("unsupported elliptic curve {0}")]
	UnsupportedCurve(ObjectIdentifier),
}

/// Assembles the verifier-facing JWK Set from the three live generations.
///
/// Fail-closed: if any generation cannot be resolved or its material cannot
/// be decoded, the whole export fails. This includes the case where no
/// previous key exists yet because no rotation has completed.
pub struct KeySetExporter<'a, S> {
	store: &'a S,
	resolver: AliasResolver,
}

impl<'a, S> KeySetExporter<'a, S>
where
	S: KeyStore + Sync,
{
	pub fn new(store: &'a S, resolver: AliasResolver) -> Self {
		Self { store, resolver }
	}

	pub async fn export(&self, config: &ExportConfig) -> Result<JwkSet, ExportError> {
		let mut keys = Vec::with_capacity(Generation::ALL.len());
		for generation in Generation::ALL {
			let alias = self.resolver.resolve(generation);
			let key = self.store.describe_by_alias(&alias).await.map_err(|err| {
				ExportError::Store { op: "describe key", id: alias.clone(), source: err }
			})?;
			let der = self.store.get_public_key(&key.key_id).await.map_err(|err| {
				ExportError::Store { op: "get public key", id: key.key_id.clone(), source: err }
			})?;
			let jwk = jwk_from_spki_der(&der, &key.key_id, config.algorithm)
				.map_err(|err| ExportError::Key { id: key.key_id.clone(), source: err })?;
			keys.push(jwk);
		}
		Ok(JwkSet { keys })
	}
}

/// Decodes a DER-encoded SubjectPublicKeyInfo document into a JWK tagged
/// with the given key id and declared algorithm.
fn jwk_from_spki_der(
	der: &[u8],
	key_id: &str,
	algorithm: SignatureAlgorithm,
) -> Result<Jwk, KeyMaterialError> {
	let info = SubjectPublicKeyInfoRef::try_from(der).map_err(KeyMaterialError::Spki)?;
	let subject_public_key = info.subject_public_key.raw_bytes();

	let parameters = match info.algorithm.oid {
		oid if oid == RSA_ENCRYPTION => {
			let key = RsaPublicKey::from_pkcs1_der(subject_public_key)
				.map_err(KeyMaterialError::Rsa)?;
			AlgorithmParameters::RSA(RSAKeyParameters {
				key_type: RSAKeyType::RSA,
				n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
				e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
			})
		}
		oid if oid == ID_EC_PUBLIC_KEY => {
			let curve_oid =
				info.algorithm.parameters_oid().map_err(KeyMaterialError::Spki)?;
			match curve_oid {
				oid if oid == SECP256R1 => {
					let key = p256::PublicKey::from_sec1_bytes(subject_public_key)
						.map_err(KeyMaterialError::Point)?;
					let point = key.to_encoded_point(false);
					ec_parameters(
						EllipticCurve::P256,
						point.x().map(|x| x.as_slice()),
						point.y().map(|y| y.as_slice()),
					)?
				}
				oid if oid == SECP384R1 => {
					let key = p384::PublicKey::from_sec1_bytes(subject_public_key)
						.map_err(KeyMaterialError::Point)?;
					let point = key.to_encoded_point(false);
					ec_parameters(
						EllipticCurve::P384,
						point.x().map(|x| x.as_slice()),
						point.y().map(|y| y.as_slice()),
					)?
				}
				oid => return Err(KeyMaterialError::UnsupportedCurve(oid)),
			}
		}
		oid => return Err(KeyMaterialError::UnsupportedAlgorithm(oid)),
	};

	Ok(Jwk {
		common: CommonParameters {
			public_key_use: Some(PublicKeyUse::Signature),
			key_algorithm: Some(algorithm.to_key_algorithm()),
			key_id: Some(key_id.to_string()),
			..Default::default()
		},
		algorithm: parameters,
	})
}

fn ec_parameters(
	curve: EllipticCurve,
	x: Option<&[u8]>,
	y: Option<&[u8]>,
) -> Result<AlgorithmParameters, KeyMaterialError> {
	let x = x.ok_or(KeyMaterialError::NonAffinePoint)?;
	let y = y.ok_or(KeyMaterialError::NonAffinePoint)?;
	Ok(AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
		key_type: EllipticCurveKeyType::EC,
		curve,
		x: URL_SAFE_NO_PAD.encode(x),
		y: URL_SAFE_NO_PAD.encode(y),
	}))
}

#[cfg(test)]
mod tests {
	use super::*;

	// SPKI documents generated with openssl.
	const EC_P256_SPKI: &str = "3059301306072a8648ce3d020106082a8648ce3d03010703420004c50f8cf07b82213ab4217164409c6764d5776980668575d86881f27437abe599f95d28b98d7128359fcd8359d1812462596eafc18b21f789eeb67efc648f0c47";
	const EC_P384_SPKI: &str = "3076301006072a8648ce3d020106052b81040022036200046d08be00ce7cf5cb7474a240c0d1b4da13aeda7314ac99b241d06e93e041a44c938a374b1f15f908e861446ba6e1d6d8e7f7512694400d941583a81c7f769dffbb28087674497e90071bd8912cf1294a1c9cf43703f7ee3731abdbdfed0b4af6";
	const RSA_2048_SPKI: &str = "30820122300d06092a864886f70d01010105000382010f003082010a028201010086fdb5c7f2668e82ee1af6f1ab7fa1c550af21dbda4c466a123c59a72b280ad1f298b1ca57f09b9319028616dfba43245c5fb33f2383640df1035f764ff0415662668dacadb6ac257e9caab8900ccc0539f5469ca5d6f3891d89a3834bf6c1479b49e6c7ca73a79f5ac6a469db5197946fe1878bc050f2daba83168664874443ab74b0cb2c4f8e9336ee21390a59bc6b44b8726b378574d4817d491f4b8035a9dcf53009c7f48b7b0da2a7ce699e0ff8ce0034b9c119506cc3f4a0df82d08fe08f6cd8ed7ae117797bc30919f0c284fe44b4dec508ab83eeb71f547891476563d03a7f12a90685db8127aa773dae0fe22d74a29584a48fe23cd3d0400df741a50203010001";
	const ED25519_SPKI: &str =
		"302a300506032b6570032100e26f93103c0aa358b73cbdbfe73bea10009c9f4eeeb6e0232bd9dbafae0fe49b";

	fn der(fixture: &str) -> Vec<u8> {
		hex::decode(fixture).unwrap()
	}

	#[test]
	fn rsa_key_decodes_to_modulus_and_exponent() {
		let jwk =
			jwk_from_spki_der(&der(RSA_2048_SPKI), "kid-1", SignatureAlgorithm::Rs256).unwrap();
		assert_eq!(jwk.common.key_id.as_deref(), Some("kid-1"));
		assert_eq!(jwk.common.public_key_use, Some(PublicKeyUse::Signature));
		assert_eq!(jwk.common.key_algorithm, Some(KeyAlgorithm::RS256));
		match jwk.algorithm {
			AlgorithmParameters::RSA(params) => {
				// 2048-bit modulus, standard exponent 65537
				assert_eq!(params.n.len(), 342);
				assert_eq!(params.e, "AQAB");
			}
			other => panic!("expected RSA parameters, got {:?}", other),
		}
	}

	#[test]
	fn p256_key_decodes_to_affine_coordinates() {
		let jwk =
			jwk_from_spki_der(&der(EC_P256_SPKI), "kid-2", SignatureAlgorithm::Es256).unwrap();
		match jwk.algorithm {
			AlgorithmParameters::EllipticCurve(params) => {
				assert_eq!(params.curve, EllipticCurve::P256);
				// 32-byte coordinates
				assert_eq!(params.x.len(), 43);
				assert_eq!(params.y.len(), 43);
			}
			other => panic!("expected EC parameters, got {:?}", other),
		}
	}

	#[test]
	fn p384_key_decodes_to_affine_coordinates() {
		let jwk =
			jwk_from_spki_der(&der(EC_P384_SPKI), "kid-3", SignatureAlgorithm::Es384).unwrap();
		match jwk.algorithm {
			AlgorithmParameters::EllipticCurve(params) => {
				assert_eq!(params.curve, EllipticCurve::P384);
				// 48-byte coordinates
				assert_eq!(params.x.len(), 64);
				assert_eq!(params.y.len(), 64);
			}
			other => panic!("expected EC parameters, got {:?}", other),
		}
	}

	#[test]
	fn declared_algorithm_is_attached_regardless_of_key_type() {
		let jwk =
			jwk_from_spki_der(&der(EC_P256_SPKI), "kid-4", SignatureAlgorithm::Rs512).unwrap();
		assert_eq!(jwk.common.key_algorithm, Some(KeyAlgorithm::RS512));
	}

	#[test]
	fn unsupported_key_algorithm_is_rejected() {
		let err = jwk_from_spki_der(&der(ED25519_SPKI), "kid-5", SignatureAlgorithm::Es256)
			.unwrap_err();
		assert!(matches!(err, KeyMaterialError::UnsupportedAlgorithm(_)));
	}

	#[test]
	fn truncated_material_is_rejected() {
		let err =
			jwk_from_spki_der(&der(EC_P256_SPKI)[..20], "kid-6", SignatureAlgorithm::Es256)
				.unwrap_err();
		assert!(matches!(err, KeyMaterialError::Spki(_)));
	}

	#[test]
	fn algorithm_canonical_string_round_trips() {
		for alg in [
			SignatureAlgorithm::Rs256,
			SignatureAlgorithm::Ps512,
			SignatureAlgorithm::Es384,
		] {
			let round_tripped =
				SignatureAlgorithm::try_from_canonical_string(&alg.to_canonical_string())
					.unwrap();
			assert_eq!(round_tripped, alg);
		}
		assert!(SignatureAlgorithm::try_from_canonical_string("none").is_err());
	}
}
