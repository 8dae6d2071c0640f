use crate::{ToCanonicalString, TryFromCanonicalString};
use std::fmt;

/// Role of a key in the rotation cycle. Exactly one alias exists per
/// generation under a given prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
	Current,
	Next,
	Previous,
}

impl Generation {
	/// All generations in the fixed export order.
	pub const ALL: [Generation; 3] = [Generation::Current, Generation::Next, Generation::Previous];

	/// Suffix appended to the alias prefix for this generation.
	pub fn alias_suffix(&self) -> &'static str {
		match self {
			Generation::Current => "-current",
			Generation::Next => "-next",
			Generation::Previous => "-previous",
		}
	}
}

impl ToCanonicalString for Generation {
	fn to_canonical_string(&self) -> String {
		match self {
			Generation::Current => "current".to_string(),
			Generation::Next => "next".to_string(),
			Generation::Previous => "previous".to_string(),
		}
	}
}

impl TryFromCanonicalString for Generation {
	fn try_from_canonical_string(s: &str) -> Result<Self, String> {
		match s {
			"current" => Ok(Generation::Current),
			"next" => Ok(Generation::Next),
			"previous" => Ok(Generation::Previous),
			_ => Err(format!("invalid generation: {}", s)),
		}
	}
}

impl fmt::Display for Generation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_canonical_string())
	}
}

/// Maps (prefix, generation) pairs to the physical alias identifiers used by
/// the key-management service. Pure string construction: no state, no I/O,
/// and no two generations collide under the same prefix.
#[derive(Debug, Clone)]
pub struct AliasResolver {
	prefix: String,
}

impl AliasResolver {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self { prefix: prefix.into() }
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Resolves the alias identifier for a generation under this prefix.
	pub fn resolve(&self, generation: Generation) -> String {
		format!("alias/{}{}", self.prefix, generation.alias_suffix())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_namespaced_aliases() {
		let resolver = AliasResolver::new("svc");
		assert_eq!(resolver.resolve(Generation::Current), "alias/svc-current");
		assert_eq!(resolver.resolve(Generation::Next), "alias/svc-next");
		assert_eq!(resolver.resolve(Generation::Previous), "alias/svc-previous");
	}

	#[test]
	fn resolution_is_stable_and_collision_free() {
		let resolver = AliasResolver::new("svc");
		for generation in Generation::ALL {
			assert_eq!(resolver.resolve(generation), resolver.resolve(generation));
		}
		let aliases: Vec<_> =
			Generation::ALL.iter().map(|g| resolver.resolve(*g)).collect();
		assert!(aliases.iter().all(|a| aliases.iter().filter(|b| *b == a).count() == 1));
	}

	#[test]
	fn generation_canonical_string_round_trips() {
		for generation in Generation::ALL {
			let round_tripped =
				Generation::try_from_canonical_string(&generation.to_canonical_string()).unwrap();
			assert_eq!(round_tripped, generation);
		}
		assert!(Generation::try_from_canonical_string("stale").is_err());
	}
}
