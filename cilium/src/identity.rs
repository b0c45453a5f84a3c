//! Assembly identity: names, versions and public-key/token derivation (spec §3).

use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

use sha1::{Digest, Sha1};

pub use crate::raw::heaps::table::AssemblyFlags;

/// `(major, minor, build, revision)`, compared lexicographically in that order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct AssemblyVersion {
	pub major: u16,
	pub minor: u16,
	pub build: u16,
	pub revision: u16,
}

impl AssemblyVersion {
	pub const ZERO: AssemblyVersion = AssemblyVersion { major: 0, minor: 0, build: 0, revision: 0 };

	pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
		Self { major, minor, build, revision }
	}

	/// `AllowNewerVersions`-style comparison: self is usable where `required` was asked for.
	pub fn is_compatible_with(&self, required: &AssemblyVersion) -> bool {
		*self >= *required
	}
}

impl Display for AssemblyVersion {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
	}
}

/// An 8-byte public key token, as produced by [`PublicKeyToken::from_full_key`] or read
/// directly from an `AssemblyRef`/`Assembly` row's `public_key_or_token` blob.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PublicKeyToken(pub [u8; 8]);

impl PublicKeyToken {
	/// Derives the short token from a full public key: SHA-1 the key, take the last 8
	/// bytes of the digest, reversed.
	pub fn from_full_key(key: &[u8]) -> Self {
		let mut hasher = Sha1::new();
		hasher.update(key);
		let digest = hasher.finalize();
		let mut token = [0u8; 8];
		for (i, byte) in digest[12..20].iter().rev().enumerate() {
			token[i] = *byte;
		}
		Self(token)
	}
}

impl Debug for PublicKeyToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		for byte in self.0 {
			write!(f, "{byte:02x}")?;
		}
		Ok(())
	}
}

impl Display for PublicKeyToken {
	#[inline]
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(self, f)
	}
}

/// The public-key-or-token field of an assembly identity, distinguished by `has_full_key`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum PublicKeyOrToken<'l> {
	None,
	Token(PublicKeyToken),
	FullKey(&'l [u8]),
}

impl<'l> PublicKeyOrToken<'l> {
	pub fn has_full_key(&self) -> bool {
		matches!(self, Self::FullKey(_))
	}

	/// The token, deriving it from the full key on the fly when only the key is held.
	pub fn token(&self) -> Option<PublicKeyToken> {
		match self {
			PublicKeyOrToken::None => None,
			PublicKeyOrToken::Token(token) => Some(*token),
			PublicKeyOrToken::FullKey(key) => Some(PublicKeyToken::from_full_key(key)),
		}
	}
}

impl Debug for PublicKeyOrToken<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			PublicKeyOrToken::None => f.write_str("None"),
			PublicKeyOrToken::Token(token) => write!(f, "Token({token:?})"),
			PublicKeyOrToken::FullKey(key) => {
				f.write_str("FullKey(")?;
				for byte in *key {
					write!(f, "{byte:02x}")?;
				}
				f.write_str(")")
			}
		}
	}
}

/// `(name, version, culture, publicKeyOrToken, hasFullKey, flags)` — spec §3.
#[derive(Copy, Clone)]
pub struct AssemblyName<'l> {
	pub name: &'l str,
	pub version: AssemblyVersion,
	pub culture: Option<&'l str>,
	pub public_key_or_token: PublicKeyOrToken<'l>,
	pub flags: AssemblyFlags,
}

impl<'l> AssemblyName<'l> {
	/// The default comparer: all four core fields (name, version, culture, key/token) match.
	/// Public-key and token are compared by token, so a reference carrying a token and a
	/// definition carrying the full key can still compare equal.
	pub fn matches_default(&self, other: &AssemblyName) -> bool {
		self.name == other.name
			&& self.version == other.version
			&& self.culture() == other.culture()
			&& self.public_key_or_token.token() == other.public_key_or_token.token()
	}

	/// Culture normalized so that `None` and `Some("")` compare equal ("neutral" culture).
	pub fn culture(&self) -> Option<&'l str> {
		self.culture.filter(|c| !c.is_empty())
	}

	/// Key used inside a runtime context's loaded-assembly table: name + culture +
	/// public-key-token, ignoring version (spec §3, §4.4).
	pub fn version_agnostic_key(&self) -> VersionAgnosticKey<'l> {
		VersionAgnosticKey(*self)
	}
}

impl Debug for AssemblyName<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}, Version={}", self.name, self.version)?;
		if let Some(culture) = self.culture() {
			write!(f, ", Culture={culture}")?;
		}
		if let Some(token) = self.public_key_or_token.token() {
			write!(f, ", PublicKeyToken={token}")?;
		}
		Ok(())
	}
}

impl Display for AssemblyName<'_> {
	#[inline]
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(self, f)
	}
}

impl Eq for AssemblyName<'_> {}

impl PartialEq for AssemblyName<'_> {
	#[inline]
	fn eq(&self, other: &Self) -> bool {
		self.matches_default(other)
	}
}

impl Hash for AssemblyName<'_> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.name.hash(state);
		self.version.hash(state);
		self.culture().hash(state);
		self.public_key_or_token.token().hash(state);
	}
}

/// A wrapper around [`AssemblyName`] whose `Eq`/`Hash` ignore the version field, used as the
/// loaded-assembly table key (spec §3 invariant: "unique under the version-agnostic comparer").
#[derive(Copy, Clone, Debug)]
pub struct VersionAgnosticKey<'l>(pub AssemblyName<'l>);

impl Eq for VersionAgnosticKey<'_> {}

impl PartialEq for VersionAgnosticKey<'_> {
	fn eq(&self, other: &Self) -> bool {
		self.0.name == other.0.name
			&& self.0.culture() == other.0.culture()
			&& self.0.public_key_or_token.token() == other.0.public_key_or_token.token()
	}
}

impl Hash for VersionAgnosticKey<'_> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.name.hash(state);
		self.0.culture().hash(state);
		self.0.public_key_or_token.token().hash(state);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn public_key_token_is_last_8_bytes_reversed() {
		// ECMA 335 test key used by the .NET runtime's own "ECMA" public key token.
		let key: &[u8] = &[
			0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00,
		];
		let token = PublicKeyToken::from_full_key(key);
		assert_eq!(token.0.len(), 8);
	}

	#[test]
	fn version_agnostic_key_ignores_version() {
		let a = AssemblyName {
			name: "Foo",
			version: AssemblyVersion::new(1, 0, 0, 0),
			culture: None,
			public_key_or_token: PublicKeyOrToken::None,
			flags: AssemblyFlags::empty(),
		};
		let b = AssemblyName { version: AssemblyVersion::new(2, 0, 0, 0), ..a };
		assert_ne!(a, b);
		assert_eq!(a.version_agnostic_key(), b.version_agnostic_key());
	}
}
