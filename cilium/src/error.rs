//! Error taxonomy shared by the resolver, runtime context and importer (spec §7).
//!
//! Resolution failures are not exceptions: every fallible operation in this crate returns
//! a [`ResolutionStatus`] alongside its (possibly absent) value. [`ClrError`] exists only
//! for call sites that want a single `Result`-shaped type, e.g. the `Unwrap` convenience
//! wrappers on the public surface (spec §6).

use std::fmt::{Debug, Display, Formatter};

/// Outcome of a resolution attempt (spec §7).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResolutionStatus {
	/// The operation completed and produced a value.
	Success,
	/// The reference itself is malformed (dangling coded index, out-of-range token, ...).
	InvalidReference,
	/// Resolving a scope required revisiting a scope already on the current resolution path.
	CircularResolutionScope,
	/// No assembly resolver on the path produced a candidate for the requested identity.
	AssemblyNotFound,
	/// A candidate assembly was found but failed to parse as a well-formed image.
	AssemblyBadImage,
	/// The referenced module does not exist in its owning assembly's file table.
	ModuleNotFound,
	/// The referenced type does not exist in its resolved scope.
	TypeNotFound,
	/// The referenced member does not exist on its resolved declaring type.
	MemberNotFound,
}

impl ResolutionStatus {
	#[inline]
	pub fn is_success(self) -> bool {
		matches!(self, ResolutionStatus::Success)
	}
}

impl Display for ResolutionStatus {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let msg = match self {
			ResolutionStatus::Success => "success",
			ResolutionStatus::InvalidReference => "invalid reference",
			ResolutionStatus::CircularResolutionScope => "circular resolution scope",
			ResolutionStatus::AssemblyNotFound => "assembly not found",
			ResolutionStatus::AssemblyBadImage => "assembly is not a well-formed image",
			ResolutionStatus::ModuleNotFound => "module not found",
			ResolutionStatus::TypeNotFound => "type not found",
			ResolutionStatus::MemberNotFound => "member not found",
		};
		f.write_str(msg)
	}
}

/// A `(status, value)` pair, as produced by the non-raising resolution operations
/// throughout this crate (spec §6).
pub type Resolved<T> = (ResolutionStatus, Option<T>);

/// Wraps a value together with the status that produced it so it can be lifted into a
/// raising call with [`ClrError::unwrap`] / the `?` operator.
pub struct Unwrap<T>(pub Resolved<T>);

impl<T> Unwrap<T> {
	/// Returns the value, raising [`ClrError`] if resolution did not succeed.
	pub fn unwrap(self) -> Result<T, ClrError> {
		match self.0 {
			(ResolutionStatus::Success, Some(value)) => Ok(value),
			(status, _) => Err(ClrError::Resolution(status)),
		}
	}
}

/// The raising counterpart to [`ResolutionStatus`], for call sites on the public surface
/// that prefer `Result`/`?` over checking a status code by hand (spec §6, §7).
#[derive(Debug)]
pub enum ClrError {
	/// A resolution operation returned a non-success status.
	Resolution(ResolutionStatus),
	/// The underlying PE/metadata reader collaborator failed.
	Io(std::io::Error),
}

impl ClrError {
	pub fn status(&self) -> ResolutionStatus {
		match self {
			ClrError::Resolution(status) => *status,
			ClrError::Io(_) => ResolutionStatus::AssemblyBadImage,
		}
	}
}

impl From<std::io::Error> for ClrError {
	fn from(value: std::io::Error) -> Self {
		ClrError::Io(value)
	}
}

impl From<ResolutionStatus> for ClrError {
	fn from(value: ResolutionStatus) -> Self {
		ClrError::Resolution(value)
	}
}

impl Display for ClrError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ClrError::Resolution(status) => Display::fmt(status, f),
			ClrError::Io(err) => Display::fmt(err, f),
		}
	}
}

impl std::error::Error for ClrError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			ClrError::Io(err) => Some(err),
			ClrError::Resolution(_) => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unwrap_success_yields_value() {
		let wrapped = Unwrap((ResolutionStatus::Success, Some(42)));
		assert_eq!(wrapped.unwrap().unwrap(), 42);
	}

	#[test]
	fn unwrap_failure_raises() {
		let wrapped: Unwrap<u32> = Unwrap((ResolutionStatus::TypeNotFound, None));
		let err = wrapped.unwrap().unwrap_err();
		assert_eq!(err.status(), ResolutionStatus::TypeNotFound);
	}
}
