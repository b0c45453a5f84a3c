//! Signature equality with configurable assembly-version strictness (spec §4.2).

use bitflags::bitflags;

use crate::context::RuntimeContext;
use crate::metadata::{ResolutionScope, TypeDefOrRef};
use crate::signature::{ArrayShape, CallingConvention, MethodSignature, TypeSignature};

bitflags! {
	/// Strictness flags controlling how two signatures' scope references compare.
	///
	/// `VERSION_AGNOSTIC` and `ALLOW_NEWER_VERSIONS` are independently combinable bits
	/// rather than mutually exclusive modes; when both would otherwise disagree on an
	/// outcome the stricter (exact-version) reading wins (spec §9, Open Question).
	#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
	pub struct ComparerFlags: u8 {
		/// Ignore assembly version entirely when comparing scopes.
		const VERSION_AGNOSTIC = 0b001;
		/// Treat a higher-versioned scope as equal to a lower-versioned one it is
		/// compatible with, per [`AssemblyVersion::is_compatible_with`](crate::identity::AssemblyVersion::is_compatible_with).
		const ALLOW_NEWER_VERSIONS = 0b010;
		/// Require an exact version match. Default.
		const EXACT_VERSION = 0b100;
	}
}

impl Default for ComparerFlags {
	fn default() -> Self {
		ComparerFlags::EXACT_VERSION
	}
}

/// Compares signatures and scope references under a fixed [`ComparerFlags`] policy
/// (spec §4.2). Stateless and immutable: safe to share across threads and contexts
/// (spec §5), except that a bound `context` makes comparisons do resolution work.
///
/// `context` is optional: without it, a `TypeDef` never compares equal to a `TypeRef`/
/// `TypeSpec` naming the same type, since redirecting through exported-type forwarders
/// requires a runtime context to resolve against (spec §4.2).
#[derive(Debug, Copy, Clone)]
pub struct SignatureComparer<'l> {
	pub flags: ComparerFlags,
	pub context: Option<&'l RuntimeContext<'l>>,
}

impl Default for SignatureComparer<'_> {
	fn default() -> Self {
		Self { flags: ComparerFlags::default(), context: None }
	}
}

impl<'l> SignatureComparer<'l> {
	pub fn new(flags: ComparerFlags) -> Self {
		Self { flags, context: None }
	}

	pub fn with_context(flags: ComparerFlags, context: &'l RuntimeContext<'l>) -> Self {
		Self { flags, context: Some(context) }
	}

	/// `(namespace, name)` equality after exported-type redirection and case-exact byte
	/// comparison (spec §4.2). Redirection itself is the caller's responsibility since it
	/// requires a runtime context; this only compares the already-redirected scope keys.
	pub fn names_equal(
		&self,
		a: (Option<&str>, &str),
		b: (Option<&str>, &str),
	) -> bool {
		a.0.unwrap_or("") == b.0.unwrap_or("") && a.1 == b.1
	}

	/// Scope equality honoring the comparer's version strictness: `VERSION_AGNOSTIC` and
	/// `ALLOW_NEWER_VERSIONS` ignore or loosen the assembly-ref version, `EXACT_VERSION`
	/// requires an exact match (spec §4.2, §9).
	pub fn resolution_scopes_equal(&self, a: &ResolutionScope, b: &ResolutionScope) -> bool {
		use ResolutionScope::*;
		match (a, b) {
			(CurrentModule, CurrentModule) => true,
			(Module(a), Module(b)) => a == b,
			(AssemblyRef(a_handle, a_name), AssemblyRef(b_handle, b_name)) => {
				if self.flags.contains(ComparerFlags::VERSION_AGNOSTIC) {
					a_name.name == b_name.name
						&& a_name.culture() == b_name.culture()
						&& a_name.public_key_or_token.token() == b_name.public_key_or_token.token()
				} else if self.flags.contains(ComparerFlags::ALLOW_NEWER_VERSIONS)
					&& !self.flags.contains(ComparerFlags::EXACT_VERSION)
				{
					a_name.name == b_name.name
						&& a_name.culture() == b_name.culture()
						&& a_name.public_key_or_token.token() == b_name.public_key_or_token.token()
						&& (a_name.version.is_compatible_with(&b_name.version)
							|| b_name.version.is_compatible_with(&a_name.version))
				} else {
					a_handle == b_handle || a_name == b_name
				}
			},
			(TypeRef(a), TypeRef(b)) => {
				self.resolution_scopes_equal(&a.scope, &b.scope)
					&& self.names_equal((a.namespace, a.name), (b.namespace, b.name))
			},
			_ => false,
		}
	}

	pub fn type_def_or_ref_equal(&self, a: &TypeDefOrRef<'l>, b: &TypeDefOrRef<'l>) -> bool {
		use TypeDefOrRef::*;
		match (a, b) {
			(Def(a), Def(b)) if std::ptr::eq(*a, *b) => return true,
			(Ref(a), Ref(b)) => {
				if self.resolution_scopes_equal(&a.scope, &b.scope)
					&& self.names_equal((a.namespace, a.name), (b.namespace, b.name))
				{
					return true;
				}
			},
			(Spec(a), Spec(b)) => return self.type_signatures_equal(a.signature, b.signature),
			_ => {},
		}

		// A `TypeDef` on one side and an unresolved `TypeRef` (or a differently-scoped one,
		// e.g. an exported-type forwarder) on the other may still name the same type once
		// both sides are resolved through the bound context (spec §4.2).
		if let Some(context) = self.context {
			if let (Some(Def(def_a)), Some(Def(def_b))) =
				(context.resolve_type_def_or_ref(*a), context.resolve_type_def_or_ref(*b))
			{
				return std::ptr::eq(def_a, def_b);
			}
		}

		false
	}

	fn array_shapes_equal(&self, a: &ArrayShape, b: &ArrayShape) -> bool {
		if a.rank != b.rank {
			return false;
		}
		let get = |v: &[Option<u32>], i: usize| v.get(i).copied().flatten().unwrap_or(0);
		let get_lb = |v: &[Option<i32>], i: usize| v.get(i).copied().flatten().unwrap_or(0);
		(0..a.rank as usize).all(|i| get(&a.sizes, i) == get(&b.sizes, i))
			&& (0..a.rank as usize).all(|i| get_lb(&a.lower_bounds, i) == get_lb(&b.lower_bounds, i))
	}

	pub fn type_signatures_equal(&self, a: &TypeSignature, b: &TypeSignature) -> bool {
		use TypeSignature::*;
		match (a, b) {
			(Primitive(a), Primitive(b)) => a == b,
			(Class(a), Class(b)) | (ValueType(a), ValueType(b)) => self.type_def_or_ref_equal(a, b),
			(Pointer(a), Pointer(b)) | (ByRef(a), ByRef(b)) | (SzArray(a), SzArray(b)) => {
				self.type_signatures_equal(a, b)
			},
			(Pinned(a), _) => self.type_signatures_equal(a, b),
			(_, Pinned(b)) => self.type_signatures_equal(a, b),
			(Modified(_, a), _) => self.type_signatures_equal(a, b),
			(_, Modified(_, b)) => self.type_signatures_equal(a, b),
			(Array(a_elem, a_shape), Array(b_elem, b_shape)) => {
				self.type_signatures_equal(a_elem, b_elem) && self.array_shapes_equal(a_shape, b_shape)
			},
			(GenericInstance(a_def, a_args), GenericInstance(b_def, b_args)) => {
				self.type_def_or_ref_equal(a_def, b_def)
					&& a_args.len() == b_args.len()
					&& a_args
						.iter()
						.zip(b_args.iter())
						.all(|(a, b)| self.type_signatures_equal(a, b))
			},
			(GenericParam(a_src, a_idx), GenericParam(b_src, b_idx)) => a_src == b_src && a_idx == b_idx,
			(FnPointer(a), FnPointer(b)) => self.method_signatures_equal(a, b),
			(Sentinel, Sentinel) | (Invalid, Invalid) => true,
			_ => false,
		}
	}

	pub fn method_signatures_equal(&self, a: &MethodSignature, b: &MethodSignature) -> bool {
		a.calling_convention == b.calling_convention
			&& a.has_this == b.has_this
			&& a.explicit_this == b.explicit_this
			&& a.generic_param_count == b.generic_param_count
			&& self.is_vararg_compatible(a, b)
			&& self.type_signatures_equal(a.return_type, b.return_type)
			&& a.parameters.len() == b.parameters.len()
			&& a.parameters
				.iter()
				.zip(b.parameters.iter())
				.all(|(a, b)| self.type_signatures_equal(a, b))
	}

	fn is_vararg_compatible(&self, a: &MethodSignature, b: &MethodSignature) -> bool {
		matches!(a.calling_convention, CallingConvention::VarArg) == matches!(b.calling_convention, CallingConvention::VarArg)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::signature::PrimitiveType;

	#[test]
	fn primitives_compare_by_element_type() {
		let comparer = SignatureComparer::default();
		let a = TypeSignature::Primitive(PrimitiveType::I4);
		let b = TypeSignature::Primitive(PrimitiveType::I4);
		let c = TypeSignature::Primitive(PrimitiveType::I8);
		assert!(comparer.type_signatures_equal(&a, &b));
		assert!(!comparer.type_signatures_equal(&a, &c));
	}

	#[test]
	fn pinned_and_modified_wrappers_are_transparent() {
		let comparer = SignatureComparer::default();
		let inner = TypeSignature::Primitive(PrimitiveType::Object);
		let pinned = TypeSignature::Pinned(&inner);
		assert!(comparer.type_signatures_equal(&pinned, &inner));
	}
}
