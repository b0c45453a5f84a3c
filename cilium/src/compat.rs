//! Type compatibility and assignability per ECMA-335 §I.8.7 (spec §4.3).
//!
//! Every operation here fails closed: any resolution failure along the way makes the
//! overall answer `false` rather than propagating an error (spec §4.3's explicit
//! failure-mode rule) — these are conservative approximations used by verification-style
//! callers, not a source of diagnostics.

use crate::comparer::SignatureComparer;
use crate::context::RuntimeContext;
use crate::metadata::{FieldAttributes, TypeDefOrRef, Variance};
use crate::signature::{GenericContext, GenericParamSource, PrimitiveType, TypeSignature};

/// The underlying integral field type of an enum, if `ty` names one: the single instance
/// field declared on a `TypeDef` whose base class is `System.Enum` (ECMA-335 §I.8.5.2).
fn enum_underlying_type<'l>(ctx: &RuntimeContext<'l>, ty: &TypeSignature<'l>) -> Option<TypeSignature<'l>> {
	let TypeSignature::ValueType(def_or_ref) = ty else {
		return None;
	};
	let TypeDefOrRef::Def(def) = ctx.resolve_type_def_or_ref(*def_or_ref)? else {
		return None;
	};
	let TypeDefOrRef::Def(base) = ctx.resolve_type_def_or_ref((*def.extends.get()?)?)? else {
		return None;
	};
	if base.namespace != Some("System") || base.name != "Enum" {
		return None;
	}
	let fields = def.fields.get()?;
	let value_field = fields.iter().find(|f| !f.flags.contains(FieldAttributes::STATIC))?;
	Some(value_field.signature.clone())
}

/// The reduced type of a signature (ECMA-335 §I.8.7): primitive types collapse to their
/// canonical machine representation, an enum collapses to its underlying integral type
/// (recursively reduced), everything else reduces to itself.
pub fn reduced_type<'l>(ctx: &RuntimeContext<'l>, ty: &TypeSignature<'l>) -> TypeSignature<'l> {
	use PrimitiveType::*;
	let stripped = ty.strip_modifiers();
	if let Some(underlying) = enum_underlying_type(ctx, stripped) {
		return reduced_type(ctx, &underlying);
	}
	match stripped {
		TypeSignature::Primitive(I1) | TypeSignature::Primitive(U1) => TypeSignature::Primitive(I1),
		TypeSignature::Primitive(I2) | TypeSignature::Primitive(U2) => TypeSignature::Primitive(I2),
		TypeSignature::Primitive(I4) | TypeSignature::Primitive(U4) => TypeSignature::Primitive(I4),
		TypeSignature::Primitive(I8) | TypeSignature::Primitive(U8) => TypeSignature::Primitive(I8),
		TypeSignature::Primitive(IntPtr) | TypeSignature::Primitive(UIntPtr) => {
			TypeSignature::Primitive(IntPtr)
		},
		other => other.clone(),
	}
}

/// The verification type of a signature: the reduced type, with `Boolean`/`Char` further
/// folded into their integer backing representation, and a managed reference's pointee
/// folded the same way underneath the `&` (ECMA-335 §I.8.7).
pub fn verification_type<'l>(ctx: &RuntimeContext<'l>, ty: &TypeSignature<'l>) -> TypeSignature<'l> {
	if let TypeSignature::ByRef(inner) = ty.strip_modifiers() {
		let folded = verification_type(ctx, inner);
		return TypeSignature::ByRef(ctx.bump_alloc(folded));
	}
	match reduced_type(ctx, ty) {
		TypeSignature::Primitive(PrimitiveType::Boolean) => TypeSignature::Primitive(PrimitiveType::I1),
		TypeSignature::Primitive(PrimitiveType::Char) => TypeSignature::Primitive(PrimitiveType::I2),
		other => other,
	}
}

/// The intermediate type used by assignability checks: `I1`/`I2` widen to `I4`.
pub fn intermediate_type<'l>(ctx: &RuntimeContext<'l>, ty: &TypeSignature<'l>) -> TypeSignature<'l> {
	match verification_type(ctx, ty) {
		TypeSignature::Primitive(PrimitiveType::I1) | TypeSignature::Primitive(PrimitiveType::I2) => {
			TypeSignature::Primitive(PrimitiveType::I4)
		},
		other => other,
	}
}

/// Substitutes generic-parameter placeholders in `sig` with the arguments carried by
/// `generics`, allocating new nodes only where a substitution actually changes something
/// (spec §4.1). `sig.substitute(&GenericContext::default())` returns the very same
/// instance, never a clone, since an empty context changes nothing.
pub fn substitute<'l>(
	ctx: &RuntimeContext<'l>,
	sig: &'l TypeSignature<'l>,
	generics: &GenericContext<'l>,
) -> &'l TypeSignature<'l> {
	if generics.is_empty() {
		return sig;
	}
	match sig {
		TypeSignature::GenericParam(GenericParamSource::Type, index) => {
			generics.type_args.get(*index as usize).unwrap_or(sig)
		},
		TypeSignature::GenericParam(GenericParamSource::Method, index) => {
			generics.method_args.get(*index as usize).unwrap_or(sig)
		},
		TypeSignature::Pointer(inner) => ctx.bump_alloc(TypeSignature::Pointer(substitute(ctx, inner, generics))),
		TypeSignature::ByRef(inner) => ctx.bump_alloc(TypeSignature::ByRef(substitute(ctx, inner, generics))),
		TypeSignature::Pinned(inner) => ctx.bump_alloc(TypeSignature::Pinned(substitute(ctx, inner, generics))),
		TypeSignature::SzArray(inner) => ctx.bump_alloc(TypeSignature::SzArray(substitute(ctx, inner, generics))),
		TypeSignature::Array(inner, shape) => {
			ctx.bump_alloc(TypeSignature::Array(substitute(ctx, inner, generics), shape.clone()))
		},
		TypeSignature::GenericInstance(def, args) => {
			let substituted: Vec<_> = args
				.iter()
				.map(|a| substitute(ctx, ctx.bump_alloc(a.clone()), generics).clone())
				.collect();
			ctx.bump_alloc(TypeSignature::GenericInstance(*def, ctx.bump_alloc_slice(substituted)))
		},
		_ => sig,
	}
}

/// `ty`'s own generic arguments, as a [`GenericContext`] suitable for substituting into
/// its `extends`/interface entries, which are written in terms of the declaring type's own
/// generic parameter indices (empty when `ty` is not itself a generic instance).
fn generics_of<'l>(ty: &TypeSignature<'l>) -> GenericContext<'l> {
	match ty {
		TypeSignature::GenericInstance(_, args) => GenericContext { type_args: args, method_args: &[] },
		_ => GenericContext::default(),
	}
}

/// The direct base class of a type: `System.Object` for interfaces (everything implements
/// at least the interfaces it declares, but the CLI models the base-class chain as
/// bottoming out at `Object`), or the declared `extends` entry with its own generic
/// arguments substituted in when the type is a generic instance (spec §4.3).
pub fn direct_base_class<'l>(
	ctx: &RuntimeContext<'l>,
	ty: &TypeSignature<'l>,
) -> Option<TypeSignature<'l>> {
	let def_or_ref = match ty.strip_modifiers() {
		TypeSignature::Class(t) | TypeSignature::ValueType(t) => *t,
		TypeSignature::GenericInstance(t, _) => *t,
		_ => return None,
	};

	let TypeDefOrRef::Def(def) = ctx.resolve_type_def_or_ref(def_or_ref)? else {
		return None;
	};

	if def.flags.contains(crate::metadata::TypeAttributes::INTERFACE) {
		return Some(TypeSignature::Class(TypeDefOrRef::Def(
			ctx.corlib_type("System", "Object")?,
		)));
	}

	let extends = (*def.extends.get()?)?;
	let generics = generics_of(ty);
	let extends_sig = ctx.bump_alloc(TypeSignature::Class(extends));
	Some(substitute(ctx, extends_sig, &generics).clone())
}

/// The interfaces a type directly declares (not inherited ones), generic-substituted when
/// the type itself is a generic instance (spec §4.3).
pub fn directly_implemented_interfaces<'l>(
	ctx: &RuntimeContext<'l>,
	ty: &TypeSignature<'l>,
) -> Vec<TypeSignature<'l>> {
	let def_or_ref = match ty.strip_modifiers() {
		TypeSignature::Class(t) | TypeSignature::ValueType(t) | TypeSignature::GenericInstance(t, _) => *t,
		_ => return Vec::new(),
	};
	let Some(TypeDefOrRef::Def(def)) = ctx.resolve_type_def_or_ref(def_or_ref) else {
		return Vec::new();
	};
	let generics = generics_of(ty);
	def.interfaces
		.get()
		.map(|ifaces| {
			ifaces
				.iter()
				.map(|i| {
					let sig = ctx.bump_alloc(TypeSignature::Class(*i));
					substitute(ctx, sig, &generics).clone()
				})
				.collect()
		})
		.unwrap_or_default()
}

/// Whether `from` can be used directly where `to` is expected, without walking the
/// base-class chain: primitive identity, or same open generic type with per-argument
/// variance honored (unknown variance is treated as non-variant — spec §4.3's
/// failure-mode note).
pub fn is_directly_compatible_with<'l>(
	comparer: &SignatureComparer<'l>,
	ctx: &RuntimeContext<'l>,
	from: &TypeSignature<'l>,
	to: &TypeSignature<'l>,
) -> bool {
	match (from.strip_modifiers(), to.strip_modifiers()) {
		(TypeSignature::GenericInstance(from_def, from_args), TypeSignature::GenericInstance(to_def, to_args)) => {
			if !comparer.type_def_or_ref_equal(from_def, to_def) || from_args.len() != to_args.len() {
				return false;
			}
			from_args.iter().zip(to_args.iter()).enumerate().all(|(i, (from_arg, to_arg))| {
				match ctx.generic_param_variance(*to_def, i) {
					Variance::NonVariant => comparer.type_signatures_equal(from_arg, to_arg),
					Variance::Covariant => is_compatible_with(comparer, ctx, from_arg, to_arg),
					Variance::Contravariant => is_compatible_with(comparer, ctx, to_arg, from_arg),
				}
			})
		},
		_ => comparer.type_signatures_equal(from, to),
	}
}

/// Transitive compatibility: `from` is directly compatible with `to`, or with some type in
/// `to`'s base-class chain, or implements `to` (directly or transitively) as an interface
/// (spec §4.3).
pub fn is_compatible_with<'l>(
	comparer: &SignatureComparer<'l>,
	ctx: &RuntimeContext<'l>,
	from: &TypeSignature<'l>,
	to: &TypeSignature<'l>,
) -> bool {
	if is_directly_compatible_with(comparer, ctx, from, to) {
		return true;
	}

	let mut current = from.clone();
	loop {
		match direct_base_class(ctx, &current) {
			Some(base) => {
				if is_directly_compatible_with(comparer, ctx, &base, to) {
					return true;
				}
				current = base;
			},
			None => break,
		}
	}

	directly_implemented_interfaces(ctx, from)
		.iter()
		.any(|iface| is_compatible_with(comparer, ctx, iface, to))
}

/// Whether a value of type `from` may be stored where `to` is expected: the intermediate
/// types match, the native-int/32-bit-int special case applies, or `from` is compatible
/// with `to` (spec §4.3).
pub fn is_assignable_to<'l>(
	comparer: &SignatureComparer<'l>,
	ctx: &RuntimeContext<'l>,
	from: &TypeSignature<'l>,
	to: &TypeSignature<'l>,
) -> bool {
	let from_inter = intermediate_type(ctx, from);
	let to_inter = intermediate_type(ctx, to);
	if comparer.type_signatures_equal(&from_inter, &to_inter) {
		return true;
	}

	let is_native_or_i4 = |t: &TypeSignature| {
		matches!(
			t,
			TypeSignature::Primitive(PrimitiveType::I4) | TypeSignature::Primitive(PrimitiveType::IntPtr)
		)
	};
	if is_native_or_i4(&from_inter) && is_native_or_i4(&to_inter) {
		return true;
	}

	is_compatible_with(comparer, ctx, from, to)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::prober::TargetRuntime;
	use crate::resolver::DirectoryProbingResolver;
	use std::path::PathBuf;

	fn test_context<'l>() -> RuntimeContext<'l> {
		RuntimeContext::new(TargetRuntime::fallback(), Box::new(DirectoryProbingResolver::new(Vec::<PathBuf>::new())))
	}

	#[test]
	fn reduced_type_folds_signed_unsigned_pairs() {
		let ctx = test_context();
		let unsigned = TypeSignature::Primitive(PrimitiveType::U4);
		assert!(matches!(reduced_type(&ctx, &unsigned), TypeSignature::Primitive(PrimitiveType::I4)));
	}

	#[test]
	fn intermediate_type_widens_short_ints() {
		let ctx = test_context();
		let short = TypeSignature::Primitive(PrimitiveType::I2);
		assert!(matches!(intermediate_type(&ctx, &short), TypeSignature::Primitive(PrimitiveType::I4)));
	}

	#[test]
	fn verification_type_folds_byref_pointee() {
		let ctx = test_context();
		let inner = TypeSignature::Primitive(PrimitiveType::Boolean);
		let by_ref = TypeSignature::ByRef(&inner);
		match verification_type(&ctx, &by_ref) {
			TypeSignature::ByRef(folded) => {
				assert!(matches!(folded, TypeSignature::Primitive(PrimitiveType::I1)));
			},
			other => panic!("expected ByRef, got {other:?}"),
		}
	}
}
