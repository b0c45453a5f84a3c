//! Type and method signature trees, parsed from blob-heap signatures (spec §3, §4.1).
//!
//! A signature is a closed sum type visited through [`TypeSignatureVisitor`] rather than an
//! open class hierarchy (spec §9): callers that need to thread extra state through a walk
//! use the `*_with` methods, everyone else uses the plain `visit`.

use std::fmt::Debug;

use crate::metadata::TypeDefOrRef;

/// Calling convention bits carried by a method signature's leading byte (ECMA-335 §II.23.2.1).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CallingConvention {
	Default,
	C,
	StdCall,
	ThisCall,
	FastCall,
	VarArg,
	/// A property getter/setter signature (no argument-passing semantics of its own).
	Property,
}

/// An element-type byte that denotes one of the built-in primitive/corlib types
/// (ECMA-335 §II.23.1.16).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveType {
	Void,
	Boolean,
	Char,
	I1,
	U1,
	I2,
	U2,
	I4,
	U4,
	I8,
	U8,
	R4,
	R8,
	String,
	IntPtr,
	UIntPtr,
	Object,
	TypedByRef,
}

/// A custom modifier attached to a signature element (`cmod_req`/`cmod_opt`).
#[derive(Debug, Copy, Clone)]
pub struct CustomModifier<'l> {
	pub required: bool,
	pub modifier: TypeDefOrRef<'l>,
}

/// Dimension information for a general (non-`szarray`) array shape.
#[derive(Debug, Clone, Default)]
pub struct ArrayShape {
	pub rank: u32,
	/// `None` entries mean the bound/size is unspecified for that dimension (spec §4.2:
	/// treated as zero when comparing).
	pub sizes: Vec<Option<u32>>,
	pub lower_bounds: Vec<Option<i32>>,
}

/// Which generic parameter list a [`TypeSignature::GenericParam`] indexes into.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GenericParamSource {
	Type,
	Method,
}

/// A parsed type signature tree (spec §3, §4.1).
///
/// The `Invalid` variant is the placeholder substituted whenever parsing or resolution
/// fails partway through a tree (spec §7): it lets the rest of a containing signature stay
/// well-formed instead of failing the whole parse.
#[derive(Debug, Clone)]
pub enum TypeSignature<'l> {
	Primitive(PrimitiveType),
	/// A reference-type (`class`) element-type wrapping a `TypeDefOrRef`.
	Class(TypeDefOrRef<'l>),
	/// A value-type element-type wrapping a `TypeDefOrRef`.
	ValueType(TypeDefOrRef<'l>),
	Pointer(&'l TypeSignature<'l>),
	ByRef(&'l TypeSignature<'l>),
	Pinned(&'l TypeSignature<'l>),
	SzArray(&'l TypeSignature<'l>),
	Array(&'l TypeSignature<'l>, ArrayShape),
	Modified(CustomModifier<'l>, &'l TypeSignature<'l>),
	GenericInstance(TypeDefOrRef<'l>, &'l [TypeSignature<'l>]),
	GenericParam(GenericParamSource, u32),
	FnPointer(&'l MethodSignature<'l>),
	/// Marks the boundary between fixed and variadic arguments in a `VARARG` call (ECMA-335
	/// §II.23.2.2).
	Sentinel,
	/// Placeholder for a signature element that failed to parse or resolve.
	Invalid,
}

impl<'l> TypeSignature<'l> {
	/// Strips leading `cmod_req`/`cmod_opt`/`pinned` wrappers (spec §4.1).
	pub fn strip_modifiers(&self) -> &TypeSignature<'l> {
		match self {
			TypeSignature::Modified(_, inner) | TypeSignature::Pinned(inner) => inner.strip_modifiers(),
			other => other,
		}
	}

	pub fn is_primitive(&self, ty: PrimitiveType) -> bool {
		matches!(self, TypeSignature::Primitive(p) if *p == ty)
	}

	/// Visits this node without extra state.
	pub fn visit<V: TypeSignatureVisitor<'l>>(&self, visitor: &mut V) -> V::Output {
		visitor.visit(self)
	}

	/// Visits this node threading `state` through, for visitors whose result depends on the
	/// path taken to reach a node (e.g. generic-substitution contexts).
	pub fn visit_with<V: TypeSignatureVisitorWithState<'l>>(
		&self,
		visitor: &mut V,
		state: &V::State,
	) -> V::Output {
		visitor.visit(self, state)
	}
}

/// Visits a [`TypeSignature`] tree without additional per-call state.
pub trait TypeSignatureVisitor<'l> {
	type Output;
	fn visit(&mut self, signature: &TypeSignature<'l>) -> Self::Output;
}

/// Visits a [`TypeSignature`] tree with caller-supplied state threaded through each call,
/// e.g. the generic-argument context used by substitution (spec §4.1).
pub trait TypeSignatureVisitorWithState<'l> {
	type Output;
	type State;
	fn visit(&mut self, signature: &TypeSignature<'l>, state: &Self::State) -> Self::Output;
}

/// Generic-argument bindings in scope while substituting `GenericParam` nodes (spec §4.1,
/// §8's substitution identity invariant: substituting with an empty context returns the
/// exact same instance).
#[derive(Debug, Copy, Clone, Default)]
pub struct GenericContext<'l> {
	pub type_args: &'l [TypeSignature<'l>],
	pub method_args: &'l [TypeSignature<'l>],
}

impl<'l> GenericContext<'l> {
	pub fn is_empty(&self) -> bool {
		self.type_args.is_empty() && self.method_args.is_empty()
	}
}

/// A method signature: calling convention plus return and parameter types (spec §3, §4.2).
#[derive(Debug, Clone)]
pub struct MethodSignature<'l> {
	pub calling_convention: CallingConvention,
	pub has_this: bool,
	pub explicit_this: bool,
	pub generic_param_count: u32,
	pub return_type: &'l TypeSignature<'l>,
	pub parameters: &'l [TypeSignature<'l>],
	/// Index into `parameters` of the first variadic argument, if this is a `VARARG` call
	/// site signature (ECMA-335 §II.23.2.2).
	pub sentinel_index: Option<usize>,
}

impl MethodSignature<'_> {
	pub fn is_vararg(&self) -> bool {
		matches!(self.calling_convention, CallingConvention::VarArg)
	}
}

/// The field-or-property type encoding used inside a custom-attribute value blob
/// (ECMA-335 §II.23.3, spec §4.1's closing paragraph).
#[derive(Debug, Clone)]
pub enum CustomAttributeFieldType<'l> {
	Primitive(PrimitiveType),
	/// `System.String`.
	String,
	/// `System.Type`, encoded as its assembly-qualified name string at the use site.
	Type,
	/// A boxed `object` field whose runtime type is encoded alongside the value.
	Boxed,
	/// An enum field, named by its assembly-qualified type name.
	Enum(&'l str),
	SzArray(&'l CustomAttributeFieldType<'l>),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strip_modifiers_unwraps_nested_wrappers() {
		let inner = TypeSignature::Primitive(PrimitiveType::I4);
		let pinned = TypeSignature::Pinned(&inner);
		assert!(pinned.strip_modifiers().is_primitive(PrimitiveType::I4));
	}

	#[test]
	fn generic_context_empty_is_default() {
		let ctx = GenericContext::default();
		assert!(ctx.is_empty());
	}
}
