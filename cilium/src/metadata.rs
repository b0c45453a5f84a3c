//! The metadata model: arena-backed, resolved views over type and member references
//! (spec §3, §4.4.1–§4.4.3).
//!
//! Every definition lives in the bump arena of the [`Assembly`](crate::context::Assembly)
//! that owns it and is handed out as a shared reference; cross-assembly links go through a
//! stable `(assembly handle, row)` pair rather than a borrowed reference, since the target
//! assembly may not have been loaded yet at the time the reference is built (spec §9).

use std::cell::OnceCell;
use std::fmt::{Debug, Formatter};

use crate::identity::AssemblyName;
use crate::signature::{MethodSignature, TypeSignature};

pub use crate::raw::heaps::table::{FieldAttributes, MethodAttributes, TypeAttributes};

/// Index of a loaded assembly inside a runtime context's assembly arena. Never reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AssemblyHandle(pub u32);

/// A module within an assembly. Most assemblies have exactly one (rid 1); additional rows
/// only appear for multi-file assemblies (spec Glossary, "Module").
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ModuleHandle {
	pub assembly: AssemblyHandle,
	pub index: u32,
}

/// Row identifier, scoped to one table within one module.
pub type Rid = u32;

/// Where a [`TypeRef`] is looked up (spec §3, "resolution scope").
#[derive(Debug, Copy, Clone)]
pub enum ResolutionScope<'l> {
	/// Resolve inside the module that owns the reference.
	CurrentModule,
	/// Resolve inside a named sibling module of the same assembly.
	Module(ModuleHandle),
	/// Resolve inside another assembly, identified by name.
	AssemblyRef(AssemblyHandle, &'l AssemblyName<'l>),
	/// Resolve as a nested type of another type reference.
	TypeRef(&'l TypeRef<'l>),
}

/// An unresolved reference to a type, as it appears in a `TypeRef` row (spec §3).
#[derive(Debug, Copy, Clone)]
pub struct TypeRef<'l> {
	pub scope: ResolutionScope<'l>,
	pub namespace: Option<&'l str>,
	pub name: &'l str,
}

/// Either a resolved definition, an unresolved reference, or a constructed generic/array
/// instantiation (spec §3, `TypeDefOrRef`).
#[derive(Copy, Clone)]
pub enum TypeDefOrRef<'l> {
	Def(&'l TypeDef<'l>),
	Ref(&'l TypeRef<'l>),
	Spec(&'l TypeSpec<'l>),
}

impl Debug for TypeDefOrRef<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			TypeDefOrRef::Def(ty) => write!(f, "Def({}.{})", ty.namespace.unwrap_or(""), ty.name),
			TypeDefOrRef::Ref(ty) => write!(f, "Ref({}.{})", ty.namespace.unwrap_or(""), ty.name),
			TypeDefOrRef::Spec(_) => f.write_str("Spec(..)"),
		}
	}
}

/// A `TypeSpec` row: a type signature used where a token is required (generic
/// instantiations, arrays of arrays, pointers, ...).
#[derive(Debug, Copy, Clone)]
pub struct TypeSpec<'l> {
	pub signature: &'l TypeSignature<'l>,
}

/// A field defined on a [`TypeDef`].
#[derive(Debug, Copy, Clone)]
pub struct Field<'l> {
	pub flags: FieldAttributes,
	pub name: &'l str,
	pub signature: &'l TypeSignature<'l>,
}

/// A method defined on a [`TypeDef`].
#[derive(Debug, Copy, Clone)]
pub struct Method<'l> {
	pub flags: MethodAttributes,
	pub name: &'l str,
	pub signature: &'l MethodSignature<'l>,
}

/// A type definition, with structural members resolved lazily and memoized once
/// (spec §9's "resolve-once" guidance; each lazy field is written at most once).
pub struct TypeDef<'l> {
	pub module: ModuleHandle,
	pub flags: TypeAttributes,
	pub namespace: Option<&'l str>,
	pub name: &'l str,
	pub extends: OnceCell<Option<TypeDefOrRef<'l>>>,
	pub fields: OnceCell<&'l [Field<'l>]>,
	pub methods: OnceCell<&'l [Method<'l>]>,
	pub interfaces: OnceCell<&'l [TypeDefOrRef<'l>]>,
	pub nested_types: OnceCell<&'l [&'l TypeDef<'l>]>,
	pub generic_params: OnceCell<&'l [GenericParam<'l>]>,
}

impl Debug for TypeDef<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TypeDef")
			.field("namespace", &self.namespace)
			.field("name", &self.name)
			.field("flags", &self.flags)
			.finish_non_exhaustive()
	}
}

impl Eq for TypeDef<'_> {}
impl PartialEq for TypeDef<'_> {
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(self, other)
	}
}

/// A generic parameter on a type or method (spec §3, `TypeOrMethodDef` coded index).
#[derive(Debug, Copy, Clone)]
pub struct GenericParam<'l> {
	pub index: u16,
	pub name: &'l str,
	pub constraints: &'l [TypeDefOrRef<'l>],
	pub variance: Variance,
}

/// Declared generic variance, read from a `GenericParam` row's flags (spec §4.3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Variance {
	#[default]
	NonVariant,
	Covariant,
	Contravariant,
}

/// Where an exported type forwards to (spec §3, `ExportedType`).
#[derive(Debug, Copy, Clone)]
pub enum ExportedTypeImplementation<'l> {
	AssemblyRef(AssemblyHandle, &'l AssemblyName<'l>),
	File(&'l FileEntry<'l>),
	Nested(&'l ExportedType<'l>),
}

/// A type forwarder entry: a type advertised by this assembly's manifest but actually
/// defined elsewhere (spec §3, §4.4.2).
#[derive(Debug, Copy, Clone)]
pub struct ExportedType<'l> {
	pub flags: TypeAttributes,
	pub namespace: Option<&'l str>,
	pub name: &'l str,
	pub implementation: ExportedTypeImplementation<'l>,
}

/// A `File` table row: a non-manifest file belonging to a multi-file assembly.
#[derive(Debug, Copy, Clone)]
pub struct FileEntry<'l> {
	pub name: &'l str,
	pub hash_value: &'l [u8],
	pub contains_metadata: bool,
}

/// What a `MemberRef` points at (spec §3).
#[derive(Debug, Copy, Clone)]
pub enum MemberRefParent<'l> {
	TypeDef(&'l TypeDef<'l>),
	TypeRef(&'l TypeRef<'l>),
	TypeSpec(&'l TypeSpec<'l>),
	ModuleRef(ModuleHandle),
	/// A vararg call site: the member ref's signature carries the actual argument types,
	/// with the declaring method's own signature supplying only the fixed prefix (spec §3).
	MethodDef(&'l Method<'l>),
}

/// Disambiguates a `MemberRef`'s signature shape: a field or a method (spec §3).
#[derive(Debug, Copy, Clone)]
pub enum MemberRefSignature<'l> {
	Field(&'l TypeSignature<'l>),
	Method(&'l MethodSignature<'l>),
}

/// An unresolved reference to a field or method, possibly on a generic instantiation.
#[derive(Debug, Copy, Clone)]
pub struct MemberRef<'l> {
	pub parent: MemberRefParent<'l>,
	pub name: &'l str,
	pub signature: MemberRefSignature<'l>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn type_def_eq_is_identity() {
		let a = TypeDef {
			module: ModuleHandle { assembly: AssemblyHandle(0), index: 0 },
			flags: TypeAttributes::empty(),
			namespace: Some("System"),
			name: "Object",
			extends: OnceCell::new(),
			fields: OnceCell::new(),
			methods: OnceCell::new(),
			interfaces: OnceCell::new(),
			nested_types: OnceCell::new(),
			generic_params: OnceCell::new(),
		};
		assert_eq!(a, a);
	}
}
