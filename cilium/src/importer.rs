//! Importer: copies foreign references and signatures into a target module's own scopes
//! (spec §4.7).
//!
//! Import results are not cached, except for the trivial case where the source is already
//! owned by the target module — there the original instance is returned unchanged
//! (spec §4.7).

use crate::context::RuntimeContext;
use crate::identity::AssemblyName;
use crate::metadata::{
	MemberRefParent, MemberRefSignature, ModuleHandle, ResolutionScope, TypeDefOrRef, TypeRef,
};
use crate::signature::{MethodSignature, TypeSignature};

/// Where an import is being brought into.
#[derive(Debug, Copy, Clone)]
pub struct ImportTarget {
	pub module: ModuleHandle,
}

impl ImportTarget {
	pub fn new(module: ModuleHandle) -> Self {
		Self { module }
	}
}

/// Imports references and signatures into [`ImportTarget`]'s module (spec §4.7).
pub struct Importer<'a, 'l> {
	ctx: &'a RuntimeContext<'l>,
	target: ImportTarget,
}

impl<'a, 'l> Importer<'a, 'l> {
	pub fn new(ctx: &'a RuntimeContext<'l>, target: ImportTarget) -> Self {
		Self { ctx, target }
	}

	/// Copies an assembly reference by identity; no structural changes are needed since
	/// assembly names carry no scope of their own.
	pub fn import_assembly_name(&self, name: &'l AssemblyName<'l>) -> &'l AssemblyName<'l> {
		name
	}

	/// Imports a type reference, promoting a source module's own-module scope to an
	/// explicit assembly reference of that module's owning assembly, since the target
	/// module has no "current module" relationship to the source (spec §4.7).
	pub fn import_type_def_or_ref(&self, source: TypeDefOrRef<'l>) -> TypeDefOrRef<'l> {
		match source {
			TypeDefOrRef::Def(def) => {
				if def.module == self.target.module {
					return source;
				}
				if self.is_corlib_type(def) {
					if let Some(substituted) = self.ctx.corlib_type(def.namespace.unwrap_or(""), def.name) {
						return TypeDefOrRef::Def(substituted);
					}
				}
				let owning = self.ctx.assembly(def.module.assembly);
				let type_ref = self.ctx.bump_alloc(TypeRef {
					scope: ResolutionScope::AssemblyRef(def.module.assembly, owning.name),
					namespace: def.namespace,
					name: def.name,
				});
				TypeDefOrRef::Ref(type_ref)
			},
			TypeDefOrRef::Ref(type_ref) => {
				let scope = match &type_ref.scope {
					ResolutionScope::CurrentModule => {
						// The reference's own module becomes an explicit assembly reference
						// once it leaves that module's scope.
						ResolutionScope::AssemblyRef(
							self.target.module.assembly,
							self.ctx.assembly(self.target.module.assembly).name,
						)
					},
					other => *other,
				};
				let imported = self.ctx.bump_alloc(TypeRef {
					scope,
					namespace: type_ref.namespace,
					name: type_ref.name,
				});
				TypeDefOrRef::Ref(imported)
			},
			TypeDefOrRef::Spec(spec) => {
				let signature = self.import_type_signature(spec.signature);
				TypeDefOrRef::Spec(self.ctx.bump_alloc(crate::metadata::TypeSpec { signature }))
			},
		}
	}

	fn is_corlib_type(&self, def: &crate::metadata::TypeDef) -> bool {
		self.ctx.corlib_handle() == Some(def.module.assembly)
	}

	/// Imports a type signature by recursively importing every `TypeDefOrRef` it
	/// references (spec §4.7).
	pub fn import_type_signature(&self, sig: &'l TypeSignature<'l>) -> &'l TypeSignature<'l> {
		let imported = match sig {
			TypeSignature::Class(t) => TypeSignature::Class(self.import_type_def_or_ref(*t)),
			TypeSignature::ValueType(t) => TypeSignature::ValueType(self.import_type_def_or_ref(*t)),
			TypeSignature::Pointer(inner) => TypeSignature::Pointer(self.import_type_signature(inner)),
			TypeSignature::ByRef(inner) => TypeSignature::ByRef(self.import_type_signature(inner)),
			TypeSignature::Pinned(inner) => TypeSignature::Pinned(self.import_type_signature(inner)),
			TypeSignature::SzArray(inner) => TypeSignature::SzArray(self.import_type_signature(inner)),
			TypeSignature::Array(inner, shape) => {
				TypeSignature::Array(self.import_type_signature(inner), shape.clone())
			},
			TypeSignature::GenericInstance(def, args) => {
				let imported_args: Vec<_> = args
					.iter()
					.map(|a| self.import_type_signature(self.ctx.bump_alloc(a.clone())).clone())
					.collect();
				TypeSignature::GenericInstance(
					self.import_type_def_or_ref(*def),
					self.ctx.bump_alloc_slice(imported_args),
				)
			},
			TypeSignature::FnPointer(method) => TypeSignature::FnPointer(self.import_method_signature(method)),
			other => other.clone(),
		};
		self.ctx.bump_alloc(imported)
	}

	/// Imports a method signature's return type and every parameter type (spec §4.7).
	pub fn import_method_signature(&self, sig: &'l MethodSignature<'l>) -> &'l MethodSignature<'l> {
		let parameters: Vec<_> = sig
			.parameters
			.iter()
			.map(|p| self.import_type_signature(self.ctx.bump_alloc(p.clone())).clone())
			.collect();
		self.ctx.bump_alloc(MethodSignature {
			calling_convention: sig.calling_convention,
			has_this: sig.has_this,
			explicit_this: sig.explicit_this,
			generic_param_count: sig.generic_param_count,
			return_type: self.import_type_signature(sig.return_type),
			parameters: self.ctx.bump_alloc_slice(parameters),
			sentinel_index: sig.sentinel_index,
		})
	}

	/// Imports a member reference's parent and name-or-signature, recursing through
	/// [`Self::import_type_def_or_ref`] and the signature importers (spec §4.7).
	pub fn import_member_ref(&self, member: &crate::metadata::MemberRef<'l>) -> crate::metadata::MemberRef<'l> {
		let parent = match member.parent {
			MemberRefParent::TypeDef(def) => match self.import_type_def_or_ref(TypeDefOrRef::Def(def)) {
				TypeDefOrRef::Def(def) => MemberRefParent::TypeDef(def),
				TypeDefOrRef::Ref(r) => MemberRefParent::TypeRef(r),
				TypeDefOrRef::Spec(s) => MemberRefParent::TypeSpec(s),
			},
			MemberRefParent::TypeRef(type_ref) => match self.import_type_def_or_ref(TypeDefOrRef::Ref(type_ref)) {
				TypeDefOrRef::Ref(r) => MemberRefParent::TypeRef(r),
				TypeDefOrRef::Def(d) => MemberRefParent::TypeDef(d),
				TypeDefOrRef::Spec(s) => MemberRefParent::TypeSpec(s),
			},
			other => other,
		};

		let signature = match member.signature {
			MemberRefSignature::Field(sig) => MemberRefSignature::Field(self.import_type_signature(sig)),
			MemberRefSignature::Method(sig) => MemberRefSignature::Method(self.import_method_signature(sig)),
		};

		crate::metadata::MemberRef { parent, name: member.name, signature }
	}
}
