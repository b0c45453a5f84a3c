//! Runtime context: the root object owning loaded assemblies, the resolver, the type
//! cache and the comparer bound to them (spec §4.4, concurrency model in spec §5).

use std::path::Path;
use std::pin::Pin;
use std::sync::{Mutex, RwLock};

use bumpalo::Bump;
use fxhash::FxHashMap;

use crate::comparer::{ComparerFlags, SignatureComparer};
use crate::error::ResolutionStatus;
use crate::identity::{AssemblyName, VersionAgnosticKey};
use crate::metadata::{
	AssemblyHandle, ExportedType, ExportedTypeImplementation, ModuleHandle, ResolutionScope,
	TypeDef, TypeDefOrRef, TypeRef, Variance,
};
use crate::prober::TargetRuntime;
use crate::resolver::{AssemblyResolver, AssemblyResolverResult};
use crate::signature::TypeSignature;

/// A loaded assembly: its identity, the modules it owns and whether it has already been
/// registered with a context (spec §4.4: "Add asserts the assembly has no prior context").
pub struct Assembly<'l> {
	pub name: &'l AssemblyName<'l>,
	pub modules: Vec<Module<'l>>,
	attached: std::cell::Cell<bool>,
}

impl<'l> Assembly<'l> {
	pub fn new(name: &'l AssemblyName<'l>, modules: Vec<Module<'l>>) -> Self {
		Self { name, modules, attached: std::cell::Cell::new(false) }
	}

	pub fn is_attached(&self) -> bool {
		self.attached.get()
	}
}

/// A module within a loaded assembly: the types it defines and the types it forwards.
pub struct Module<'l> {
	pub name: &'l str,
	pub type_defs: Vec<&'l TypeDef<'l>>,
	pub exported_types: Vec<&'l ExportedType<'l>>,
}

/// Key used to memoize resolution results in the type cache: which kind of reference it
/// is (a `TypeRef`, scoped to its requesting module, or an `ExportedType`) plus its
/// pointer identity (spec §4.4: first-writer-wins cache).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum TypeCacheKey {
	TypeRef(ModuleHandle, usize),
	ExportedType(usize),
}

/// The root object: arena, loaded-assembly table, resolver and type cache, all scoped to
/// one target runtime (spec §4.4).
pub struct RuntimeContext<'l> {
	bump: Pin<Box<Bump>>,
	target_runtime: TargetRuntime,
	comparer_flags: ComparerFlags,
	corlib: Mutex<Option<AssemblyHandle>>,
	assemblies: Mutex<Vec<&'l Assembly<'l>>>,
	/// Loaded-assembly table and resolution path, guarded by a single mutex (spec §5):
	/// nothing about resolving one reference may race with registering another assembly.
	loaded: Mutex<FxHashMap<VersionAgnosticKey<'l>, AssemblyHandle>>,
	resolver: Mutex<Box<dyn AssemblyResolver>>,
	/// Independent from `loaded`: readers never block on other readers, writers insert
	/// only if no entry exists yet (spec §5, "first writer wins").
	type_cache: RwLock<FxHashMap<TypeCacheKey, TypeDefOrRef<'l>>>,
}

impl<'l> RuntimeContext<'l> {
	pub fn new(target_runtime: TargetRuntime, resolver: Box<dyn AssemblyResolver>) -> Self {
		Self {
			bump: Pin::new(Box::new(Bump::new())),
			target_runtime,
			comparer_flags: ComparerFlags::default(),
			corlib: Mutex::new(None),
			assemblies: Mutex::new(Vec::new()),
			loaded: Mutex::new(Default::default()),
			resolver: Mutex::new(resolver),
			type_cache: RwLock::new(Default::default()),
		}
	}

	/// The comparer bound to this context: exported-type references compare equal to
	/// their resolved `TypeDef` (spec §4.2).
	pub fn comparer(&self) -> SignatureComparer<'l> {
		SignatureComparer::with_context(self.comparer_flags, self.self_ref())
	}

	#[inline]
	fn self_ref(&self) -> &'l RuntimeContext<'l> {
		unsafe { std::mem::transmute::<&RuntimeContext<'l>, &'l RuntimeContext<'l>>(self) }
	}

	fn type_cache_get(&self, key: TypeCacheKey) -> Option<TypeDefOrRef<'l>> {
		let cached = self.type_cache.read().unwrap().get(&key).copied();
		#[cfg(feature = "tracing")]
		if cached.is_some() {
			tracing::trace!(?key, "type cache hit");
		}
		cached
	}

	/// First-writer-wins: never overwrites an existing entry (spec §4.4, §9).
	fn type_cache_insert(&self, key: TypeCacheKey, resolved: TypeDefOrRef<'l>) {
		let mut cache = self.type_cache.write().unwrap();
		cache.entry(key).or_insert(resolved);
		#[cfg(feature = "tracing")]
		tracing::trace!(?key, "type cache insert");
	}

	pub fn target_runtime(&self) -> &TargetRuntime {
		&self.target_runtime
	}

	#[inline]
	pub(crate) fn bump(&self) -> &'l Bump {
		unsafe { std::mem::transmute::<&Bump, &'l Bump>(&self.bump) }
	}

	pub(crate) fn bump_alloc<T>(&self, value: T) -> &'l T {
		self.bump().alloc(value)
	}

	pub(crate) fn bump_alloc_slice<T>(&self, items: Vec<T>) -> &'l [T] {
		self.bump().alloc_slice_fill_iter(items)
	}

	/// Registers an assembly that has not been associated with any context before.
	/// Asserts uniqueness under the version-agnostic identity (spec §4.4).
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, assembly)))]
	pub fn add(&self, assembly: &'l Assembly<'l>) -> Result<AssemblyHandle, ResolutionStatus> {
		if assembly.is_attached() {
			return Err(ResolutionStatus::InvalidReference);
		}
		let key = assembly.name.version_agnostic_key();
		let mut loaded = self.loaded.lock().unwrap();
		if loaded.contains_key(&key) {
			return Err(ResolutionStatus::InvalidReference);
		}

		let mut assemblies = self.assemblies.lock().unwrap();
		let handle = AssemblyHandle(assemblies.len() as u32);
		assemblies.push(assembly);
		loaded.insert(key, handle);
		assembly.attached.set(true);

		if assembly.name.name == "mscorlib"
			|| assembly.name.name == "System.Private.CoreLib"
			|| assembly.name.name == "netstandard"
		{
			*self.corlib.lock().unwrap() = Some(handle);
			#[cfg(feature = "tracing")]
			tracing::debug!(name = %assembly.name, "registered as corlib");
		}

		#[cfg(feature = "tracing")]
		tracing::debug!(name = %assembly.name, ?handle, "assembly registered");
		Ok(handle)
	}

	/// Loads an assembly by name via the resolver, returning the already-registered
	/// instance if an equivalent identity is already present instead of inserting a
	/// second copy (spec §4.4: "discards the newly read instance").
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, read)))]
	pub fn load_assembly(
		&self,
		name: &AssemblyName,
		origin: Option<&Path>,
		read: impl FnOnce(&Path) -> Result<Assembly<'l>, ResolutionStatus>,
	) -> (ResolutionStatus, Option<AssemblyHandle>) {
		let key_probe = VersionAgnosticKey(*name);
		if let Some(handle) = self.loaded.lock().unwrap().get(&key_probe) {
			return (ResolutionStatus::Success, Some(*handle));
		}

		let path = match self.resolver.lock().unwrap().resolve_assembly_name(self, name, origin) {
			// Reading the assembly out of its resolver's own collaborator (a loaded
			// in-memory instance, or a bundle's embedded file table) is out of scope here;
			// only a filesystem path can be read through the `read` callback.
			AssemblyResolverResult::Assembly(_) | AssemblyResolverResult::Embedded(_) => None,
			AssemblyResolverResult::None => None,
			AssemblyResolverResult::Path(path) => Some(path),
		};
		let Some(path) = path else {
			#[cfg(feature = "tracing")]
			tracing::debug!(name = %name, "assembly not found");
			return (ResolutionStatus::AssemblyNotFound, None);
		};

		let assembly: &'l Assembly<'l> = match read(&path) {
			Ok(assembly) => self.bump().alloc(assembly),
			Err(status) => return (status, None),
		};

		match self.add(assembly) {
			Ok(handle) => (ResolutionStatus::Success, Some(handle)),
			Err(_) => {
				// Lost a race with a concurrent load of the same identity; use the winner.
				let handle = *self.loaded.lock().unwrap().get(&key_probe).unwrap();
				(ResolutionStatus::Success, Some(handle))
			},
		}
	}

	pub fn loaded_assemblies(&self) -> Vec<&'l Assembly<'l>> {
		self.assemblies.lock().unwrap().clone()
	}

	pub fn assembly(&self, handle: AssemblyHandle) -> &'l Assembly<'l> {
		self.assemblies.lock().unwrap()[handle.0 as usize]
	}

	fn module(&self, handle: ModuleHandle) -> &Module<'l> {
		&self.assembly(handle.assembly).modules[handle.index as usize]
	}

	/// Searches a module's top-level types by case-exact `(namespace, name)`, falling back
	/// to exported-type forwarding when nothing matches directly (spec §4.4.1).
	pub fn find_type_in_module(
		&self,
		module: ModuleHandle,
		namespace: Option<&str>,
		name: &str,
	) -> (ResolutionStatus, Option<TypeDefOrRef<'l>>) {
		let module_ref = self.module(module);
		if let Some(def) = module_ref
			.type_defs
			.iter()
			.find(|t| t.namespace == namespace && t.name == name)
		{
			return (ResolutionStatus::Success, Some(TypeDefOrRef::Def(def)));
		}

		if let Some(exported) = module_ref
			.exported_types
			.iter()
			.find(|t| t.namespace == namespace && t.name == name)
		{
			return self.resolve_exported_type(exported, &mut Vec::new());
		}

		(ResolutionStatus::TypeNotFound, None)
	}

	/// Follows a `TypeRef`'s scope chain to its defining `TypeDef`, detecting cycles via a
	/// per-query scope stack (spec §4.4.1). Consults the type cache first and populates it
	/// on a successful resolution (spec §4.4, §5).
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, path)))]
	pub fn resolve_type_reference(
		&self,
		type_ref: &TypeRef<'l>,
		origin: ModuleHandle,
		path: &mut Vec<*const ()>,
	) -> (ResolutionStatus, Option<TypeDefOrRef<'l>>) {
		let cache_key = TypeCacheKey::TypeRef(origin, type_ref as *const _ as usize);
		if let Some(cached) = self.type_cache_get(cache_key) {
			return (ResolutionStatus::Success, Some(cached));
		}

		let marker = type_ref as *const _ as *const ();
		if path.contains(&marker) {
			return (ResolutionStatus::CircularResolutionScope, None);
		}
		path.push(marker);

		let result = match &type_ref.scope {
			ResolutionScope::CurrentModule => self.find_type_in_module(origin, type_ref.namespace, type_ref.name),
			ResolutionScope::Module(module) => self.find_type_in_module(*module, type_ref.namespace, type_ref.name),
			ResolutionScope::AssemblyRef(_, name) => {
				let (status, handle) = self.load_assembly(name, None, |_| Err(ResolutionStatus::AssemblyNotFound));
				match (status, handle) {
					(ResolutionStatus::Success, Some(handle)) => {
						let module = ModuleHandle { assembly: handle, index: 0 };
						self.find_type_in_module(module, type_ref.namespace, type_ref.name)
					},
					(status, _) => (status, None),
				}
			},
			ResolutionScope::TypeRef(parent) => {
				match self.resolve_type_reference(parent, origin, path) {
					(ResolutionStatus::Success, Some(TypeDefOrRef::Def(parent_def))) => {
						let nested = parent_def.nested_types.get().and_then(|types| {
							types.iter().find(|t| t.namespace == type_ref.namespace && t.name == type_ref.name)
						});
						match nested {
							Some(def) => (ResolutionStatus::Success, Some(TypeDefOrRef::Def(def))),
							None => (ResolutionStatus::TypeNotFound, None),
						}
					},
					(status, _) => (status, None),
				}
			},
		};

		path.pop();
		if let (ResolutionStatus::Success, Some(resolved)) = result {
			self.type_cache_insert(cache_key, resolved);
		}
		result
	}

	/// Follows an `ExportedType`'s implementation chain, detecting cycles the same way
	/// as [`Self::resolve_type_reference`] (spec §4.4.2). Consults the type cache first,
	/// same as [`Self::resolve_type_reference`].
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, path)))]
	pub fn resolve_exported_type(
		&self,
		exported: &'l ExportedType<'l>,
		path: &mut Vec<*const ()>,
	) -> (ResolutionStatus, Option<TypeDefOrRef<'l>>) {
		let cache_key = TypeCacheKey::ExportedType(exported as *const _ as usize);
		if let Some(cached) = self.type_cache_get(cache_key) {
			return (ResolutionStatus::Success, Some(cached));
		}

		let marker = exported as *const _ as *const ();
		if path.contains(&marker) {
			return (ResolutionStatus::CircularResolutionScope, None);
		}
		path.push(marker);

		let result = match &exported.implementation {
			ExportedTypeImplementation::AssemblyRef(_, name) => {
				let (status, handle) = self.load_assembly(name, None, |_| Err(ResolutionStatus::AssemblyNotFound));
				match (status, handle) {
					(ResolutionStatus::Success, Some(handle)) => {
						let module = ModuleHandle { assembly: handle, index: 0 };
						self.find_type_in_module(module, exported.namespace, exported.name)
					},
					(status, _) => (status, None),
				}
			},
			ExportedTypeImplementation::File(_) => (ResolutionStatus::ModuleNotFound, None),
			ExportedTypeImplementation::Nested(parent) => self.resolve_exported_type(parent, path),
		};

		path.pop();
		if let (ResolutionStatus::Success, Some(resolved)) = result {
			self.type_cache_insert(cache_key, resolved);
		}
		result
	}

	/// Resolves a `TypeDefOrRef` to its defining `TypeDef`: a `TypeRef` resolves through
	/// [`Self::resolve_type_reference`], a `TypeSpec` resolves through the `TypeDefOrRef`
	/// embedded in its signature (its own open generic definition for a generic instance),
	/// and a `TypeDef` passes through unchanged.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn resolve_type_def_or_ref(&self, def_or_ref: TypeDefOrRef<'l>) -> Option<TypeDefOrRef<'l>> {
		match def_or_ref {
			TypeDefOrRef::Def(_) => Some(def_or_ref),
			TypeDefOrRef::Ref(type_ref) => {
				// The origin module is not recoverable from a bare `TypeRef`; callers that
				// need `CurrentModule` scopes resolved correctly should call
				// `resolve_type_reference` directly with the referencing module.
				let dummy_origin = ModuleHandle { assembly: AssemblyHandle(0), index: 0 };
				match self.resolve_type_reference(type_ref, dummy_origin, &mut Vec::new()) {
					(ResolutionStatus::Success, resolved) => resolved,
					_ => None,
				}
			},
			TypeDefOrRef::Spec(spec) => {
				let inner = match spec.signature.strip_modifiers() {
					TypeSignature::Class(t) | TypeSignature::ValueType(t) => *t,
					TypeSignature::GenericInstance(t, _) => *t,
					_ => return None,
				};
				self.resolve_type_def_or_ref(inner)
			},
		}
	}

	/// Linear-scans a resolved declaring type's members by name and signature equality
	/// (spec §4.4.3).
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, signature_matches)))]
	pub fn resolve_member(
		&self,
		declaring_type: TypeDefOrRef<'l>,
		name: &str,
		signature_matches: impl Fn(&crate::signature::TypeSignature) -> bool,
	) -> (ResolutionStatus, Option<&'l crate::metadata::Field<'l>>) {
		let TypeDefOrRef::Def(def) = declaring_type else {
			return (ResolutionStatus::TypeNotFound, None);
		};
		let Some(fields) = def.fields.get() else {
			return (ResolutionStatus::MemberNotFound, None);
		};
		match fields.iter().find(|f| f.name == name && signature_matches(f.signature)) {
			Some(field) => (ResolutionStatus::Success, Some(field)),
			None => (ResolutionStatus::MemberNotFound, None),
		}
	}

	pub fn corlib_handle(&self) -> Option<AssemblyHandle> {
		*self.corlib.lock().unwrap()
	}

	/// Looks up a well-known corlib type by name, searching the registered corlib
	/// assembly's first module (spec §4.3, §4.6).
	pub fn corlib_type(&self, namespace: &str, name: &str) -> Option<&'l TypeDef<'l>> {
		let handle = self.corlib_handle()?;
		let module = ModuleHandle { assembly: handle, index: 0 };
		match self.find_type_in_module(module, Some(namespace), name) {
			(ResolutionStatus::Success, Some(TypeDefOrRef::Def(def))) => Some(def),
			_ => None,
		}
	}

	/// Declared variance of the `index`-th generic parameter of a type (spec §4.3).
	pub fn generic_param_variance(&self, def_or_ref: TypeDefOrRef<'l>, index: usize) -> Variance {
		let Some(resolved) = self.resolve_type_def_or_ref(def_or_ref) else {
			return Variance::NonVariant;
		};
		let TypeDefOrRef::Def(def) = resolved else {
			return Variance::NonVariant;
		};
		def.generic_params
			.get()
			.and_then(|params| params.get(index))
			.map(|p| p.variance)
			.unwrap_or_default()
	}
}
