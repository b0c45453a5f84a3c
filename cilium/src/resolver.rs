//! Assembly resolvers: turn an [`AssemblyName`] reference into a loadable path or an
//! already-loaded assembly (spec §4.5).

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fxhash::FxHashMap;
use rust_search::SearchBuilder;

use crate::context::{Assembly, RuntimeContext};
use crate::error::ResolutionStatus;
use crate::identity::AssemblyName;

/// Outcome of a resolution attempt: nothing found, a path to probe further, an
/// already-parsed assembly (e.g. one the context had already loaded), or a match found
/// inside a bundle's embedded file table, identified but not yet read.
pub enum AssemblyResolverResult<'l> {
	None,
	Path(PathBuf),
	Assembly(&'l Assembly<'l>),
	Embedded(BundleEntry),
}

/// Something that can turn an assembly reference into a candidate (spec §4.5).
pub trait AssemblyResolver: Debug {
	fn resolve_assembly_name<'l>(
		&mut self,
		ctx: &RuntimeContext<'l>,
		name: &AssemblyName,
		origin: Option<&Path>,
	) -> AssemblyResolverResult<'l>;
}

/// Ordered-directory-list probing, the base every other resolver builds on: the origin
/// module's own directory, then each configured search directory, trying
/// `{culture}/{name}.dll` before `{name}.dll` when a culture is set (spec §4.5).
#[derive(Debug)]
pub struct DirectoryProbingResolver {
	search_directories: Vec<PathBuf>,
	/// Lazily-populated, keyed by filename without extension (grounded in the teacher's
	/// recursive-`.dll`-search directory resolver).
	paths: FxHashMap<String, Vec<Rc<Path>>>,
}

impl DirectoryProbingResolver {
	pub fn new<T: AsRef<Path>>(search_directories: impl IntoIterator<Item = T>) -> Self {
		let mut paths: FxHashMap<String, Vec<Rc<Path>>> = Default::default();
		let mut dirs = Vec::new();
		for dir in search_directories {
			let dir = dir.as_ref().to_path_buf();
			for entry in SearchBuilder::default().location(&dir).depth(usize::MAX).ext("dll").build() {
				let path = Path::new(&entry);
				let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string();
				paths.entry(stem).or_default().push(Rc::from(path));
			}
			dirs.push(dir);
		}
		Self { search_directories: dirs, paths }
	}

	fn candidates(&self, name: &str, culture: Option<&str>) -> Vec<PathBuf> {
		let mut candidates = Vec::new();
		for dir in &self.search_directories {
			if let Some(culture) = culture {
				candidates.push(dir.join(culture).join(format!("{name}.dll")));
			}
			candidates.push(dir.join(format!("{name}.dll")));
		}
		candidates
	}

	pub fn resolve_path(&self, name: &AssemblyName, origin: Option<&Path>) -> Option<PathBuf> {
		if let Some(origin) = origin.and_then(Path::parent) {
			let direct = origin.join(format!("{}.dll", name.name));
			if direct.is_file() {
				return Some(direct);
			}
		}

		for candidate in self.candidates(name.name, name.culture()) {
			if candidate.is_file() {
				return Some(candidate);
			}
		}

		self.paths
			.get(name.name)
			.and_then(|group| group.first())
			.map(|p| p.to_path_buf())
	}
}

impl AssemblyResolver for DirectoryProbingResolver {
	fn resolve_assembly_name<'l>(
		&mut self,
		_ctx: &RuntimeContext<'l>,
		name: &AssemblyName,
		origin: Option<&Path>,
	) -> AssemblyResolverResult<'l> {
		match self.resolve_path(name, origin) {
			Some(path) => AssemblyResolverResult::Path(path),
			None => AssemblyResolverResult::None,
		}
	}
}

/// .NET Framework-family resolution: a GAC-layout probe restricted to strong-named
/// (public-key-token-bearing) references, falling back to directory probing (spec §4.5).
#[derive(Debug)]
pub struct FrameworkResolver {
	install_directory: PathBuf,
	gac_directories: Vec<PathBuf>,
	fallback: DirectoryProbingResolver,
}

impl FrameworkResolver {
	pub fn new(install_directory: impl Into<PathBuf>, gac_directories: Vec<PathBuf>) -> Self {
		let install_directory = install_directory.into();
		let fallback = DirectoryProbingResolver::new([install_directory.clone()]);
		Self { install_directory, gac_directories, fallback }
	}

	fn probe_gac(&self, name: &AssemblyName) -> Option<PathBuf> {
		let token = name.public_key_or_token.token()?;
		for gac in &self.gac_directories {
			let versioned = gac.join(name.name).join(format!(
				"{}__{}",
				name.version, token
			));
			let path = versioned.join(format!("{}.dll", name.name));
			if path.is_file() {
				return Some(path);
			}
		}
		None
	}
}

impl AssemblyResolver for FrameworkResolver {
	fn resolve_assembly_name<'l>(
		&mut self,
		ctx: &RuntimeContext<'l>,
		name: &AssemblyName,
		origin: Option<&Path>,
	) -> AssemblyResolverResult<'l> {
		if name.name == "mscorlib" {
			let direct = self.install_directory.join("mscorlib.dll");
			if direct.is_file() {
				return AssemblyResolverResult::Path(direct);
			}
		}
		if let Some(path) = self.probe_gac(name) {
			return AssemblyResolverResult::Path(path);
		}
		self.fallback.resolve_assembly_name(ctx, name, origin)
	}
}

/// .NET Core-family resolution: runtime-directory probing with a version fallback, the
/// application's own framework directories searched before the shared runtime ones
/// (spec §4.5).
#[derive(Debug)]
pub struct CoreResolver {
	fallback: DirectoryProbingResolver,
}

impl CoreResolver {
	pub fn new(app_directories: Vec<PathBuf>, runtime_directories: Vec<PathBuf>) -> Self {
		let mut dirs = app_directories;
		dirs.extend(runtime_directories);
		Self { fallback: DirectoryProbingResolver::new(dirs) }
	}
}

impl AssemblyResolver for CoreResolver {
	fn resolve_assembly_name<'l>(
		&mut self,
		ctx: &RuntimeContext<'l>,
		name: &AssemblyName,
		origin: Option<&Path>,
	) -> AssemblyResolverResult<'l> {
		self.fallback.resolve_assembly_name(ctx, name, origin)
	}
}

/// An entry in a bundled single-file application's embedded file table (spec §4.5).
#[derive(Debug, Clone)]
pub struct BundleEntry {
	pub name: String,
	pub offset: u64,
	pub size: u64,
}

/// Resolution from an embedded file table, falling back to [`CoreResolver`] for anything
/// not bundled (spec §4.5's "Load path contract").
#[derive(Debug)]
pub struct BundleResolver {
	entries: FxHashMap<String, BundleEntry>,
	fallback: CoreResolver,
}

impl BundleResolver {
	pub fn new(entries: Vec<BundleEntry>, fallback: CoreResolver) -> Self {
		let entries = entries.into_iter().map(|e| (e.name.clone(), e)).collect();
		Self { entries, fallback }
	}

	pub fn find_embedded(&self, name: &str) -> Option<&BundleEntry> {
		self.entries.get(name)
	}
}

impl AssemblyResolver for BundleResolver {
	fn resolve_assembly_name<'l>(
		&mut self,
		ctx: &RuntimeContext<'l>,
		name: &AssemblyName,
		origin: Option<&Path>,
	) -> AssemblyResolverResult<'l> {
		// A name found in the bundle's own table is a match: report it so the caller can
		// read it through the embedded-bundle reader, an external collaborator this
		// resolver doesn't itself own. Only a name genuinely absent from the bundle falls
		// through to the ordinary filesystem-backed resolver.
		match self.find_embedded(name.name) {
			Some(entry) => AssemblyResolverResult::Embedded(entry.clone()),
			None => self.fallback.resolve_assembly_name(ctx, name, origin),
		}
	}
}

pub fn not_found() -> (ResolutionStatus, Option<PathBuf>) {
	(ResolutionStatus::AssemblyNotFound, None)
}
