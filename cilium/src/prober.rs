//! Target-runtime probing: infers which runtime family and version an assembly was built
//! against from its corlib reference and `TargetFrameworkAttribute` (spec §4.6).

use crate::identity::AssemblyVersion;

/// The runtime family a corlib name maps to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RuntimeFamily {
	Framework,
	Standard,
	Core,
}

/// A probed target runtime: family plus version, monotonically refined as more evidence
/// (assembly refs, custom attributes) is examined (spec §4.6).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TargetRuntime {
	pub family: RuntimeFamily,
	pub version: AssemblyVersion,
}

impl TargetRuntime {
	/// The conservative fallback when nothing in the assembly yields usable evidence
	/// (spec §4.6: ".NET Framework 4.0 on total failure").
	pub fn fallback() -> Self {
		Self { family: RuntimeFamily::Framework, version: AssemblyVersion::new(4, 0, 0, 0) }
	}

	/// Folds in evidence from a corlib-named assembly reference, keeping the higher
	/// version within a family and preferring a more specific family over `Framework`'s
	/// default guess (spec §4.6 step 2: "keeping the highest known-corlib version").
	fn refine(&mut self, candidate: TargetRuntime) {
		if candidate.family == self.family {
			if candidate.version > self.version {
				self.version = candidate.version;
			}
		} else if self.family == RuntimeFamily::Framework && *self == Self::fallback() {
			*self = candidate;
		}
	}
}

/// Maps a corlib assembly's name and version to a [`TargetRuntime`] guess
/// (spec §4.6's mapping table).
pub fn corlib_name_to_runtime(name: &str, version: AssemblyVersion) -> Option<TargetRuntime> {
	match name {
		"mscorlib" => Some(TargetRuntime { family: RuntimeFamily::Framework, version }),
		"netstandard" => Some(TargetRuntime { family: RuntimeFamily::Standard, version }),
		"System.Private.CoreLib" => Some(TargetRuntime {
			family: RuntimeFamily::Core,
			version: if version.major == 4 { AssemblyVersion::new(1, 0, 0, 0) } else { version },
		}),
		"System.Runtime" => Some(TargetRuntime {
			family: RuntimeFamily::Core,
			version: if version.major >= 5 { version } else { quadruple_to_core_version(version) },
		}),
		_ => None,
	}
}

fn quadruple_to_core_version(version: AssemblyVersion) -> AssemblyVersion {
	match (version.major, version.minor) {
		(4, 0) => AssemblyVersion::new(1, 0, 0, 0),
		(4, 1) => AssemblyVersion::new(1, 1, 0, 0),
		(4, 2) => AssemblyVersion::new(2, 0, 0, 0),
		(_, _) if version.major >= 5 => version,
		_ => version,
	}
}

/// Parses a `TargetFrameworkAttribute` moniker string such as
/// `.NETCoreApp,Version=v6.0` or `.NETFramework,Version=v4.7.2` (spec §4.6 step 3).
pub fn parse_framework_moniker(moniker: &str) -> Option<TargetRuntime> {
	let (family_part, version_part) = moniker.split_once(",Version=v")?;
	let family = match family_part {
		".NETFramework" => RuntimeFamily::Framework,
		".NETStandard" => RuntimeFamily::Standard,
		".NETCoreApp" => RuntimeFamily::Core,
		_ => return None,
	};

	let mut parts = version_part.split('.');
	let major: u16 = parts.next()?.parse().ok()?;
	let minor: u16 = parts.next().unwrap_or("0").parse().ok()?;
	let build: u16 = parts.next().unwrap_or("0").parse().ok()?;
	Some(TargetRuntime { family, version: AssemblyVersion::new(major, minor, build, 0) })
}

/// Runs the full probing algorithm: assembly-definition corlib check, then assembly-ref
/// table evidence, then the `TargetFrameworkAttribute` moniker, never letting the result
/// regress to a lower version once refined, and falling back to .NET Framework 4.0 if
/// nothing is found (spec §4.6).
pub struct Prober {
	current: TargetRuntime,
	found_any: bool,
}

impl Default for Prober {
	fn default() -> Self {
		Self { current: TargetRuntime::fallback(), found_any: false }
	}
}

impl Prober {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn observe_corlib_reference(&mut self, name: &str, version: AssemblyVersion) {
		if let Some(candidate) = corlib_name_to_runtime(name, version) {
			if !self.found_any {
				self.current = candidate;
				self.found_any = true;
			} else {
				self.current.refine(candidate);
			}
		}
	}

	pub fn observe_target_framework_attribute(&mut self, moniker: &str) {
		if let Some(candidate) = parse_framework_moniker(moniker) {
			if !self.found_any {
				self.current = candidate;
				self.found_any = true;
			} else {
				self.current.refine(candidate);
			}
		}
	}

	pub fn finish(self) -> TargetRuntime {
		self.current
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fallback_is_net_framework_4_0() {
		let runtime = TargetRuntime::fallback();
		assert_eq!(runtime.family, RuntimeFamily::Framework);
		assert_eq!(runtime.version, AssemblyVersion::new(4, 0, 0, 0));
	}

	#[test]
	fn parses_core_moniker() {
		let runtime = parse_framework_moniker(".NETCoreApp,Version=v6.0").unwrap();
		assert_eq!(runtime.family, RuntimeFamily::Core);
		assert_eq!(runtime.version.major, 6);
	}

	#[test]
	fn private_corelib_maps_to_core_1_0() {
		let runtime = corlib_name_to_runtime("System.Private.CoreLib", AssemblyVersion::new(4, 0, 0, 0)).unwrap();
		assert_eq!(runtime.family, RuntimeFamily::Core);
		assert_eq!(runtime.version, AssemblyVersion::new(1, 0, 0, 0));
	}

	#[test]
	fn empty_prober_falls_back() {
		let prober = Prober::new();
		assert_eq!(prober.finish(), TargetRuntime::fallback());
	}
}
