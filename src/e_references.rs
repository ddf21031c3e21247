//! Target framework → reference assembly lookup.
//!
//! Each supported framework moniker maps to a targeting pack shipped with the
//! .NET SDK. The pack directory layout is
//! `<dotnet_root>/packs/<pack>/<version>/ref/<folder>/*.dll`; the highest
//! installed version within the entry's band is used.

use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::Serialize;

use crate::e_types::{AnalyzerError, Result};

/// One row of the static framework table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameworkEntry {
    /// Moniker as written in a project file, e.g. `net6.0`.
    pub moniker: &'static str,
    /// Targeting pack id under `<dotnet_root>/packs`.
    pub pack: &'static str,
    /// Version band of the pack; any installed `<band>.*` version matches.
    pub band: &'static str,
    /// Folder under `ref/` holding the reference assemblies.
    pub folder: &'static str,
}

pub static FRAMEWORK_TABLE: &[FrameworkEntry] = &[
    FrameworkEntry {
        moniker: "netcoreapp3.1",
        pack: "Microsoft.NETCore.App.Ref",
        band: "3.1",
        folder: "netcoreapp3.1",
    },
    FrameworkEntry {
        moniker: "net5.0",
        pack: "Microsoft.NETCore.App.Ref",
        band: "5.0",
        folder: "net5.0",
    },
    FrameworkEntry {
        moniker: "net6.0",
        pack: "Microsoft.NETCore.App.Ref",
        band: "6.0",
        folder: "net6.0",
    },
    FrameworkEntry {
        moniker: "net7.0",
        pack: "Microsoft.NETCore.App.Ref",
        band: "7.0",
        folder: "net7.0",
    },
    FrameworkEntry {
        moniker: "net8.0",
        pack: "Microsoft.NETCore.App.Ref",
        band: "8.0",
        folder: "net8.0",
    },
    FrameworkEntry {
        moniker: "net9.0",
        pack: "Microsoft.NETCore.App.Ref",
        band: "9.0",
        folder: "net9.0",
    },
    FrameworkEntry {
        moniker: "netstandard2.0",
        pack: "NETStandard.Library.Ref",
        band: "2.1",
        folder: "netstandard2.1",
    },
    FrameworkEntry {
        moniker: "netstandard2.1",
        pack: "NETStandard.Library.Ref",
        band: "2.1",
        folder: "netstandard2.1",
    },
];

/// Looks a moniker up in [`FRAMEWORK_TABLE`]. Matching is case-insensitive,
/// as it is for MSBuild.
pub fn lookup_framework(moniker: &str) -> Option<&'static FrameworkEntry> {
    let moniker = moniker.trim();
    FRAMEWORK_TABLE
        .iter()
        .find(|entry| entry.moniker.eq_ignore_ascii_case(moniker))
}

/// A single reference assembly handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceAssembly {
    pub name: String,
    pub path: PathBuf,
}

/// The set of references a project compiles against, selected by target
/// framework. The assemblies themselves are enumerated lazily from a .NET
/// installation, see [`ReferenceSet::assemblies`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSet {
    pub framework: FrameworkEntry,
}

impl ReferenceSet {
    /// Selects the reference set for `moniker`.
    pub fn for_framework(moniker: &str) -> Result<Self> {
        lookup_framework(moniker)
            .map(|entry| ReferenceSet { framework: *entry })
            .ok_or_else(|| AnalyzerError::UnsupportedTargetFramework(moniker.to_string()))
    }

    pub fn moniker(&self) -> &'static str {
        self.framework.moniker
    }

    /// Returns the directory holding the reference assemblies, using the
    /// newest installed pack version in the band.
    pub fn reference_dir(&self, dotnet_root: &Path) -> Result<PathBuf> {
        let pack_root = dotnet_root.join("packs").join(self.framework.pack);
        let missing = || AnalyzerError::MissingTargetingPack {
            pack: self.framework.pack.to_string(),
            band: self.framework.band.to_string(),
            root: dotnet_root.to_path_buf(),
        };
        let entries = fs::read_dir(&pack_root).map_err(|_| missing())?;

        let band_prefix = format!("{}.", self.framework.band);
        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if !name.starts_with(&band_prefix) {
                    return None;
                }
                let version = match Version::parse(&name) {
                    Ok(version) => version,
                    Err(e) => {
                        log::debug!("ignoring pack directory {}: {}", name, e);
                        return None;
                    }
                };
                let dir = entry.path().join("ref").join(self.framework.folder);
                dir.is_dir().then_some((version, dir))
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, dir)| dir)
            .ok_or_else(missing)
    }

    /// Enumerates every `*.dll` in the pack's reference folder, sorted by
    /// file name.
    pub fn assemblies(&self, dotnet_root: &Path) -> Result<Vec<ReferenceAssembly>> {
        let dir = self.reference_dir(dotnet_root)?;
        let entries = fs::read_dir(&dir).map_err(|e| AnalyzerError::io(&dir, e))?;
        let mut assemblies: Vec<ReferenceAssembly> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("dll"))
            })
            .filter_map(|path| {
                let name = path.file_stem()?.to_string_lossy().to_string();
                Some(ReferenceAssembly { name, path })
            })
            .collect();
        assemblies.sort_by(|a, b| a.name.cmp(&b.name));
        log::debug!(
            "{} reference assemblies for {} in {}",
            assemblies.len(),
            self.moniker(),
            dir.display()
        );
        Ok(assemblies)
    }
}

/// Preprocessor symbols the SDK defines for a framework: the framework
/// family, the exact version and every `*_OR_GREATER` symbol up to it.
pub fn framework_defines(entry: &FrameworkEntry) -> Vec<String> {
    const NETCOREAPP: &[&str] = &["1_0", "1_1", "2_0", "2_1", "2_2", "3_0", "3_1"];
    const NETSTANDARD: &[&str] = &[
        "1_0", "1_1", "1_2", "1_3", "1_4", "1_5", "1_6", "2_0", "2_1",
    ];

    fn or_greater(family: &str, versions: &[&str], upto: &str, defines: &mut Vec<String>) {
        for version in versions {
            defines.push(format!("{}{}_OR_GREATER", family, version));
            if *version == upto {
                break;
            }
        }
    }

    let mut defines = Vec::new();

    if let Some(version) = entry.moniker.strip_prefix("netstandard") {
        let version = version.replace('.', "_");
        defines.push("NETSTANDARD".to_string());
        defines.push(format!("NETSTANDARD{}", version));
        or_greater("NETSTANDARD", NETSTANDARD, &version, &mut defines);
    } else if let Some(version) = entry.moniker.strip_prefix("netcoreapp") {
        let version = version.replace('.', "_");
        defines.push("NETCOREAPP".to_string());
        defines.push(format!("NETCOREAPP{}", version));
        or_greater("NETCOREAPP", NETCOREAPP, &version, &mut defines);
    } else if let Some(version) = entry.moniker.strip_prefix("net") {
        let major: u32 = version
            .split('.')
            .next()
            .and_then(|m| m.parse().ok())
            .unwrap_or(5);
        defines.push("NET".to_string());
        defines.push(format!("NET{}_0", major));
        for m in 5..=major {
            defines.push(format!("NET{}_0_OR_GREATER", m));
        }
        defines.push("NETCOREAPP".to_string());
        or_greater("NETCOREAPP", NETCOREAPP, "3_1", &mut defines);
    }
    defines
}
