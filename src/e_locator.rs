//! Process-wide discovery of the .NET toolchain.
//!
//! [`register_defaults`] (or [`register`] with explicit overrides) must run
//! before the first solution is opened. The first successful registration
//! wins; later calls return the same [`Toolchain`].

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use semver::Version;

use crate::e_types::{AnalyzerError, Result};

static TOOLCHAIN: OnceCell<Toolchain> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Root of the .NET installation (contains `dotnet`, `sdk/`, `packs/`).
    pub dotnet_root: PathBuf,
    /// The `dotnet` host used to launch the compiler.
    pub dotnet: PathBuf,
    /// `csc.dll` of the newest installed SDK.
    pub compiler: PathBuf,
}

/// Explicit settings taking precedence over discovery.
#[derive(Debug, Clone, Default)]
pub struct ToolchainOverrides {
    pub dotnet_root: Option<PathBuf>,
    pub compiler: Option<PathBuf>,
}

/// Registers the toolchain found from `dotnet` on `PATH`.
pub fn register_defaults() -> Result<&'static Toolchain> {
    register(&ToolchainOverrides::default())
}

/// Registers the toolchain once per process. Overrides are only considered
/// by the first call that succeeds.
pub fn register(overrides: &ToolchainOverrides) -> Result<&'static Toolchain> {
    TOOLCHAIN.get_or_try_init(|| {
        let toolchain = discover(overrides)?;
        log::info!(
            "registered .NET toolchain at {} (compiler {})",
            toolchain.dotnet_root.display(),
            toolchain.compiler.display()
        );
        Ok(toolchain)
    })
}

/// The registered toolchain, if any.
pub fn registered() -> Option<&'static Toolchain> {
    TOOLCHAIN.get()
}

/// Resolves a toolchain without registering it.
pub fn discover(overrides: &ToolchainOverrides) -> Result<Toolchain> {
    let dotnet_root = match &overrides.dotnet_root {
        Some(root) => root.clone(),
        None => locate_dotnet_root()?,
    };
    let dotnet = dotnet_host(&dotnet_root);
    let compiler = match &overrides.compiler {
        Some(compiler) => compiler.clone(),
        None => newest_sdk_compiler(&dotnet_root)?,
    };
    if !compiler.is_file() {
        return Err(AnalyzerError::Toolchain(format!(
            "compiler not found at {}",
            compiler.display()
        )));
    }
    Ok(Toolchain {
        dotnet_root,
        dotnet,
        compiler,
    })
}

fn dotnet_host(root: &Path) -> PathBuf {
    let exe = if cfg!(windows) { "dotnet.exe" } else { "dotnet" };
    let candidate = root.join(exe);
    if candidate.is_file() {
        candidate
    } else {
        PathBuf::from(exe)
    }
}

fn locate_dotnet_root() -> Result<PathBuf> {
    let dotnet = which::which("dotnet")
        .map_err(|e| AnalyzerError::Toolchain(format!("dotnet not found on PATH: {}", e)))?;
    // Package managers commonly install `dotnet` as a symlink into the root.
    let dotnet = fs::canonicalize(&dotnet).unwrap_or(dotnet);
    dotnet
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| AnalyzerError::Toolchain(format!("bad dotnet path {}", dotnet.display())))
}

/// Finds `sdk/<newest>/Roslyn/bincore/csc.dll` under `dotnet_root`.
pub fn newest_sdk_compiler(dotnet_root: &Path) -> Result<PathBuf> {
    let sdk_dir = dotnet_root.join("sdk");
    let entries = fs::read_dir(&sdk_dir).map_err(|e| AnalyzerError::io(&sdk_dir, e))?;
    entries
        .flatten()
        .filter_map(|entry| {
            let csc = entry.path().join("Roslyn").join("bincore").join("csc.dll");
            if !csc.is_file() {
                return None;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match Version::parse(&name) {
                Ok(version) => Some((version, csc)),
                Err(e) => {
                    log::debug!("ignoring SDK directory {}: {}", name, e);
                    None
                }
            }
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, csc)| csc)
        .ok_or_else(|| {
            AnalyzerError::Toolchain(format!(
                "no SDK with a C# compiler under {}",
                sdk_dir.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_sdk(root: &Path, version: &str) -> PathBuf {
        let dir = root.join("sdk").join(version).join("Roslyn").join("bincore");
        fs::create_dir_all(&dir).unwrap();
        let csc = dir.join("csc.dll");
        fs::write(&csc, b"").unwrap();
        csc
    }

    #[test]
    fn picks_newest_sdk() {
        let root = TempDir::new().unwrap();
        fake_sdk(root.path(), "6.0.400");
        let newest = fake_sdk(root.path(), "8.0.100");
        fake_sdk(root.path(), "7.0.302");
        fs::create_dir_all(root.path().join("sdk").join("9.0.100")).unwrap();
        assert_eq!(newest_sdk_compiler(root.path()).unwrap(), newest);
    }

    #[test]
    fn released_sdk_outranks_preview() {
        let root = TempDir::new().unwrap();
        fake_sdk(root.path(), "9.0.100-preview.3.24204.13");
        let release = fake_sdk(root.path(), "9.0.100");
        fake_sdk(root.path(), "9.0.100-rc.1.24452.12");
        fake_sdk(root.path(), "NuGetFallbackFolder");
        assert_eq!(newest_sdk_compiler(root.path()).unwrap(), release);
    }

    #[test]
    fn discover_with_explicit_root() {
        let root = TempDir::new().unwrap();
        let csc = fake_sdk(root.path(), "8.0.100");
        let toolchain = discover(&ToolchainOverrides {
            dotnet_root: Some(root.path().to_path_buf()),
            compiler: None,
        })
        .unwrap();
        assert_eq!(toolchain.compiler, csc);
        assert_eq!(toolchain.dotnet_root, root.path());
    }

    #[test]
    fn discover_fails_without_sdk() {
        let root = TempDir::new().unwrap();
        let err = discover(&ToolchainOverrides {
            dotnet_root: Some(root.path().to_path_buf()),
            compiler: None,
        })
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::Io { .. }));
    }

    #[test]
    fn registration_is_idempotent() {
        let root = TempDir::new().unwrap();
        fake_sdk(root.path(), "8.0.100");
        let overrides = ToolchainOverrides {
            dotnet_root: Some(root.path().to_path_buf()),
            compiler: None,
        };
        let first = register(&overrides).unwrap();
        let second = register(&ToolchainOverrides::default()).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(registered().is_some());
    }
}
