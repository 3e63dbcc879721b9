//! Native plugin module loading.

use std::path::{Path, PathBuf};

use crate::abi::PluginMain;
use crate::error::{HostError, Result};

/// Entry symbols in resolution order. Old plugins only export `main`.
pub const ENTRY_POINTS: [&str; 2] = ["VSTPluginMain", "main"];

/// A loaded plugin binary and its resolved entry point.
///
/// The library stays mapped for as long as the module lives, so the entry point
/// and every function pointer the plugin hands out remain valid until drop.
pub struct PluginModule {
    path: PathBuf,
    directory: PathBuf,
    entry: PluginMain,
    _library: Option<libloading::Library>,
}

impl PluginModule {
    /// Map the module at `path` and resolve its entry point.
    pub fn load(path: &Path) -> Result<Self> {
        let resolved = resolve_bundle_path(path);

        // SAFETY: loading a plugin runs its static initializers; the user chose this file.
        let library = unsafe { libloading::Library::new(&resolved) }.map_err(|e| {
            HostError::ModuleNotFound {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let entry = resolve_entry(&ENTRY_POINTS, |name| {
            // SAFETY: both entry names share the `PluginMain` signature by ABI contract.
            unsafe { library.get::<PluginMain>(name.as_bytes()) }
                .ok()
                .map(|symbol| *symbol)
        })
        .ok_or_else(|| HostError::EntryPointNotFound {
            path: path.to_path_buf(),
            tried: ENTRY_POINTS.join(", "),
        })?;

        tracing::debug!(path = %resolved.display(), "plugin module mapped");

        Ok(Self {
            path: path.to_path_buf(),
            directory: plugin_directory(path),
            entry,
            _library: Some(library),
        })
    }

    /// Wrap an entry point linked into this binary.
    pub fn from_entry(name: impl Into<PathBuf>, entry: PluginMain) -> Self {
        let path = name.into();
        Self {
            directory: plugin_directory(&path),
            path,
            entry,
            _library: None,
        }
    }

    pub fn entry(&self) -> PluginMain {
        self.entry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the plugin binary (or bundle).
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_static(&self) -> bool {
        self._library.is_none()
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("path", &self.path)
            .field("static", &self.is_static())
            .finish()
    }
}

/// First entry name the lookup resolves, in priority order.
pub(crate) fn resolve_entry<F>(names: &[&str], mut lookup: F) -> Option<PluginMain>
where
    F: FnMut(&str) -> Option<PluginMain>,
{
    names.iter().find_map(|name| lookup(name))
}

/// macOS ships VST2 plugins as `.vst` bundles with the binary at `Contents/MacOS/<stem>`.
fn resolve_bundle_path(path: &Path) -> PathBuf {
    if path.is_dir() && path.extension().and_then(|e| e.to_str()) == Some("vst") {
        if let Some(stem) = path.file_stem() {
            let inner = path.join("Contents").join("MacOS").join(stem);
            if inner.exists() {
                return inner;
            }
        }
    }
    path.to_path_buf()
}

fn plugin_directory(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
