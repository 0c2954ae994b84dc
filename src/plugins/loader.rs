// src/plugins/loader.rs
use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::plugins::traits::{CreatePluginFn, Interface};
use crate::utils::error::{HarnessError, Result};

const LIBRARY_EXTENSIONS: [&str; 3] = ["so", "dylib", "dll"];

pub struct PluginLoader;

impl PluginLoader {
    /// Loads an implementation from a shared library, or from the single
    /// shared library inside a directory.
    ///
    /// The returned `Library` must outlive the implementation.
    pub fn load(path: &Path) -> Result<(Box<dyn Interface>, Library)> {
        let path = Self::resolve(path)?;
        info!(library = %path.display(), "Loading implementation library");

        // SAFETY: the library is trusted to export `_create_plugin` with the
        // `CreatePluginFn` signature, built against this crate's interface.
        unsafe {
            let library = Library::new(&path)?;
            let plugin = {
                let create_plugin: Symbol<CreatePluginFn> = library.get(b"_create_plugin")?;
                create_plugin()
            };
            Ok((plugin, library))
        }
    }

    fn resolve(path: &Path) -> Result<PathBuf> {
        if !path.is_dir() {
            return Ok(path.to_path_buf());
        }

        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let candidate = entry?.path();
            let is_library = candidate
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| LIBRARY_EXTENSIONS.contains(&ext));
            if is_library {
                candidates.push(candidate);
            }
        }

        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => Err(HarnessError::Plugin(format!(
                "No implementation library found in {}",
                path.display()
            ))),
            n => Err(HarnessError::Plugin(format!(
                "Expected exactly one implementation library in {}, found {}",
                path.display(),
                n
            ))),
        }
    }
}
