// src/plugins/manager.rs
use libloading::Library;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::core::{ReturnStatus, Role};
use crate::plugins::loader::PluginLoader;
use crate::plugins::registry::PluginRegistry;
use crate::plugins::traits::Interface;
use crate::plugins::types::PluginMetadata;
use crate::plugins::versioning::VersionManager;
use crate::utils::error::{HarnessError, Result};

/// Where an implementation comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    Builtin(String),
    Library(PathBuf),
}

/// Owns the implementation under test for the lifetime of one invocation.
///
/// `initialize` may run once. Workers forked afterwards inherit the
/// initialized instance and only issue per-item calls.
pub struct PluginManager {
    // Declared before `library` so the implementation drops first.
    plugin: Box<dyn Interface>,
    initialized: Option<Role>,
    library: Option<Library>,
}

impl PluginManager {
    pub fn load(source: &PluginSource, registry: &PluginRegistry) -> Result<Self> {
        match source {
            PluginSource::Builtin(name) => Ok(Self::from_instance(registry.create(name)?)),
            PluginSource::Library(path) => {
                let (plugin, library) = PluginLoader::load(path)?;
                Ok(Self {
                    plugin,
                    initialized: None,
                    library: Some(library),
                })
            }
        }
    }

    pub fn from_instance(plugin: Box<dyn Interface>) -> Self {
        Self {
            plugin,
            initialized: None,
            library: None,
        }
    }

    pub fn metadata(&self) -> PluginMetadata {
        self.plugin.metadata()
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    pub fn check_version(&self, versions: &VersionManager) -> Result<()> {
        let metadata = self.metadata();
        versions.check_compatibility(&metadata).map_err(|e| {
            error!(plugin = %metadata.name, "{}", e);
            e
        })
    }

    pub fn initialize(&mut self, config_dir: &Path, role: Role) -> Result<ReturnStatus> {
        if let Some(previous) = self.initialized {
            return Err(HarnessError::Plugin(format!(
                "Implementation already initialized for {:?}",
                previous
            )));
        }

        let status = self.plugin.initialize(config_dir, role);
        self.initialized = Some(role);
        info!(role = ?role, status = %status, "initialize() returned");
        Ok(status)
    }

    pub fn initialized_role(&self) -> Option<Role> {
        self.initialized
    }

    pub fn implementation(&self) -> &dyn Interface {
        self.plugin.as_ref()
    }

    pub fn implementation_mut(&mut self) -> &mut dyn Interface {
        self.plugin.as_mut()
    }
}
