// src/plugins/registry.rs
use std::collections::BTreeMap;

use crate::plugins::official::reference::ReferenceImplementation;
use crate::plugins::traits::Interface;
use crate::utils::error::{HarnessError, Result};

pub type PluginFactory = fn() -> Box<dyn Interface>;

/// Implementations compiled into the harness, looked up by name.
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ReferenceImplementation::NAME, ReferenceImplementation::boxed);
        registry
    }

    pub fn register(&mut self, name: &str, factory: PluginFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Interface>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            HarnessError::Plugin(format!(
                "Unknown implementation '{}', available: {}",
                name,
                self.names().join(", ")
            ))
        })?;
        Ok(factory())
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
