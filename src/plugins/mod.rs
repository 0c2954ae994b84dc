//! Plugin contract, loading, and version checks

pub mod loader;
pub mod manager;
pub mod official;
pub mod registry;
pub mod traits;
pub mod types;
pub mod versioning;

pub use manager::{PluginManager, PluginSource};
pub use registry::PluginRegistry;
pub use traits::{CreatePluginFn, Interface};
pub use types::{
    ComparisonResult, MorphResult, PluginMetadata, QualityResult, SearchResult, TemplateResult,
};
pub use versioning::VersionManager;
