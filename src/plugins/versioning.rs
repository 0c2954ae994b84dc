// src/plugins/versioning.rs
use semver::{Version, VersionReq};
use tracing::debug;

use crate::plugins::types::PluginMetadata;
use crate::utils::error::{HarnessError, Result};

/// Interface version this harness was compiled with.
pub const API_VERSION: &str = "1.0.0";
/// Shared data-structure version this harness was compiled with.
pub const STRUCTS_VERSION: &str = "1.0.0";

/// Compares the harness's interface versions against the versions an
/// implementation reports. Compatible means equal major and minor.
#[derive(Debug, Clone)]
pub struct VersionManager {
    api: Version,
    structs: Version,
}

impl VersionManager {
    pub fn new() -> Result<Self> {
        Ok(Self::with_versions(
            Version::parse(API_VERSION)?,
            Version::parse(STRUCTS_VERSION)?,
        ))
    }

    pub fn with_versions(api: Version, structs: Version) -> Self {
        Self { api, structs }
    }

    pub fn check_compatibility(&self, metadata: &PluginMetadata) -> Result<()> {
        check("API", &self.api, &metadata.api_version)?;
        check("Structs", &self.structs, &metadata.structs_version)?;
        debug!(
            plugin = %metadata.name,
            api = %metadata.api_version,
            structs = %metadata.structs_version,
            "Implementation version accepted"
        );
        Ok(())
    }
}

fn check(component: &'static str, expected: &Version, found: &str) -> Result<()> {
    let found_version = Version::parse(found)?;
    let requirement = VersionReq::parse(&format!("={}.{}", expected.major, expected.minor))?;

    if !requirement.matches(&found_version) {
        return Err(HarnessError::VersionMismatch {
            component,
            expected: format!("{}.{}", expected.major, expected.minor),
            found: format!("{}.{}", found_version.major, found_version.minor),
        });
    }
    Ok(())
}
