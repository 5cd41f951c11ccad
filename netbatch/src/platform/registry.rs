//! Registry of platform definitions keyed by `<vendor>_<platform>`.

use std::sync::Arc;

use indexmap::IndexMap;

use super::definition::PlatformDefinition;
use super::vendors;
use crate::error::{PlatformError, Result};

/// Registry for platform definitions.
///
/// Built once before a run and shared read-only by every worker.
#[derive(Debug, Default, Clone)]
pub struct PlatformRegistry {
    platforms: IndexMap<String, Arc<PlatformDefinition>>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            platforms: IndexMap::new(),
        }
    }

    /// Create a registry holding the built-in drivers.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for platform in vendors::builtin()? {
            registry.register(platform)?;
        }
        Ok(registry)
    }

    /// Register a platform definition.
    pub fn register(&mut self, platform: PlatformDefinition) -> Result<()> {
        if self.platforms.contains_key(&platform.name) {
            return Err(PlatformError::AlreadyRegistered {
                name: platform.name.clone(),
            }
            .into());
        }
        self.platforms.insert(platform.name.clone(), Arc::new(platform));
        Ok(())
    }

    /// Get a platform by name.
    pub fn get(&self, name: &str) -> Option<&Arc<PlatformDefinition>> {
        self.platforms.get(name)
    }

    /// Look up the driver for a vendor/platform pair.
    pub fn resolve(&self, vendor: &str, platform: &str) -> Option<&Arc<PlatformDefinition>> {
        self.get(&platform_key(vendor, platform))
    }

    /// Check if a platform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains_key(name)
    }

    /// List all registered platform names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }
}

/// Registry key for a vendor/platform pair.
pub fn platform_key(vendor: &str, platform: &str) -> String {
    format!("{}_{}", vendor.trim().to_lowercase(), platform.trim().to_lowercase())
}
