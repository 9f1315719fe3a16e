//! Platform property access
//!
//! The device name and installed version come from platform properties. The
//! orchestrator only sees the [`PlatformInfo`] trait; how a property is read is
//! up to the implementation.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::process::Command;

/// Value returned by [`installed_version`] when the property is empty
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Read-only access to named platform properties
///
/// # Examples
///
/// ```
/// use update_stager::platform::{PlatformInfo, StaticPlatform};
///
/// # #[tokio::main]
/// # async fn main() {
/// let platform = StaticPlatform::new().with("ro.product.device", "mako");
/// assert_eq!(platform.get_property("ro.product.device", "").await, "mako");
/// assert_eq!(platform.get_property("ro.missing", "fallback").await, "fallback");
/// # }
/// ```
#[async_trait]
pub trait PlatformInfo: Send + Sync {
    /// Value of `name`, or `default` when the property is unset or unreadable
    async fn get_property(&self, name: &str, default: &str) -> String;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}

/// Reads properties through the platform `getprop` tool
pub struct GetpropPlatform {
    binary_path: PathBuf,
}

impl GetpropPlatform {
    /// Create a reader with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `getprop` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("getprop").ok().map(Self::new)
    }
}

#[async_trait]
impl PlatformInfo for GetpropPlatform {
    async fn get_property(&self, name: &str, default: &str) -> String {
        let output = match Command::new(&self.binary_path).arg(name).output().await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(property = name, error = %e, "getprop failed, using default");
                return default.to_string();
            }
        };

        if !output.status.success() {
            return default.to_string();
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    }

    fn name(&self) -> &'static str {
        "getprop"
    }
}

/// Fixed property map, for hosts without a property service and for tests
#[derive(Clone, Debug, Default)]
pub struct StaticPlatform {
    properties: HashMap<String, String>,
}

impl StaticPlatform {
    /// Empty property map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl PlatformInfo for StaticPlatform {
    async fn get_property(&self, name: &str, default: &str) -> String {
        self.properties
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

fn build_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"([0-9.]+?)-.+").expect("static version regex is valid")
    })
}

/// Installed version with any `-<suffix>` build tag removed
///
/// Returns [`UNKNOWN_VERSION`] when the property is empty.
pub async fn installed_version(platform: &dyn PlatformInfo, property: &str) -> String {
    let raw = platform.get_property(property, "").await;
    let version = build_suffix_pattern().replace(&raw, "$1");
    if version.is_empty() {
        UNKNOWN_VERSION.to_string()
    } else {
        version.into_owned()
    }
}

/// Device (board) name, empty when unknown
pub async fn device_name(platform: &dyn PlatformInfo, property: &str) -> String {
    platform.get_property(property, "").await
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn installed_version_strips_build_suffix() {
        let platform = StaticPlatform::new().with("ro.modversion", "10.2.0-RC1-mako");
        assert_eq!(installed_version(&platform, "ro.modversion").await, "10.2.0");
    }

    #[tokio::test]
    async fn installed_version_keeps_plain_versions() {
        let platform = StaticPlatform::new().with("ro.modversion", "10.2.0");
        assert_eq!(installed_version(&platform, "ro.modversion").await, "10.2.0");
    }

    #[tokio::test]
    async fn installed_version_leaves_non_numeric_prefix_alone() {
        // Only a numeric head followed by a dash is rewritten
        let platform = StaticPlatform::new().with("ro.modversion", "cm-10.2.0");
        assert_eq!(
            installed_version(&platform, "ro.modversion").await,
            "cm-10.2.0"
        );
    }

    #[tokio::test]
    async fn missing_version_is_unknown() {
        let platform = StaticPlatform::new();
        assert_eq!(
            installed_version(&platform, "ro.modversion").await,
            UNKNOWN_VERSION
        );
    }

    #[tokio::test]
    async fn getprop_with_missing_binary_falls_back_to_default() {
        let platform = GetpropPlatform::new(PathBuf::from("/nonexistent/getprop-xyz"));
        assert_eq!(
            platform.get_property("ro.product.device", "generic").await,
            "generic"
        );
    }

    #[test]
    fn from_path_is_consistent_with_which() {
        assert_eq!(
            GetpropPlatform::from_path().is_some(),
            which::which("getprop").is_ok()
        );
    }
}
