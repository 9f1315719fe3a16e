//! Retention policy for local artifacts

use crate::error::VersionParseError;
use crate::version::compare_versions;

/// Decides whether a downloaded artifact is older than (or equal to) what the
/// device already runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Whether obsolete artifacts are pruned at all
    pub enabled: bool,
}

impl RetentionPolicy {
    /// Create a policy
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// See [`is_obsolete`]
    pub fn is_obsolete(
        &self,
        local_version: &str,
        installed_version: &str,
    ) -> Result<bool, VersionParseError> {
        is_obsolete(local_version, installed_version, self.enabled)
    }
}

/// Whether a local artifact's version is not newer than the installed version
///
/// A disabled policy never reads the versions, so malformed names are only an
/// error when pruning is enabled.
pub fn is_obsolete(
    local_version: &str,
    installed_version: &str,
    policy_enabled: bool,
) -> Result<bool, VersionParseError> {
    if !policy_enabled {
        return Ok(false);
    }
    Ok(compare_versions(local_version, installed_version)? <= 0)
}
