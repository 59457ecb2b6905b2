//! Event schema versioning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer protocol revision carried by every event.
///
/// Producers bump the version when the event shape changes. Newer versions
/// are still decoded, with a warning, so an outdated HUD keeps working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    /// Highest revision this build understands.
    pub const SUPPORTED: SchemaVersion = SchemaVersion(1);

    /// Returns `None` for 0, which is never a valid revision.
    pub const fn new(version: u32) -> Option<Self> {
        if version == 0 {
            None
        } else {
            Some(Self(version))
        }
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns true if this version is newer than what this build supports.
    pub fn is_newer_than_supported(&self) -> bool {
        *self > Self::SUPPORTED
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::SUPPORTED
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_invalid() {
        assert!(SchemaVersion::new(0).is_none());
        assert_eq!(SchemaVersion::new(3).map(|v| v.get()), Some(3));
    }

    #[test]
    fn test_newer_than_supported() {
        assert!(!SchemaVersion::SUPPORTED.is_newer_than_supported());
        assert!(SchemaVersion::new(2).unwrap().is_newer_than_supported());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(SchemaVersion::SUPPORTED.to_string(), "v1");
    }
}
