//! Product versions and the generation behaviors they gate.
//!
//! Migrations are historical artifacts: regenerating the SQL of a migration
//! authored with an older tool must produce the DDL that tool produced. The
//! model records the version that authored it, and each gate below switches
//! a behavior on from the version that introduced it.

use std::cmp::Ordering;

/// A behavior that changed at a specific product version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGate {
    pub name: &'static str,
    /// First version with the current behavior.
    pub introduced_in: &'static str,
}

/// `AlterColumn` carries the previous column definition, so narrowing can be
/// detected.
pub const OLD_COLUMN_SUPPORT: VersionGate = VersionGate {
    name: "old-column-support",
    introduced_in: "2.0.0",
};

/// A missing new schema in a rename means "the default schema" rather than
/// "unchanged".
pub const SCHEMA_AWARE_RENAME: VersionGate = VersionGate {
    name: "schema-aware-rename",
    introduced_in: "2.1.0",
};

pub const GATES: &[VersionGate] = &[OLD_COLUMN_SUPPORT, SCHEMA_AWARE_RENAME];

impl VersionGate {
    /// Returns true when a model authored by `version` has this behavior.
    /// Models without a recorded version get the current behavior.
    #[must_use]
    pub fn is_enabled(&self, version: Option<&str>) -> bool {
        version.map_or(true, |v| compare_versions(v, self.introduced_in) != Ordering::Less)
    }
}

/// The behavior switches for one generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compatibility {
    pub old_column_supported: bool,
    pub legacy_rename: bool,
}

impl Compatibility {
    #[must_use]
    pub fn for_version(version: Option<&str>) -> Self {
        Self {
            old_column_supported: OLD_COLUMN_SUPPORT.is_enabled(version),
            legacy_rename: !SCHEMA_AWARE_RENAME.is_enabled(version),
        }
    }
}

impl Default for Compatibility {
    fn default() -> Self {
        Self::for_version(None)
    }
}

/// Compares two dotted versions by their numeric components.
///
/// Anything after the first `-` or `+` is a pre-release or build suffix and
/// is ignored, so `2.1.0-preview1` equals `2.1.0`. Missing components count
/// as zero and non-numeric components compare as zero.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = components(a);
    let b = components(b);
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn components(version: &str) -> Vec<u64> {
    let core = version
        .trim()
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    core.split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_is_numeric() {
        assert_eq!(compare_versions("2.10.0", "2.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.1", "2.1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.1.6", "2.0.0"), Ordering::Less);
    }

    #[test]
    fn test_prerelease_suffix_is_ignored() {
        assert_eq!(compare_versions("2.1.0-preview1-final", "2.1.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.0.3+build.7", "2.0.3"), Ordering::Equal);
    }

    #[test]
    fn test_gates() {
        let old = Compatibility::for_version(Some("1.1.6"));
        assert!(!old.old_column_supported);
        assert!(old.legacy_rename);

        let mid = Compatibility::for_version(Some("2.0.1"));
        assert!(mid.old_column_supported);
        assert!(mid.legacy_rename);

        let current = Compatibility::for_version(None);
        assert!(current.old_column_supported);
        assert!(!current.legacy_rename);
        assert_eq!(current, Compatibility::for_version(Some("2.1.0-rc1")));
    }
}
