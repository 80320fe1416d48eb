//! Version numbers for extensions and the host.
//!
//! Extension manifests carry versions such as `5.3.008`, `7.1` or
//! `1.0.0-beta.2`, and `Implementation-Version` may be empty. Those are not
//! all valid semver, so [`VersionNumber`] parses them leniently:
//!
//! - up to three numeric components, missing ones default to `0`
//! - leading zeros are allowed (`5.3.008` is `5.3.8`)
//! - an optional `-prerelease` tag ordered by semver precedence
//! - an empty string is `0.0.0`
//!
//! Ordering is lexicographic on `(major, minor, patch)`, then a release
//! sorts above every pre-release of the same triple.
//!
//! ```
//! use ext_runtime::version::VersionNumber;
//!
//! let release = VersionNumber::parse("1.2").unwrap();
//! let beta = VersionNumber::parse("1.2.0-beta").unwrap();
//! assert!(release > beta);
//! assert_eq!(release.to_string(), "1.2.0");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A totally ordered `major.minor.patch[-prerelease]` version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionNumber {
    major: u64,
    minor: u64,
    patch: u64,
    pre: semver::Prerelease,
}

impl VersionNumber {
    /// A release version with no pre-release tag.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: semver::Prerelease::EMPTY,
        }
    }

    /// `0.0.0`, the version assumed when none is declared.
    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Parse a version string.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::zero());
        }

        let (numbers, pre) = match trimmed.split_once('-') {
            Some((numbers, pre)) => (numbers, Some(pre)),
            None => (trimmed, None),
        };

        let invalid = |reason: &str| Error::InvalidVersion {
            version: input.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() > 3 {
            return Err(invalid("more than three numeric components"));
        }

        let mut triple = [0u64; 3];
        for (slot, part) in triple.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("components must be non-empty decimal numbers"));
            }
            *slot = part
                .parse()
                .map_err(|_| invalid("numeric component out of range"))?;
        }

        let pre = match pre {
            Some(tag) => semver::Prerelease::new(tag)
                .map_err(|e| invalid(&format!("bad pre-release tag: {e}")))?,
            None => semver::Prerelease::EMPTY,
        };
        if pre.is_empty() && trimmed.ends_with('-') {
            return Err(invalid("empty pre-release tag"));
        }

        Ok(Self {
            major: triple[0],
            minor: triple[1],
            patch: triple[2],
            pre,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// The pre-release tag, if any.
    pub fn pre_release(&self) -> Option<&str> {
        if self.pre.is_empty() {
            None
        } else {
            Some(self.pre.as_str())
        }
    }

    pub fn is_pre_release(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Whether this version lies within `[lower, upper]`, an absent bound
    /// being unbounded on that side.
    pub fn is_within(&self, lower: Option<&VersionNumber>, upper: Option<&VersionNumber>) -> bool {
        lower.is_none_or(|lo| self >= lo) && upper.is_none_or(|hi| self <= hi)
    }
}

impl Default for VersionNumber {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        Ok(())
    }
}

impl FromStr for VersionNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(s: &str) -> VersionNumber {
        VersionNumber::parse(s).unwrap()
    }

    #[rstest]
    #[case("1.2.3", (1, 2, 3), None)]
    #[case("5.3.008", (5, 3, 8), None)]
    #[case("7.1", (7, 1, 0), None)]
    #[case("2", (2, 0, 0), None)]
    #[case("", (0, 0, 0), None)]
    #[case("  0.0.000 ", (0, 0, 0), None)]
    #[case("1.0.0-beta.2", (1, 0, 0), Some("beta.2"))]
    #[case("9.10-SNAPSHOT", (9, 10, 0), Some("SNAPSHOT"))]
    fn test_parse(#[case] input: &str, #[case] triple: (u64, u64, u64), #[case] pre: Option<&str>) {
        let parsed = v(input);
        assert_eq!((parsed.major(), parsed.minor(), parsed.patch()), triple);
        assert_eq!(parsed.pre_release(), pre);
    }

    #[rstest]
    #[case("1.2.3.4")]
    #[case("1..2")]
    #[case("a.b.c")]
    #[case("1.2.x")]
    #[case("1.0-")]
    #[case("1.0-beta..1")]
    #[case("-1.0")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(VersionNumber::parse(input).is_err(), "{input} should be rejected");
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0") > v("1.99.99"));
        assert!(v("1.2.1") > v("1.2"));
        assert_eq!(v("1.2").cmp(&v("1.2.000")), Ordering::Equal);
    }

    #[test]
    fn test_release_beats_pre_release() {
        assert!(v("1.0.0") > v("1.0.0-rc.1"));
        assert!(v("1.0.0-rc.1") > v("1.0.0-beta"));
        assert!(v("1.0.0-beta.11") > v("1.0.0-beta.2"));
        assert!(v("1.0.1-alpha") > v("1.0.0"));
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(v("5.3.008").to_string(), "5.3.8");
        assert_eq!(v("1-rc.1").to_string(), "1.0.0-rc.1");
    }

    #[test]
    fn test_is_within() {
        let lo = v("1.0");
        let hi = v("1.2");
        assert!(v("1.1").is_within(Some(&lo), Some(&hi)));
        assert!(v("1.2").is_within(Some(&lo), Some(&hi)));
        assert!(!v("1.2.1").is_within(Some(&lo), Some(&hi)));
        assert!(v("0.1").is_within(None, Some(&hi)));
        assert!(v("99.0").is_within(Some(&lo), None));
        assert!(v("3.0").is_within(None, None));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("1.2-beta")).unwrap();
        assert_eq!(json, "\"1.2.0-beta\"");
        let back: VersionNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.2-beta"));
    }
}
