//! Declared dependencies between extensions.
//!
//! `Plugin-Dependencies` is a semicolon-separated list of `id[version]`
//! tokens. The bracketed part is the minimum acceptable version and defaults
//! to `0` when omitted:
//!
//! ```
//! use ext_runtime::dependency::DependencySpec;
//!
//! let deps = DependencySpec::parse_list("rmx_core_ops[1.0]; rmx_nlp").unwrap();
//! assert_eq!(deps[0].id, "rmx_core_ops");
//! assert_eq!(deps[0].min_version.to_string(), "1.0.0");
//! assert_eq!(deps[1].min_version.to_string(), "0.0.0");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::VersionNumber;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.\-]+)\s*(?:\[\s*([^\]]*?)\s*\])?$")
        .unwrap_or_else(|e| panic!("dependency token pattern is invalid: {e}"))
});

/// An extension identity plus the minimum version that satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencySpec {
    pub id: String,
    pub min_version: VersionNumber,
}

impl DependencySpec {
    pub fn new(id: impl Into<String>, min_version: VersionNumber) -> Self {
        Self {
            id: id.into(),
            min_version,
        }
    }

    /// Parse a single `id[version]` token.
    pub fn parse(token: &str) -> Result<Self> {
        let trimmed = token.trim();
        let caps = TOKEN.captures(trimmed).ok_or_else(|| Error::InvalidDependency {
            token: token.to_string(),
            reason: "expected 'id' or 'id[version]'".to_string(),
        })?;

        let id = caps[1].to_string();
        let min_version = match caps.get(2).map(|m| m.as_str()) {
            Some(raw) if !raw.is_empty() => {
                VersionNumber::parse(raw).map_err(|e| Error::InvalidDependency {
                    token: token.to_string(),
                    reason: e.to_string(),
                })?
            }
            _ => VersionNumber::zero(),
        };

        Ok(Self { id, min_version })
    }

    /// Parse a full `Plugin-Dependencies` value. Empty tokens are skipped.
    pub fn parse_list(value: &str) -> Result<Vec<Self>> {
        value
            .split(';')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Whether `version` of the target identity satisfies this dependency.
    pub fn accepts(&self, version: &VersionNumber) -> bool {
        version >= &self.min_version
    }

    /// Whether some candidate with the target identity satisfies this
    /// dependency. `candidates` yields `(identity, version)` pairs of the
    /// surviving descriptors.
    pub fn is_fulfilled<'a, I>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a VersionNumber)>,
    {
        candidates
            .into_iter()
            .any(|(id, version)| id == self.id && self.accepts(version))
    }
}

impl std::fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.id, self.min_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rmx_text", "rmx_text", "0.0.0")]
    #[case("rmx_text[1.2]", "rmx_text", "1.2.0")]
    #[case(" rmx_text [ 5.3.008 ] ", "rmx_text", "5.3.8")]
    #[case("rmx_text[]", "rmx_text", "0.0.0")]
    #[case("com.acme.text[2.0-beta]", "com.acme.text", "2.0.0-beta")]
    fn test_parse_token(#[case] token: &str, #[case] id: &str, #[case] min: &str) {
        let spec = DependencySpec::parse(token).unwrap();
        assert_eq!(spec.id, id);
        assert_eq!(spec.min_version.to_string(), min);
    }

    #[rstest]
    #[case("")]
    #[case("[1.0]")]
    #[case("rmx_text[1.0")]
    #[case("rmx_text[x.y]")]
    #[case("rmx text")]
    fn test_parse_token_rejects(#[case] token: &str) {
        assert!(DependencySpec::parse(token).is_err(), "{token:?} should be rejected");
    }

    #[test]
    fn test_parse_list_skips_empty_tokens() {
        let deps = DependencySpec::parse_list("a[1.0];;  ; b").unwrap();
        assert_eq!(deps.len(), 2);
        assert!(DependencySpec::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_is_fulfilled() {
        let spec = DependencySpec::parse("c[2.0]").unwrap();
        let low = VersionNumber::parse("1.0").unwrap();
        let high = VersionNumber::parse("2.0.1").unwrap();

        assert!(!spec.is_fulfilled([("c", &low)]));
        assert!(!spec.is_fulfilled([("d", &high)]));
        assert!(spec.is_fulfilled([("c", &low), ("c", &high)]));
        assert!(!spec.is_fulfilled(std::iter::empty()));
    }

    #[test]
    fn test_display() {
        let spec = DependencySpec::parse("rmx_nlp").unwrap();
        assert_eq!(spec.to_string(), "rmx_nlp[0.0.0]");
    }
}
