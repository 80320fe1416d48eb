//! Blacklist and whitelist policy.
//!
//! The blacklist forbids version intervals of an identity (or the whole
//! identity). The whitelist restricts which identities may load at all and
//! distinguishes three categories:
//!
//! - **packaged** identities are always allowed by the whitelist
//! - **shipped** identities are allowed when explicitly listed, or when the
//!   `shipped` token is set and the archive is properly signed
//! - every other identity must be explicitly listed
//!
//! The blacklist applies to every category.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result};
use crate::signature::{SecurityPolicy, TrustedSigners};
use crate::version::VersionNumber;

/// Whitelist token allowing packaged extensions only.
pub const TOKEN_NONE: &str = "none";
/// Whitelist token allowing every signed shipped extension.
pub const TOKEN_SHIPPED: &str = "shipped";

static BLACKLIST_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.\-]+)\s*(?:\[([^\]]*)\])?$")
        .unwrap_or_else(|e| panic!("blacklist entry pattern is invalid: {e}"))
});

/// Forbidden versions of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlacklistRange {
    /// Every version is forbidden.
    Total,
    /// Versions within the inclusive bounds are forbidden. A missing bound is
    /// unbounded on that side.
    Bounded {
        lower: Option<VersionNumber>,
        upper: Option<VersionNumber>,
    },
}

impl BlacklistRange {
    pub fn contains(&self, version: &VersionNumber) -> bool {
        match self {
            Self::Total => true,
            Self::Bounded { lower, upper } => version.is_within(lower.as_ref(), upper.as_ref()),
        }
    }
}

impl fmt::Display for BlacklistRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Total => f.write_str("all versions"),
            Self::Bounded { lower, upper } => {
                let side = |b: &Option<VersionNumber>| b.as_ref().map(ToString::to_string);
                write!(
                    f,
                    "[{}, {}]",
                    side(lower).unwrap_or_else(|| "*".to_string()),
                    side(upper).unwrap_or_else(|| "*".to_string())
                )
            }
        }
    }
}

/// Identity to forbidden range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    entries: BTreeMap<String, BlacklistRange>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, range: BlacklistRange) {
        self.entries.insert(id.into(), range);
    }

    /// Parse the compact admin form `id; id[lower,upper]; id[,upper]`.
    ///
    /// A bare identity bans every version. Either bound may be left empty.
    pub fn parse(value: &str) -> Result<Self> {
        let mut blacklist = Self::new();
        for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = |reason: &str| Error::InvalidBlacklist {
                entry: entry.to_string(),
                reason: reason.to_string(),
            };
            let caps = BLACKLIST_ENTRY
                .captures(entry)
                .ok_or_else(|| invalid("expected 'id' or 'id[lower,upper]'"))?;

            let range = match caps.get(2) {
                None => BlacklistRange::Total,
                Some(bounds) => {
                    let (lower, upper) = bounds
                        .as_str()
                        .split_once(',')
                        .ok_or_else(|| invalid("expected '[lower,upper]'"))?;
                    BlacklistRange::Bounded {
                        lower: parse_bound(lower).map_err(|e| invalid(&e.to_string()))?,
                        upper: parse_bound(upper).map_err(|e| invalid(&e.to_string()))?,
                    }
                }
            };
            blacklist.insert(&caps[1], range);
        }
        Ok(blacklist)
    }

    pub fn get(&self, id: &str) -> Option<&BlacklistRange> {
        self.entries.get(id)
    }

    pub fn is_blacklisted(&self, id: &str, version: &VersionNumber) -> bool {
        self.entries.get(id).is_some_and(|range| range.contains(version))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_bound(raw: &str) -> Result<Option<VersionNumber>> {
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(None)
    } else {
        VersionNumber::parse(raw).map(Some)
    }
}

/// The admin whitelist setting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    listed: BTreeSet<String>,
    allow_shipped: bool,
}

impl Whitelist {
    /// Parse a comma-separated whitelist.
    ///
    /// `none` short-circuits to "packaged only" and ignores the rest of the
    /// list. `shipped` enables every signed shipped extension. Anything else
    /// is an explicit identity.
    pub fn parse(value: &str) -> Self {
        let mut whitelist = Self::default();
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token.eq_ignore_ascii_case(TOKEN_NONE) {
                return Self::packaged_only();
            }
            if token.eq_ignore_ascii_case(TOKEN_SHIPPED) {
                whitelist.allow_shipped = true;
            } else {
                whitelist.listed.insert(token.to_string());
            }
        }
        whitelist
    }

    pub fn packaged_only() -> Self {
        Self::default()
    }

    pub fn with_listed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listed.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_shipped(mut self, allow: bool) -> Self {
        self.allow_shipped = allow;
        self
    }

    pub fn is_listed(&self, id: &str) -> bool {
        self.listed.contains(id)
    }

    pub fn allows_shipped(&self) -> bool {
        self.allow_shipped
    }
}

/// Trust tier of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Packaged,
    Shipped,
    Other,
}

/// Why the policy refused a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRejection {
    Blacklisted,
    NotWhitelisted,
    Unsigned,
}

impl fmt::Display for PolicyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Blacklisted => "version is blacklisted",
            Self::NotWhitelisted => "not whitelisted",
            Self::Unsigned => "shipped extension is not properly signed",
        })
    }
}

/// Combined blacklist, whitelist and category policy.
#[derive(Clone)]
pub struct PolicyFilter {
    blacklist: Blacklist,
    whitelist: Option<Whitelist>,
    packaged: BTreeSet<String>,
    shipped: BTreeSet<String>,
    security: Arc<dyn SecurityPolicy>,
}

impl Default for PolicyFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyFilter {
    /// A filter that allows everything.
    pub fn new() -> Self {
        Self {
            blacklist: Blacklist::new(),
            whitelist: None,
            packaged: BTreeSet::new(),
            shipped: BTreeSet::new(),
            security: Arc::new(TrustedSigners::default()),
        }
    }

    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn with_whitelist(mut self, whitelist: Option<Whitelist>) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn with_packaged<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packaged.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_shipped<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shipped.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_security_policy(mut self, security: Arc<dyn SecurityPolicy>) -> Self {
        self.security = security;
        self
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn whitelist(&self) -> Option<&Whitelist> {
        self.whitelist.as_ref()
    }

    pub fn category(&self, id: &str) -> Category {
        if self.packaged.contains(id) {
            Category::Packaged
        } else if self.shipped.contains(id) {
            Category::Shipped
        } else {
            Category::Other
        }
    }

    pub fn is_blacklisted(&self, id: &str, version: &VersionNumber) -> bool {
        self.blacklist.is_blacklisted(id, version)
    }

    pub fn is_allowed(&self, descriptor: &ExtensionDescriptor) -> bool {
        self.check(descriptor).is_ok()
    }

    /// Evaluate `descriptor`, returning the first reason it is refused.
    pub fn check(&self, descriptor: &ExtensionDescriptor) -> std::result::Result<(), PolicyRejection> {
        let id = descriptor.id();
        if self.is_blacklisted(id, descriptor.version()) {
            return Err(PolicyRejection::Blacklisted);
        }

        let Some(whitelist) = &self.whitelist else {
            return Ok(());
        };
        if whitelist.is_listed(id) {
            return Ok(());
        }
        match self.category(id) {
            Category::Packaged => Ok(()),
            Category::Shipped if whitelist.allows_shipped() => {
                if descriptor.is_signed(self.security.as_ref()) {
                    Ok(())
                } else {
                    Err(PolicyRejection::Unsigned)
                }
            }
            Category::Shipped | Category::Other => Err(PolicyRejection::NotWhitelisted),
        }
    }
}

impl fmt::Debug for PolicyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyFilter")
            .field("blacklist", &self.blacklist)
            .field("whitelist", &self.whitelist)
            .field("packaged", &self.packaged)
            .field("shipped", &self.shipped)
            .finish_non_exhaustive()
    }
}
