//! Runtime settings.
//!
//! Loaded through [`ConfigStore`], so the file may be TOML, JSON or YAML:
//!
//! ```toml
//! host_version = "9.10.0"
//! whitelist = "shipped, rmx_extra"
//! packaged = ["rmx_core_ops"]
//! shipped = ["rmx_text", "rmx_web"]
//! trusted_signers = ["Acme Extensions"]
//! scan = ["~/.host/extensions"]
//! managed_root = "~/.host/managed"
//!
//! [blacklist]
//! rmx_web = { max = "1.2" }
//! rmx_old = {}
//! ```
//!
//! `blacklist` may also be the compact admin string `"rmx_web[,1.2]; rmx_old"`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ext_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::{Blacklist, BlacklistRange, PolicyFilter, Whitelist};
use crate::signature::TrustedSigners;
use crate::version::VersionNumber;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    /// Version of the running host. Absent disables the host version check.
    pub host_version: Option<VersionNumber>,
    /// Skip GUI hooks.
    pub headless: bool,
    /// Admin whitelist string. Absent means no whitelist.
    pub whitelist: Option<String>,
    pub packaged: Vec<String>,
    pub shipped: Vec<String>,
    pub trusted_signers: Vec<String>,
    pub blacklist: BlacklistSetting,
    /// Directories scanned for `.ext` archives, in order.
    pub scan: Vec<String>,
    pub managed_root: Option<String>,
}

/// Either form of the blacklist setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlacklistSetting {
    Compact(String),
    Table(BTreeMap<String, BlacklistBounds>),
}

impl Default for BlacklistSetting {
    fn default() -> Self {
        Self::Table(BTreeMap::new())
    }
}

/// Inclusive bounds of one blacklist table entry. `{}` bans every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlacklistBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<VersionNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<VersionNumber>,
}

impl RuntimeSettings {
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        Ok(ConfigStore::new().load(path)?)
    }

    /// Load settings, falling back to defaults when the file is missing.
    pub fn load_or_default(path: &NormalizedPath) -> Result<Self> {
        Ok(ConfigStore::new().load_or_default(path)?)
    }

    pub fn save(&self, path: &NormalizedPath) -> Result<()> {
        Ok(ConfigStore::new().save(path, self)?)
    }

    pub fn blacklist(&self) -> Result<Blacklist> {
        match &self.blacklist {
            BlacklistSetting::Compact(value) => Blacklist::parse(value),
            BlacklistSetting::Table(entries) => {
                let mut blacklist = Blacklist::new();
                for (id, bounds) in entries {
                    let range = match (&bounds.min, &bounds.max) {
                        (None, None) => BlacklistRange::Total,
                        (lower, upper) => BlacklistRange::Bounded {
                            lower: lower.clone(),
                            upper: upper.clone(),
                        },
                    };
                    blacklist.insert(id.clone(), range);
                }
                Ok(blacklist)
            }
        }
    }

    pub fn whitelist(&self) -> Option<Whitelist> {
        self.whitelist.as_deref().map(Whitelist::parse)
    }

    pub fn policy_filter(&self) -> Result<PolicyFilter> {
        let whitelist = self.whitelist();
        let signers = TrustedSigners::new(self.trusted_signers.iter().map(|s| s.trim()));
        if signers.is_empty() && whitelist.as_ref().is_some_and(Whitelist::allows_shipped) {
            tracing::warn!("whitelist allows shipped extensions but no trusted signers are configured");
        }
        Ok(PolicyFilter::new()
            .with_blacklist(self.blacklist()?)
            .with_whitelist(whitelist)
            .with_packaged(self.packaged.iter().cloned())
            .with_shipped(self.shipped.iter().cloned())
            .with_security_policy(Arc::new(signers)))
    }

    pub fn scan_roots(&self) -> Vec<NormalizedPath> {
        self.scan.iter().map(NormalizedPath::new).collect()
    }

    pub fn managed_root(&self) -> Option<NormalizedPath> {
        self.managed_root.as_ref().map(NormalizedPath::new)
    }

    /// Replace a leading `~` in every configured path with `home`.
    pub fn expand_home(&mut self, home: &Path) {
        let expand = |value: &mut String| {
            if value == "~" {
                *value = home.to_string_lossy().into_owned();
            } else if let Some(rest) = value.strip_prefix("~/") {
                *value = home.join(rest).to_string_lossy().into_owned();
            }
        };
        self.scan.iter_mut().for_each(&expand);
        if let Some(root) = self.managed_root.as_mut() {
            expand(root);
        }
    }
}
