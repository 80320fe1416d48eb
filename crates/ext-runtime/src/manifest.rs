//! Archive manifest parsing.
//!
//! Every extension archive carries `META-INF/MANIFEST.MF`, a list of
//! `Key: Value` attributes:
//!
//! ```text
//! Implementation-Title: Text Processing
//! Implementation-Version: 1.2.0
//! Extension-ID: rmx_text
//! Initialization-Class: com.acme.text.TextInit
//! RapidMiner-Version: 9.0
//! Plugin-Dependencies: rmx_core_ops[1.0];rmx_nlp
//! Operator-Descriptor: /com/acme/text/Operators.txt
//! Error-Descriptor: com.acme.text.i18n.Errors
//! ```
//!
//! A line starting with a single space continues the previous value. The main
//! section ends at the first blank line; per-entry sections after it are
//! ignored.

use std::collections::BTreeMap;

use ext_fs::normalize_resource_name;
use serde::{Deserialize, Serialize};

/// Location of the manifest inside an archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Attribute keys read from the manifest.
pub mod attr {
    pub const TITLE: &str = "Implementation-Title";
    pub const VERSION: &str = "Implementation-Version";
    pub const VENDOR: &str = "Implementation-Vendor";
    pub const URL: &str = "Implementation-URL";
    pub const EXTENSION_ID: &str = "Extension-ID";
    pub const INITIALIZER: &str = "Initialization-Class";
    pub const HOST_VERSION: &str = "RapidMiner-Version";
    pub const DEPENDENCIES: &str = "Plugin-Dependencies";
}

/// Required host version assumed when the manifest does not declare one.
pub const DEFAULT_HOST_VERSION: &str = "0.0.000";

/// The parsed main section of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest text. The error string describes the offending line.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut attributes = BTreeMap::new();
        let mut current: Option<(String, String)> = None;

        for (index, raw_line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            if line.is_empty() {
                if current.is_some() || !attributes.is_empty() {
                    break;
                }
                continue;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                match current.as_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => {
                        return Err(format!(
                            "line {line_no}: continuation line without a preceding attribute"
                        ));
                    }
                }
                continue;
            }

            if let Some((key, value)) = current.take() {
                attributes.insert(key, value);
            }

            let Some((key, value)) = line.split_once(':') else {
                return Err(format!("line {line_no}: expected 'Key: Value'"));
            };
            let key = key.trim();
            if key.is_empty()
                || !key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(format!("line {line_no}: invalid attribute name '{key}'"));
            }
            let value = value.strip_prefix(' ').unwrap_or(value);
            current = Some((key.to_string(), value.to_string()));
        }

        if let Some((key, value)) = current {
            attributes.insert(key, value);
        }

        Ok(Self { attributes })
    }

    /// Raw attribute value, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Trimmed attribute value, `None` when absent or blank.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// The kinds of resource handle an extension may declare.
///
/// The runtime does not interpret most of these; it only makes sure they
/// exist in the archive and hands them to the host registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Operators,
    IoObjects,
    ParseRules,
    Groups,
    Errors,
    UserErrors,
    Gui,
    Settings,
    SettingsStructure,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Operators,
        ResourceKind::IoObjects,
        ResourceKind::ParseRules,
        ResourceKind::Groups,
        ResourceKind::Errors,
        ResourceKind::UserErrors,
        ResourceKind::Gui,
        ResourceKind::Settings,
        ResourceKind::SettingsStructure,
    ];

    /// Manifest attribute declaring this handle.
    pub fn attribute(self) -> &'static str {
        match self {
            Self::Operators => "Operator-Descriptor",
            Self::IoObjects => "IOObject-Descriptor",
            Self::ParseRules => "ParseRule-Descriptor",
            Self::Groups => "Group-Descriptor",
            Self::Errors => "Error-Descriptor",
            Self::UserErrors => "UserError-Descriptor",
            Self::Gui => "GUI-Descriptor",
            Self::Settings => "Settings-Descriptor",
            Self::SettingsStructure => "SettingsStructure-Descriptor",
        }
    }

    /// Whether the handle is a dotted bundle identifier rather than a path.
    pub fn is_bundle(self) -> bool {
        matches!(
            self,
            Self::Groups | Self::Errors | Self::UserErrors | Self::Gui | Self::Settings
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operators => "operators",
            Self::IoObjects => "io_objects",
            Self::ParseRules => "parse_rules",
            Self::Groups => "groups",
            Self::Errors => "errors",
            Self::UserErrors => "user_errors",
            Self::Gui => "gui",
            Self::Settings => "settings",
            Self::SettingsStructure => "settings_structure",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File suffix of a properties bundle.
pub const BUNDLE_SUFFIX: &str = ".properties";

/// A named resource declared by a manifest attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    /// The handle exactly as declared.
    pub name: String,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// The archive-relative resource this handle refers to.
    ///
    /// `com.acme.i18n.Errors` (bundle) becomes `com/acme/i18n/Errors.properties`,
    /// `/com/acme/Operators.txt` (plain) becomes `com/acme/Operators.txt`.
    pub fn resource_path(&self) -> String {
        if self.kind.is_bundle() {
            format!("{}{}", self.name.trim().replace('.', "/"), BUNDLE_SUFFIX)
        } else {
            normalize_resource_name(self.name.trim())
        }
    }

    /// Collect all handles declared in a manifest, in [`ResourceKind::ALL`] order.
    pub fn from_manifest(manifest: &Manifest) -> Vec<Self> {
        ResourceKind::ALL
            .iter()
            .filter_map(|&kind| {
                manifest
                    .get_non_empty(kind.attribute())
                    .map(|name| Self::new(kind, name))
            })
            .collect()
    }
}
