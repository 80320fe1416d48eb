//! Archive signatures and the security policy that trusts them.
//!
//! A signed archive carries `META-INF/SIGNATURE`:
//!
//! ```toml
//! signer = "Acme Extensions"
//! certificates = ["CN=Acme Extensions, O=Acme"]
//! digest = "sha256:<hex of META-INF/MANIFEST.MF>"
//! ```
//!
//! An extension counts as signed when its initializer unit is present in its
//! own archive, the signature lists at least one certificate, the digest
//! matches the manifest, and the active [`SecurityPolicy`] grants the signer
//! all permissions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Location of the signature record inside an archive.
pub const SIGNATURE_PATH: &str = "META-INF/SIGNATURE";

/// Parsed `META-INF/SIGNATURE` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSignature {
    pub signer: String,
    #[serde(default)]
    pub certificates: Vec<String>,
    pub digest: String,
}

impl ArchiveSignature {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Whether the recorded digest matches `manifest_digest`.
    pub fn covers(&self, manifest_digest: &str) -> bool {
        self.digest.trim().eq_ignore_ascii_case(manifest_digest)
    }
}

/// Decides which signers are trusted with full permissions.
pub trait SecurityPolicy: Send + Sync {
    fn grants_all_permissions(&self, signature: &ArchiveSignature) -> bool;
}

/// Default policy: a fixed set of trusted signer names.
#[derive(Debug, Clone, Default)]
pub struct TrustedSigners {
    signers: BTreeSet<String>,
}

impl TrustedSigners {
    pub fn new<I, S>(signers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            signers: signers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

impl SecurityPolicy for TrustedSigners {
    fn grants_all_permissions(&self, signature: &ArchiveSignature) -> bool {
        self.signers.contains(signature.signer.trim())
    }
}
