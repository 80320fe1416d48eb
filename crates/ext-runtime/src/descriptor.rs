//! Parsed metadata of one candidate extension archive.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use ext_fs::{NormalizedPath, checksum, io};
use serde::Serialize;

use crate::archive::{ARCHIVE_SUFFIX, ArchiveIndex, symbol_to_resource};
use crate::dependency::DependencySpec;
use crate::error::{Error, Result};
use crate::manifest::{DEFAULT_HOST_VERSION, MANIFEST_PATH, Manifest, ResourceHandle, attr};
use crate::signature::{ArchiveSignature, SIGNATURE_PATH, SecurityPolicy};
use crate::version::VersionNumber;

/// Everything the runtime knows about one extension archive.
///
/// Descriptors are created by [`ExtensionDescriptor::load`] and shared as
/// `Arc<ExtensionDescriptor>`. Only the resolution pipeline touches the
/// `disabled` flag; the signature check is computed lazily and memoized.
pub struct ExtensionDescriptor {
    id: String,
    name: String,
    version: VersionNumber,
    vendor: Option<String>,
    url: Option<String>,
    required_host_version: VersionNumber,
    dependencies: Vec<DependencySpec>,
    initializer: Option<String>,
    resources: Vec<ResourceHandle>,
    origin: NormalizedPath,
    archive: ArchiveIndex,
    manifest_digest: String,
    signature: Option<ArchiveSignature>,
    disabled: AtomicBool,
    signed: OnceLock<bool>,
}

impl ExtensionDescriptor {
    /// Load the descriptor of the archive at `origin`.
    pub fn load(origin: &NormalizedPath) -> Result<Self> {
        let archive = ArchiveIndex::scan(origin)?;
        if !archive.contains(MANIFEST_PATH) {
            return Err(Error::ManifestNotFound(origin.join(MANIFEST_PATH).to_native()));
        }

        let manifest_bytes = io::read_bytes(&origin.join(MANIFEST_PATH))?;
        let text = String::from_utf8(manifest_bytes.clone()).map_err(|_| Error::ManifestParse {
            path: origin.to_native(),
            reason: "manifest is not valid UTF-8".to_string(),
        })?;
        let manifest = Manifest::parse(&text).map_err(|reason| Error::ManifestParse {
            path: origin.to_native(),
            reason,
        })?;

        let signature = if archive.contains(SIGNATURE_PATH) {
            let raw = io::read_text(&origin.join(SIGNATURE_PATH))?;
            match ArchiveSignature::from_toml(&raw) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    tracing::warn!(archive = %origin, "ignoring unreadable signature: {e}");
                    None
                }
            }
        } else {
            None
        };

        let mut descriptor = Self::from_manifest(origin.clone(), &manifest, archive)?;
        descriptor.manifest_digest = checksum::compute_bytes_checksum(&manifest_bytes);
        descriptor.signature = signature;
        Ok(descriptor)
    }

    /// Build a descriptor from an already parsed manifest.
    pub fn from_manifest(
        origin: NormalizedPath,
        manifest: &Manifest,
        archive: ArchiveIndex,
    ) -> Result<Self> {
        let parse_error = |reason: String| Error::ManifestParse {
            path: origin.to_native(),
            reason,
        };

        let id = manifest
            .get_non_empty(attr::EXTENSION_ID)
            .ok_or_else(|| parse_error(format!("missing required attribute {}", attr::EXTENSION_ID)))?
            .to_string();

        let name = manifest
            .get_non_empty(attr::TITLE)
            .map(str::to_string)
            .unwrap_or_else(|| archive_display_name(&origin));

        let version = VersionNumber::parse(manifest.get(attr::VERSION).unwrap_or(""))
            .map_err(|e| parse_error(e.to_string()))?;

        let required_host_version = VersionNumber::parse(
            manifest
                .get_non_empty(attr::HOST_VERSION)
                .unwrap_or(DEFAULT_HOST_VERSION),
        )
        .map_err(|e| parse_error(e.to_string()))?;

        let dependencies = DependencySpec::parse_list(manifest.get(attr::DEPENDENCIES).unwrap_or(""))
            .map_err(|e| parse_error(e.to_string()))?;

        Ok(Self {
            id,
            name,
            version,
            vendor: manifest.get_non_empty(attr::VENDOR).map(str::to_string),
            url: manifest.get_non_empty(attr::URL).map(str::to_string),
            required_host_version,
            dependencies,
            initializer: manifest.get_non_empty(attr::INITIALIZER).map(str::to_string),
            resources: ResourceHandle::from_manifest(manifest),
            origin,
            archive,
            manifest_digest: String::new(),
            signature: None,
            disabled: AtomicBool::new(false),
            signed: OnceLock::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &VersionNumber {
        &self.version
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn required_host_version(&self) -> &VersionNumber {
        &self.required_host_version
    }

    pub fn dependencies(&self) -> &[DependencySpec] {
        &self.dependencies
    }

    /// Symbol name of the optional initializer unit.
    pub fn initializer(&self) -> Option<&str> {
        self.initializer.as_deref()
    }

    pub fn resources(&self) -> &[ResourceHandle] {
        &self.resources
    }

    pub fn origin(&self) -> &NormalizedPath {
        &self.origin
    }

    pub fn archive(&self) -> &ArchiveIndex {
        &self.archive
    }

    pub fn signature(&self) -> Option<&ArchiveSignature> {
        self.signature.as_ref()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    /// Whether the archive is properly signed under `policy`.
    ///
    /// Computed on first use and memoized. Concurrent first callers may each
    /// compute the answer; the first one stored wins and the rest are dropped.
    /// The memo is per descriptor, so later calls ignore `policy`.
    pub fn is_signed(&self, policy: &dyn SecurityPolicy) -> bool {
        if let Some(&signed) = self.signed.get() {
            return signed;
        }
        let computed = self.compute_signed(policy);
        let _ = self.signed.set(computed);
        self.signed.get().copied().unwrap_or(computed)
    }

    fn compute_signed(&self, policy: &dyn SecurityPolicy) -> bool {
        let Some(initializer) = self.initializer.as_deref() else {
            tracing::debug!(extension = %self.id, "unsigned: no initializer unit declared");
            return false;
        };
        if !self.archive.contains(&symbol_to_resource(initializer)) {
            tracing::debug!(extension = %self.id, initializer, "unsigned: initializer unit not in archive");
            return false;
        }
        let Some(signature) = self.signature.as_ref() else {
            tracing::debug!(extension = %self.id, "unsigned: no signature record");
            return false;
        };
        if signature.certificates.is_empty() {
            tracing::debug!(extension = %self.id, "unsigned: signature carries no certificate");
            return false;
        }
        if self.manifest_digest.is_empty() || !signature.covers(&self.manifest_digest) {
            tracing::debug!(extension = %self.id, "unsigned: digest does not match manifest");
            return false;
        }
        policy.grants_all_permissions(signature)
    }
}

/// Archive directory name without the `.ext` suffix.
fn archive_display_name(origin: &NormalizedPath) -> String {
    let file_name = origin.file_name().unwrap_or_default();
    file_name
        .strip_suffix(ARCHIVE_SUFFIX)
        .unwrap_or(file_name)
        .to_string()
}

impl fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDescriptor")
            .field("id", &self.id)
            .field("version", &self.version.to_string())
            .field("dependencies", &self.dependencies)
            .field("origin", &self.origin)
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Serializable summary of a descriptor, used by reports and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorSummary {
    pub id: String,
    pub name: String,
    pub version: VersionNumber,
    pub vendor: Option<String>,
    pub url: Option<String>,
    pub required_host_version: VersionNumber,
    pub dependencies: Vec<String>,
    pub initializer: Option<String>,
    pub resources: Vec<ResourceHandle>,
    pub origin: String,
}

impl From<&ExtensionDescriptor> for DescriptorSummary {
    fn from(d: &ExtensionDescriptor) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            version: d.version.clone(),
            vendor: d.vendor.clone(),
            url: d.url.clone(),
            required_host_version: d.required_host_version.clone(),
            dependencies: d.dependencies.iter().map(ToString::to_string).collect(),
            initializer: d.initializer.clone(),
            resources: d.resources.clone(),
            origin: d.origin.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::TrustedSigners;
    use std::fs;
    use std::path::Path;

    fn write_archive(dir: &Path, name: &str, manifest: &str) -> NormalizedPath {
        let root = dir.join(name);
        fs::create_dir_all(root.join("META-INF")).unwrap();
        fs::write(root.join("META-INF/MANIFEST.MF"), manifest).unwrap();
        NormalizedPath::new(root)
    }

    fn sign(root: &NormalizedPath, signer: &str, certificates: &[&str]) {
        let digest = checksum::compute_file_checksum(&root.join(MANIFEST_PATH).to_native()).unwrap();
        let certs: Vec<String> = certificates.iter().map(|c| format!("\"{c}\"")).collect();
        fs::write(
            root.join(SIGNATURE_PATH).to_native(),
            format!(
                "signer = \"{signer}\"\ncertificates = [{}]\ndigest = \"{digest}\"\n",
                certs.join(", ")
            ),
        )
        .unwrap();
    }

    fn add_unit(root: &NormalizedPath, symbol: &str) {
        let path = root.join(&symbol_to_resource(symbol)).to_native();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_load_full_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_archive(
            dir.path(),
            "rmx_text-1.2.0.ext",
            "Implementation-Title: Text Processing\n\
             Implementation-Version: 1.2.0\n\
             Implementation-Vendor: Acme\n\
             Extension-ID: rmx_text\n\
             Initialization-Class: com.acme.text.TextInit\n\
             RapidMiner-Version: 9.0\n\
             Plugin-Dependencies: rmx_core_ops[1.0]\n\
             Operator-Descriptor: /com/acme/text/Operators.txt\n",
        );

        let d = ExtensionDescriptor::load(&root).unwrap();
        assert_eq!(d.id(), "rmx_text");
        assert_eq!(d.name(), "Text Processing");
        assert_eq!(d.version().to_string(), "1.2.0");
        assert_eq!(d.vendor(), Some("Acme"));
        assert_eq!(d.required_host_version().to_string(), "9.0.0");
        assert_eq!(d.dependencies().len(), 1);
        assert_eq!(d.initializer(), Some("com.acme.text.TextInit"));
        assert_eq!(d.resources().len(), 1);
        assert!(!d.is_disabled());
    }

    #[test]
    fn test_defaults_for_optional_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_archive(dir.path(), "bare.ext", "Extension-ID: bare\n");

        let d = ExtensionDescriptor::load(&root).unwrap();
        assert_eq!(d.name(), "bare");
        assert_eq!(d.version(), &VersionNumber::zero());
        assert_eq!(d.required_host_version(), &VersionNumber::zero());
        assert!(d.dependencies().is_empty());
        assert!(d.initializer().is_none());
    }

    #[test]
    fn test_missing_extension_id_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_archive(dir.path(), "anon.ext", "Implementation-Title: Anon\n");

        let err = ExtensionDescriptor::load(&root).unwrap_err();
        assert!(matches!(err, Error::ManifestParse { ref reason, .. } if reason.contains("Extension-ID")));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty.ext")).unwrap();

        let err = ExtensionDescriptor::load(&NormalizedPath::new(dir.path().join("empty.ext"))).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound(_)));
    }

    #[test]
    fn test_bad_dependency_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_archive(
            dir.path(),
            "x.ext",
            "Extension-ID: x\nPlugin-Dependencies: y[not.a.version]\n",
        );
        assert!(matches!(
            ExtensionDescriptor::load(&root),
            Err(Error::ManifestParse { .. })
        ));
    }

    #[test]
    fn test_signed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_archive(
            dir.path(),
            "s.ext",
            "Extension-ID: s\nInitialization-Class: com.acme.SInit\n",
        );
        add_unit(&root, "com.acme.SInit");
        sign(&root, "Acme", &["CN=Acme"]);

        let d = ExtensionDescriptor::load(&root).unwrap();
        assert!(d.is_signed(&TrustedSigners::new(["Acme"])));
    }

    #[test]
    fn test_signature_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_archive(
            dir.path(),
            "s.ext",
            "Extension-ID: s\nInitialization-Class: com.acme.SInit\n",
        );
        add_unit(&root, "com.acme.SInit");
        sign(&root, "Acme", &["CN=Acme"]);

        let d = ExtensionDescriptor::load(&root).unwrap();
        assert!(!d.is_signed(&TrustedSigners::new(["Other"])));
        // first answer sticks
        assert!(!d.is_signed(&TrustedSigners::new(["Acme"])));
    }

    #[test]
    fn test_unsigned_variants() {
        let dir = tempfile::tempdir().unwrap();
        let policy = TrustedSigners::new(["Acme"]);

        // no initializer unit in the archive
        let root = write_archive(dir.path(), "a.ext", "Extension-ID: a\nInitialization-Class: com.A\n");
        sign(&root, "Acme", &["CN=Acme"]);
        assert!(!ExtensionDescriptor::load(&root).unwrap().is_signed(&policy));

        // no certificates
        let root = write_archive(dir.path(), "b.ext", "Extension-ID: b\nInitialization-Class: com.B\n");
        add_unit(&root, "com.B");
        sign(&root, "Acme", &[]);
        assert!(!ExtensionDescriptor::load(&root).unwrap().is_signed(&policy));

        // manifest changed after signing
        let root = write_archive(dir.path(), "c.ext", "Extension-ID: c\nInitialization-Class: com.C\n");
        add_unit(&root, "com.C");
        sign(&root, "Acme", &["CN=Acme"]);
        fs::write(
            root.join(MANIFEST_PATH).to_native(),
            "Extension-ID: c\nInitialization-Class: com.C\nImplementation-Version: 2.0\n",
        )
        .unwrap();
        assert!(!ExtensionDescriptor::load(&root).unwrap().is_signed(&policy));
    }
}
