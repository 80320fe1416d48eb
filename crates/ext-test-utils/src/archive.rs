//! [`ArchiveBuilder`] for extension archive fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use ext_fs::checksum::compute_bytes_checksum;

/// Builds an extension archive directory.
///
/// # Example
///
/// ```rust,no_run
/// use ext_test_utils::ArchiveBuilder;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = ArchiveBuilder::new("rmx_text", "1.2.0")
///     .depends_on("rmx_core[1.0]")
///     .initializer("com.acme.text.TextInit")
///     .signed_by("Acme")
///     .write_to(dir.path());
/// assert!(path.ends_with("rmx_text-1.2.0.ext"));
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    id: String,
    version: String,
    attributes: Vec<(String, String)>,
    dependencies: Vec<String>,
    files: Vec<(String, String)>,
    signer: Option<String>,
    certificates: Vec<String>,
    tamper_after_signing: bool,
}

impl ArchiveBuilder {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            attributes: Vec::new(),
            dependencies: Vec::new(),
            files: Vec::new(),
            signer: None,
            certificates: Vec::new(),
            tamper_after_signing: false,
        }
    }

    /// Set an arbitrary manifest attribute.
    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn title(self, title: &str) -> Self {
        self.attribute("Implementation-Title", title)
    }

    pub fn vendor(self, vendor: &str) -> Self {
        self.attribute("Implementation-Vendor", vendor)
    }

    /// Minimum host version (`RapidMiner-Version`).
    pub fn host_version(self, version: &str) -> Self {
        self.attribute("RapidMiner-Version", version)
    }

    /// Add one `Plugin-Dependencies` token such as `rmx_core[1.0]`.
    pub fn depends_on(mut self, token: &str) -> Self {
        self.dependencies.push(token.to_string());
        self
    }

    /// Declare `Initialization-Class` and add its unit file.
    pub fn initializer(self, symbol: &str) -> Self {
        self.attribute("Initialization-Class", symbol).unit(symbol)
    }

    /// Declare `Initialization-Class` without adding the unit file.
    pub fn initializer_without_unit(self, symbol: &str) -> Self {
        self.attribute("Initialization-Class", symbol)
    }

    /// Add the unit file of a dotted symbol.
    pub fn unit(self, symbol: &str) -> Self {
        let path = format!("{}.unit", symbol.replace('.', "/"));
        self.file(&path, "")
    }

    /// Add an arbitrary file inside the archive.
    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files
            .push((path.trim_start_matches('/').to_string(), content.to_string()));
        self
    }

    /// Declare an `Operator-Descriptor` table and write it.
    pub fn operators(self, path: &str, entries: &[(&str, &str)]) -> Self {
        let table: String = entries
            .iter()
            .map(|(key, symbol)| format!("{key} = {symbol}\n"))
            .collect();
        self.attribute("Operator-Descriptor", path).file(path, &table)
    }

    /// Declare a bundle handle such as `Error-Descriptor: a.b.Errors` and
    /// write its `.properties` file.
    pub fn bundle(self, attribute: &str, handle: &str) -> Self {
        let path = format!("{}.properties", handle.replace('.', "/"));
        self.attribute(attribute, handle).file(&path, "")
    }

    /// Sign the archive with one certificate.
    pub fn signed_by(self, signer: &str) -> Self {
        let certificate = format!("CN={signer}");
        self.signed_with(signer, &[certificate.as_str()])
    }

    pub fn signed_with(mut self, signer: &str, certificates: &[&str]) -> Self {
        self.signer = Some(signer.to_string());
        self.certificates = certificates.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Change the manifest after computing the signature digest.
    pub fn tampered(mut self) -> Self {
        self.tamper_after_signing = true;
        self
    }

    /// Directory name `<id>-<version>.ext`.
    pub fn archive_name(&self) -> String {
        format!("{}-{}.ext", self.id, self.version)
    }

    pub fn manifest(&self) -> String {
        let mut manifest = format!(
            "Manifest-Version: 1.0\nExtension-ID: {}\nImplementation-Version: {}\n",
            self.id, self.version
        );
        if !self.dependencies.is_empty() {
            manifest.push_str(&format!(
                "Plugin-Dependencies: {}\n",
                self.dependencies.join(";")
            ));
        }
        for (key, value) in &self.attributes {
            manifest.push_str(&format!("{key}: {value}\n"));
        }
        manifest
    }

    /// Write the archive below `dir` under [`archive_name`](Self::archive_name).
    ///
    /// # Panics
    /// Panics if the filesystem operations fail.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        self.write_as(dir, &self.archive_name())
    }

    /// Write the archive as `dir/name`.
    ///
    /// # Panics
    /// Panics if the filesystem operations fail.
    pub fn write_as(&self, dir: &Path, name: &str) -> PathBuf {
        let root = dir.join(name);
        let meta = root.join("META-INF");
        fs::create_dir_all(&meta)
            .unwrap_or_else(|e| panic!("ArchiveBuilder: failed to create {}: {e}", meta.display()));

        let manifest = self.manifest();
        write(&meta.join("MANIFEST.MF"), &manifest);

        for (path, content) in &self.files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    panic!("ArchiveBuilder: failed to create {}: {e}", parent.display())
                });
            }
            write(&full, content);
        }

        if let Some(signer) = &self.signer {
            let digest = compute_bytes_checksum(manifest.as_bytes());
            let certificates = self
                .certificates
                .iter()
                .map(|c| format!("{c:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            write(
                &meta.join("SIGNATURE"),
                &format!("signer = {signer:?}\ncertificates = [{certificates}]\ndigest = \"{digest}\"\n"),
            );
            if self.tamper_after_signing {
                write(&meta.join("MANIFEST.MF"), &format!("{manifest}Tampered: yes\n"));
            }
        }

        root
    }
}

fn write(path: &Path, content: &str) {
    fs::write(path, content)
        .unwrap_or_else(|e| panic!("ArchiveBuilder: failed to write {}: {e}", path.display()));
}
