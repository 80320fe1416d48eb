//! Runtime tests over archives laid out on disk.

use std::sync::{Arc, Mutex};

use ext_fs::NormalizedPath;
use ext_runtime::hooks::HookResult;
use ext_runtime::policy::PolicyRejection;
use ext_runtime::{
    ExtensionHooks, ExtensionRuntime, HookContext, IncompatibleReason, InitializerCatalog, ManagedStore, Provider,
    RuntimeSettings, VersionNumber, Visibility,
};
use ext_test_utils::{ArchiveBuilder, TestHost};
use pretty_assertions::assert_eq;

fn runtime_for(host: &TestHost, settings_body: &str) -> ExtensionRuntime {
    let path = NormalizedPath::new(host.write_settings(settings_body));
    let settings = RuntimeSettings::load(&path).unwrap();
    ExtensionRuntime::from_settings(&settings).unwrap()
}

fn reason_of<'a>(report: &'a ext_runtime::ResolutionReport, id: &str) -> &'a IncompatibleReason {
    &report
        .incompatible
        .iter()
        .find(|i| i.id == id)
        .unwrap_or_else(|| panic!("{id} is not incompatible: {report:?}"))
        .reason
}

#[test]
fn test_start_resolves_scanned_archives() {
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("rmx_core", "1.0").unit("com.core.Base"));
    host.add(
        ArchiveBuilder::new("rmx_text", "1.2")
            .depends_on("rmx_core[1.0]")
            .operators("ops.txt", &[("text:tokenize", "com.text.Tokenize"), ("text:core", "com.core.Base")])
            .unit("com.text.Tokenize"),
    );
    let mut runtime = runtime_for(&host, "");

    let report = runtime.start().unwrap();

    assert_eq!(report.activated, vec!["rmx_core", "rmx_text"]);
    assert!(report.incompatible.is_empty());
    assert!(report.capability_failures.is_empty(), "{:?}", report.capability_failures);
    assert_eq!(
        runtime.capabilities().registered("rmx_text"),
        vec!["text:core", "text:tokenize"]
    );
    let found = runtime
        .lookup("rmx_text", "com.core.Base", true, Visibility::Full)
        .unwrap()
        .unwrap();
    assert_eq!(found.provider, Provider::Extension("rmx_core".to_string()));
}

#[test]
fn test_equal_versions_keep_first_archive() {
    let host = TestHost::new();
    host.add_as(ArchiveBuilder::new("dup", "1.0").file("first.txt", ""), "a-dup.ext");
    host.add_as(ArchiveBuilder::new("dup", "1.0").file("second.txt", ""), "b-dup.ext");
    let mut runtime = runtime_for(&host, "");

    let report = runtime.start().unwrap();
    assert_eq!(report.conflicts.len(), 1);
    assert!(report.conflicts[0].kept_origin.ends_with("a-dup.ext"));
    assert!(
        runtime
            .lookup("dup", "first.txt", false, Visibility::LocalOnly)
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_rejected_manifest_is_reported() {
    let host = TestHost::new();
    host.add_as(ArchiveBuilder::new("ok", "1.0"), "ok.ext");
    let broken = host.scan_dir().join("broken.ext/META-INF");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("MANIFEST.MF"), "Implementation-Title: nameless\n").unwrap();

    let report = runtime_for(&host, "").start().unwrap();
    assert_eq!(report.activated, vec!["ok"]);
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].error.contains("Extension-ID"));
}

#[test]
fn test_shipped_extension_needs_valid_signature() {
    let settings = r#"
whitelist = "shipped"
shipped = ["signed", "unsigned", "tampered", "untrusted"]
trusted_signers = ["Acme"]
"#;
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("signed", "1.0").initializer("com.s.Init").signed_by("Acme"));
    host.add(ArchiveBuilder::new("unsigned", "1.0").initializer("com.u.Init"));
    host.add(
        ArchiveBuilder::new("tampered", "1.0")
            .initializer("com.t.Init")
            .signed_by("Acme")
            .tampered(),
    );
    host.add(ArchiveBuilder::new("untrusted", "1.0").initializer("com.x.Init").signed_by("Mallory"));

    let report = runtime_for(&host, settings).start().unwrap();
    assert_eq!(report.activated, vec!["signed"]);
    for id in ["unsigned", "tampered", "untrusted"] {
        assert_eq!(
            reason_of(&report, id),
            &IncompatibleReason::PolicyRejected {
                rejection: PolicyRejection::Unsigned
            }
        );
    }
}

#[test]
fn test_signature_requires_initializer_in_own_archive() {
    let settings = "whitelist = \"shipped\"\nshipped = [\"s\"]\ntrusted_signers = [\"Acme\"]\n";
    let host = TestHost::new();
    host.add(
        ArchiveBuilder::new("s", "1.0")
            .initializer_without_unit("com.s.Init")
            .signed_by("Acme"),
    );
    let report = runtime_for(&host, settings).start().unwrap();
    assert!(report.activated.is_empty());
}

#[test]
fn test_blacklist_and_host_version_gate() {
    let settings = r#"
host_version = "9.0"

[blacklist]
old = {}
ranged = { max = "1.2" }
"#;
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("old", "3.0"));
    host.add(ArchiveBuilder::new("ranged", "1.1"));
    host.add(ArchiveBuilder::new("future", "1.0").host_version("9.1"));
    host.add(ArchiveBuilder::new("current", "1.0").host_version("9.0"));

    let report = runtime_for(&host, settings).start().unwrap();
    assert_eq!(report.activated, vec!["current"]);
    assert!(matches!(reason_of(&report, "old"), IncompatibleReason::PolicyRejected { .. }));
    assert!(matches!(reason_of(&report, "ranged"), IncompatibleReason::PolicyRejected { .. }));
    assert_eq!(
        reason_of(&report, "future"),
        &IncompatibleReason::HostTooOld {
            required: VersionNumber::new(9, 1, 0),
            host: VersionNumber::new(9, 0, 0),
        }
    );
}

#[test]
fn test_managed_store_contributes_selected_version() {
    let host = TestHost::new();
    // archive names must match the store layout, `<id>-<major.minor.patch>.ext`
    host.add_managed(ArchiveBuilder::new("managed_ext", "1.0.0").file("v1.txt", ""));
    host.add_managed(ArchiveBuilder::new("managed_ext", "2.0.0").file("v2.txt", ""));
    host.add_managed(ArchiveBuilder::new("disabled_ext", "1.0.0"));

    let mut store = ManagedStore::open(host.managed_root()).unwrap();
    store.record_install("managed_ext", "Managed", None, VersionNumber::new(2, 0, 0));
    store.record_install("managed_ext", "Managed", None, VersionNumber::new(1, 0, 0));
    store.record_install("disabled_ext", "Disabled", None, VersionNumber::new(1, 0, 0));
    store.set_active("disabled_ext", false).unwrap();
    store.save().unwrap();

    let managed_root = host.managed_root().display().to_string();
    let mut runtime = runtime_for(&host, &format!("managed_root = {managed_root:?}\n"));
    let report = runtime.start().unwrap();

    assert_eq!(report.activated, vec!["managed_ext"]);
    assert_eq!(
        runtime.registry().get("managed_ext").unwrap().version(),
        &VersionNumber::new(1, 0, 0)
    );
}

struct Counting(Arc<Mutex<Vec<String>>>);

impl ExtensionHooks for Counting {
    fn init_plugin(&mut self, ctx: &HookContext<'_>) -> HookResult {
        self.0.lock().unwrap().push(format!("init:{}", ctx.descriptor.id()));
        Ok(())
    }

    fn tear_down(&mut self, ctx: &HookContext<'_>) -> HookResult {
        self.0.lock().unwrap().push(format!("down:{}", ctx.descriptor.id()));
        Err("tear down is allowed to fail".into())
    }
}

#[test]
fn test_runtime_registration_and_teardown_with_hooks() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("base", "1.0").initializer("com.base.Init"));

    let base_calls = Arc::clone(&calls);
    let late_calls = Arc::clone(&calls);
    let catalog = InitializerCatalog::new()
        .with("com.base.Init", move || -> Box<dyn ExtensionHooks> {
            Box::new(Counting(Arc::clone(&base_calls)))
        })
        .with("com.late.Init", move || -> Box<dyn ExtensionHooks> {
            Box::new(Counting(Arc::clone(&late_calls)))
        });

    let mut runtime = runtime_for(&host, "headless = true\n").with_initializers(catalog);
    runtime.start().unwrap();

    let late = host.stage(
        ArchiveBuilder::new("late", "1.0")
            .depends_on("base")
            .initializer("com.late.Init"),
    );
    let newer_base = host.stage(ArchiveBuilder::new("base", "2.0"));
    let report = runtime.register_archives(&[NormalizedPath::new(late), NormalizedPath::new(newer_base)]);

    assert_eq!(report.activated, vec!["late"]);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(runtime.registry().order_ids(), ["base", "late"]);

    let removed = runtime.unregister_one("base").unwrap();
    assert_eq!(removed, vec!["late", "base"]);
    assert!(runtime.registry().is_empty());
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["init:base", "init:late", "down:late", "down:base"]
    );
}
