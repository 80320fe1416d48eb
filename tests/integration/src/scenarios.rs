//! End-to-end resolution scenarios.
//!
//! Each test lays out real archives on disk, writes a settings file and runs
//! the full startup flow: settings -> scan -> conflicts -> policy -> graph ->
//! scopes -> lifecycle.

use ext_fs::NormalizedPath;
use ext_runtime::conflict::ConflictReason;
use ext_runtime::policy::PolicyRejection;
use ext_runtime::{
    ExtensionRuntime, IncompatibleReason, ResolutionReport, RuntimeSettings, VersionNumber, Visibility,
};
use ext_test_utils::{ArchiveBuilder, TestHost};
use pretty_assertions::assert_eq;

fn start(host: &TestHost, settings: &str) -> (ExtensionRuntime, ResolutionReport) {
    let path = NormalizedPath::new(host.write_settings(settings));
    let settings = RuntimeSettings::load(&path).unwrap();
    let mut runtime = ExtensionRuntime::from_settings(&settings).unwrap();
    let report = runtime.start().unwrap();
    (runtime, report)
}

fn reasons(report: &ResolutionReport) -> Vec<(&str, &IncompatibleReason)> {
    report
        .incompatible
        .iter()
        .map(|i| (i.id.as_str(), &i.reason))
        .collect()
}

#[test]
fn test_higher_version_wins() {
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("a", "1.0"));
    host.add(ArchiveBuilder::new("a", "1.2"));

    let (runtime, report) = start(&host, "");

    assert_eq!(report.activated, vec!["a"]);
    assert_eq!(runtime.registry().get("a").unwrap().version(), &VersionNumber::new(1, 2, 0));
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].reason, ConflictReason::HigherVersion);
    assert_eq!(report.conflicts[0].dropped, VersionNumber::new(1, 0, 0));
}

#[test]
fn test_blacklisted_higher_version_yields_to_lower() {
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("a", "1.2").file("new.txt", ""));
    host.add(ArchiveBuilder::new("a", "1.0").file("old.txt", ""));

    let (runtime, report) = start(&host, "blacklist = \"a[1.1,1.2]\"\n");

    assert_eq!(report.activated, vec!["a"]);
    assert_eq!(runtime.registry().get("a").unwrap().version(), &VersionNumber::new(1, 0, 0));
    assert_eq!(report.conflicts[0].reason, ConflictReason::HigherVersionRejected);
    assert!(
        runtime
            .lookup("a", "old.txt", false, Visibility::LocalOnly)
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_dependency_version_too_low_is_excised() {
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("b", "1.0").depends_on("c[2.0]"));
    host.add(ArchiveBuilder::new("c", "1.0"));

    let (runtime, report) = start(&host, "");

    assert_eq!(report.activated, vec!["c"]);
    assert!(!runtime.registry().is_active("b"));
    assert_eq!(
        reasons(&report),
        vec![(
            "b",
            &IncompatibleReason::UnsatisfiedDependency {
                dependency: "c".to_string(),
                required: VersionNumber::new(2, 0, 0),
                found: Some(VersionNumber::new(1, 0, 0)),
            }
        )]
    );
}

#[test]
fn test_dependency_cycle_is_excised_not_dropped() {
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("x", "1.0").depends_on("y"));
    host.add(ArchiveBuilder::new("y", "1.0").depends_on("x"));

    let (runtime, report) = start(&host, "");

    assert!(report.activated.is_empty());
    assert!(runtime.registry().is_empty());
    let cycle = IncompatibleReason::CyclicOrUnresolvable {
        members: vec!["x".to_string(), "y".to_string()],
    };
    assert_eq!(reasons(&report), vec![("x", &cycle), ("y", &cycle)]);
}

#[test]
fn test_whitelist_none_keeps_only_packaged() {
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("p", "1.0"));
    host.add(ArchiveBuilder::new("q", "1.0"));

    let (_, report) = start(&host, "whitelist = \"none\"\npackaged = [\"p\"]\n");

    assert_eq!(report.activated, vec!["p"]);
    assert_eq!(
        reasons(&report),
        vec![(
            "q",
            &IncompatibleReason::PolicyRejected {
                rejection: PolicyRejection::NotWhitelisted
            }
        )]
    );
}

#[test]
fn test_shipped_extension_needs_signature() {
    let settings = "whitelist = \"shipped\"\nshipped = [\"s\"]\ntrusted_signers = [\"Acme\"]\n";

    let unsigned = TestHost::new();
    unsigned.add(ArchiveBuilder::new("s", "1.0").initializer("com.s.Init"));
    let (_, report) = start(&unsigned, settings);
    assert!(report.activated.is_empty());
    assert_eq!(
        reasons(&report),
        vec![(
            "s",
            &IncompatibleReason::PolicyRejected {
                rejection: PolicyRejection::Unsigned
            }
        )]
    );

    let signed = TestHost::new();
    signed.add(ArchiveBuilder::new("s", "1.0").initializer("com.s.Init").signed_by("Acme"));
    let (_, report) = start(&signed, settings);
    assert_eq!(report.activated, vec!["s"]);
    assert!(report.incompatible.is_empty());
}

#[test]
fn test_full_startup_and_shutdown() {
    let host = TestHost::new();
    host.add(ArchiveBuilder::new("core", "2.0").bundle("Error-Descriptor", "com.core.Errors"));
    host.add(
        ArchiveBuilder::new("text", "1.1")
            .depends_on("core[2.0]")
            .operators("ops.txt", &[("text:split", "com.text.Split")])
            .unit("com.text.Split"),
    );
    host.add(ArchiveBuilder::new("web", "1.0").depends_on("text[1.0]").host_version("9.5"));
    host.add(ArchiveBuilder::new("legacy", "0.9").depends_on("web"));

    let (mut runtime, report) = start(&host, "host_version = \"9.2\"\n");

    assert_eq!(report.activated, vec!["core", "text"]);
    let excised: Vec<&str> = report.incompatible.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(excised, vec!["web", "legacy"]);
    assert!(runtime.registry().order_is_consistent());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["incompatible"][0]["reason"]["kind"], "host_too_old");
    assert_eq!(json["incompatible"][1]["reason"]["kind"], "unsatisfied_dependency");

    assert_eq!(runtime.shutdown(), vec!["text", "core"]);
    assert!(runtime.registry().is_empty());
}
