//! Choosing one descriptor per identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::descriptor::ExtensionDescriptor;
use crate::policy::PolicyFilter;
use crate::version::VersionNumber;

/// Which of two same-identity descriptors survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Survivor {
    Existing,
    Candidate,
}

/// Why the survivor was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// The survivor has the higher version.
    HigherVersion,
    /// The higher version was refused by policy, so the lower one survives.
    HigherVersionRejected,
    /// Both versions are equal; the first one seen survives.
    EqualVersion,
    /// The identity is already active and is never replaced at runtime.
    AlreadyActive,
}

/// A resolved conflict, kept for the resolution report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub id: String,
    pub kept: VersionNumber,
    pub kept_origin: String,
    pub dropped: VersionNumber,
    pub dropped_origin: String,
    pub reason: ConflictReason,
}

/// Survivors of a batch plus the conflicts that were settled.
#[derive(Debug, Default)]
pub struct ConflictOutcome {
    pub survivors: Vec<Arc<ExtensionDescriptor>>,
    pub conflicts: Vec<ConflictRecord>,
}

pub struct ConflictResolver<'a> {
    policy: &'a PolicyFilter,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(policy: &'a PolicyFilter) -> Self {
        Self { policy }
    }

    /// Decide between an existing descriptor and a newly seen one.
    pub fn choose(
        &self,
        existing: &ExtensionDescriptor,
        candidate: &ExtensionDescriptor,
    ) -> (Survivor, ConflictReason) {
        use std::cmp::Ordering;

        let (higher, lower) = match candidate.version().cmp(existing.version()) {
            Ordering::Equal => return (Survivor::Existing, ConflictReason::EqualVersion),
            Ordering::Greater => (Survivor::Candidate, Survivor::Existing),
            Ordering::Less => (Survivor::Existing, Survivor::Candidate),
        };
        let higher_descriptor = match higher {
            Survivor::Candidate => candidate,
            Survivor::Existing => existing,
        };

        if self.policy.is_allowed(higher_descriptor) {
            (higher, ConflictReason::HigherVersion)
        } else {
            (lower, ConflictReason::HigherVersionRejected)
        }
    }

    /// Reduce a freshly scanned batch to one descriptor per identity.
    ///
    /// Batch members are settled against each other in scan order, then
    /// against `active`. An active identity always stays; the newcomer is
    /// dropped. Every displaced descriptor is marked disabled.
    pub fn resolve_batch(
        &self,
        batch: Vec<Arc<ExtensionDescriptor>>,
        active: &BTreeMap<String, Arc<ExtensionDescriptor>>,
    ) -> ConflictOutcome {
        let mut chosen: BTreeMap<String, Arc<ExtensionDescriptor>> = BTreeMap::new();
        let mut conflicts = Vec::new();

        for candidate in batch {
            let Some(existing) = chosen.get(candidate.id()) else {
                chosen.insert(candidate.id().to_string(), candidate);
                continue;
            };

            let (survivor, reason) = self.choose(existing, &candidate);
            let (kept, dropped) = match survivor {
                Survivor::Existing => (Arc::clone(existing), candidate),
                Survivor::Candidate => (candidate, Arc::clone(existing)),
            };
            conflicts.push(self.settle(&kept, &dropped, reason));
            chosen.insert(kept.id().to_string(), kept);
        }

        let mut survivors = Vec::with_capacity(chosen.len());
        for (id, candidate) in chosen {
            match active.get(&id) {
                Some(current) => {
                    conflicts.push(self.settle(current, &candidate, ConflictReason::AlreadyActive));
                }
                None => survivors.push(candidate),
            }
        }

        ConflictOutcome {
            survivors,
            conflicts,
        }
    }

    fn settle(
        &self,
        kept: &ExtensionDescriptor,
        dropped: &ExtensionDescriptor,
        reason: ConflictReason,
    ) -> ConflictRecord {
        dropped.set_disabled(true);
        kept.set_disabled(false);

        match reason {
            ConflictReason::EqualVersion => tracing::warn!(
                extension = kept.id(),
                version = %kept.version(),
                kept = %kept.origin(),
                dropped = %dropped.origin(),
                "duplicate extension with equal version, keeping the first one"
            ),
            _ => tracing::info!(
                extension = kept.id(),
                kept = %kept.version(),
                dropped = %dropped.version(),
                ?reason,
                "resolved version conflict"
            ),
        }

        ConflictRecord {
            id: kept.id().to_string(),
            kept: kept.version().clone(),
            kept_origin: kept.origin().to_string(),
            dropped: dropped.version().clone(),
            dropped_origin: dropped.origin().to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveIndex;
    use crate::manifest::Manifest;
    use crate::policy::{Blacklist, BlacklistRange};
    use ext_fs::NormalizedPath;
    use pretty_assertions::assert_eq;

    fn descriptor(id: &str, version: &str) -> Arc<ExtensionDescriptor> {
        let manifest = Manifest::parse(&format!(
            "Extension-ID: {id}\nImplementation-Version: {version}\n"
        ))
        .unwrap();
        Arc::new(
            ExtensionDescriptor::from_manifest(
                NormalizedPath::new(format!("/ext/{id}-{version}.ext")),
                &manifest,
                ArchiveIndex::default(),
            )
            .unwrap(),
        )
    }

    fn kept_version(outcome: &ConflictOutcome) -> String {
        assert_eq!(outcome.survivors.len(), 1);
        outcome.survivors[0].version().to_string()
    }

    #[test]
    fn test_higher_version_wins_in_either_order() {
        let policy = PolicyFilter::new();
        let resolver = ConflictResolver::new(&policy);

        let forward = resolver.resolve_batch(vec![descriptor("a", "1.0"), descriptor("a", "1.2")], &BTreeMap::new());
        let backward = resolver.resolve_batch(vec![descriptor("a", "1.2"), descriptor("a", "1.0")], &BTreeMap::new());

        assert_eq!(kept_version(&forward), "1.2.0");
        assert_eq!(kept_version(&backward), "1.2.0");
        assert_eq!(forward.conflicts[0].reason, ConflictReason::HigherVersion);
    }

    #[test]
    fn test_blacklisted_higher_version_loses() {
        let mut blacklist = Blacklist::new();
        blacklist.insert(
            "a",
            BlacklistRange::Bounded {
                lower: None,
                upper: Some(VersionNumber::new(1, 2, 0)),
            },
        );
        let policy = PolicyFilter::new().with_blacklist(blacklist);
        let resolver = ConflictResolver::new(&policy);

        let high = descriptor("a", "1.2");
        let low = descriptor("a", "1.0");
        let outcome = resolver.resolve_batch(vec![Arc::clone(&high), Arc::clone(&low)], &BTreeMap::new());

        // both are blacklisted, the lower one still survives the conflict
        assert_eq!(kept_version(&outcome), "1.0.0");
        assert_eq!(outcome.conflicts[0].reason, ConflictReason::HigherVersionRejected);
        assert!(high.is_disabled());
        assert!(!low.is_disabled());

        let reversed = resolver.resolve_batch(vec![descriptor("a", "1.0"), descriptor("a", "1.2")], &BTreeMap::new());
        assert_eq!(kept_version(&reversed), "1.0.0");
        assert_eq!(reversed.conflicts[0].reason, ConflictReason::HigherVersionRejected);
    }

    #[test]
    fn test_equal_versions_keep_first_seen() {
        let policy = PolicyFilter::new();
        let resolver = ConflictResolver::new(&policy);
        let first = descriptor("a", "1.0");
        let second = descriptor("a", "1.0");

        let outcome = resolver.resolve_batch(vec![Arc::clone(&first), Arc::clone(&second)], &BTreeMap::new());
        assert!(Arc::ptr_eq(&outcome.survivors[0], &first));
        assert!(second.is_disabled());
        assert_eq!(outcome.conflicts[0].reason, ConflictReason::EqualVersion);
    }

    #[test]
    fn test_active_identity_is_never_replaced() {
        let policy = PolicyFilter::new();
        let resolver = ConflictResolver::new(&policy);
        let current = descriptor("a", "1.0");
        let active = BTreeMap::from([("a".to_string(), Arc::clone(&current))]);

        let newer = descriptor("a", "2.0");
        let outcome = resolver.resolve_batch(vec![Arc::clone(&newer), descriptor("b", "1.0")], &active);

        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.survivors[0].id(), "b");
        assert_eq!(outcome.conflicts[0].reason, ConflictReason::AlreadyActive);
        assert!(newer.is_disabled());
        assert!(!current.is_disabled());
    }

    #[test]
    fn test_distinct_identities_pass_through() {
        let policy = PolicyFilter::new();
        let outcome = ConflictResolver::new(&policy)
            .resolve_batch(vec![descriptor("b", "1.0"), descriptor("a", "1.0")], &BTreeMap::new());
        assert!(outcome.conflicts.is_empty());
        let ids: Vec<&str> = outcome.survivors.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
