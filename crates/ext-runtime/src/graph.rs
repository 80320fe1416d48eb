//! Dependency ordering of surviving descriptors.
//!
//! The order is computed by repeated relaxation passes over a work queue
//! rather than an adjacency-list topological sort: a missing dependency must
//! be attributed to the descriptor that declared it, and an excision can
//! invalidate descriptors that were already checked earlier in the pass.
//!
//! Each pass visits the queue in identity order and, for every descriptor:
//!
//! 1. excises it if a dependency is absent from the surviving set, or present
//!    only with a version below the required minimum
//! 2. promotes it to the initialization order if all dependencies are
//!    already initialized
//! 3. otherwise leaves it queued
//!
//! When a pass makes no progress the remaining descriptors depend on each
//! other in a cycle (or on such a cycle) and are all excised.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::descriptor::ExtensionDescriptor;
use crate::registry::IncompatibleReason;
use crate::version::VersionNumber;

/// Result of ordering one batch.
#[derive(Debug, Default)]
pub struct GraphOutcome {
    /// Promoted descriptors, dependencies first.
    pub order: Vec<Arc<ExtensionDescriptor>>,
    pub excised: Vec<(Arc<ExtensionDescriptor>, IncompatibleReason)>,
    /// Number of relaxation passes performed.
    pub passes: usize,
}

enum Verdict {
    Excise(IncompatibleReason),
    Promote,
    Wait,
}

pub struct DependencyGraphBuilder<'a> {
    /// Extensions initialized by earlier runs; they count as initialized.
    initialized: &'a BTreeMap<String, Arc<ExtensionDescriptor>>,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(initialized: &'a BTreeMap<String, Arc<ExtensionDescriptor>>) -> Self {
        Self { initialized }
    }

    pub fn build(&self, candidates: Vec<Arc<ExtensionDescriptor>>) -> GraphOutcome {
        let mut queue = candidates;
        queue.sort_by(|a, b| a.id().cmp(b.id()));

        // identity -> version of everything initialized so far
        let mut initialized: BTreeMap<String, VersionNumber> = self
            .initialized
            .iter()
            .map(|(id, d)| (id.clone(), d.version().clone()))
            .collect();

        let mut outcome = GraphOutcome::default();

        while !queue.is_empty() {
            outcome.passes += 1;
            let mut progress = false;
            let mut index = 0;

            while index < queue.len() {
                let verdict = Self::examine(&queue[index], &queue, &initialized);
                match verdict {
                    Verdict::Excise(reason) => {
                        let descriptor = queue.remove(index);
                        tracing::debug!(extension = descriptor.id(), pass = outcome.passes, "graph excision: {reason}");
                        outcome.excised.push((descriptor, reason));
                        progress = true;
                    }
                    Verdict::Promote => {
                        let descriptor = queue.remove(index);
                        tracing::debug!(extension = descriptor.id(), pass = outcome.passes, "promoted");
                        initialized.insert(descriptor.id().to_string(), descriptor.version().clone());
                        outcome.order.push(descriptor);
                        progress = true;
                    }
                    Verdict::Wait => index += 1,
                }
            }

            if !progress {
                let members: Vec<String> = queue.iter().map(|d| d.id().to_string()).collect();
                tracing::warn!(
                    members = ?members,
                    "no progress in dependency resolution, excising remaining extensions"
                );
                for descriptor in queue.drain(..) {
                    outcome.excised.push((
                        descriptor,
                        IncompatibleReason::CyclicOrUnresolvable {
                            members: members.clone(),
                        },
                    ));
                }
            }
        }

        tracing::debug!(
            ordered = outcome.order.len(),
            excised = outcome.excised.len(),
            passes = outcome.passes,
            "dependency graph built"
        );
        outcome
    }

    fn examine(
        descriptor: &ExtensionDescriptor,
        queue: &[Arc<ExtensionDescriptor>],
        initialized: &BTreeMap<String, VersionNumber>,
    ) -> Verdict {
        let mut ready = true;

        for dep in descriptor.dependencies() {
            let candidates = initialized
                .iter()
                .map(|(id, version)| (id.as_str(), version))
                .chain(queue.iter().map(|candidate| (candidate.id(), candidate.version())));
            if dep.is_fulfilled(candidates) {
                ready &= initialized.contains_key(&dep.id);
                continue;
            }

            let found = initialized.get(&dep.id).or_else(|| {
                queue
                    .iter()
                    .find(|candidate| candidate.id() == dep.id)
                    .map(|candidate| candidate.version())
            });
            return Verdict::Excise(IncompatibleReason::UnsatisfiedDependency {
                dependency: dep.id.clone(),
                required: dep.min_version.clone(),
                found: found.cloned(),
            });
        }

        if ready { Verdict::Promote } else { Verdict::Wait }
    }
}
