//! Fork lineage derivation.
//!
//! Runs in two passes: a complete id index over every repository first, then
//! a scan that turns each repository's `parent_id` / `source_id` into a
//! `FORKS` edge when, and only when, another repository carries that id.
//! The scan never starts before the index is complete, so the order in which
//! repositories arrive has no effect on which edges exist.

use std::collections::{HashMap, HashSet};

use crate::schemas::{ForkRelation, GitHubRepository};

/// Read-only id lookup over a complete repository set.
#[derive(Debug)]
pub struct RepositoryIndex<'a> {
    by_id: HashMap<i64, &'a GitHubRepository>,
}

impl<'a> RepositoryIndex<'a> {
    pub fn build(repositories: &'a [GitHubRepository]) -> Self {
        let by_id = repositories.iter().map(|repo| (repo.id, repo)).collect();
        Self { by_id }
    }

    pub fn get(&self, id: i64) -> Option<&'a GitHubRepository> {
        self.by_id.get(&id).copied()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineageOutcome {
    pub edges: Vec<ForkRelation>,
    /// `(fork, referenced id)` pairs whose target is outside the dataset.
    pub dangling: Vec<(i64, i64)>,
    /// Repositories that name themselves as parent or source.
    pub self_references: Vec<i64>,
}

/// Derives one `FORKS` edge per (fork, parent) pair in repository input order.
///
/// A repository whose `parent_id` and `source_id` point to the same target
/// yields a single edge. Lineage is never inferred transitively and cycles in
/// the input are emitted as they are.
pub fn derive_fork_edges(
    repositories: &[GitHubRepository],
    index: &RepositoryIndex<'_>,
) -> LineageOutcome {
    let mut outcome = LineageOutcome::default();
    let mut emitted: HashSet<ForkRelation> = HashSet::new();

    for repo in repositories {
        for target in repo.fork_references() {
            if target == repo.id {
                log::warn!("Repository {} names itself as its parent; no edge", repo.id);
                if !outcome.self_references.contains(&repo.id) {
                    outcome.self_references.push(repo.id);
                }
                continue;
            }
            if !index.contains(target) {
                log::debug!(
                    "Repository {} references {} which is not in the dataset",
                    repo.id,
                    target
                );
                outcome.dangling.push((repo.id, target));
                continue;
            }
            let edge = ForkRelation {
                fork_id: repo.id,
                parent_id: target,
            };
            if emitted.insert(edge) {
                outcome.edges.push(edge);
            }
        }
    }

    log::info!(
        "Derived {} fork edges from {} repositories ({} references outside the dataset)",
        outcome.edges.len(),
        index.len(),
        outcome.dangling.len()
    );
    outcome
}
