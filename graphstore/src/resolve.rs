//! Explicit relationship resolution.
//!
//! Every reference carried by [`GraphData`] is checked against a read-only
//! identity index. A reference whose endpoint is missing is a dangling
//! reference: it is logged and skipped, the batch carries on.

use std::collections::{HashMap, HashSet};

use crate::fetch::GraphData;
use crate::schemas::{
    ContributeRelation, ForkRelation, GeneralRelation, ImplementedRelation, NodeLabel, NodeRef,
    Relation, RelationType,
};

/// Identity lookup over a complete node set. Built once, read-only afterwards.
#[derive(Debug, Default)]
pub struct NodeIndex {
    ids: HashMap<NodeLabel, HashSet<String>>,
}

impl NodeIndex {
    pub fn build(graph: &GraphData) -> Self {
        let mut ids: HashMap<NodeLabel, HashSet<String>> = HashMap::new();
        let mut add = |label: NodeLabel, keys: Vec<String>| {
            ids.entry(label).or_default().extend(keys);
        };
        add(NodeLabel::App, graph.apps.identities().map(str::to_string).collect());
        add(
            NodeLabel::GooglePlayPage,
            graph.play_pages.identities().map(str::to_string).collect(),
        );
        add(
            NodeLabel::GitHubRepository,
            graph.repositories.identities().map(str::to_string).collect(),
        );
        add(NodeLabel::Commit, graph.commits.identities().map(str::to_string).collect());
        add(
            NodeLabel::Contributor,
            graph.contributors.identities().map(str::to_string).collect(),
        );
        add(NodeLabel::Branch, graph.branches.identities().map(str::to_string).collect());
        add(NodeLabel::Tag, graph.tags.identities().map(str::to_string).collect());
        Self { ids }
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        self.ids
            .get(&node.label)
            .is_some_and(|ids| ids.contains(&node.id))
    }

    pub fn len(&self) -> usize {
        self.ids.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reference that was dropped because an endpoint does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub label: RelationType,
    pub from: NodeRef,
    pub to: NodeRef,
    pub missing: NodeRef,
}

/// Relationship records grouped by output table, each in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct RelationSet {
    pub general: Vec<GeneralRelation>,
    pub contribute: Vec<ContributeRelation>,
    pub implemented: Vec<ImplementedRelation>,
    pub forks: Vec<ForkRelation>,
}

impl RelationSet {
    pub fn len(&self) -> usize {
        self.general.len() + self.contribute.len() + self.implemented.len() + self.forks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Relationship counts keyed by relationship type.
    pub fn counts(&self) -> HashMap<RelationType, usize> {
        let mut counts = HashMap::new();
        for rel in &self.general {
            *counts.entry(rel.label).or_insert(0) += 1;
        }
        for rel in &self.contribute {
            *counts.entry(rel.label).or_insert(0) += 1;
        }
        if !self.implemented.is_empty() {
            counts.insert(RelationType::ImplementedBy, self.implemented.len());
        }
        if !self.forks.is_empty() {
            counts.insert(RelationType::Forks, self.forks.len());
        }
        counts
    }
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub relations: RelationSet,
    pub dangling: Vec<DanglingReference>,
}

/// Resolves every explicit reference against `index`. Identical references
/// (same type and endpoints) are kept once; the first occurrence wins.
pub fn resolve_references(references: &[Relation], index: &NodeIndex) -> Resolution {
    let mut resolution = Resolution::default();
    let mut seen: HashSet<(RelationType, NodeRef, NodeRef)> = HashSet::new();

    for reference in references {
        let label = reference.label();
        let (from, to) = reference.endpoints();

        let missing = [&from, &to]
            .into_iter()
            .find(|node| !index.contains(node))
            .cloned();
        if let Some(missing) = missing {
            log::warn!(
                "Dropping {} {} -> {}: {} does not exist",
                label,
                from,
                to,
                missing
            );
            resolution.dangling.push(DanglingReference {
                label,
                from,
                to,
                missing,
            });
            continue;
        }

        if !seen.insert((label, from, to)) {
            continue;
        }

        match reference {
            Relation::General(rel) => resolution.relations.general.push(rel.clone()),
            Relation::Contribute(rel) => resolution.relations.contribute.push(rel.clone()),
            Relation::Implemented(rel) => resolution.relations.implemented.push(rel.clone()),
        }
    }

    log::info!(
        "Resolved {} explicit relationships, dropped {} dangling references",
        resolution.relations.len(),
        resolution.dangling.len()
    );
    resolution
}
