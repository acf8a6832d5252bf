pub mod edges;
pub mod nodes;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use edges::{
    ContributeRelation, ForkRelation, GeneralRelation, ImplementedRelation, Relation,
    RelationType,
};
pub use nodes::{
    App, Branch, Commit, Contributor, GitHubRepository, GooglePlayPage, OwnerType, Tag,
};

/// Node types of the app graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    App,
    GooglePlayPage,
    GitHubRepository,
    Commit,
    Contributor,
    Branch,
    Tag,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::App => "App",
            NodeLabel::GooglePlayPage => "GooglePlayPage",
            NodeLabel::GitHubRepository => "GitHubRepository",
            NodeLabel::Commit => "Commit",
            NodeLabel::Contributor => "Contributor",
            NodeLabel::Branch => "Branch",
            NodeLabel::Tag => "Tag",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed pointer to a node identity; the target may or may not exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub id: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, id: impl Into<String>) -> Self {
        Self {
            label,
            id: id.into(),
        }
    }

    pub fn repository(id: i64) -> Self {
        Self::new(NodeLabel::GitHubRepository, id.to_string())
    }

    pub fn commit(hash: impl Into<String>) -> Self {
        Self::new(NodeLabel::Commit, hash)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label, self.id)
    }
}
