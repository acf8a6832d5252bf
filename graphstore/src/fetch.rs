use crate::codec::{Column, FieldValue};
use crate::errors::{Result, StorageError};
use crate::schemas::{
    App, Branch, Commit, Contributor, GitHubRepository, GooglePlayPage, NodeLabel, Relation, Tag,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// The category of an entity in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Node,
    Edge,
}

impl FromStr for EntityCategory {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "node" => Ok(EntityCategory::Node),
            "edge" => Ok(EntityCategory::Edge),
            other => Err(StorageError::InvalidArg(format!(
                "unknown entity category '{other}'"
            ))),
        }
    }
}

/// A record type that maps onto one bulk-import table with a fixed column order.
pub trait Fetchable: Send + Sync + Clone + 'static {
    const ENTITY_TYPE: &'static str;
    fn table_name() -> String {
        Self::ENTITY_TYPE.to_string()
    }
    fn primary_keys() -> Vec<&'static str>;
    /// Specifies the category of the entity in the graph.
    fn category() -> EntityCategory;
    /// Store label for node tables.
    fn graph_label() -> Option<&'static str> {
        None
    }
    /// Whether the table may be split across several files.
    fn splittable() -> bool {
        false
    }
    fn columns() -> &'static [Column];
    fn to_row(&self) -> Vec<FieldValue>;
}

// A helper trait for type erasure.
pub trait AnyFetchable: Send {
    fn entity_type_any(&self) -> &'static str;
    fn category_any(&self) -> EntityCategory;
    fn graph_label_any(&self) -> Option<&'static str>;
    fn splittable_any(&self) -> bool;
    fn columns_any(&self) -> &'static [Column];
    fn row_count_any(&self) -> usize;
    fn rows_any(&self) -> Box<dyn Iterator<Item = Vec<FieldValue>> + '_>;
}

impl<T: Fetchable + 'static> AnyFetchable for Vec<T> {
    fn entity_type_any(&self) -> &'static str {
        T::ENTITY_TYPE
    }
    fn category_any(&self) -> EntityCategory {
        T::category()
    }
    fn graph_label_any(&self) -> Option<&'static str> {
        T::graph_label()
    }
    fn splittable_any(&self) -> bool {
        T::splittable()
    }
    fn columns_any(&self) -> &'static [Column] {
        T::columns()
    }
    fn row_count_any(&self) -> usize {
        self.len()
    }
    fn rows_any(&self) -> Box<dyn Iterator<Item = Vec<FieldValue>> + '_> {
        Box::new(self.iter().map(T::to_row))
    }
}

/// A node type with a unique identity inside its table.
pub trait GraphNode: Fetchable + Sized {
    const LABEL: NodeLabel;
    fn identity(&self) -> String;
    /// Folds a later occurrence of the same identity into this node.
    /// Present fields are kept; absent ones are filled from `other`.
    fn merge_from(&mut self, other: Self);
    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self>;
}

/// Insertion-ordered node collection keyed by identity.
#[derive(Debug, Clone)]
pub struct NodeTable<T> {
    rows: Vec<T>,
    positions: HashMap<String, usize>,
}

impl<T> Default for NodeTable<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: GraphNode> NodeTable<T> {
    /// Returns `true` when the identity was not seen before.
    pub fn insert(&mut self, node: T) -> bool {
        let key = node.identity();
        match self.positions.get(&key) {
            Some(&idx) => {
                self.rows[idx].merge_from(node);
                false
            }
            None => {
                self.positions.insert(key, self.rows.len());
                self.rows.push(node);
                true
            }
        }
    }

    pub fn get(&self, identity: &str) -> Option<&T> {
        self.positions.get(identity).map(|&idx| &self.rows[idx])
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.positions.contains_key(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

/// A unified container for all data related to a graph update: normalized
/// nodes plus the explicit references that still need resolving.
#[derive(Default, Debug, Clone)]
pub struct GraphData {
    pub apps: NodeTable<App>,
    pub play_pages: NodeTable<GooglePlayPage>,
    pub repositories: NodeTable<GitHubRepository>,
    pub commits: NodeTable<Commit>,
    pub contributors: NodeTable<Contributor>,
    pub branches: NodeTable<Branch>,
    pub tags: NodeTable<Tag>,
    pub references: Vec<Relation>,
    /// Source records dropped as malformed while building this graph.
    pub dropped_records: usize,
}

impl GraphData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds nodes of one type, merging duplicates. Returns how many were new.
    pub fn add_entities<T: GraphNode>(&mut self, entities: Vec<T>) -> usize {
        let table = T::table_mut(self);
        entities
            .into_iter()
            .map(|node| table.insert(node))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn add_entity<T: GraphNode>(&mut self, entity: T) -> bool {
        T::table_mut(self).insert(entity)
    }

    pub fn add_reference(&mut self, relation: impl Into<Relation>) {
        self.references.push(relation.into());
    }

    pub fn record_malformed(&mut self) {
        self.dropped_records += 1;
    }

    pub fn node_count(&self) -> usize {
        self.apps.len()
            + self.play_pages.len()
            + self.repositories.len()
            + self.commits.len()
            + self.contributors.len()
            + self.branches.len()
            + self.tags.len()
    }

    /// Moves every node table into its type-erased emission form.
    pub fn into_node_tables(self) -> Vec<Box<dyn AnyFetchable>> {
        vec![
            Box::new(self.apps.into_rows()),
            Box::new(self.play_pages.into_rows()),
            Box::new(self.repositories.into_rows()),
            Box::new(self.commits.into_rows()),
            Box::new(self.contributors.into_rows()),
            Box::new(self.branches.into_rows()),
            Box::new(self.tags.into_rows()),
        ]
    }
}

/// The seam between a record source and the graph pipeline.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, params: serde_json::Value) -> Result<GraphData>;
}
