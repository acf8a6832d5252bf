use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{Column, FieldValue};
use crate::fetch::{EntityCategory, Fetchable};
use crate::schemas::{NodeLabel, NodeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    PublishedAt,
    ImplementedBy,
    BelongsTo,
    PointsTo,
    Parent,
    Authors,
    Commits,
    Forks,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::PublishedAt => "PUBLISHED_AT",
            RelationType::ImplementedBy => "IMPLEMENTED_BY",
            RelationType::BelongsTo => "BELONGS_TO",
            RelationType::PointsTo => "POINTS_TO",
            RelationType::Parent => "PARENT",
            RelationType::Authors => "AUTHORS",
            RelationType::Commits => "COMMITS",
            RelationType::Forks => "FORKS",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ENDPOINT_COLUMNS: [Column; 5] = [
    Column::text("from_type"),
    Column::text("from_id"),
    Column::text("to_type"),
    Column::text("to_id"),
    Column::text("label"),
];

fn endpoint_row(label: RelationType, from: &NodeRef, to: &NodeRef) -> Vec<FieldValue> {
    vec![
        FieldValue::id(from.label.as_str()),
        FieldValue::id(&from.id),
        FieldValue::id(to.label.as_str()),
        FieldValue::id(&to.id),
        FieldValue::id(label.as_str()),
    ]
}

/// Property-less relationships: `PUBLISHED_AT`, `BELONGS_TO`, `POINTS_TO`, `PARENT`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralRelation {
    pub label: RelationType,
    pub from: NodeRef,
    pub to: NodeRef,
}

impl GeneralRelation {
    pub fn new(label: RelationType, from: NodeRef, to: NodeRef) -> Self {
        Self { label, from, to }
    }
}

const GENERAL_COLUMNS: &[Column] = &ENDPOINT_COLUMNS;

impl Fetchable for GeneralRelation {
    const ENTITY_TYPE: &'static str = "general_relations";

    fn primary_keys() -> Vec<&'static str> {
        vec!["from_id", "to_id", "label"]
    }

    fn category() -> EntityCategory {
        EntityCategory::Edge
    }

    fn columns() -> &'static [Column] {
        GENERAL_COLUMNS
    }

    fn to_row(&self) -> Vec<FieldValue> {
        endpoint_row(self.label, &self.from, &self.to)
    }
}

/// `AUTHORS` / `COMMITS` from a contributor to a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ContributeRelation {
    pub label: RelationType,
    pub contributor: String,
    pub commit: String,
    pub timestamp: Option<i64>,
}

const CONTRIBUTE_COLUMNS: &[Column] = &[
    ENDPOINT_COLUMNS[0],
    ENDPOINT_COLUMNS[1],
    ENDPOINT_COLUMNS[2],
    ENDPOINT_COLUMNS[3],
    ENDPOINT_COLUMNS[4],
    Column::integer("timestamp"),
];

impl ContributeRelation {
    pub fn from_ref(&self) -> NodeRef {
        NodeRef::new(NodeLabel::Contributor, &self.contributor)
    }

    pub fn to_ref(&self) -> NodeRef {
        NodeRef::commit(&self.commit)
    }
}

impl Fetchable for ContributeRelation {
    const ENTITY_TYPE: &'static str = "contribute_relations";

    fn primary_keys() -> Vec<&'static str> {
        vec!["from_id", "to_id", "label"]
    }

    fn category() -> EntityCategory {
        EntityCategory::Edge
    }

    fn columns() -> &'static [Column] {
        CONTRIBUTE_COLUMNS
    }

    fn to_row(&self) -> Vec<FieldValue> {
        let mut row = endpoint_row(self.label, &self.from_ref(), &self.to_ref());
        row.push(FieldValue::Integer(self.timestamp));
        row
    }
}

/// `IMPLEMENTED_BY` from an app to the repository holding its sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplementedRelation {
    pub app_id: String,
    pub repository_id: i64,
    pub manifest_paths: Vec<String>,
    pub build_paths: Vec<String>,
}

const IMPLEMENTED_COLUMNS: &[Column] = &[
    ENDPOINT_COLUMNS[0],
    ENDPOINT_COLUMNS[1],
    ENDPOINT_COLUMNS[2],
    ENDPOINT_COLUMNS[3],
    ENDPOINT_COLUMNS[4],
    Column::list("manifestPaths"),
    Column::list("buildPaths"),
];

impl ImplementedRelation {
    pub fn from_ref(&self) -> NodeRef {
        NodeRef::new(NodeLabel::App, &self.app_id)
    }

    pub fn to_ref(&self) -> NodeRef {
        NodeRef::repository(self.repository_id)
    }
}

impl Fetchable for ImplementedRelation {
    const ENTITY_TYPE: &'static str = "implemented_relations";

    fn primary_keys() -> Vec<&'static str> {
        vec!["from_id", "to_id"]
    }

    fn category() -> EntityCategory {
        EntityCategory::Edge
    }

    fn columns() -> &'static [Column] {
        IMPLEMENTED_COLUMNS
    }

    fn to_row(&self) -> Vec<FieldValue> {
        let mut row = endpoint_row(RelationType::ImplementedBy, &self.from_ref(), &self.to_ref());
        row.push(FieldValue::TextList(Some(self.manifest_paths.clone())));
        row.push(FieldValue::TextList(Some(self.build_paths.clone())));
        row
    }
}

/// Derived `FORKS` edge between two repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForkRelation {
    pub fork_id: i64,
    pub parent_id: i64,
}

const FORK_COLUMNS: &[Column] = &ENDPOINT_COLUMNS;

impl Fetchable for ForkRelation {
    const ENTITY_TYPE: &'static str = "fork_relations";

    fn primary_keys() -> Vec<&'static str> {
        vec!["from_id", "to_id"]
    }

    fn category() -> EntityCategory {
        EntityCategory::Edge
    }

    fn columns() -> &'static [Column] {
        FORK_COLUMNS
    }

    fn to_row(&self) -> Vec<FieldValue> {
        endpoint_row(
            RelationType::Forks,
            &NodeRef::repository(self.fork_id),
            &NodeRef::repository(self.parent_id),
        )
    }
}

/// An explicit cross-reference taken from one source record. It becomes an
/// emitted relationship only if both endpoints exist.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    General(GeneralRelation),
    Contribute(ContributeRelation),
    Implemented(ImplementedRelation),
}

impl Relation {
    pub fn label(&self) -> RelationType {
        match self {
            Relation::General(rel) => rel.label,
            Relation::Contribute(rel) => rel.label,
            Relation::Implemented(_) => RelationType::ImplementedBy,
        }
    }

    pub fn endpoints(&self) -> (NodeRef, NodeRef) {
        match self {
            Relation::General(rel) => (rel.from.clone(), rel.to.clone()),
            Relation::Contribute(rel) => (rel.from_ref(), rel.to_ref()),
            Relation::Implemented(rel) => (rel.from_ref(), rel.to_ref()),
        }
    }
}

impl From<GeneralRelation> for Relation {
    fn from(value: GeneralRelation) -> Self {
        Relation::General(value)
    }
}

impl From<ContributeRelation> for Relation {
    fn from(value: ContributeRelation) -> Self {
        Relation::Contribute(value)
    }
}

impl From<ImplementedRelation> for Relation {
    fn from(value: ImplementedRelation) -> Self {
        Relation::Implemented(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_row_is_keyed_by_repository_ids() {
        let row = ForkRelation {
            fork_id: 2,
            parent_id: 1,
        }
        .to_row();
        assert_eq!(row[0].as_str(), Some("GitHubRepository"));
        assert_eq!(row[1].as_str(), Some("2"));
        assert_eq!(row[3].as_str(), Some("1"));
        assert_eq!(row[4].as_str(), Some("FORKS"));
    }

    #[test]
    fn relation_rows_match_columns() {
        let contribute = ContributeRelation {
            label: RelationType::Authors,
            contributor: "dev@example.org".into(),
            commit: "abc".into(),
            timestamp: None,
        };
        assert_eq!(contribute.to_row().len(), ContributeRelation::columns().len());

        let implemented = ImplementedRelation {
            app_id: "app".into(),
            repository_id: 7,
            manifest_paths: vec![],
            build_paths: vec![],
        };
        assert_eq!(implemented.to_row().len(), ImplementedRelation::columns().len());
        assert_eq!(
            Relation::from(implemented).endpoints().1,
            NodeRef::repository(7)
        );
    }
}
