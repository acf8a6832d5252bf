use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::{Column, FieldValue};
use crate::fetch::{EntityCategory, Fetchable, GraphData, GraphNode, NodeTable};
use crate::schemas::NodeLabel;
use crate::utils::id::stable_node_uuid;

/// Fills every listed field that is still `None` from `$other`.
macro_rules! fill_absent {
    ($target:ident, $other:ident; $($field:ident),+ $(,)?) => {
        $(
            if $target.$field.is_none() {
                $target.$field = $other.$field;
            }
        )+
    };
}

/// Implements `Fetchable` + `GraphNode` boilerplate for a node struct.
macro_rules! node_table {
    ($ty:ty, $table:literal, $label:expr, $columns:expr) => {
        impl Fetchable for $ty {
            const ENTITY_TYPE: &'static str = $table;

            fn primary_keys() -> Vec<&'static str> {
                vec!["id"]
            }

            fn category() -> EntityCategory {
                EntityCategory::Node
            }

            fn graph_label() -> Option<&'static str> {
                Some($label.as_str())
            }

            fn columns() -> &'static [Column] {
                $columns
            }

            fn to_row(&self) -> Vec<FieldValue> {
                self.row()
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct App {
    /// Synthetic identity derived from the package name.
    pub id: String,
    pub package: String,
}

const APP_COLUMNS: &[Column] = &[Column::text("id"), Column::text("package")];

impl App {
    pub fn for_package(package: &str) -> Self {
        Self {
            id: stable_node_uuid("App", &[("package", package.to_string())]),
            package: package.to_string(),
        }
    }

    fn row(&self) -> Vec<FieldValue> {
        vec![FieldValue::id(&self.id), FieldValue::id(&self.package)]
    }
}

node_table!(App, "apps", NodeLabel::App, APP_COLUMNS);

impl GraphNode for App {
    const LABEL: NodeLabel = NodeLabel::App;

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn merge_from(&mut self, _other: Self) {}

    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self> {
        &mut graph.apps
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GooglePlayPage {
    pub doc_id: String,
    pub uri: Option<String>,
    pub snapshot_timestamp: Option<i64>,
    pub title: Option<String>,
    pub app_category: Option<Vec<String>>,
    pub promotional_description: Option<String>,
    pub description_html: Option<String>,
    pub translated_description_html: Option<String>,
    pub version_code: Option<i64>,
    pub version_string: Option<String>,
    pub upload_date: Option<i64>,
    pub formatted_amount: Option<String>,
    pub currency_code: Option<String>,
    pub in_app_purchases: Option<String>,
    pub install_notes: Option<String>,
    pub star_rating: Option<f64>,
    pub num_downloads: Option<String>,
    pub developer_name: Option<String>,
    pub developer_email: Option<String>,
    pub developer_website: Option<String>,
    pub target_sdk_version: Option<i64>,
    pub permissions: Option<Vec<String>>,
}

const PLAY_PAGE_COLUMNS: &[Column] = &[
    Column::text("id"),
    Column::text("uri"),
    Column::integer("snapshotTimestamp"),
    Column::text("title"),
    Column::list("appCategory"),
    Column::text("promotionalDescription"),
    Column::text("descriptionHtml"),
    Column::text("translatedDescriptionHtml"),
    Column::integer("versionCode"),
    Column::text("versionString"),
    Column::integer("uploadDate"),
    Column::text("formattedAmount"),
    Column::text("currencyCode"),
    Column::text("inAppPurchases"),
    Column::text("installNotes"),
    Column::float("starRating"),
    Column::text("numDownloads"),
    Column::text("developerName"),
    Column::text("developerEmail"),
    Column::text("developerWebsite"),
    Column::integer("targetSdkVersion"),
    Column::list("permissions"),
];

impl GooglePlayPage {
    fn row(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::id(&self.doc_id),
            FieldValue::text(&self.uri),
            FieldValue::Integer(self.snapshot_timestamp),
            FieldValue::text(&self.title),
            FieldValue::list(&self.app_category),
            FieldValue::text(&self.promotional_description),
            FieldValue::text(&self.description_html),
            FieldValue::text(&self.translated_description_html),
            FieldValue::Integer(self.version_code),
            FieldValue::text(&self.version_string),
            FieldValue::Integer(self.upload_date),
            FieldValue::text(&self.formatted_amount),
            FieldValue::text(&self.currency_code),
            FieldValue::text(&self.in_app_purchases),
            FieldValue::text(&self.install_notes),
            FieldValue::Float(self.star_rating),
            FieldValue::text(&self.num_downloads),
            FieldValue::text(&self.developer_name),
            FieldValue::text(&self.developer_email),
            FieldValue::text(&self.developer_website),
            FieldValue::Integer(self.target_sdk_version),
            FieldValue::list(&self.permissions),
        ]
    }
}

node_table!(
    GooglePlayPage,
    "play_pages",
    NodeLabel::GooglePlayPage,
    PLAY_PAGE_COLUMNS
);

impl GraphNode for GooglePlayPage {
    const LABEL: NodeLabel = NodeLabel::GooglePlayPage;

    fn identity(&self) -> String {
        self.doc_id.clone()
    }

    fn merge_from(&mut self, other: Self) {
        fill_absent!(self, other;
            uri, snapshot_timestamp, title, app_category, promotional_description,
            description_html, translated_description_html, version_code, version_string,
            upload_date, formatted_amount, currency_code, in_app_purchases, install_notes,
            star_rating, num_downloads, developer_name, developer_email, developer_website,
            target_sdk_version, permissions,
        );
    }

    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self> {
        &mut graph.play_pages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerType {
    User,
    Organization,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::User => "User",
            OwnerType::Organization => "Organization",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "User" => Ok(OwnerType::User),
            "Organization" => Ok(OwnerType::Organization),
            other => Err(format!("unknown owner type '{other}'")),
        }
    }
}

/// Sentinel used by `parent_id` / `source_id` for "not a fork".
pub const NO_PARENT: i64 = -1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitHubRepository {
    pub id: i64,
    pub owner: Option<String>,
    pub name: Option<String>,
    pub snapshot: Option<String>,
    pub snapshot_timestamp: Option<i64>,
    pub description: Option<String>,
    pub created_at: Option<i64>,
    pub forks_count: Option<i64>,
    pub stargazers_count: Option<i64>,
    pub subscribers_count: Option<i64>,
    pub watchers_count: Option<i64>,
    pub network_count: Option<i64>,
    pub owner_type: Option<OwnerType>,
    pub parent_id: Option<i64>,
    pub source_id: Option<i64>,
}

impl GitHubRepository {
    /// Fork references that are set and not the sentinel, parent first.
    pub fn fork_references(&self) -> impl Iterator<Item = i64> + '_ {
        [self.parent_id, self.source_id]
            .into_iter()
            .flatten()
            .filter(|id| *id != NO_PARENT)
    }
}

const REPOSITORY_COLUMNS: &[Column] = &[
    Column::integer("id"),
    Column::text("owner"),
    Column::text("name"),
    Column::text("snapshot"),
    Column::integer("snapshotTimestamp"),
    Column::text("description"),
    Column::integer("createdAt"),
    Column::integer("forksCount"),
    Column::integer("stargazersCount"),
    Column::integer("subscribersCount"),
    Column::integer("watchersCount"),
    Column::integer("networkCount"),
    Column::text("ownerType"),
    Column::integer("parentId"),
    Column::integer("sourceId"),
];

impl GitHubRepository {
    fn row(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Integer(Some(self.id)),
            FieldValue::text(&self.owner),
            FieldValue::text(&self.name),
            FieldValue::text(&self.snapshot),
            FieldValue::Integer(self.snapshot_timestamp),
            FieldValue::text(&self.description),
            FieldValue::Integer(self.created_at),
            FieldValue::Integer(self.forks_count),
            FieldValue::Integer(self.stargazers_count),
            FieldValue::Integer(self.subscribers_count),
            FieldValue::Integer(self.watchers_count),
            FieldValue::Integer(self.network_count),
            FieldValue::Text(self.owner_type.map(|t| t.as_str().to_string())),
            FieldValue::Integer(self.parent_id),
            FieldValue::Integer(self.source_id),
        ]
    }
}

node_table!(
    GitHubRepository,
    "repos",
    NodeLabel::GitHubRepository,
    REPOSITORY_COLUMNS
);

impl GraphNode for GitHubRepository {
    const LABEL: NodeLabel = NodeLabel::GitHubRepository;

    fn identity(&self) -> String {
        self.id.to_string()
    }

    fn merge_from(&mut self, other: Self) {
        fill_absent!(self, other;
            owner, name, snapshot, snapshot_timestamp, description, created_at, forks_count,
            stargazers_count, subscribers_count, watchers_count, network_count, owner_type,
            parent_id, source_id,
        );
    }

    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self> {
        &mut graph.repositories
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commit {
    pub id: String,
    pub short_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub total: Option<i64>,
    pub authored_at: Option<i64>,
    pub committed_at: Option<i64>,
}

const COMMIT_COLUMNS: &[Column] = &[
    Column::text("id"),
    Column::text("shortId"),
    Column::text("title"),
    Column::text("message"),
    Column::integer("additions"),
    Column::integer("deletions"),
    Column::integer("total"),
    Column::integer("authoredAt"),
    Column::integer("committedAt"),
];

impl Commit {
    fn row(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::id(&self.id),
            FieldValue::text(&self.short_id),
            FieldValue::text(&self.title),
            FieldValue::text(&self.message),
            FieldValue::Integer(self.additions),
            FieldValue::Integer(self.deletions),
            FieldValue::Integer(self.total),
            FieldValue::Integer(self.authored_at),
            FieldValue::Integer(self.committed_at),
        ]
    }
}

impl Fetchable for Commit {
    const ENTITY_TYPE: &'static str = "commits";

    fn primary_keys() -> Vec<&'static str> {
        vec!["id"]
    }

    fn category() -> EntityCategory {
        EntityCategory::Node
    }

    fn graph_label() -> Option<&'static str> {
        Some(NodeLabel::Commit.as_str())
    }

    fn splittable() -> bool {
        true
    }

    fn columns() -> &'static [Column] {
        COMMIT_COLUMNS
    }

    fn to_row(&self) -> Vec<FieldValue> {
        self.row()
    }
}

impl GraphNode for Commit {
    const LABEL: NodeLabel = NodeLabel::Commit;

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn merge_from(&mut self, other: Self) {
        fill_absent!(self, other;
            short_id, title, message, additions, deletions, total, authored_at, committed_at,
        );
    }

    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self> {
        &mut graph.commits
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contributor {
    /// E-mail address; contributors are merged across repositories on it.
    pub email: String,
    pub name: Option<String>,
}

const CONTRIBUTOR_COLUMNS: &[Column] = &[Column::text("id"), Column::text("name")];

impl Contributor {
    fn row(&self) -> Vec<FieldValue> {
        vec![FieldValue::id(&self.email), FieldValue::text(&self.name)]
    }
}

node_table!(
    Contributor,
    "contributors",
    NodeLabel::Contributor,
    CONTRIBUTOR_COLUMNS
);

impl GraphNode for Contributor {
    const LABEL: NodeLabel = NodeLabel::Contributor;

    fn identity(&self) -> String {
        self.email.clone()
    }

    fn merge_from(&mut self, other: Self) {
        fill_absent!(self, other; name);
    }

    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self> {
        &mut graph.contributors
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    /// Stable id over (repository, name).
    pub id: String,
    pub name: String,
    pub repository_id: i64,
}

const BRANCH_COLUMNS: &[Column] = &[
    Column::text("id"),
    Column::text("name"),
    Column::integer("repositoryId"),
];

impl Branch {
    pub fn new(repository_id: i64, name: &str) -> Self {
        Self {
            id: stable_node_uuid(
                "Branch",
                &[
                    ("repository", repository_id.to_string()),
                    ("name", name.to_string()),
                ],
            ),
            name: name.to_string(),
            repository_id,
        }
    }

    fn row(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::id(&self.id),
            FieldValue::id(&self.name),
            FieldValue::Integer(Some(self.repository_id)),
        ]
    }
}

node_table!(Branch, "branches", NodeLabel::Branch, BRANCH_COLUMNS);

impl GraphNode for Branch {
    const LABEL: NodeLabel = NodeLabel::Branch;

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn merge_from(&mut self, _other: Self) {}

    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self> {
        &mut graph.branches
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    /// Stable id over (repository, name).
    pub id: String,
    pub name: String,
    pub message: Option<String>,
    pub repository_id: i64,
}

const TAG_COLUMNS: &[Column] = &[
    Column::text("id"),
    Column::text("name"),
    Column::text("message"),
    Column::integer("repositoryId"),
];

impl Tag {
    pub fn new(repository_id: i64, name: &str, message: Option<String>) -> Self {
        Self {
            id: stable_node_uuid(
                "Tag",
                &[
                    ("repository", repository_id.to_string()),
                    ("name", name.to_string()),
                ],
            ),
            name: name.to_string(),
            message,
            repository_id,
        }
    }

    fn row(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::id(&self.id),
            FieldValue::id(&self.name),
            FieldValue::text(&self.message),
            FieldValue::Integer(Some(self.repository_id)),
        ]
    }
}

node_table!(Tag, "tags", NodeLabel::Tag, TAG_COLUMNS);

impl GraphNode for Tag {
    const LABEL: NodeLabel = NodeLabel::Tag;

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn merge_from(&mut self, other: Self) {
        fill_absent!(self, other; message);
    }

    fn table_mut(graph: &mut GraphData) -> &mut NodeTable<Self> {
        &mut graph.tags
    }
}
