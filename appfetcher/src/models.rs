//! Raw source records as they arrive from disk, before normalization.
//!
//! CSV rows deserialize every column as an optional string: an empty cell or
//! a missing column is `None`, and all typing happens in the mapper.

use serde::Deserialize;

/// One row of the repository list.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RepositoryRow {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub owner_login: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub forks_count: Option<String>,
    pub stargazers_count: Option<String>,
    pub subscribers_count: Option<String>,
    pub watchers_count: Option<String>,
    pub network_count: Option<String>,
    pub owner_type: Option<String>,
    pub parent_id: Option<String>,
    pub source_id: Option<String>,
    /// Comma-separated package names implemented by this repository.
    pub packages: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SnapshotRow {
    pub web_url: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CommitRow {
    pub id: Option<String>,
    pub short_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub additions: Option<String>,
    pub deletions: Option<String>,
    pub total: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub authored_date: Option<String>,
    pub committed_date: Option<String>,
    /// Comma-separated parent hashes.
    pub parent_ids: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BranchRow {
    pub branch_name: Option<String>,
    pub commit_hash: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TagRow {
    pub tag_name: Option<String>,
    pub tag_message: Option<String>,
    pub commit_hash: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PathRow {
    pub package: Option<String>,
    pub manifest_path: Option<String>,
    pub build_path: Option<String>,
}

/// Extra category document stored under `categories/<package>.json`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryRecord {
    pub app_category: Option<String>,
}

/// Everything known about one package from the play details directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayListing {
    /// File stem the listing was found under.
    pub package: String,
    /// Parsed `<package>.json`, when present.
    pub details: Option<serde_json::Value>,
    pub category: Option<CategoryRecord>,
    /// Modification time of the file the listing was read from.
    pub modified_at: Option<i64>,
}

/// The per-repository CSV files found under the details directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryDetails {
    pub snapshot: Option<SnapshotRow>,
    pub commits: Vec<CommitRow>,
    pub branches: Vec<BranchRow>,
    pub tags: Vec<TagRow>,
    pub paths: Vec<PathRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryRecord {
    pub row: RepositoryRow,
    pub details: RepositoryDetails,
}

/// All raw records of one batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecords {
    pub listings: Vec<PlayListing>,
    pub repositories: Vec<RepositoryRecord>,
    /// Rows that could not be read at all (wrong column count and the like).
    pub unreadable_rows: usize,
}
