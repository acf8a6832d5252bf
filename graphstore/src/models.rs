use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::codec::{Column, FieldKind, ARRAY_DELIMITER, EMPTY_LIST_MARKER, NULL_MARKER};
use crate::fetch::EntityCategory;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Describes one emitted bulk-import file set. Written next to the tables as
/// `manifest.json`; the reader and the persistence bridge both work from it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BulkManifest {
    pub generated_at: DateTime<Utc>,
    pub field_delimiter: char,
    pub array_delimiter: char,
    pub null_marker: String,
    pub empty_list_marker: String,
    pub tables: Vec<TableManifest>,
}

impl Default for BulkManifest {
    fn default() -> Self {
        Self {
            generated_at: Utc::now(),
            field_delimiter: ',',
            array_delimiter: ARRAY_DELIMITER,
            null_marker: NULL_MARKER.to_string(),
            empty_list_marker: EMPTY_LIST_MARKER.to_string(),
            tables: Vec::new(),
        }
    }
}

impl BulkManifest {
    pub fn table(&self, name: &str) -> Option<&TableManifest> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn node_tables(&self) -> impl Iterator<Item = &TableManifest> {
        self.tables
            .iter()
            .filter(|table| table.category == EntityCategory::Node)
    }

    pub fn edge_tables(&self) -> impl Iterator<Item = &TableManifest> {
        self.tables
            .iter()
            .filter(|table| table.category == EntityCategory::Edge)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(TableManifest::rows).sum()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TableManifest {
    pub name: String,
    pub category: EntityCategory,
    /// Store label for node tables; relationship rows carry their own label column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub files: Vec<TableFile>,
}

impl TableManifest {
    pub fn rows(&self) -> usize {
        self.files.iter().map(|file| file.rows).sum()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(ColumnSpec::header).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl ColumnSpec {
    pub fn header(&self) -> String {
        match self.kind {
            FieldKind::TextList => format!("{}[]", self.name),
            _ => self.name.clone(),
        }
    }
}

impl From<&Column> for ColumnSpec {
    fn from(column: &Column) -> Self {
        Self {
            name: column.name.to_string(),
            kind: column.kind,
        }
    }
}

/// One file of a table, relative to the output directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TableFile {
    pub path: PathBuf,
    pub rows: usize,
}

/// Counters for one pipeline run.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub nodes: BTreeMap<String, usize>,
    pub relations: BTreeMap<String, usize>,
    pub dropped_records: usize,
    pub dangling_references: usize,
    pub self_references: usize,
}

impl PipelineReport {
    pub fn node_total(&self) -> usize {
        self.nodes.values().sum()
    }

    pub fn relation_total(&self) -> usize {
        self.relations.values().sum()
    }
}

/// What a completed `process_graph_data` run produced.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub output_dir: PathBuf,
    pub manifest: BulkManifest,
    pub report: PipelineReport,
}
