//! Bulk-import file sets: one delimited file per node or relationship type,
//! a header row in a stable column order, and a `manifest.json` describing it.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::codec::{decode_field, encode_field, FieldValue, FIELD_DELIMITER};
use crate::config::EmitOptions;
use crate::errors::{Result, StorageError};
use crate::fetch::AnyFetchable;
use crate::models::{BulkManifest, ColumnSpec, TableFile, TableManifest, MANIFEST_FILE};

pub struct BulkEmitter {
    output_dir: PathBuf,
    options: EmitOptions,
}

impl BulkEmitter {
    pub fn new(output_dir: impl Into<PathBuf>, options: EmitOptions) -> Self {
        Self {
            output_dir: output_dir.into(),
            options,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes every table plus the manifest. Any value that cannot be encoded
    /// aborts the whole emission with [`StorageError::Serialization`]; the
    /// caller owns cleanup of the partially written directory.
    pub fn emit(&self, tables: &[Box<dyn AnyFetchable>]) -> Result<BulkManifest> {
        fs::create_dir_all(&self.output_dir)?;
        let mut manifest = BulkManifest::default();

        for table in tables {
            let entry = self.emit_table(table.as_ref())?;
            log::debug!(
                "Wrote {} rows of '{}' across {} file(s)",
                entry.rows(),
                entry.name,
                entry.files.len()
            );
            manifest.tables.push(entry);
        }

        let manifest_path = self.output_dir.join(MANIFEST_FILE);
        let writer = BufWriter::new(File::create(&manifest_path)?);
        serde_json::to_writer_pretty(writer, &manifest)?;

        log::info!(
            "Emitted {} tables ({} rows) to {}",
            manifest.tables.len(),
            manifest.total_rows(),
            self.output_dir.display()
        );
        Ok(manifest)
    }

    fn emit_table(&self, table: &dyn AnyFetchable) -> Result<TableManifest> {
        let name = table.entity_type_any();
        let columns = table.columns_any();
        let headers: Vec<String> = columns.iter().map(|column| column.header()).collect();
        let chunk_size = match self.options.max_rows_per_file {
            Some(limit) if table.splittable_any() && limit > 0 => Some(limit),
            _ => None,
        };

        let mut files = Vec::new();
        let mut writer: Option<(PathBuf, csv::Writer<File>, usize)> = None;

        for (row_idx, row) in table.rows_any().enumerate() {
            if row.len() != columns.len() {
                return Err(StorageError::InvalidArg(format!(
                    "table '{name}' row {row_idx} has {} fields, expected {}",
                    row.len(),
                    columns.len()
                )));
            }

            let needs_new_file = match (&writer, chunk_size) {
                (None, _) => true,
                (Some((_, _, rows)), Some(limit)) => *rows >= limit,
                (Some(_), None) => false,
            };
            if needs_new_file {
                if let Some(done) = writer.take() {
                    files.push(finish_file(done)?);
                }
                let relative = file_name(name, chunk_size.map(|_| files.len()));
                writer = Some((relative.clone(), self.open_writer(&relative, &headers)?, 0));
            }

            let mut record = Vec::with_capacity(row.len());
            for (value, column) in row.iter().zip(columns) {
                let encoded =
                    encode_field(value).map_err(|source| StorageError::Serialization {
                        table: name.to_string(),
                        column: column.name.to_string(),
                        row: row_idx,
                        source,
                    })?;
                record.push(encoded);
            }

            if let Some((_, csv_writer, rows)) = writer.as_mut() {
                csv_writer.write_record(&record)?;
                *rows += 1;
            }
        }

        match writer.take() {
            Some(done) => files.push(finish_file(done)?),
            None => {
                // empty tables still get a header-only file
                let relative = file_name(name, chunk_size.map(|_| 0));
                files.push(finish_file((
                    relative.clone(),
                    self.open_writer(&relative, &headers)?,
                    0,
                ))?);
            }
        }

        Ok(TableManifest {
            name: name.to_string(),
            category: table.category_any(),
            label: table.graph_label_any().map(str::to_string),
            columns: columns.iter().map(ColumnSpec::from).collect(),
            files,
        })
    }

    fn open_writer(&self, relative: &Path, headers: &[String]) -> Result<csv::Writer<File>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .from_path(self.output_dir.join(relative))?;
        writer.write_record(headers)?;
        Ok(writer)
    }
}

fn file_name(table: &str, part: Option<usize>) -> PathBuf {
    match part {
        Some(part) => PathBuf::from(format!("{table}.part-{part:04}.csv")),
        None => PathBuf::from(format!("{table}.csv")),
    }
}

fn finish_file((path, mut writer, rows): (PathBuf, csv::Writer<File>, usize)) -> Result<TableFile> {
    writer.flush()?;
    Ok(TableFile { path, rows })
}

/// Reads an emitted file set back into typed rows.
pub struct BulkReader {
    dir: PathBuf,
}

impl BulkReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn read_manifest(&self) -> Result<BulkManifest> {
        let path = self.dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(StorageError::NotFound(format!(
                "no manifest at {}",
                path.display()
            )));
        }
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn read_table_by_name(
        &self,
        manifest: &BulkManifest,
        name: &str,
    ) -> Result<Vec<Vec<FieldValue>>> {
        let table = manifest
            .table(name)
            .ok_or_else(|| StorageError::NotFound(format!("table '{name}'")))?;
        self.read_table(table)
    }

    /// Decodes every file of `table` in manifest order.
    pub fn read_table(&self, table: &TableManifest) -> Result<Vec<Vec<FieldValue>>> {
        let expected = table.headers();
        let mut rows = Vec::with_capacity(table.rows());

        for file in &table.files {
            let mut reader = csv::ReaderBuilder::new()
                .delimiter(FIELD_DELIMITER)
                .has_headers(true)
                .from_path(self.dir.join(&file.path))?;

            let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
            if headers != expected {
                return Err(StorageError::MalformedRecord(format!(
                    "{} has header {:?}, expected {:?}",
                    file.path.display(),
                    headers,
                    expected
                )));
            }

            for record in reader.records() {
                let record = record?;
                let row_idx = rows.len();
                let mut row = Vec::with_capacity(table.columns.len());
                for (raw, column) in record.iter().zip(&table.columns) {
                    let value = decode_field(column.kind, raw).map_err(|source| {
                        StorageError::Deserialization {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            row: row_idx,
                            source,
                        }
                    })?;
                    row.push(value);
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }
}
