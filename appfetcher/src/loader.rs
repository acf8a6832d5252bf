use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::models::{
    CategoryRecord, PlayListing, RepositoryDetails, RepositoryRecord, RepositoryRow, SourceRecords,
};
use crate::params::LoaderParams;

const CATEGORIES_DIR: &str = "categories";

/// Reads the three record sources of one batch run from disk.
///
/// Unreadable files and broken CSV/JSON structure abort the load; a single
/// row that cannot be read is logged, counted and skipped.
pub struct RecordLoader {
    params: LoaderParams,
}

impl RecordLoader {
    pub fn new(params: LoaderParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LoaderParams {
        &self.params
    }

    pub fn load(&self) -> Result<SourceRecords> {
        let mut records = SourceRecords {
            listings: self.load_listings()?,
            ..SourceRecords::default()
        };
        log::info!(
            "loaded {} play listings from {}",
            records.listings.len(),
            self.params.play_details_dir.display()
        );

        let rows: Vec<RepositoryRow> =
            read_rows(&self.params.repository_list, &mut records.unreadable_rows)?;
        for row in rows {
            let details = match row.id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => {
                    let dir = self.params.repo_details_dir.join(id);
                    load_details(&dir, &mut records.unreadable_rows)?
                }
                _ => RepositoryDetails::default(),
            };
            records.repositories.push(RepositoryRecord { row, details });
        }
        log::info!(
            "loaded {} repositories from {}",
            records.repositories.len(),
            self.params.repository_list.display()
        );
        Ok(records)
    }

    fn load_listings(&self) -> Result<Vec<PlayListing>> {
        let details_dir = &self.params.play_details_dir;
        let categories_dir = details_dir.join(CATEGORIES_DIR);

        let mut packages = json_stems(details_dir)?;
        if categories_dir.is_dir() {
            packages.extend(json_stems(&categories_dir)?);
        }

        let mut listings = Vec::with_capacity(packages.len());
        for package in packages {
            let file_name = format!("{package}.json");
            let details_path = details_dir.join(&file_name);
            let category_path = categories_dir.join(&file_name);

            let details = read_json_opt::<serde_json::Value>(&details_path)?;
            let category = read_json_opt::<CategoryRecord>(&category_path)?;
            let modified_at = if details.is_some() {
                modified_secs(&details_path)
            } else {
                log::warn!("no details for {package}, using its category file only");
                modified_secs(&category_path)
            };

            listings.push(PlayListing {
                package,
                details,
                category,
                modified_at,
            });
        }
        Ok(listings)
    }
}

fn load_details(dir: &Path, skipped: &mut usize) -> Result<RepositoryDetails> {
    if !dir.is_dir() {
        log::warn!("repository details directory {} is missing", dir.display());
        return Ok(RepositoryDetails::default());
    }
    Ok(RepositoryDetails {
        snapshot: read_rows_opt(&dir.join("snapshot.csv"), skipped)?
            .into_iter()
            .next(),
        commits: read_rows_opt(&dir.join("commits.csv"), skipped)?,
        branches: read_rows_opt(&dir.join("branches.csv"), skipped)?,
        tags: read_rows_opt(&dir.join("tags.csv"), skipped)?,
        paths: read_rows_opt(&dir.join("paths.csv"), skipped)?,
    })
}

/// Sorted stems of the `*.json` files directly inside `dir`.
fn json_stems(dir: &Path) -> Result<BTreeSet<String>> {
    let mut stems = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stems.insert(stem.to_string());
        }
    }
    Ok(stems)
}

fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(Some(serde_json::from_reader(reader)?))
}

fn modified_secs(path: &Path) -> Option<i64> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs() as i64)
}

fn read_rows_opt<T: DeserializeOwned>(path: &Path, skipped: &mut usize) -> Result<Vec<T>> {
    if !path.is_file() {
        log::warn!("cannot read {}, treating it as empty", path.display());
        return Ok(Vec::new());
    }
    read_rows(path, skipped)
}

/// Deserializes every row of a headed CSV file.
fn read_rows<T: DeserializeOwned>(path: &Path, skipped: &mut usize) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                log::warn!(
                    "skipping malformed row {} of {}: {err}",
                    idx + 1,
                    path.display()
                );
                *skipped += 1;
            }
        }
    }
    Ok(rows)
}
