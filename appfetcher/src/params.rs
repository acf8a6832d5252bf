use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FetchError, Result};

/// Locations of the three record sources of one batch run.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoaderParams {
    /// `<package>.json` Google Play details, plus an optional `categories/` subdirectory.
    pub play_details_dir: PathBuf,
    /// One `<repository id>/` subdirectory of CSV files per repository.
    pub repo_details_dir: PathBuf,
    /// CSV listing repositories and the packages they implement.
    pub repository_list: PathBuf,
}

impl LoaderParams {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| FetchError::InvalidParam(format!("invalid fetch params: {err}")))
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.play_details_dir.is_dir() {
            return Err(FetchError::InvalidParam(format!(
                "play details directory {} does not exist",
                self.play_details_dir.display()
            )));
        }
        if !self.repo_details_dir.is_dir() {
            return Err(FetchError::InvalidParam(format!(
                "repository details directory {} does not exist",
                self.repo_details_dir.display()
            )));
        }
        if !self.repository_list.is_file() {
            return Err(FetchError::InvalidParam(format!(
                "repository list {} does not exist",
                self.repository_list.display()
            )));
        }
        Ok(())
    }
}
