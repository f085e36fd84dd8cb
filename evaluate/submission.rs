//! Submission discovery and naming.
//!
//! Prediction files are named `<group>_<team>_<name>.csv`. The three parts identify a
//! submission in the report and in the figure legend.

use crate::data::PredictionTable;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PREDICTION_EXTENSION: &str = "csv";

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("IO error while listing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "Prediction file '{0}' is not named <group>_<team>_<name>.csv (expected exactly three '_'-separated parts)."
    )]
    MalformedName(String),
}

/// Identity of a submission as encoded in its file name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubmissionId {
    pub group: String,
    pub team: String,
    pub name: String,
}

impl SubmissionId {
    pub fn new(group: impl Into<String>, team: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            team: team.into(),
            name: name.into(),
        }
    }

    /// Parses a file stem of the form `group_team_name`.
    pub fn parse_stem(stem: &str) -> Result<Self, SubmissionError> {
        let parts: Vec<&str> = stem.split('_').collect();
        match parts.as_slice() {
            [group, team, name] if !group.is_empty() && !team.is_empty() && !name.is_empty() => {
                Ok(Self::new(*group, *team, *name))
            }
            _ => Err(SubmissionError::MalformedName(stem.to_string())),
        }
    }

    /// Legend label, `group-team-name`.
    pub fn label(&self) -> String {
        format!("{}-{}-{}", self.group, self.team, self.name)
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Where a submission's predictions came from.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionSource {
    File(PathBuf),
    Ensemble { members: usize },
}

/// A validated submission ready for scoring.
#[derive(Clone, Debug)]
pub struct Submission {
    pub id: SubmissionId,
    pub source: SubmissionSource,
    pub predictions: PredictionTable,
}

/// A prediction file found on disk, with its parsed identity.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionFile {
    pub id: SubmissionId,
    pub path: PathBuf,
}

/// Lists the eligible prediction files in `dir`, in natural file-name order.
///
/// Only regular `.csv` files are considered, and any file whose name starts with
/// `exclusion_prefix` is skipped.
pub fn discover_submissions(
    dir: &Path,
    exclusion_prefix: &str,
) -> Result<Vec<SubmissionFile>, SubmissionError> {
    let io_err = |source| SubmissionError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut candidates: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == PREDICTION_EXTENSION);
        if !is_csv {
            continue;
        }
        if !exclusion_prefix.is_empty() && file_name.starts_with(exclusion_prefix) {
            log::info!("Skipping excluded prediction file '{file_name}'");
            continue;
        }
        candidates.push((file_name, path));
    }
    candidates.sort_by(|a, b| natord::compare(&a.0, &b.0));

    candidates
        .into_iter()
        .map(|(file_name, path)| {
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| SubmissionError::MalformedName(file_name.clone()))?;
            Ok(SubmissionFile {
                id: SubmissionId::parse_stem(stem)?,
                path,
            })
        })
        .collect()
}
