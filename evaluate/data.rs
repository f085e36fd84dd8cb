//! # Data Loading and Validation Module
//!
//! This module is the exclusive entry point for the CSV files handed to the
//! evaluator: one ground-truth table and one table per submission. Both are indexed
//! by a subject identifier column and are returned sorted by that identifier, so
//! every downstream array lines up position-for-position.
//!
//! - Strict Schema: ground truth must carry `split`, `target_binary`, `death`,
//!   `survival_time` and `volume`. Prediction files may carry `binary`,
//!   `survival_event` and `survival_time_0..k`; nothing else is read.
//! - User-Centric Errors: failures are assumed to be input errors, and `DataError`
//!   names the file column at fault.

use ahash::AHashSet;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

pub const SPLIT_COLUMN: &str = "split";
pub const TARGET_BINARY_COLUMN: &str = "target_binary";
pub const DEATH_COLUMN: &str = "death";
pub const SURVIVAL_TIME_COLUMN: &str = "survival_time";
pub const VOLUME_COLUMN: &str = "volume";

pub const BINARY_COLUMN: &str = "binary";
pub const SURVIVAL_EVENT_COLUMN: &str = "survival_event";
pub const SURVIVAL_CURVE_PREFIX: &str = "survival_time_";

/// Held-out outcomes for the evaluation split, sorted by subject identifier.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    pub subject_ids: Vec<String>,
    pub target_binary: Array1<f64>,
    /// Event indicator (1 = death observed, 0 = censored).
    pub death: Array1<f64>,
    pub survival_time: Array1<f64>,
    pub volume: Array1<f64>,
}

/// One submission's predictions, sorted by subject identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    pub subject_ids: Vec<String>,
    /// Binary-outcome score, from the `binary` column.
    pub binary: Option<Array1<f64>>,
    /// Risk score for the survival endpoint, from the `survival_event` column.
    pub survival_event: Option<Array1<f64>>,
    /// Predicted survival curve, one column per `survival_time_i` in grid order.
    /// Shape: [n_subjects, n_grid_points].
    pub survival_curves: Option<Array2<f64>>,
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or non-finite values were found in the column '{0}'. Every evaluated subject needs a value."
    )]
    MissingValuesFound(String),
    #[error("Subject identifier '{0}' appears more than once.")]
    DuplicateSubjectId(String),
    #[error("No ground-truth rows have split '{0}'.")]
    NoEvaluationSubjects(String),
}

/// Loads the ground truth, keeping only rows of the requested split.
pub fn load_ground_truth(
    path: &Path,
    id_column: &str,
    split: &str,
) -> Result<GroundTruth, DataError> {
    log::info!("Loading ground truth from '{}'", path.display());
    let df = internal::read_csv(path)?;
    internal::require_columns(
        &df,
        &[
            id_column,
            SPLIT_COLUMN,
            TARGET_BINARY_COLUMN,
            DEATH_COLUMN,
            SURVIVAL_TIME_COLUMN,
            VOLUME_COLUMN,
        ],
    )?;

    let splits = internal::extract_string_column(&df, SPLIT_COLUMN)?;
    let selected: Vec<usize> = splits
        .iter()
        .enumerate()
        .filter(|(_, value)| value.as_deref() == Some(split))
        .map(|(idx, _)| idx)
        .collect();
    if selected.is_empty() {
        return Err(DataError::NoEvaluationSubjects(split.to_string()));
    }
    log::info!(
        "Selected {} of {} ground-truth rows with split '{split}'",
        selected.len(),
        df.height()
    );

    let all_ids = internal::extract_string_column(&df, id_column)?;
    let ids = internal::complete_strings(id_column, &all_ids, &selected)?;
    let order = internal::sorted_order(&ids)?;
    let sorted_ids: Vec<String> = order.iter().map(|&i| ids[i].clone()).collect();

    let numeric = |name: &str| -> Result<Array1<f64>, DataError> {
        let raw = internal::extract_numeric_column(&df, name)?;
        let values = internal::complete_numbers(name, &raw, &selected)?;
        Ok(order.iter().map(|&i| values[i]).collect())
    };

    Ok(GroundTruth {
        target_binary: numeric(TARGET_BINARY_COLUMN)?,
        death: numeric(DEATH_COLUMN)?,
        survival_time: numeric(SURVIVAL_TIME_COLUMN)?,
        volume: numeric(VOLUME_COLUMN)?,
        subject_ids: sorted_ids,
    })
}

/// Loads one submission file. Only the recognised prediction columns are read.
pub fn load_prediction_table(path: &Path, id_column: &str) -> Result<PredictionTable, DataError> {
    let df = internal::read_csv(path)?;
    internal::require_columns(&df, &[id_column])?;
    log::debug!("Read '{}':\n{}", path.display(), df.head(Some(5)));

    let all_rows: Vec<usize> = (0..df.height()).collect();
    let raw_ids = internal::extract_string_column(&df, id_column)?;
    let ids = internal::complete_strings(id_column, &raw_ids, &all_rows)?;
    let order = internal::sorted_order(&ids)?;
    let sorted_ids: Vec<String> = order.iter().map(|&i| ids[i].clone()).collect();

    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str().to_string())
        .collect();
    let has_column = |name: &str| column_names.iter().any(|c| c == name);

    let sorted_numeric = |name: &str| -> Result<Array1<f64>, DataError> {
        let raw = internal::extract_numeric_column(&df, name)?;
        let values = internal::complete_numbers(name, &raw, &all_rows)?;
        Ok(order.iter().map(|&i| values[i]).collect())
    };

    let binary = if has_column(BINARY_COLUMN) {
        Some(sorted_numeric(BINARY_COLUMN)?)
    } else {
        None
    };

    let curve_columns = survival_curve_columns(&column_names);
    let (survival_curves, survival_event) = if curve_columns
        .first()
        .is_some_and(|first| first == &format!("{SURVIVAL_CURVE_PREFIX}0"))
    {
        if !has_column(SURVIVAL_EVENT_COLUMN) {
            return Err(DataError::ColumnNotFound(SURVIVAL_EVENT_COLUMN.to_string()));
        }
        let mut curves = Array2::<f64>::zeros((sorted_ids.len(), curve_columns.len()));
        for (j, name) in curve_columns.iter().enumerate() {
            curves.column_mut(j).assign(&sorted_numeric(name)?);
        }
        (Some(curves), Some(sorted_numeric(SURVIVAL_EVENT_COLUMN)?))
    } else {
        (None, None)
    };

    Ok(PredictionTable {
        subject_ids: sorted_ids,
        binary,
        survival_event,
        survival_curves,
    })
}

/// Returns the `survival_time_<i>` columns in natural order of their suffix.
pub fn survival_curve_columns(column_names: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = column_names
        .iter()
        .filter(|name| {
            name.strip_prefix(SURVIVAL_CURVE_PREFIX)
                .is_some_and(|suffix| {
                    !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
                })
        })
        .cloned()
        .collect();
    columns.sort_by(|a, b| natord::compare(a, b));
    columns
}

/// Internal module for shared data loading logic.
mod internal {
    use super::*;

    pub(super) fn read_csv(path: &Path) -> Result<DataFrame, DataError> {
        let file = File::open(path)?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(file)
            .finish()?;
        Ok(df)
    }

    pub(super) fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), DataError> {
        let present: AHashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str().to_string())
            .collect();
        for name in required {
            if !present.contains(*name) {
                return Err(DataError::ColumnNotFound(name.to_string()));
            }
        }
        Ok(())
    }

    pub(super) fn extract_string_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<Option<String>>, DataError> {
        let column = df.column(column_name)?;
        let casted = column
            .cast(&DataType::String)
            .map_err(|_| DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "string",
                found_type: format!("{:?}", column.dtype()),
            })?;
        let values = casted.str()?;
        Ok(values
            .into_iter()
            .map(|value| value.map(|text| text.to_string()))
            .collect())
    }

    pub(super) fn extract_numeric_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<Option<f64>>, DataError> {
        let column = df.column(column_name)?;
        let casted = match column.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", column.dtype()),
                });
            }
        };
        // A cast that introduces nulls means some cells were not numeric.
        if casted.null_count() > column.null_count() {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", column.dtype()),
            });
        }
        let chunked = casted.f64()?;
        Ok(chunked.into_iter().collect())
    }

    pub(super) fn complete_strings(
        column_name: &str,
        values: &[Option<String>],
        rows: &[usize],
    ) -> Result<Vec<String>, DataError> {
        rows.iter()
            .map(|&row| match &values[row] {
                Some(text) if !text.is_empty() => Ok(text.clone()),
                _ => Err(DataError::MissingValuesFound(column_name.to_string())),
            })
            .collect()
    }

    pub(super) fn complete_numbers(
        column_name: &str,
        values: &[Option<f64>],
        rows: &[usize],
    ) -> Result<Vec<f64>, DataError> {
        rows.iter()
            .map(|&row| match values[row] {
                Some(value) if value.is_finite() => Ok(value),
                _ => Err(DataError::MissingValuesFound(column_name.to_string())),
            })
            .collect()
    }

    /// Permutation that sorts `ids` ascending. Duplicate identifiers are rejected.
    pub(super) fn sorted_order(ids: &[String]) -> Result<Vec<usize>, DataError> {
        let mut order: Vec<usize> = (0..ids.len()).collect();
        order.sort_by(|&a, &b| ids[a].cmp(&ids[b]));
        for pair in order.windows(2) {
            if ids[pair[0]].cmp(&ids[pair[1]]) == Ordering::Equal {
                return Err(DataError::DuplicateSubjectId(ids[pair[0]].clone()));
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{Builder, NamedTempFile};

    fn write_csv(contents: &str) -> NamedTempFile {
        let file = Builder::new().suffix(".csv").tempfile().expect("tempfile");
        fs::write(file.path(), contents).expect("write csv");
        file
    }

    const TRUTH: &str = "Study ID,split,target_binary,death,survival_time,volume\n\
RADCURE-0004,test,1,1,1.5,40.0\n\
RADCURE-0001,test,0,0,5.0,12.5\n\
RADCURE-0099,training,1,1,0.5,\n\
RADCURE-0002,test,1,0,3.0,20.0\n";

    #[test]
    fn ground_truth_keeps_test_split_sorted() {
        let file = write_csv(TRUTH);
        let truth = load_ground_truth(file.path(), "Study ID", "test").expect("load truth");
        assert_eq!(
            truth.subject_ids,
            vec!["RADCURE-0001", "RADCURE-0002", "RADCURE-0004"]
        );
        assert_eq!(truth.target_binary.to_vec(), vec![0.0, 1.0, 1.0]);
        assert_eq!(truth.death.to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(truth.survival_time.to_vec(), vec![5.0, 3.0, 1.5]);
        // The training row has no volume, which is fine because it is filtered out.
        assert_eq!(truth.volume.to_vec(), vec![12.5, 20.0, 40.0]);
    }

    #[test]
    fn ground_truth_requires_schema_columns() {
        let file = write_csv("Study ID,split,target_binary\nA,test,1\n");
        let err = load_ground_truth(file.path(), "Study ID", "test").expect_err("missing column");
        match err {
            DataError::ColumnNotFound(name) => assert_eq!(name, "death"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ground_truth_without_split_rows_is_rejected() {
        let file = write_csv(TRUTH);
        let err = load_ground_truth(file.path(), "Study ID", "validation").expect_err("no rows");
        assert!(matches!(err, DataError::NoEvaluationSubjects(_)));
    }

    #[test]
    fn prediction_table_reads_binary_only() {
        let file = write_csv("Study ID,binary\nB,0.9\nA,0.1\n");
        let table = load_prediction_table(file.path(), "Study ID").expect("load predictions");
        assert_eq!(table.subject_ids, vec!["A", "B"]);
        assert_eq!(table.binary.as_ref().expect("binary").to_vec(), vec![0.1, 0.9]);
        assert!(table.survival_event.is_none());
        assert!(table.survival_curves.is_none());
    }

    #[test]
    fn prediction_table_orders_survival_columns_naturally() {
        let header = "Study ID,binary,survival_event,survival_time_10,survival_time_2,survival_time_0,survival_time_1,survival_time_3,survival_time_4,survival_time_5,survival_time_6,survival_time_7,survival_time_8,survival_time_9";
        let row_b = "B,0.5,2.0,0.10,0.82,1.0,0.9,0.7,0.6,0.5,0.4,0.3,0.2,0.15";
        let row_a = "A,0.2,1.0,0.50,0.95,1.0,0.98,0.9,0.85,0.8,0.75,0.7,0.6,0.55";
        let file = write_csv(&format!("{header}\n{row_b}\n{row_a}\n"));
        let table = load_prediction_table(file.path(), "Study ID").expect("load predictions");
        let curves = table.survival_curves.expect("curves");
        assert_eq!(curves.ncols(), 11);
        assert_eq!(curves.row(0).to_vec()[..3], [1.0, 0.98, 0.95][..]);
        assert_eq!(curves[[1, 10]], 0.10);
        assert_eq!(table.survival_event.expect("event").to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn survival_curves_require_event_column() {
        let file = write_csv("Study ID,survival_time_0,survival_time_1\nA,1.0,0.5\n");
        let err = load_prediction_table(file.path(), "Study ID").expect_err("missing event");
        match err {
            DataError::ColumnNotFound(name) => assert_eq!(name, "survival_event"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_subjects_are_rejected() {
        let file = write_csv("Study ID,binary\nA,0.1\nA,0.3\n");
        let err = load_prediction_table(file.path(), "Study ID").expect_err("duplicate");
        assert!(matches!(err, DataError::DuplicateSubjectId(id) if id == "A"));
    }

    #[test]
    fn missing_prediction_values_are_rejected() {
        let file = write_csv("Study ID,binary\nA,0.1\nB,\n");
        let err = load_prediction_table(file.path(), "Study ID").expect_err("missing value");
        assert!(matches!(err, DataError::MissingValuesFound(name) if name == "binary"));
    }

    #[test]
    fn natural_order_ignores_unrelated_columns() {
        let names: Vec<String> = [
            "survival_time",
            "survival_time_1",
            "survival_time_x",
            "survival_time_0",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(
            survival_curve_columns(&names),
            vec!["survival_time_0".to_string(), "survival_time_1".to_string()]
        );
    }
}
