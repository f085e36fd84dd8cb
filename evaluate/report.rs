//! The per-submission metrics table written to `metrics.csv`.

use crate::metrics::{BinaryMetrics, Correlation, SurvivalMetrics};
use crate::submission::SubmissionId;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write metrics table: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error while writing metrics table: {0}")]
    Io(#[from] std::io::Error),
}

/// Every metric column in output order. Only columns that at least one row fills are
/// written.
pub const METRIC_COLUMNS: [MetricColumn; 9] = [
    MetricColumn::RocAuc,
    MetricColumn::RocAucPval,
    MetricColumn::AveragePrecision,
    MetricColumn::AveragePrecisionPval,
    MetricColumn::ConcordanceIndex,
    MetricColumn::ConcordanceIndexPval,
    MetricColumn::IntegratedBrierScore,
    MetricColumn::VolumeCorr,
    MetricColumn::VolumeCorrPval,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricColumn {
    RocAuc,
    RocAucPval,
    AveragePrecision,
    AveragePrecisionPval,
    ConcordanceIndex,
    ConcordanceIndexPval,
    IntegratedBrierScore,
    VolumeCorr,
    VolumeCorrPval,
}

impl MetricColumn {
    pub fn header(self) -> &'static str {
        match self {
            Self::RocAuc => "roc_auc",
            Self::RocAucPval => "roc_auc_pval",
            Self::AveragePrecision => "average_precision",
            Self::AveragePrecisionPval => "average_precision_pval",
            Self::ConcordanceIndex => "concordance_index",
            Self::ConcordanceIndexPval => "concordance_index_pval",
            Self::IntegratedBrierScore => "integrated_brier_score",
            Self::VolumeCorr => "volume_corr",
            Self::VolumeCorrPval => "volume_corr_pval",
        }
    }
}

/// One output row: the submission identity merged with whichever metric sets apply.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsRow {
    pub id: SubmissionId,
    pub binary: Option<BinaryMetrics>,
    pub survival: Option<SurvivalMetrics>,
    pub volume: Option<Correlation>,
}

impl MetricsRow {
    pub fn new(id: SubmissionId) -> Self {
        Self {
            id,
            binary: None,
            survival: None,
            volume: None,
        }
    }

    /// `None` when the column does not apply to this submission.
    pub fn value(&self, column: MetricColumn) -> Option<f64> {
        use MetricColumn::*;
        match column {
            RocAuc => self.binary.map(|b| b.roc_auc.value),
            RocAucPval => self.binary.map(|b| b.roc_auc.p_value),
            AveragePrecision => self.binary.map(|b| b.average_precision.value),
            AveragePrecisionPval => self.binary.map(|b| b.average_precision.p_value),
            ConcordanceIndex => self.survival.map(|s| s.concordance_index.value),
            ConcordanceIndexPval => self.survival.map(|s| s.concordance_index.p_value),
            IntegratedBrierScore => self.survival.map(|s| s.integrated_brier_score),
            VolumeCorr => self.volume.map(|c| c.coefficient),
            VolumeCorrPval => self.volume.map(|c| c.p_value),
        }
    }
}

/// Columns filled by at least one row, in canonical order.
pub fn present_columns(rows: &[MetricsRow]) -> Vec<MetricColumn> {
    METRIC_COLUMNS
        .into_iter()
        .filter(|&column| rows.iter().any(|row| row.value(column).is_some()))
        .collect()
}

/// Writes the table as CSV. Missing and undefined values are empty cells.
pub fn write_metrics<W: Write>(writer: W, rows: &[MetricsRow]) -> Result<(), ReportError> {
    let columns = present_columns(rows);
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["group", "team", "name"];
    header.extend(columns.iter().map(|c| c.header()));
    csv_writer.write_record(&header)?;

    let mut buffer = ryu::Buffer::new();
    for row in rows {
        let mut record: Vec<String> = vec![
            row.id.group.clone(),
            row.id.team.clone(),
            row.id.name.clone(),
        ];
        for &column in &columns {
            record.push(match row.value(column) {
                Some(v) if v.is_finite() => buffer.format_finite(v).to_string(),
                _ => String::new(),
            });
        }
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_metrics_file(path: &Path, rows: &[MetricsRow]) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    write_metrics(std::io::BufWriter::new(file), rows)?;
    log::info!("Wrote {} metric rows to '{}'", rows.len(), path.display());
    Ok(())
}
