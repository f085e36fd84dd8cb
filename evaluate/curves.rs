//! ROC and precision-recall curve coordinates for the figure.

use crate::metrics::binary::{ThresholdCounts, threshold_counts};
use ndarray::ArrayView1;

/// Curve data for one submission, collected while scoring and rendered at the end.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveSeries {
    pub label: String,
    /// `(false positive rate, true positive rate)`, starting at the origin.
    pub roc: Vec<(f64, f64)>,
    /// `(recall, precision)`, starting at recall 0 with precision 1.
    pub pr: Vec<(f64, f64)>,
    pub roc_auc: f64,
    pub average_precision: f64,
}

impl CurveSeries {
    pub fn new(
        label: String,
        target: ArrayView1<f64>,
        scores: ArrayView1<f64>,
        roc_auc: f64,
        average_precision: f64,
    ) -> Self {
        let counts = threshold_counts(target, scores);
        Self {
            label,
            roc: roc_points(&counts),
            pr: pr_points(&counts),
            roc_auc,
            average_precision,
        }
    }

    pub fn roc_legend(&self) -> String {
        format!("{} (AUC = {})", self.label, format_metric(self.roc_auc))
    }

    pub fn pr_legend(&self) -> String {
        format!("{} (AP = {})", self.label, format_metric(self.average_precision))
    }
}

fn format_metric(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.3}")
    } else {
        "n/a".to_string()
    }
}

/// ROC curve points. Empty when either class is absent.
pub fn roc_points(counts: &[ThresholdCounts]) -> Vec<(f64, f64)> {
    let Some(last) = counts.last() else {
        return Vec::new();
    };
    let (total_pos, total_neg) = (last.true_positives, last.false_positives);
    if total_pos == 0 || total_neg == 0 {
        return Vec::new();
    }
    std::iter::once((0.0, 0.0))
        .chain(counts.iter().map(|c| {
            (
                c.false_positives as f64 / total_neg as f64,
                c.true_positives as f64 / total_pos as f64,
            )
        }))
        .collect()
}

/// Precision-recall curve points. Empty when there are no positives.
pub fn pr_points(counts: &[ThresholdCounts]) -> Vec<(f64, f64)> {
    let total_pos = counts.last().map_or(0, |c| c.true_positives);
    if total_pos == 0 {
        return Vec::new();
    }
    std::iter::once((0.0, 1.0))
        .chain(counts.iter().map(|c| {
            (
                c.true_positives as f64 / total_pos as f64,
                c.true_positives as f64 / (c.true_positives + c.false_positives) as f64,
            )
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn roc_and_pr_points_follow_thresholds() {
        let target = array![0.0, 1.0, 1.0, 0.0];
        let scores = array![0.5, 0.5, 0.9, 0.1];
        let series = CurveSeries::new(
            "challenge-teamA-run1".to_string(),
            target.view(),
            scores.view(),
            0.875,
            0.833,
        );
        assert_eq!(
            series.roc,
            vec![(0.0, 0.0), (0.0, 0.5), (0.5, 1.0), (1.0, 1.0)]
        );
        assert_eq!(
            series.pr,
            vec![(0.0, 1.0), (0.5, 1.0), (1.0, 2.0 / 3.0), (1.0, 0.5)]
        );
        assert_eq!(series.roc_legend(), "challenge-teamA-run1 (AUC = 0.875)");
        assert_eq!(series.pr_legend(), "challenge-teamA-run1 (AP = 0.833)");
    }

    #[test]
    fn single_class_has_no_roc_curve() {
        let target = array![1.0, 1.0];
        let scores = array![0.3, 0.7];
        let series = CurveSeries::new("x".to_string(), target.view(), scores.view(), f64::NAN, 1.0);
        assert!(series.roc.is_empty());
        assert_eq!(series.pr, vec![(0.0, 1.0), (0.5, 1.0), (1.0, 1.0)]);
        assert_eq!(series.roc_legend(), "x (AUC = n/a)");
    }
}
