//! Binary-outcome scoring: ROC-AUC and average precision.

use super::permutation::{PermutationEngine, PermutationResult};
use ndarray::ArrayView1;
use std::cmp::Ordering;

/// Subjects with `target > POSITIVE_THRESHOLD` form the positive class.
pub const POSITIVE_THRESHOLD: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinaryMetrics {
    pub roc_auc: PermutationResult,
    pub average_precision: PermutationResult,
}

/// Computes both binary metrics and their permutation p-values.
///
/// A single-class target leaves the ROC-AUC undefined (NaN); average precision is
/// still reported.
pub fn evaluate_binary(
    target: ArrayView1<f64>,
    scores: ArrayView1<f64>,
    engine: &PermutationEngine,
) -> BinaryMetrics {
    assert_eq!(target.len(), scores.len());
    let roc_auc = engine.test(scores, |s| roc_auc(target, s));
    if roc_auc.value.is_nan() {
        log::warn!("Target has a single class; ROC-AUC is undefined");
    }
    let average_precision = engine.test(scores, |s| average_precision(target, s));
    BinaryMetrics {
        roc_auc,
        average_precision,
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic, with tied scores
/// sharing their average rank.
pub fn roc_auc(target: ArrayView1<f64>, scores: ArrayView1<f64>) -> f64 {
    assert_eq!(target.len(), scores.len());
    let n = target.len();
    let n_pos = target.iter().filter(|&&t| t > POSITIVE_THRESHOLD).count() as f64;
    let n_neg = n as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return f64::NAN;
    }

    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&i, &j| scores[i].total_cmp(&scores[j]));

    let mut sum_ranks_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && scores[idx[j]] == scores[idx[i]] {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0 + 1.0;
        for &k in &idx[i..j] {
            if target[k] > POSITIVE_THRESHOLD {
                sum_ranks_pos += avg_rank;
            }
        }
        i = j;
    }

    (sum_ranks_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

/// Average precision: the sum over descending score thresholds of precision
/// weighted by the recall gained at that threshold.
///
/// With no positives there is no recall to gain and the result is 0.
pub fn average_precision(target: ArrayView1<f64>, scores: ArrayView1<f64>) -> f64 {
    let points = threshold_counts(target, scores);
    let total_pos = points.last().map_or(0, |p| p.true_positives);
    if total_pos == 0 {
        return 0.0;
    }
    let mut previous_recall = 0.0;
    let mut ap = 0.0;
    for p in &points {
        let recall = p.true_positives as f64 / total_pos as f64;
        let precision = p.true_positives as f64 / (p.true_positives + p.false_positives) as f64;
        ap += (recall - previous_recall) * precision;
        previous_recall = recall;
    }
    ap
}

/// Cumulative confusion counts when predicting positive for every score at or above
/// `threshold`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdCounts {
    pub threshold: f64,
    pub true_positives: usize,
    pub false_positives: usize,
}

/// One entry per distinct score, ordered from the highest threshold to the lowest.
pub fn threshold_counts(target: ArrayView1<f64>, scores: ArrayView1<f64>) -> Vec<ThresholdCounts> {
    assert_eq!(target.len(), scores.len());
    let n = target.len();
    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&i, &j| match scores[j].total_cmp(&scores[i]) {
        Ordering::Equal => i.cmp(&j),
        other => other,
    });

    let mut points = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < n {
        let threshold = scores[idx[i]];
        let mut j = i;
        while j < n && scores[idx[j]] == threshold {
            if target[idx[j]] > POSITIVE_THRESHOLD {
                tp += 1;
            } else {
                fp += 1;
            }
            j += 1;
        }
        points.push(ThresholdCounts {
            threshold,
            true_positives: tp,
            false_positives: fp,
        });
        i = j;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::permutation::PermutationOptions;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn engine(n_permutations: usize) -> PermutationEngine {
        PermutationEngine::new(PermutationOptions {
            n_permutations,
            n_threads: 1,
            seed: 0,
        })
        .expect("thread pool")
    }

    #[test]
    fn perfect_separation() {
        let target = array![0.0, 1.0, 0.0, 1.0];
        let scores = array![0.1, 0.4, 0.35, 0.8];
        assert_eq!(roc_auc(target.view(), scores.view()), 1.0);
        assert_eq!(average_precision(target.view(), scores.view()), 1.0);
    }

    #[test]
    fn auc_counts_ties_as_half() {
        let target = array![0.0, 1.0, 0.0, 1.0];
        let scores = array![0.5, 0.5, 0.2, 0.9];
        // Pairs (pos, neg): (0.5,0.5)=0.5, (0.5,0.2)=1, (0.9,0.5)=1, (0.9,0.2)=1.
        assert_relative_eq!(roc_auc(target.view(), scores.view()), 0.875, epsilon = 1e-12);
    }

    #[test]
    fn average_precision_reference_values() {
        let target = array![1.0, 0.0, 1.0, 0.0, 1.0];
        let scores = array![0.9, 0.8, 0.7, 0.6, 0.5];
        assert_relative_eq!(
            average_precision(target.view(), scores.view()),
            0.755_555_555_555_555_6,
            epsilon = 1e-12
        );

        let target = array![0.0, 1.0, 1.0];
        let scores = array![0.5, 0.5, 0.2];
        assert_relative_eq!(
            average_precision(target.view(), scores.view()),
            0.583_333_333_333_333_3,
            epsilon = 1e-12
        );
    }

    #[test]
    fn single_class_target_is_undefined_for_auc_only() {
        let target = array![1.0, 1.0, 1.0];
        let scores = array![0.2, 0.6, 0.4];
        let metrics = evaluate_binary(target.view(), scores.view(), &engine(10));
        assert!(metrics.roc_auc.value.is_nan());
        assert!(metrics.roc_auc.p_value.is_nan());
        assert_eq!(metrics.average_precision.value, 1.0);

        let negatives = array![0.0, 0.0, 0.0];
        let metrics = evaluate_binary(negatives.view(), scores.view(), &engine(10));
        assert!(metrics.roc_auc.value.is_nan());
        assert_eq!(metrics.average_precision.value, 0.0);
    }

    #[test]
    fn zero_permutations_report_unit_p_values() {
        let target = array![0.0, 1.0, 0.0, 1.0];
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let metrics = evaluate_binary(target.view(), scores.view(), &engine(0));
        assert_eq!(metrics.roc_auc.p_value, 1.0);
        assert_eq!(metrics.average_precision.p_value, 1.0);
    }

    #[test]
    fn threshold_counts_group_ties() {
        let target = array![0.0, 1.0, 1.0, 0.0];
        let scores = array![0.5, 0.5, 0.9, 0.1];
        let points = threshold_counts(target.view(), scores.view());
        let summary: Vec<(f64, usize, usize)> = points
            .iter()
            .map(|p| (p.threshold, p.true_positives, p.false_positives))
            .collect();
        assert_eq!(summary, vec![(0.9, 1, 0), (0.5, 2, 1), (0.1, 2, 2)]);
    }
}
