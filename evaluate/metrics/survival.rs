//! Survival-endpoint scoring.
//!
//! Two quantities are reported for a submission that predicts the survival endpoint:
//!
//! - Harrell's concordance index between the predicted `survival_event` risk and the
//!   observed (time, death) pairs, with a permutation p-value.
//! - The integrated Brier score of the predicted survival curves, weighted by the
//!   inverse probability of censoring so that censored subjects do not bias it.

use super::permutation::{PermutationEngine, PermutationResult};
use ndarray::{Array1, ArrayView1, ArrayView2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurvivalMetrics {
    pub concordance_index: PermutationResult,
    pub integrated_brier_score: f64,
}

/// Scores one submission's survival predictions.
///
/// `curves` holds one predicted survival curve per subject, sampled on an even grid
/// from 0 to `grid_end`.
pub fn evaluate_survival(
    death: ArrayView1<f64>,
    survival_time: ArrayView1<f64>,
    risk: ArrayView1<f64>,
    curves: ArrayView2<f64>,
    grid_end: f64,
    engine: &PermutationEngine,
) -> SurvivalMetrics {
    assert_eq!(death.len(), survival_time.len());
    assert_eq!(risk.len(), survival_time.len());
    assert_eq!(curves.nrows(), survival_time.len());

    let pairs = ComparablePairs::new(survival_time, death);
    log::debug!("{} comparable pairs for concordance", pairs.len());
    let concordance_index = engine.test(risk, |r| pairs.concordance(r));

    let grid = time_grid(curves.ncols(), grid_end);
    let integrated_brier_score = integrated_brier_score(survival_time, death, curves, &grid);

    SurvivalMetrics {
        concordance_index,
        integrated_brier_score,
    }
}

/// Subject pairs whose ordering is known despite censoring: the first subject died
/// strictly before the second left follow-up, or at the same time as a censored one.
///
/// The pairs depend only on the outcomes, so they are built once and reused for every
/// permuted risk vector.
pub struct ComparablePairs {
    pairs: Vec<(usize, usize)>,
}

impl ComparablePairs {
    pub fn new(time: ArrayView1<f64>, death: ArrayView1<f64>) -> Self {
        let n = time.len();
        let mut pairs = Vec::new();
        for i in 0..n {
            if !is_event(death[i]) {
                continue;
            }
            for j in 0..n {
                if i == j {
                    continue;
                }
                if time[i] < time[j] || (time[i] == time[j] && !is_event(death[j])) {
                    pairs.push((i, j));
                }
            }
        }
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Fraction of comparable pairs in which the earlier death has the higher risk.
    /// Tied risks count one half. Undefined without comparable pairs.
    pub fn concordance(&self, risk: ArrayView1<f64>) -> f64 {
        if self.pairs.is_empty() {
            return f64::NAN;
        }
        let score: f64 = self
            .pairs
            .iter()
            .map(|&(earlier, later)| {
                if risk[earlier] > risk[later] {
                    1.0
                } else if risk[earlier] == risk[later] {
                    0.5
                } else {
                    0.0
                }
            })
            .sum();
        score / self.pairs.len() as f64
    }
}

/// Harrell's concordance index.
pub fn concordance_index(
    time: ArrayView1<f64>,
    death: ArrayView1<f64>,
    risk: ArrayView1<f64>,
) -> f64 {
    ComparablePairs::new(time, death).concordance(risk)
}

/// `n_points` evenly spaced times from 0 to `end`.
pub fn time_grid(n_points: usize, end: f64) -> Array1<f64> {
    match n_points {
        0 => Array1::zeros(0),
        1 => Array1::zeros(1),
        _ => Array1::linspace(0.0, end, n_points),
    }
}

/// Kaplan-Meier estimate of the censoring survival function `G(t)`.
pub struct CensoringDistribution {
    /// Distinct observed times, ascending, with `G` just after each one.
    steps: Vec<(f64, f64)>,
}

impl CensoringDistribution {
    pub fn fit(time: ArrayView1<f64>, death: ArrayView1<f64>) -> Self {
        let mut order: Vec<usize> = (0..time.len()).collect();
        order.sort_by(|&a, &b| time[a].total_cmp(&time[b]));

        let mut steps = Vec::new();
        let mut at_risk = time.len();
        let mut survival = 1.0;
        let mut i = 0;
        while i < order.len() {
            let t = time[order[i]];
            let mut j = i;
            let mut censored = 0usize;
            while j < order.len() && time[order[j]] == t {
                if !is_event(death[order[j]]) {
                    censored += 1;
                }
                j += 1;
            }
            survival *= 1.0 - censored as f64 / at_risk as f64;
            steps.push((t, survival));
            at_risk -= j - i;
            i = j;
        }
        Self { steps }
    }

    /// `G(t)`, including censorings at `t` itself.
    pub fn at(&self, t: f64) -> f64 {
        self.steps
            .iter()
            .take_while(|(step, _)| *step <= t)
            .last()
            .map_or(1.0, |&(_, g)| g)
    }

    /// `G(t-)`, excluding censorings at `t`.
    pub fn before(&self, t: f64) -> f64 {
        self.steps
            .iter()
            .take_while(|(step, _)| *step < t)
            .last()
            .map_or(1.0, |&(_, g)| g)
    }
}

/// Inverse-probability-of-censoring weighted Brier score at each grid time.
pub fn brier_scores(
    time: ArrayView1<f64>,
    death: ArrayView1<f64>,
    curves: ArrayView2<f64>,
    grid: &Array1<f64>,
) -> Array1<f64> {
    assert_eq!(curves.ncols(), grid.len());
    let n = time.len() as f64;
    let censoring = CensoringDistribution::fit(time, death);
    let inverse = |g: f64| if g > 0.0 { 1.0 / g } else { 0.0 };

    grid.iter()
        .enumerate()
        .map(|(k, &t)| {
            let weight_alive = inverse(censoring.at(t));
            let total: f64 = (0..time.len())
                .map(|i| {
                    let predicted = curves[[i, k]];
                    if time[i] <= t && is_event(death[i]) {
                        predicted * predicted * inverse(censoring.before(time[i]))
                    } else if time[i] > t {
                        (1.0 - predicted).powi(2) * weight_alive
                    } else {
                        0.0
                    }
                })
                .sum();
            total / n
        })
        .collect()
}

/// Brier score integrated over the grid by the trapezoid rule and divided by the
/// grid span. A single-point grid reports the Brier score at that point.
pub fn integrated_brier_score(
    time: ArrayView1<f64>,
    death: ArrayView1<f64>,
    curves: ArrayView2<f64>,
    grid: &Array1<f64>,
) -> f64 {
    if grid.is_empty() || time.is_empty() {
        return f64::NAN;
    }
    let scores = brier_scores(time, death, curves, grid);
    if grid.len() == 1 {
        return scores[0];
    }
    let span = grid[grid.len() - 1] - grid[0];
    if span <= 0.0 {
        return f64::NAN;
    }
    let area: f64 = grid
        .windows(2)
        .into_iter()
        .zip(scores.windows(2))
        .map(|(t, s)| (t[1] - t[0]) * (s[0] + s[1]) / 2.0)
        .sum();
    area / span
}

fn is_event(death: f64) -> bool {
    death > 0.5
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
            seed: 3,
        })
        .expect("thread pool")
    }

    #[test]
    fn concordance_extremes() {
        let time = array![1.0, 2.0, 3.0, 4.0];
        let death = array![1.0, 0.0, 1.0, 0.0];
        let aligned = array![3.0, 1.0, 2.0, 0.5];
        let reversed = array![0.5, 1.0, 2.0, 3.0];
        assert_eq!(concordance_index(time.view(), death.view(), aligned.view()), 1.0);
        assert_eq!(concordance_index(time.view(), death.view(), reversed.view()), 0.0);
    }

    #[test]
    fn concordance_handles_tied_times_and_risks() {
        let time = array![1.0, 1.0, 2.0];
        let death = array![1.0, 0.0, 1.0];
        let risk = array![1.0, 1.0, 0.0];
        assert_relative_eq!(
            concordance_index(time.view(), death.view(), risk.view()),
            0.75,
            epsilon = 1e-12
        );
    }

    #[test]
    fn concordance_without_events_is_undefined() {
        let time = array![1.0, 2.0];
        let death = array![0.0, 0.0];
        let pairs = ComparablePairs::new(time.view(), death.view());
        assert!(pairs.is_empty());
        assert!(pairs.concordance(array![0.1, 0.2].view()).is_nan());
    }

    #[test]
    fn censoring_distribution_steps() {
        let time = array![1.0, 2.0, 3.0, 4.0];
        let death = array![1.0, 0.0, 1.0, 0.0];
        let g = CensoringDistribution::fit(time.view(), death.view());
        assert_eq!(g.at(0.5), 1.0);
        assert_eq!(g.at(1.5), 1.0);
        assert_relative_eq!(g.at(2.0), 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(g.before(2.0), 1.0);
        assert_relative_eq!(g.at(3.5), 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(g.at(4.0), 0.0);
    }

    #[test]
    fn integrated_brier_reference_value() {
        let time = array![1.0, 2.0, 3.0, 4.0];
        let death = array![1.0, 0.0, 1.0, 0.0];
        let curves = array![
            [1.0, 0.4, 0.1],
            [1.0, 0.8, 0.6],
            [1.0, 0.7, 0.3],
            [1.0, 0.9, 0.8]
        ];
        let grid = time_grid(3, 4.0);
        assert_eq!(grid, array![0.0, 2.0, 4.0]);

        let scores = brier_scores(time.view(), death.view(), curves.view(), &grid);
        assert_relative_eq!(scores[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(scores[1], 0.0775, epsilon = 1e-12);
        assert_relative_eq!(scores[2], 0.03625, epsilon = 1e-12);

        let ibs = integrated_brier_score(time.view(), death.view(), curves.view(), &grid);
        assert_relative_eq!(ibs, 0.047_812_5, epsilon = 1e-12);
    }

    #[test]
    fn evaluate_survival_reports_both_metrics() {
        let time = array![1.0, 2.0, 3.0, 4.0];
        let death = array![1.0, 0.0, 1.0, 0.0];
        let risk = array![3.0, 1.0, 2.0, 0.5];
        let curves = array![
            [1.0, 0.4, 0.1],
            [1.0, 0.8, 0.6],
            [1.0, 0.7, 0.3],
            [1.0, 0.9, 0.8]
        ];
        let metrics = evaluate_survival(
            death.view(),
            time.view(),
            risk.view(),
            curves.view(),
            4.0,
            &engine(0),
        );
        assert_eq!(metrics.concordance_index.value, 1.0);
        assert_eq!(metrics.concordance_index.p_value, 1.0);
        assert_relative_eq!(metrics.integrated_brier_score, 0.047_812_5, epsilon = 1e-12);
    }
}
