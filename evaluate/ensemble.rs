//! Grand-ensemble construction.
//!
//! The ensemble averages every prediction column over the challenge-group
//! submissions that carry it. All inputs have already been aligned to the ground
//! truth, so averaging is position-wise.

use crate::data::PredictionTable;
use crate::submission::{Submission, SubmissionId, SubmissionSource};
use ndarray::{Array1, Array2};

pub const ENSEMBLE_TEAM: &str = "grand ensemble";
pub const ENSEMBLE_NAME: &str = "combined";

/// Builds the grand ensemble from the submissions belonging to `challenge_group`.
///
/// Returns `None` when the group has no submissions.
pub fn build_ensemble(submissions: &[Submission], challenge_group: &str) -> Option<Submission> {
    let members: Vec<&PredictionTable> = submissions
        .iter()
        .filter(|s| s.id.group == challenge_group)
        .map(|s| &s.predictions)
        .collect();
    let first = members.first()?;

    let binary = mean_of_vectors(members.iter().filter_map(|m| m.binary.as_ref()));
    let survival_event = mean_of_vectors(members.iter().filter_map(|m| m.survival_event.as_ref()));
    let survival_curves =
        mean_of_matrices(members.iter().filter_map(|m| m.survival_curves.as_ref()));

    log::info!(
        "Built grand ensemble from {} '{challenge_group}' submissions",
        members.len()
    );

    Some(Submission {
        id: SubmissionId::new(challenge_group, ENSEMBLE_TEAM, ENSEMBLE_NAME),
        source: SubmissionSource::Ensemble {
            members: members.len(),
        },
        predictions: PredictionTable {
            subject_ids: first.subject_ids.clone(),
            binary,
            survival_event,
            survival_curves,
        },
    })
}

fn mean_of_vectors<'a, I>(vectors: I) -> Option<Array1<f64>>
where
    I: Iterator<Item = &'a Array1<f64>>,
{
    let mut count = 0usize;
    let mut sum: Option<Array1<f64>> = None;
    for v in vectors {
        count += 1;
        match sum.as_mut() {
            Some(acc) => *acc += v,
            None => sum = Some(v.clone()),
        }
    }
    sum.map(|acc| acc / count as f64)
}

/// Column `j` of the result is averaged over the matrices that have a column `j`,
/// so curves sampled on grids of different length still combine.
fn mean_of_matrices<'a, I>(matrices: I) -> Option<Array2<f64>>
where
    I: Iterator<Item = &'a Array2<f64>>,
{
    let matrices: Vec<&Array2<f64>> = matrices.collect();
    let nrows = matrices.first()?.nrows();
    let width = matrices.iter().map(|m| m.ncols()).max()?;

    let mut sum = Array2::<f64>::zeros((nrows, width));
    let mut counts = vec![0usize; width];
    for m in &matrices {
        for j in 0..m.ncols() {
            let mut column = sum.column_mut(j);
            column += &m.column(j);
            counts[j] += 1;
        }
    }
    for (j, &count) in counts.iter().enumerate() {
        sum.column_mut(j).mapv_inplace(|v| v / count as f64);
    }
    Some(sum)
}
