//! # The Evaluation Aggregator
//!
//! A single pass over a predictions directory: load the ground truth, load and
//! align every eligible submission, append the grand ensemble, score each submission
//! and write `metrics.csv` plus `roc_pr_curves.png` into the output directory.
//!
//! Alignment is all-or-nothing. A submission whose subject identifiers differ from
//! the ground truth stops the run before anything is scored.

use crate::config::EvaluationConfig;
use crate::curves::CurveSeries;
use crate::data::{DataError, GroundTruth, load_ground_truth, load_prediction_table};
use crate::ensemble::build_ensemble;
use crate::metrics::{
    Correlation, PermutationEngine, PermutationError, PermutationOptions, evaluate_binary,
    evaluate_survival, pearson,
};
use crate::plot::{PlotError, TextRendering, render_curves};
use crate::progress::{EvaluationProgressObserver, EvaluationStage};
use crate::report::{MetricsRow, ReportError, write_metrics_file};
use crate::submission::{
    Submission, SubmissionError, SubmissionSource, discover_submissions,
};
use itertools::{EitherOrBoth, Itertools};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const METRICS_FILE_NAME: &str = "metrics.csv";
pub const FIGURE_FILE_NAME: &str = "roc_pr_curves.png";

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Failed to load '{path}': {source}")]
    Data {
        path: PathBuf,
        #[source]
        source: DataError,
    },
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(
        "Subject identifiers in '{path}' do not match the ground truth ({found} subjects vs {expected} expected; first difference: {first_difference})."
    )]
    SubjectMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
        first_difference: String,
    },
    #[error("No submissions belong to the '{0}' group, so the grand ensemble cannot be built.")]
    NoChallengeSubmissions(String),
    #[error(transparent)]
    Permutation(#[from] PermutationError),
    #[error(transparent)]
    Plot(#[from] PlotError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("Could not create output directory '{path}': {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Paths handed to a run.
#[derive(Clone, Debug)]
pub struct EvaluationPaths {
    pub true_data_path: PathBuf,
    pub predictions_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Everything a run produced, for callers that want more than the files.
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub rows: Vec<MetricsRow>,
    pub curves: Vec<CurveSeries>,
    pub metrics_path: PathBuf,
    pub figure_path: PathBuf,
    pub figure_text: TextRendering,
}

/// Runs the whole evaluation and writes its outputs.
pub fn run_evaluation(
    paths: &EvaluationPaths,
    config: &EvaluationConfig,
    progress: &mut dyn EvaluationProgressObserver,
) -> Result<EvaluationOutcome, EvaluationError> {
    fs::create_dir_all(&paths.output_dir).map_err(|source| EvaluationError::OutputDirectory {
        path: paths.output_dir.clone(),
        source,
    })?;

    let truth = load_ground_truth(
        &paths.true_data_path,
        &config.subject_id_column,
        &config.evaluation_split,
    )
    .map_err(|source| EvaluationError::Data {
        path: paths.true_data_path.clone(),
        source,
    })?;

    let submissions = collect_submissions(&paths.predictions_dir, &truth, config, progress)?;
    let (rows, curves) = score_submissions(&submissions, &truth, config, progress)?;

    let metrics_path = paths.output_dir.join(METRICS_FILE_NAME);
    write_metrics_file(&metrics_path, &rows)?;

    let figure_path = paths.output_dir.join(FIGURE_FILE_NAME);
    let figure_text = render_curves(&figure_path, &curves, &config.plot)?;

    Ok(EvaluationOutcome {
        rows,
        curves,
        metrics_path,
        figure_path,
        figure_text,
    })
}

/// Loads every eligible prediction file, checks it against the ground truth and
/// appends the grand ensemble.
pub fn collect_submissions(
    predictions_dir: &Path,
    truth: &GroundTruth,
    config: &EvaluationConfig,
    progress: &mut dyn EvaluationProgressObserver,
) -> Result<Vec<Submission>, EvaluationError> {
    let files = discover_submissions(predictions_dir, &config.exclusion_prefix)?;
    log::info!(
        "Found {} prediction files in '{}'",
        files.len(),
        predictions_dir.display()
    );

    progress.on_stage_start(EvaluationStage::Loading, files.len());
    let mut submissions = Vec::with_capacity(files.len() + 1);
    for file in files {
        let predictions = load_prediction_table(&file.path, &config.subject_id_column)
            .map_err(|source| EvaluationError::Data {
                path: file.path.clone(),
                source,
            })?;
        check_alignment(&file.path, &truth.subject_ids, &predictions.subject_ids)?;
        progress.on_submission_done(EvaluationStage::Loading, &file.id);
        submissions.push(Submission {
            id: file.id,
            source: SubmissionSource::File(file.path),
            predictions,
        });
    }
    progress.on_stage_finish(EvaluationStage::Loading);

    let ensemble = build_ensemble(&submissions, &config.challenge_group)
        .ok_or_else(|| EvaluationError::NoChallengeSubmissions(config.challenge_group.clone()))?;
    submissions.push(ensemble);
    Ok(submissions)
}

/// Both identifier lists are sorted, so set equality is element-wise equality.
fn check_alignment(path: &Path, expected: &[String], found: &[String]) -> Result<(), EvaluationError> {
    let Some(first_difference) = expected
        .iter()
        .zip_longest(found)
        .find_map(|pair| match pair {
            EitherOrBoth::Both(e, f) if e != f => Some(format!("expected '{e}', found '{f}'")),
            EitherOrBoth::Both(..) => None,
            EitherOrBoth::Left(e) => Some(format!("missing subject '{e}'")),
            EitherOrBoth::Right(f) => Some(format!("unexpected subject '{f}'")),
        })
    else {
        return Ok(());
    };
    Err(EvaluationError::SubjectMismatch {
        path: path.to_path_buf(),
        expected: expected.len(),
        found: found.len(),
        first_difference,
    })
}

/// Scores every submission. Returns one row per submission and one curve series
/// per submission that carries a binary score.
pub fn score_submissions(
    submissions: &[Submission],
    truth: &GroundTruth,
    config: &EvaluationConfig,
    progress: &mut dyn EvaluationProgressObserver,
) -> Result<(Vec<MetricsRow>, Vec<CurveSeries>), EvaluationError> {
    let engine = PermutationEngine::new(PermutationOptions {
        n_permutations: config.n_permutations,
        n_threads: config.worker_threads(),
        seed: config.seed,
    })?;
    let grid_end = config.survival.grid_end.unwrap_or_else(|| {
        truth
            .survival_time
            .iter()
            .copied()
            .fold(0.0_f64, f64::max)
    });
    log::info!(
        "Scoring {} submissions with {} permutations on {} threads",
        submissions.len(),
        config.n_permutations,
        config.worker_threads()
    );

    progress.on_stage_start(EvaluationStage::Scoring, submissions.len());
    let mut rows = Vec::with_capacity(submissions.len());
    let mut curves = Vec::new();
    for submission in submissions {
        let (row, series) = score_submission(submission, truth, grid_end, &engine);
        rows.push(row);
        curves.extend(series);
        progress.on_submission_done(EvaluationStage::Scoring, &submission.id);
    }
    progress.on_stage_finish(EvaluationStage::Scoring);
    Ok((rows, curves))
}

fn score_submission(
    submission: &Submission,
    truth: &GroundTruth,
    grid_end: f64,
    engine: &PermutationEngine,
) -> (MetricsRow, Option<CurveSeries>) {
    let predictions = &submission.predictions;
    let label = submission.id.label();
    let mut row = MetricsRow::new(submission.id.clone());
    let mut series = None;

    if let Some(binary) = &predictions.binary {
        let metrics = evaluate_binary(truth.target_binary.view(), binary.view(), engine);
        log::info!(
            "{label}: roc_auc={:.4} (p={:.4}), average_precision={:.4} (p={:.4})",
            metrics.roc_auc.value,
            metrics.roc_auc.p_value,
            metrics.average_precision.value,
            metrics.average_precision.p_value
        );
        series = Some(CurveSeries::new(
            label.clone(),
            truth.target_binary.view(),
            binary.view(),
            metrics.roc_auc.value,
            metrics.average_precision.value,
        ));
        row.binary = Some(metrics);
    }

    if let (Some(curves), Some(risk)) = (&predictions.survival_curves, &predictions.survival_event)
    {
        let metrics = evaluate_survival(
            truth.death.view(),
            truth.survival_time.view(),
            risk.view(),
            curves.view(),
            grid_end,
            engine,
        );
        log::info!(
            "{label}: concordance_index={:.4} (p={:.4}), integrated_brier_score={:.4}",
            metrics.concordance_index.value,
            metrics.concordance_index.p_value,
            metrics.integrated_brier_score
        );
        row.survival = Some(metrics);
        row.volume = Some(match &predictions.binary {
            Some(binary) => pearson(binary.view(), truth.volume.view()),
            None => {
                log::warn!("{label}: no binary score to correlate with tumour volume");
                Correlation::UNDEFINED
            }
        });
    }

    if row.binary.is_none() && row.survival.is_none() {
        log::warn!("{label}: no recognised prediction columns; the row will be empty");
    }
    if let SubmissionSource::Ensemble { members } = &submission.source {
        log::debug!("{label}: averaged over {members} submissions");
    }
    (row, series)
}
