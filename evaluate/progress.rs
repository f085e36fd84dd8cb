use crate::submission::SubmissionId;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;

/// Stages reported while evaluating a predictions directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvaluationStage {
    Loading,
    Scoring,
}

impl EvaluationStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Loading => "loading submissions",
            Self::Scoring => "scoring submissions",
        }
    }
}

impl fmt::Display for EvaluationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for reporting incremental progress during an evaluation run.
pub trait EvaluationProgressObserver {
    fn on_stage_start(&mut self, stage: EvaluationStage, total_submissions: usize) {
        let _ = (stage, total_submissions);
    }
    fn on_submission_done(&mut self, stage: EvaluationStage, submission: &SubmissionId) {
        let _ = (stage, submission);
    }
    fn on_stage_finish(&mut self, stage: EvaluationStage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopEvaluationProgress;

impl EvaluationProgressObserver for NoopEvaluationProgress {}

/// Terminal progress bar. Draws nothing when stderr is not a terminal.
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
}

impl EvaluationProgressObserver for ConsoleProgress {
    fn on_stage_start(&mut self, stage: EvaluationStage, total_submissions: usize) {
        let style = ProgressStyle::with_template("{prefix:>20} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::new(total_submissions as u64);
        bar.set_style(style);
        bar.set_prefix(stage.describe());
        self.bar = Some(bar);
    }

    fn on_submission_done(&mut self, _: EvaluationStage, submission: &SubmissionId) {
        if let Some(bar) = &self.bar {
            bar.set_message(submission.label());
            bar.inc(1);
        }
    }

    fn on_stage_finish(&mut self, _: EvaluationStage) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl EvaluationProgressObserver for Recorder {
        fn on_stage_start(&mut self, stage: EvaluationStage, total_submissions: usize) {
            self.events.push(format!("start {stage} {total_submissions}"));
        }
        fn on_submission_done(&mut self, stage: EvaluationStage, submission: &SubmissionId) {
            self.events.push(format!("done {stage} {submission}"));
        }
    }

    #[test]
    fn default_methods_are_optional() {
        let mut recorder = Recorder::default();
        let id = SubmissionId::new("challenge", "teamA", "run1");
        recorder.on_stage_start(EvaluationStage::Scoring, 1);
        recorder.on_submission_done(EvaluationStage::Scoring, &id);
        recorder.on_stage_finish(EvaluationStage::Scoring);
        assert_eq!(
            recorder.events,
            vec![
                "start scoring submissions 1",
                "done scoring submissions challenge-teamA-run1"
            ]
        );
    }

    #[test]
    fn console_progress_tolerates_events_without_a_stage() {
        let mut progress = ConsoleProgress::default();
        let id = SubmissionId::new("challenge", "teamA", "run1");
        progress.on_submission_done(EvaluationStage::Loading, &id);
        progress.on_stage_finish(EvaluationStage::Loading);
        progress.on_stage_start(EvaluationStage::Loading, 2);
        progress.on_submission_done(EvaluationStage::Loading, &id);
        progress.on_stage_finish(EvaluationStage::Loading);
        assert!(progress.bar.is_none());
    }
}
