// ========================================================================================
//
//                      THE EVALUATION ORCHESTRATOR: RADEVAL
//
// ========================================================================================
//
// This binary is a thin shell around the library's evaluation pipeline. It parses the
// command line, resolves the configuration, installs logging and progress reporting,
// and hands control to `run_evaluation`. Any failure is reported once, on stderr, and
// the process exits with a non-zero status.

use clap::Parser;
use radeval::config::{CliOverrides, EvaluationConfig};
use radeval::pipeline::{EvaluationPaths, run_evaluation};
use radeval::plot::TextRendering;
use radeval::progress::ConsoleProgress;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser, Debug)]
#[command(
    name = "radeval",
    version,
    about = "Evaluate challenge submissions against held-out outcomes.",
    long_about = "Scores every prediction CSV in a directory against the ground-truth \
                  clinical table, adds the grand ensemble of challenge submissions, and \
                  writes metrics.csv and roc_pr_curves.png to the output directory."
)]
struct Args {
    /// Path to the ground-truth CSV with the clinical outcomes.
    true_data_path: PathBuf,

    /// Directory of prediction CSVs named <group>_<team>_<name>.csv.
    predictions_dir: PathBuf,

    /// Directory the metrics table and figure are written to. Created if missing.
    output_dir: PathBuf,

    /// Permutations drawn for each p-value.
    #[arg(long = "n_permutations", value_name = "N")]
    n_permutations: Option<usize>,

    /// Worker threads for the permutation tests; zero or negative uses every CPU.
    #[arg(long = "n_jobs", value_name = "N", allow_negative_numbers = true)]
    n_jobs: Option<i32>,

    /// Seed for the permutation draws.
    #[arg(long)]
    seed: Option<u64>,

    /// Optional TOML file with evaluation settings.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start_time = Instant::now();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match EvaluationConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
        None => EvaluationConfig::default(),
    };
    let config = config.with_overrides(&CliOverrides {
        n_permutations: args.n_permutations,
        n_jobs: args.n_jobs,
        seed: args.seed,
    });

    let paths = EvaluationPaths {
        true_data_path: args.true_data_path,
        predictions_dir: args.predictions_dir,
        output_dir: args.output_dir,
    };

    let mut progress = ConsoleProgress::default();
    match run_evaluation(&paths, &config, &mut progress) {
        Ok(outcome) => {
            if outcome.figure_text == TextRendering::Unlabelled {
                eprintln!(
                    "> Note: no usable font was found; set plot.font_path in a --config file for a labelled figure."
                );
            }
            eprintln!(
                "> Evaluated {} submissions. Metrics: {}. Figure: {}.",
                outcome.rows.len(),
                outcome.metrics_path.display(),
                outcome.figure_path.display()
            );
            eprintln!(
                "\nSuccess! Total execution time: {:.2?}",
                start_time.elapsed()
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
