//! Permutation significance testing.
//!
//! A metric is recomputed on randomly shuffled predictions and the p-value is the
//! add-one estimate `(#{permuted >= observed} + 1) / (n_permutations + 1)`. With zero
//! permutations this is exactly 1.0.
//!
//! Every permutation owns an RNG seeded from `(seed, index)`, so the estimate does not
//! depend on how many worker threads share the work.

use ndarray::ArrayView1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PermutationError {
    #[error("Failed to start the permutation worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermutationOptions {
    pub n_permutations: usize,
    pub n_threads: usize,
    pub seed: u64,
}

/// A point estimate together with its permutation p-value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PermutationResult {
    pub value: f64,
    pub p_value: f64,
}

impl PermutationResult {
    pub const UNDEFINED: Self = Self {
        value: f64::NAN,
        p_value: f64::NAN,
    };
}

/// Owns the worker pool so it is built once per run.
pub struct PermutationEngine {
    options: PermutationOptions,
    pool: rayon::ThreadPool,
}

impl PermutationEngine {
    pub fn new(options: PermutationOptions) -> Result<Self, PermutationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.n_threads.max(1))
            .thread_name(|i| format!("radeval-perm-{i}"))
            .build()?;
        Ok(Self { options, pool })
    }

    /// Evaluates `metric` on `scores` and on `n_permutations` shuffles of it.
    ///
    /// `metric` receives the (possibly shuffled) scores; anything it compares them
    /// against must be captured by the closure. An undefined observed value yields an
    /// undefined p-value without running any permutation.
    pub fn test<F>(&self, scores: ArrayView1<f64>, metric: F) -> PermutationResult
    where
        F: Fn(ArrayView1<f64>) -> f64 + Sync,
    {
        let observed = metric(scores);
        if observed.is_nan() {
            return PermutationResult::UNDEFINED;
        }

        let n_permutations = self.options.n_permutations;
        let seed = self.options.seed;
        let base = scores.to_vec();
        let exceed = self.pool.install(|| {
            (0..n_permutations)
                .into_par_iter()
                .map_init(
                    || base.clone(),
                    |buffer, index| {
                        buffer.copy_from_slice(&base);
                        let mut rng = StdRng::seed_from_u64(permutation_seed(seed, index as u64));
                        buffer.shuffle(&mut rng);
                        metric(ArrayView1::from(&buffer[..])) >= observed
                    },
                )
                .filter(|&exceeds| exceeds)
                .count()
        });

        PermutationResult {
            value: observed,
            p_value: (exceed + 1) as f64 / (n_permutations + 1) as f64,
        }
    }
}

/// SplitMix64 finaliser over the run seed and permutation index.
fn permutation_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
