//! Statistics computed for each submission.

pub mod binary;
pub mod correlation;
pub mod permutation;
pub mod special;
pub mod survival;

pub use binary::{BinaryMetrics, evaluate_binary};
pub use correlation::{Correlation, pearson};
pub use permutation::{PermutationEngine, PermutationError, PermutationOptions, PermutationResult};
pub use survival::{SurvivalMetrics, evaluate_survival};
