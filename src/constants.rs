//! Numeric constants shared by the distribution, induction and comparison code.
//!
//! The tie threshold and the sub-epsilon merge policy are empirically chosen;
//! changing either changes which policies a search driver ends up keeping.

/// Default maximum number of buckets a distribution keeps after any operation.
pub const DEFAULT_GRANULARITY: usize = 200;

/// Default merge tolerance: minimum bucket mass, minimum value gap between
/// buckets, and tolerance on probability sums and survival comparisons.
pub const DEFAULT_EPSILON: f64 = 0.0001;

/// Below this absolute difference of skewed mean rewards at the studied state,
/// two policies are reported as tied.
pub const TIE_THRESHOLD: f64 = 0.005;

/// Percentile levels reported by [`crate::distribution::summary::DistributionSummary`].
pub const PERCENTILE_KEYS: [u32; 9] = [1, 5, 10, 25, 50, 75, 90, 95, 99];
