//! Pure numerical kernels for the knowledge-map estimation core.
//!
//! Everything in this crate is a stateless function over plain slices:
//! the Matérn-3/2 covariance, Euclidean distance, kernel matrix/vector
//! assembly with per-observation length scales and weights, and the
//! adaptive-jitter Cholesky solver in [`cholesky`]. Matrices are flat
//! row-major `Vec<f64>` buffers (`m[i * n + j]`) so the solver walks
//! contiguous memory; no nested `Vec<Vec<_>>` anywhere.
//!
//! Hyperparameters are fixed at build time. The defaults below are the
//! single source of truth; callers that need a different length scale pass
//! it per observation rather than mutating globals.

use tracing::trace;

pub mod cholesky;

pub use cholesky::{CholeskyFactor, cholesky_solve};

/// Default kernel length scale in normalized map units.
pub const DEFAULT_LENGTH_SCALE: f64 = 0.15;
/// Signal variance σ²_f of the Matérn kernel.
pub const SIGNAL_VARIANCE: f64 = 1.0;
/// Observation noise variance σ²_n added to the kernel matrix diagonal.
pub const NOISE_VARIANCE: f64 = 0.1;
/// Prior mean μ₀: with no evidence every point sits at "half known".
pub const PRIOR_MEAN: f64 = 0.5;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Matérn-3/2 covariance: `σ²_f · (1 + √3·d/l) · exp(−√3·d/l)`.
///
/// `l` must be positive; callers own that invariant (length scales come
/// from the fixed defaults or validated observation records).
#[inline]
pub fn matern32(d: f64, l: f64, sf2: f64) -> f64 {
    let r = SQRT_3 * d / l;
    sf2 * (1.0 + r) * (-r).exp()
}

/// Euclidean distance between two points in the normalized plane.
#[inline]
pub fn euclidean(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x1 - x2;
    let dy = y1 - y2;
    (dx * dx + dy * dy).sqrt()
}

/// Logistic sigmoid.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Clamp into `[0, 1]`. NaN collapses to 0.0 (the `max` leg discards it);
/// callers that must distinguish non-finite inputs check before clamping.
#[inline]
pub fn clamp01(x: f64) -> f64 {
    x.max(0.0).min(1.0)
}

/// Assemble the noisy kernel matrix for a set of observations.
///
/// Entry `[i, j]` merges the two observations' length scales and weights
/// symmetrically: `k(d_ij; √(l_i·l_j)) · √(w_i·w_j)`. The diagonal adds
/// `sn2` on top of the self-covariance. Output is row-major `n × n`.
pub fn kernel_matrix(
    points: &[(f64, f64)],
    lengths: &[f64],
    weights: &[f64],
    sf2: f64,
    sn2: f64,
) -> Vec<f64> {
    let n = points.len();
    debug_assert_eq!(lengths.len(), n);
    debug_assert_eq!(weights.len(), n);
    let mut m = vec![0.0; n * n];
    for i in 0..n {
        // Symmetric: fill the upper triangle and mirror.
        for j in i..n {
            let d = euclidean(points[i].0, points[i].1, points[j].0, points[j].1);
            let l = (lengths[i] * lengths[j]).sqrt();
            let w = (weights[i] * weights[j]).sqrt();
            let v = matern32(d, l, sf2) * w;
            m[i * n + j] = v;
            m[j * n + i] = v;
        }
        m[i * n + i] += sn2;
    }
    trace!(target: "numerics", n, "kernel_matrix_built");
    m
}

/// Assemble the cross-covariance vector between a test point and the
/// observations. The test point has no difficulty of its own, so entry `j`
/// carries the observation's full weight `w_j` (not its square root) and
/// merges the default length scale with `l_j`.
pub fn kernel_vector(
    x: f64,
    y: f64,
    points: &[(f64, f64)],
    lengths: &[f64],
    weights: &[f64],
    l_default: f64,
    sf2: f64,
) -> Vec<f64> {
    let n = points.len();
    debug_assert_eq!(lengths.len(), n);
    debug_assert_eq!(weights.len(), n);
    let mut k = vec![0.0; n];
    for j in 0..n {
        let d = euclidean(x, y, points[j].0, points[j].1);
        let l = (l_default * lengths[j]).sqrt();
        k[j] = matern32(d, l, sf2) * weights[j];
    }
    k
}

/// Dot product over equal-length slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
