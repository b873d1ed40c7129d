//! Cholesky factorization with adaptive jitter and a safe degrade path.
//!
//! Contract (callers depend on every clause):
//! * Base jitter `ε = 1e-6 · max(1, n/10)` is added to the diagonal before
//!   the first attempt.
//! * A non-positive pivot aborts the attempt; up to 3 retries follow, each
//!   multiplying the jitter by 10.
//! * If every attempt fails, or the solution contains NaN, the solver
//!   returns the zero vector and emits exactly one warning. A zero dual
//!   vector means "fall back to the prior mean" downstream, never a panic.
//!
//! Decomposition is O(n³), each back-substitution O(n²). The engine keeps
//! n ≤ 500 observations, so a full refactor per observation is fine and an
//! incremental update scheme is deliberately absent.

use tracing::warn;

/// Lower-triangular factor of a symmetric positive-definite matrix.
///
/// Holding the factor lets callers amortize one decomposition over many
/// right-hand sides (the posterior variance needs one solve per grid cell).
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    l: Vec<f64>,
    n: usize,
}

/// Jitter policy shared by [`CholeskyFactor::decompose`] and
/// [`cholesky_solve`].
#[inline]
fn base_jitter(n: usize) -> f64 {
    1e-6 * 1.0_f64.max(n as f64 / 10.0)
}

const JITTER_RETRIES: u32 = 3;

impl CholeskyFactor {
    /// Factor `m` (row-major `n × n`, symmetric) as `L·Lᵀ`, retrying with
    /// escalating jitter. Returns `None` once the jitter ladder is
    /// exhausted; the caller owns the degrade warning so only one is
    /// emitted per rebuild.
    pub fn decompose(m: &[f64], n: usize) -> Option<Self> {
        debug_assert_eq!(m.len(), n * n);
        let eps = base_jitter(n);
        for attempt in 0..=JITTER_RETRIES {
            let jitter = eps * 10f64.powi(attempt as i32);
            if let Some(l) = try_factor(m, n, jitter) {
                return Some(CholeskyFactor { l, n });
            }
        }
        None
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Solve `M·x = b` via forward then back substitution on the stored
    /// factor. `b.len()` must equal `n`.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        debug_assert_eq!(b.len(), self.n);
        let n = self.n;
        let l = &self.l;
        // Forward: L·z = b.
        let mut z = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= l[i * n + j] * z[j];
            }
            z[i] = sum / l[i * n + i];
        }
        // Back: Lᵀ·x = z.
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = z[i];
            for j in (i + 1)..n {
                sum -= l[j * n + i] * x[j];
            }
            x[i] = sum / l[i * n + i];
        }
        x
    }
}

/// One factorization attempt with a fixed jitter. Returns the packed lower
/// factor, or `None` on the first non-positive pivot.
fn try_factor(m: &[f64], n: usize, jitter: f64) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = m[i * n + j];
            if i == j {
                sum += jitter;
            }
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(l)
}

/// One-shot solve of `M·x = b` with the full jitter-and-degrade policy.
///
/// On failure (no factorization, or NaN in the solution) this returns the
/// zero vector after a single warning. Callers treat zero as "use the
/// prior mean".
pub fn cholesky_solve(m: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let Some(factor) = CholeskyFactor::decompose(m, n) else {
        warn!(
            target: "numerics",
            n,
            "cholesky factorization failed after jitter retries; degrading to prior mean"
        );
        return vec![0.0; n];
    };
    let x = factor.solve(b);
    if x.iter().any(|v| !v.is_finite()) {
        warn!(
            target: "numerics",
            n,
            "non-finite values in cholesky solution; degrading to prior mean"
        );
        return vec![0.0; n];
    }
    x
}
