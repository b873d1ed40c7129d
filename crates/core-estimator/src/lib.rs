//! Gaussian-process knowledge surrogate over a domain's grid.
//!
//! The estimator consumes confirmed answers and skips at fixed map
//! coordinates and maintains the exact GP posterior over the grid's cell
//! centers. The contract is deliberately narrow:
//!
//! * `observe` / `observe_skip` append an observation and rebuild the
//!   kernel matrix and dual coefficients before returning; a prediction
//!   issued afterwards always reflects the new observation.
//! * `predict` / `predict_cell` are read-only and never fail: numerical
//!   trouble degrades to the prior (μ₀, uncertainty 1) after one warning,
//!   and returned values are always finite and clamped.
//! * `restore` replays an ordered response list and lands on the same
//!   posterior as calling `observe`/`observe_skip` one by one, because a
//!   rebuild is always a from-scratch function of the observation list.
//! * `reset` returns the estimator to its zero-observation state.
//!
//! Recompute policy: every mutation rebuilds `K_noisy` and α in full —
//! O(n³) with n capped in practice around 500 observations. There is no
//! incremental Cholesky update; at this scale the full rebuild is cheaper
//! than the bookkeeping that dodges it.

use core_model::{GridSpec, Question, Region, UserResponse};
use core_numerics::{
    CholeskyFactor, DEFAULT_LENGTH_SCALE, NOISE_VARIANCE, PRIOR_MEAN, SIGNAL_VARIANCE, clamp01,
    dot, euclidean, kernel_matrix, kernel_vector,
};
use std::collections::HashMap;
use tracing::{debug, warn};

mod estimate;
mod observation;

pub use estimate::{CellEstimate, CellState, coverage, difficulty_level, evidence_coverage};
pub use observation::{Observation, SKIP_KNOWLEDGE_VALUE, difficulty_weight};

/// GP posterior over one domain's grid.
#[derive(Debug, Clone)]
pub struct Estimator {
    grid: GridSpec,
    centers: Vec<(f64, f64)>,
    observations: Vec<Observation>,
    /// Cholesky factor of `K_noisy`; `None` while empty or degraded.
    factor: Option<CholeskyFactor>,
    /// Dual coefficients α = K_noisy⁻¹ · (y − μ₀); zeros when degraded so
    /// the posterior mean falls back to the prior.
    alpha: Vec<f64>,
}

impl Estimator {
    pub fn new(grid_size: usize, region: Region) -> Self {
        let grid = GridSpec::new(grid_size, region);
        Self {
            centers: grid.centers(),
            grid,
            observations: Vec::new(),
            factor: None,
            alpha: Vec::new(),
        }
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Ingest a confirmed answer. Coordinates are trusted (they come from
    /// question authoring); difficulty is normalized into `1..=4`.
    pub fn observe(
        &mut self,
        x: f64,
        y: f64,
        correct: bool,
        length_scale: Option<f64>,
        difficulty: Option<u8>,
    ) {
        self.observations
            .push(Observation::answer(x, y, correct, length_scale, difficulty));
        self.rebuild();
    }

    /// Ingest a skipped question as weak negative evidence.
    pub fn observe_skip(
        &mut self,
        x: f64,
        y: f64,
        length_scale: Option<f64>,
        difficulty: Option<u8>,
    ) {
        self.observations
            .push(Observation::skip(x, y, length_scale, difficulty));
        self.rebuild();
    }

    /// Clear all observations and derived matrices.
    pub fn reset(&mut self) {
        self.observations.clear();
        self.factor = None;
        self.alpha.clear();
    }

    /// Replay an ordered response list with a uniform length scale
    /// (per-observation lengths from older exports are ignored). Question
    /// metadata supplies each response's difficulty; unknown questions
    /// read as the default difficulty.
    pub fn restore(
        &mut self,
        responses: &[UserResponse],
        uniform_length_scale: Option<f64>,
        questions: &HashMap<String, Question>,
    ) {
        self.observations.clear();
        let l = uniform_length_scale.unwrap_or(DEFAULT_LENGTH_SCALE);
        for r in responses {
            let difficulty = questions.get(&r.question_id).and_then(|q| q.difficulty);
            let obs = if r.skipped() {
                Observation::skip(r.x, r.y, Some(l), difficulty)
            } else {
                Observation::answer(r.x, r.y, r.is_correct, Some(l), difficulty)
            };
            self.observations.push(obs);
        }
        self.rebuild();
        debug!(
            target: "estimator",
            replayed = responses.len(),
            "restored from response history"
        );
    }

    /// Posterior over the whole grid, or over the cells whose centers lie
    /// inside `viewport`. Row-major order either way, stable within one
    /// call, and always a freshly allocated array (callers swap it in
    /// atomically, never mutate in place).
    pub fn predict(&self, viewport: Option<&Region>) -> Vec<CellEstimate> {
        let columns = self.split_columns();
        let mut out = Vec::with_capacity(self.centers.len());
        for idx in 0..self.centers.len() {
            let (cx, cy) = self.centers[idx];
            if let Some(vp) = viewport
                && !vp.contains(cx, cy)
            {
                continue;
            }
            let (gx, gy) = self.grid.unflat(idx);
            out.push(self.estimate_at(gx, gy, cx, cy, &columns));
        }
        out
    }

    /// Posterior for a single cell.
    pub fn predict_cell(&self, gx: usize, gy: usize) -> CellEstimate {
        let (cx, cy) = self.grid.center(gx, gy);
        let columns = self.split_columns();
        self.estimate_at(gx, gy, cx, cy, &columns)
    }

    fn estimate_at(
        &self,
        gx: usize,
        gy: usize,
        cx: f64,
        cy: f64,
        columns: &ObservationColumns,
    ) -> CellEstimate {
        let n = self.observations.len();
        if n == 0 {
            return prior_estimate(gx, gy);
        }

        let k_star = kernel_vector(
            cx,
            cy,
            &columns.points,
            &columns.lengths,
            &columns.weights,
            DEFAULT_LENGTH_SCALE,
            SIGNAL_VARIANCE,
        );

        let mean = PRIOR_MEAN + dot(&k_star, &self.alpha);
        let variance = match &self.factor {
            Some(factor) => {
                let v = SIGNAL_VARIANCE - dot(&k_star, &factor.solve(&k_star));
                v.max(0.0)
            }
            // Degraded solve: report full prior variance.
            None => SIGNAL_VARIANCE,
        };

        let (value, uncertainty) = if mean.is_finite() && variance.is_finite() {
            (
                clamp01(mean),
                clamp01((variance / SIGNAL_VARIANCE).sqrt()),
            )
        } else {
            (PRIOR_MEAN, 1.0)
        };

        let evidence_count = self
            .observations
            .iter()
            .filter(|o| euclidean(cx, cy, o.x, o.y) <= 2.0 * o.length_scale)
            .count();

        CellEstimate {
            gx,
            gy,
            value,
            uncertainty,
            evidence_count,
            state: estimate::cell_state(value, uncertainty, evidence_count),
            difficulty_level: difficulty_level(value),
        }
    }

    /// Rebuild `K_noisy`, its factor, and α from the observation list.
    fn rebuild(&mut self) {
        let n = self.observations.len();
        if n == 0 {
            self.factor = None;
            self.alpha.clear();
            return;
        }

        let columns = self.split_columns();
        let k_noisy = kernel_matrix(
            &columns.points,
            &columns.lengths,
            &columns.weights,
            SIGNAL_VARIANCE,
            NOISE_VARIANCE,
        );

        let Some(factor) = CholeskyFactor::decompose(&k_noisy, n) else {
            warn!(
                target: "estimator",
                n,
                "kernel factorization failed; predictions degrade to the prior mean"
            );
            self.factor = None;
            self.alpha = vec![0.0; n];
            return;
        };

        let residuals: Vec<f64> = self
            .observations
            .iter()
            .map(|o| o.value - PRIOR_MEAN)
            .collect();
        let alpha = factor.solve(&residuals);
        if alpha.iter().any(|a| !a.is_finite()) {
            warn!(
                target: "estimator",
                n,
                "non-finite dual coefficients; predictions degrade to the prior mean"
            );
            self.factor = None;
            self.alpha = vec![0.0; n];
            return;
        }

        self.factor = Some(factor);
        self.alpha = alpha;
    }

    fn split_columns(&self) -> ObservationColumns {
        ObservationColumns {
            points: self.observations.iter().map(|o| (o.x, o.y)).collect(),
            lengths: self.observations.iter().map(|o| o.length_scale).collect(),
            weights: self.observations.iter().map(|o| o.weight).collect(),
        }
    }
}

/// Column view of the observation list in the shape the kernel builders
/// consume; assembled once per predict/rebuild, not per cell.
struct ObservationColumns {
    points: Vec<(f64, f64)>,
    lengths: Vec<f64>,
    weights: Vec<f64>,
}

fn prior_estimate(gx: usize, gy: usize) -> CellEstimate {
    CellEstimate {
        gx,
        gy,
        value: PRIOR_MEAN,
        uncertainty: 1.0,
        evidence_count: 0,
        state: CellState::Unknown,
        difficulty_level: difficulty_level(PRIOR_MEAN),
    }
}
