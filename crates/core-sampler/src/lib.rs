//! Adaptive question selection over the estimator's output.
//!
//! The sampler is pure policy: it borrows the latest cell-estimate array
//! and the candidate pool, scores, and returns a choice. Three phases
//! govern the scoring rule:
//!
//! * `calibrate` (fewer than 10 answers): probe uncertain cells with
//!   mid-band difficulties to anchor the IRT scale.
//! * `map` (fewer than 30 answers, or coverage below 15%): BALD expected
//!   information gain — chase the cells where an answer teaches the model
//!   the most.
//! * `learn`: target the zone of proximal development (predicted
//!   correctness near 0.6), falling back to BALD wherever the model is
//!   still too unsure for ZPD targeting to mean anything.
//!
//! Pool rule: candidates are the unanswered questions; if any of them sit
//! inside the current viewport the pool narrows to those, otherwise the
//! full set stands. `select_next` returns `None` only when every question
//! is answered.

use core_estimator::{CellEstimate, coverage};
use core_model::{GridSpec, Question, QuestionMode, Region};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub mod curriculum;
mod irt;

pub use irt::{DIFFICULTY_LOCATIONS, DISCRIMINATION, ability, p_correct};

/// Selection regime derived from answer count and coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Calibrate,
    Map,
    Learn,
}

/// Phase rule. Coverage is the uncertainty-weighted fraction in `[0,1]`.
pub fn phase_for(answered_count: usize, coverage: f64) -> Phase {
    if answered_count < 10 {
        Phase::Calibrate
    } else if answered_count < 30 || coverage < 0.15 {
        Phase::Map
    } else {
        Phase::Learn
    }
}

/// The sampler's pick: a question, the score that won, and its cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub question_id: String,
    pub score: f64,
    pub cell: (usize, usize),
}

/// Diagnostic score row from [`score_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionScore {
    pub question_id: String,
    pub score: f64,
}

/// Curriculum bias supplied by the sampler's owner: phase scores are
/// multiplied by `(1 − weight) + weight · centrality(cell)`, steering
/// early sessions toward landmark cells and later ones away from them.
pub struct CurriculumBias<'a> {
    /// Landmark weight from [`curriculum::weight`], in `(0, 1)`.
    pub weight: f64,
    /// Per-cell centrality keyed by row-major flat index.
    pub centrality: &'a HashMap<usize, f64>,
}

/// Borrowed view of everything selection needs for one decision.
/// `estimates` must be the full-grid row-major array for `grid`.
pub struct SamplerInputs<'a> {
    pub questions: &'a [Question],
    pub answered: &'a HashSet<String>,
    pub estimates: &'a [CellEstimate],
    pub grid: GridSpec,
    pub viewport: Option<Region>,
    /// Curriculum blend for phase scoring; mode selections ignore it
    /// (an explicit mode is the user overriding the curriculum).
    pub curriculum: Option<CurriculumBias<'a>>,
}

impl<'a> SamplerInputs<'a> {
    fn estimate_for(&self, q: &Question) -> &CellEstimate {
        let (gx, gy) = self.grid.cell_of(q.x, q.y);
        &self.estimates[self.grid.flat(gx, gy)]
    }

    /// Unanswered questions, narrowed to the viewport when that still
    /// leaves something to ask.
    fn pool(&self) -> Vec<&'a Question> {
        let unanswered: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| !self.answered.contains(&q.id))
            .collect();
        if let Some(vp) = self.viewport {
            let in_view: Vec<&Question> = unanswered
                .iter()
                .copied()
                .filter(|q| vp.contains(q.x, q.y))
                .collect();
            if !in_view.is_empty() {
                return in_view;
            }
        }
        unanswered
    }
}

/// BALD expected information gain for one candidate.
fn bald_eig(value: f64, uncertainty: f64, difficulty: u8) -> f64 {
    let p = p_correct(value, difficulty);
    let spread = 4.0 * uncertainty;
    DISCRIMINATION * DISCRIMINATION * p * (1.0 - p) * spread * spread
}

fn phase_score(phase: Phase, e: &CellEstimate, difficulty: u8) -> f64 {
    match phase {
        Phase::Calibrate => {
            // Mid-band difficulties in uncertain cells anchor the scale.
            e.uncertainty * (1.0 - (difficulty as f64 - 2.5).abs() / 2.0)
        }
        Phase::Map => bald_eig(e.value, e.uncertainty, difficulty),
        Phase::Learn => {
            if e.uncertainty > 0.7 {
                bald_eig(e.value, e.uncertainty, difficulty)
            } else {
                1.0 - (p_correct(e.value, difficulty) - 0.6).abs()
            }
        }
    }
}

/// Argmax over a candidate pool with a `(primary, tie_break)` key,
/// compared lexicographically. Ties after both keys keep the earliest
/// candidate so selection stays deterministic.
fn best_by<F>(pool: &[&Question], mut key: F) -> Option<usize>
where
    F: FnMut(&Question) -> (f64, f64),
{
    let mut best: Option<(usize, (f64, f64))> = None;
    for (i, q) in pool.iter().enumerate() {
        let k = key(q);
        let better = match best {
            None => true,
            Some((_, bk)) => k.0 > bk.0 || (k.0 == bk.0 && k.1 > bk.1),
        };
        if better {
            best = Some((i, k));
        }
    }
    best.map(|(i, _)| i)
}

/// Phase-scored selection. Returns `None` iff every question is answered.
pub fn select_next(inputs: &SamplerInputs<'_>) -> Option<Selection> {
    let pool = inputs.pool();
    if pool.is_empty() {
        return None;
    }
    let phase = phase_for(inputs.answered.len(), coverage(inputs.estimates));
    let score_of = |q: &Question| {
        let base = phase_score(phase, inputs.estimate_for(q), q.difficulty());
        match &inputs.curriculum {
            None => base,
            Some(bias) => {
                let (gx, gy) = inputs.grid.cell_of(q.x, q.y);
                let c = bias
                    .centrality
                    .get(&inputs.grid.flat(gx, gy))
                    .copied()
                    .unwrap_or(0.0);
                base * ((1.0 - bias.weight) + bias.weight * c)
            }
        }
    };
    let idx = best_by(&pool, |q| (score_of(q), 0.0))?;
    let q = pool[idx];
    let score = score_of(q);
    debug!(
        target: "sampler",
        phase = ?phase,
        question = q.id.as_str(),
        score,
        "selected next question"
    );
    Some(Selection {
        question_id: q.id.clone(),
        score,
        cell: inputs.grid.cell_of(q.x, q.y),
    })
}

/// Mode-constrained selection. A mode whose threshold admits no
/// candidate delegates back to [`select_next`].
pub fn select_with_mode(inputs: &SamplerInputs<'_>, mode: QuestionMode) -> Option<Selection> {
    if mode == QuestionMode::Auto {
        return select_next(inputs);
    }
    let pool = inputs.pool();
    if pool.is_empty() {
        return None;
    }

    let p_of = |q: &Question| p_correct(inputs.estimate_for(q).value, q.difficulty());
    let pick = |q: &Question| Selection {
        question_id: q.id.clone(),
        score: p_of(q),
        cell: inputs.grid.cell_of(q.x, q.y),
    };

    // Each mode filters by its P threshold and ranks with its own
    // (primary, tie_break) key.
    let (satisfying, idx) = match mode {
        QuestionMode::Auto => unreachable!("handled above"),
        QuestionMode::Easy => {
            let s: Vec<&Question> = pool.iter().copied().filter(|q| p_of(q) > 0.8).collect();
            let i = best_by(&s, |q| (p_of(q), inputs.estimate_for(q).uncertainty));
            (s, i)
        }
        QuestionMode::HardestCanAnswer => {
            let s: Vec<&Question> = pool.iter().copied().filter(|q| p_of(q) > 0.5).collect();
            let i = best_by(&s, |q| (q.difficulty() as f64, p_of(q)));
            (s, i)
        }
        QuestionMode::DontKnow => {
            let s: Vec<&Question> = pool.iter().copied().filter(|q| p_of(q) < 0.3).collect();
            let i = best_by(&s, |q| (q.difficulty() as f64, 1.0 - p_of(q)));
            (s, i)
        }
    };

    match idx {
        Some(i) => Some(pick(satisfying[i])),
        // No satisfier under this mode's threshold: phase policy decides.
        None => select_next(inputs),
    }
}

/// BALD score for every unanswered candidate, sorted descending. Feeds
/// diagnostics and the insights panel.
pub fn score_all(inputs: &SamplerInputs<'_>) -> Vec<QuestionScore> {
    let mut scores: Vec<QuestionScore> = inputs
        .pool()
        .iter()
        .map(|q| {
            let e = inputs.estimate_for(q);
            QuestionScore {
                question_id: q.id.clone(),
                score: bald_eig(e.value, e.uncertainty, q.difficulty()),
            }
        })
        .collect();
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scores
}
