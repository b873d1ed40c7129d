//! Observation records and difficulty weighting.

use core_model::normalize_difficulty;
use core_numerics::DEFAULT_LENGTH_SCALE;

/// Target value recorded for a skipped question: a skip is weak evidence
/// of not knowing, far short of an actual wrong answer.
pub const SKIP_KNOWLEDGE_VALUE: f64 = 0.05;

/// Weight per difficulty for correct answers: harder correct answers
/// count for more.
const CORRECT_WEIGHTS: [f64; 4] = [0.25, 0.5, 0.75, 1.0];

/// Weight per difficulty for incorrect or skipped answers: failing an
/// easy question counts for more than failing a hard one.
const INCORRECT_WEIGHTS: [f64; 4] = [1.0, 0.75, 0.5, 0.25];

/// Look up the kernel weight for an outcome. `difficulty` is normalized
/// into `1..=4` first; out-of-range authoring data is accepted, never
/// rejected.
pub fn difficulty_weight(correct: bool, difficulty: Option<u8>) -> f64 {
    let d = normalize_difficulty(difficulty) as usize - 1;
    if correct {
        CORRECT_WEIGHTS[d]
    } else {
        INCORRECT_WEIGHTS[d]
    }
}

/// One ingested answer, skip, or replayed response. The estimator's
/// authoritative internal record; everything else is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    /// Regression target in `[0, 1]`: 1.0 correct, 0.0 incorrect,
    /// [`SKIP_KNOWLEDGE_VALUE`] skipped.
    pub value: f64,
    /// Per-observation kernel length scale.
    pub length_scale: f64,
    /// Difficulty-dependent kernel weight in `(0, 1]`.
    pub weight: f64,
}

impl Observation {
    pub fn answer(
        x: f64,
        y: f64,
        correct: bool,
        length_scale: Option<f64>,
        difficulty: Option<u8>,
    ) -> Self {
        Self {
            x,
            y,
            value: if correct { 1.0 } else { 0.0 },
            length_scale: length_scale.unwrap_or(DEFAULT_LENGTH_SCALE),
            weight: difficulty_weight(correct, difficulty),
        }
    }

    pub fn skip(x: f64, y: f64, length_scale: Option<f64>, difficulty: Option<u8>) -> Self {
        Self {
            x,
            y,
            value: SKIP_KNOWLEDGE_VALUE,
            length_scale: length_scale.unwrap_or(DEFAULT_LENGTH_SCALE),
            weight: difficulty_weight(false, difficulty),
        }
    }
}
