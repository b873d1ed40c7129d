//! Questions and user responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multiple-choice answer label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

/// Difficulty used when a question carries none or an out-of-range one.
pub const DEFAULT_DIFFICULTY: u8 = 3;

/// Collapse an optional difficulty into the valid band `1..=4`. Anything
/// missing or out of range becomes [`DEFAULT_DIFFICULTY`]; inputs are
/// accepted rather than rejected (question authoring errors must not take
/// the engine down).
pub fn normalize_difficulty(d: Option<u8>) -> u8 {
    match d {
        Some(v @ 1..=4) => v,
        _ => DEFAULT_DIFFICULTY,
    }
}

/// An immutable quiz question pinned to a point on the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    /// Answer options keyed by label. Bundles always carry four.
    pub options: BTreeMap<AnswerLabel, String>,
    pub correct: AnswerLabel,
    /// IRT difficulty in `1..=4`; read through [`normalize_difficulty`].
    #[serde(default)]
    pub difficulty: Option<u8>,
    pub x: f64,
    pub y: f64,
    /// Optional depth coordinate used only by the 3-D view.
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub domain_ids: Vec<String>,
}

impl Question {
    pub fn difficulty(&self) -> u8 {
        normalize_difficulty(self.difficulty)
    }
}

/// One confirmed answer (or skip) by the user. Append-only; the ordered
/// response list plus question metadata reconstructs every derived map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub question_id: String,
    pub domain_id: String,
    /// `None` means the question was skipped.
    #[serde(default)]
    pub selected: Option<AnswerLabel>,
    pub is_correct: bool,
    /// Epoch milliseconds at the time of answering.
    pub timestamp: u64,
    /// Question coordinates frozen at answer time, so replay is immune to
    /// later catalog edits.
    pub x: f64,
    pub y: f64,
}

impl UserResponse {
    pub fn skipped(&self) -> bool {
        self.selected.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn difficulty_normalization_band() {
        assert_eq!(normalize_difficulty(None), 3);
        assert_eq!(normalize_difficulty(Some(0)), 3);
        assert_eq!(normalize_difficulty(Some(5)), 3);
        for d in 1..=4 {
            assert_eq!(normalize_difficulty(Some(d)), d);
        }
    }

    #[test]
    fn question_deserializes_from_bundle_shape() {
        let json = r#"{
            "id": "q-001",
            "text": "What does a Matérn kernel control?",
            "options": {"A": "Smoothness", "B": "Color", "C": "Volume", "D": "Pitch"},
            "correct": "A",
            "difficulty": 2,
            "x": 0.41,
            "y": 0.63,
            "source": "unit-test",
            "domain_ids": ["all", "stats"]
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.correct, AnswerLabel::A);
        assert_eq!(q.difficulty(), 2);
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.z, None);
    }

    #[test]
    fn response_round_trips_with_skip() {
        let r = UserResponse {
            question_id: "q-001".into(),
            domain_id: "all".into(),
            selected: None,
            is_correct: false,
            timestamp: 1_700_000_000_000,
            x: 0.41,
            y: 0.63,
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: UserResponse = serde_json::from_str(&json).unwrap();
        assert!(back.skipped());
        assert_eq!(back, r);
    }
}
