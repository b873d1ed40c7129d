//! End-to-end estimator scenarios: single-answer pull, distance decay,
//! and skip-versus-wrong polarity.

use core_estimator::{CellState, Estimator};
use core_model::Region;

#[test]
fn single_correct_answer_pulls_its_cell_up() {
    let mut e = Estimator::new(3, Region::UNIT);
    e.observe(0.5, 0.5, true, None, Some(3));

    let center = e.predict_cell(1, 1);
    assert!(center.value > 0.5, "observed cell must move above the prior");
    assert!(center.value < 1.0, "clamp leaves headroom below certainty");
    assert_eq!(center.state, CellState::Estimated);

    let corner = e.predict_cell(0, 0);
    assert!(
        corner.value < center.value,
        "pull must weaken away from the observation"
    );
    assert!(corner.value > 0.5, "a correct answer never depresses a cell");
}

#[test]
fn pull_magnitude_decays_with_distance() {
    // G=20 over the unit square gives dx = 0.05; the observation sits at
    // the center of cell (9, 9) so neighbors probe d = 0.05, 0.15, 0.30.
    let mut e = Estimator::new(20, Region::UNIT);
    e.observe(0.475, 0.475, true, None, Some(3));

    let effect = |gx: usize, gy: usize| (e.predict_cell(gx, gy).value - 0.5).abs();
    let near = effect(10, 9);
    let mid = effect(12, 9);
    let far = effect(15, 9);
    assert!(near > mid, "effect at d=0.05 must exceed d=0.15");
    assert!(mid > far, "effect at d=0.15 must exceed d=0.30");
    assert!(far > 0.0);
}

#[test]
fn skip_is_weaker_negative_evidence_than_a_wrong_answer() {
    let mut wrong = Estimator::new(3, Region::UNIT);
    wrong.observe(0.5, 0.5, false, None, Some(2));

    let mut skip = Estimator::new(3, Region::UNIT);
    skip.observe_skip(0.5, 0.5, None, Some(2));

    let wrong_value = wrong.predict_cell(1, 1).value;
    let skip_value = skip.predict_cell(1, 1).value;
    assert!(wrong_value < 0.5);
    assert!(skip_value < 0.5, "a skip still drags the cell below the prior");
    assert!(
        skip_value > wrong_value,
        "skip must be the milder of the two signals"
    );
}

#[test]
fn out_of_band_difficulty_is_accepted_as_default() {
    let mut e = Estimator::new(3, Region::UNIT);
    e.observe(0.5, 0.5, true, None, Some(200));
    let with_default = {
        let mut e2 = Estimator::new(3, Region::UNIT);
        e2.observe(0.5, 0.5, true, None, Some(3));
        e2.predict(None)
    };
    assert_eq!(e.predict(None), with_default);
}

#[test]
fn predictions_stay_finite_under_duplicate_observations() {
    // Stacked identical observations drive the kernel matrix toward
    // singularity; the jitter ladder has to keep the solve finite.
    let mut e = Estimator::new(5, Region::UNIT);
    for _ in 0..12 {
        e.observe(0.31, 0.62, true, None, Some(4));
    }
    for c in e.predict(None) {
        assert!(c.value.is_finite() && c.uncertainty.is_finite());
        assert!((0.0..=1.0).contains(&c.value));
        assert!((0.0..=1.0).contains(&c.uncertainty));
    }
}
