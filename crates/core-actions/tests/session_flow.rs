//! End-to-end session flows through the dispatcher.

use core_actions::{DispatchResult, NoopRenderer, RendererPort, SessionAction, SessionModel,
    dispatch};
use core_estimator::CellEstimate;
use core_model::{
    AnswerLabel, BundleDomain, Domain, DomainBundle, DomainLevel, Question, QuestionMode, Region,
    Video,
};
use core_state::FileStorage;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

fn question(id: &str, x: f64, y: f64, difficulty: u8, correct: AnswerLabel) -> Question {
    let mut options = BTreeMap::new();
    for (l, t) in [
        (AnswerLabel::A, "a"),
        (AnswerLabel::B, "b"),
        (AnswerLabel::C, "c"),
        (AnswerLabel::D, "d"),
    ] {
        options.insert(l, t.to_string());
    }
    Question {
        id: id.to_string(),
        text: String::new(),
        options,
        correct,
        difficulty: Some(difficulty),
        x,
        y,
        z: None,
        source: None,
        domain_ids: vec!["all".to_string()],
    }
}

fn bundle() -> Arc<DomainBundle> {
    let questions = vec![
        question("q-center", 0.5, 0.5, 3, AnswerLabel::A),
        question("q-corner", 0.1, 0.1, 2, AnswerLabel::B),
        question("q-edge", 0.9, 0.5, 4, AnswerLabel::C),
    ];
    Arc::new(DomainBundle {
        domain: BundleDomain {
            domain: Domain {
                id: "all".into(),
                name: "Everything".into(),
                parent_id: None,
                level: DomainLevel::All,
                region: Region::UNIT,
                grid_size: 3,
                question_count: questions.len(),
            },
            question_ids: questions.iter().map(|q| q.id.clone()).collect(),
        },
        questions,
        labels: Vec::new(),
        articles: Vec::new(),
    })
}

fn video(id: &str) -> Video {
    Video {
        id: id.into(),
        title: id.into(),
        duration: 120.0,
        windows: vec![(0.5, 0.5), (0.55, 0.5)],
        channel: None,
        url: None,
    }
}

/// Renderer double that counts heatmap pushes.
#[derive(Default)]
struct CountingRenderer {
    heatmaps: usize,
    last_cells: usize,
}

impl RendererPort for CountingRenderer {
    fn set_points(&mut self, _questions: &[Question]) {}
    fn set_heatmap(&mut self, estimates: &[CellEstimate], _region: Region) {
        self.heatmaps += 1;
        self.last_cells = estimates.len();
    }
    fn set_labels(&mut self, _labels: &[core_model::GridLabel]) {}
    fn viewport(&self) -> Option<Region> {
        None
    }
    fn transition_to(&mut self, _region: Region, _duration_ms: u32) {}
}

fn new_session(dir: &std::path::Path) -> SessionModel {
    let storage = Rc::new(FileStorage::open(dir).unwrap());
    let (model, _) = SessionModel::new(storage);
    model
}

#[test]
fn answer_flows_through_history_estimator_and_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = CountingRenderer::default();
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    assert_eq!(renderer.heatmaps, 1);

    let result = dispatch(
        SessionAction::Answer {
            question_id: "q-center".into(),
            selected: AnswerLabel::A, // correct
        },
        &mut model,
        &mut renderer,
    );
    assert_eq!(
        result,
        DispatchResult {
            estimates_updated: true,
            maps_updated: true,
            history_appended: true,
            export: None,
        }
    );
    assert_eq!(renderer.heatmaps, 2);
    assert_eq!(renderer.last_cells, 9);

    let responses = model.atoms.responses.get();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_correct);

    // The answered cell moved above the prior; a prediction after
    // dispatch reflects the observation.
    let estimates = model.atoms.estimates.get();
    let center = estimates
        .iter()
        .find(|c| c.gx == 1 && c.gy == 1)
        .copied()
        .unwrap();
    assert!(center.value > 0.5);
}

#[test]
fn wrong_answer_and_skip_record_their_polarity() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );

    dispatch(
        SessionAction::Answer {
            question_id: "q-corner".into(),
            selected: AnswerLabel::D, // wrong (correct is B)
        },
        &mut model,
        &mut renderer,
    );
    dispatch(
        SessionAction::Skip {
            question_id: "q-edge".into(),
        },
        &mut model,
        &mut renderer,
    );

    let responses = model.atoms.responses.get();
    assert_eq!(responses.len(), 2);
    assert!(!responses[0].is_correct);
    assert!(!responses[1].is_correct);
    assert!(responses[1].skipped());
    assert_eq!(responses[0].domain_id, "all");
}

#[test]
fn restart_replays_to_the_same_posterior() {
    let dir = tempfile::tempdir().unwrap();
    let first_estimates;
    {
        let mut model = new_session(dir.path());
        let mut renderer = NoopRenderer;
        dispatch(
            SessionAction::SwitchDomain { bundle: bundle() },
            &mut model,
            &mut renderer,
        );
        for (id, label) in [("q-center", AnswerLabel::A), ("q-corner", AnswerLabel::C)] {
            dispatch(
                SessionAction::Answer {
                    question_id: id.into(),
                    selected: label,
                },
                &mut model,
                &mut renderer,
            );
        }
        first_estimates = model.atoms.estimates.get();
    }

    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    let restored = model.atoms.estimates.get();
    assert_eq!(*restored, *first_estimates);
}

#[test]
fn video_snapshot_cycle_via_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    model.install_videos(&[video("v1")]);

    dispatch(
        SessionAction::VideoStarted {
            video_id: "v1".into(),
        },
        &mut model,
        &mut renderer,
    );
    assert!(model.atoms.pre_video_snapshot.get().is_some());

    // Five answers complete the cycle (answers to any question count).
    for i in 0..5 {
        let (id, label) = if i % 2 == 0 {
            ("q-center", AnswerLabel::A)
        } else {
            ("q-corner", AnswerLabel::B)
        };
        // Re-answering is fine at the estimator level; history is
        // append-only.
        dispatch(
            SessionAction::Answer {
                question_id: id.into(),
                selected: label,
            },
            &mut model,
            &mut renderer,
        );
    }

    assert!(model.atoms.running_difference_map.get().is_some());
    assert!(model.atoms.pre_video_snapshot.get().is_none());
    assert_eq!(model.atoms.questions_after_video.get(), 0);
}

#[test]
fn reset_all_clears_session_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    dispatch(
        SessionAction::Answer {
            question_id: "q-center".into(),
            selected: AnswerLabel::A,
        },
        &mut model,
        &mut renderer,
    );
    dispatch(
        SessionAction::MarkWatched {
            video_id: "v1".into(),
        },
        &mut model,
        &mut renderer,
    );

    dispatch(SessionAction::ResetAll, &mut model, &mut renderer);
    assert!(model.atoms.responses.get().is_empty());
    assert!(model.atoms.watched_videos.get().is_empty());
    assert!(model.atoms.running_difference_map.get().is_none());
    // Estimates are back at the prior.
    let estimates = model.atoms.estimates.get();
    assert!(estimates.iter().all(|c| c.value == 0.5));
}

#[test]
fn selection_respects_mode_atom() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );

    let auto_pick = model.select_next_question(None).expect("questions remain");
    assert!(["q-center", "q-corner", "q-edge"].contains(&auto_pick.question_id.as_str()));

    dispatch(
        SessionAction::SetMode(QuestionMode::DontKnow),
        &mut model,
        &mut renderer,
    );
    assert_eq!(model.atoms.question_mode.get(), QuestionMode::DontKnow);
    // Mode selection still returns something (delegating if unsatisfied).
    assert!(model.select_next_question(None).is_some());
}

#[test]
fn answers_for_unknown_questions_are_rejected_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );

    let result = dispatch(
        SessionAction::Answer {
            question_id: "ghost".into(),
            selected: AnswerLabel::A,
        },
        &mut model,
        &mut renderer,
    );
    assert_eq!(result, DispatchResult::clean());
    assert!(model.atoms.responses.get().is_empty());
}

#[test]
fn switch_domain_reports_republished_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    let result = dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    assert_eq!(
        result,
        DispatchResult {
            estimates_updated: true,
            maps_updated: true,
            history_appended: false,
            export: None,
        }
    );
    assert_eq!(model.atoms.active_domain.get().as_deref(), Some("all"));
    assert_eq!(model.atoms.estimates.get().len(), 9);
}

#[test]
fn export_action_carries_the_blob_on_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    dispatch(
        SessionAction::Answer {
            question_id: "q-center".into(),
            selected: AnswerLabel::A,
        },
        &mut model,
        &mut renderer,
    );

    let result = dispatch(SessionAction::Export, &mut model, &mut renderer);
    assert!(!result.estimates_updated);
    assert!(!result.maps_updated);
    assert!(!result.history_appended);
    let blob = result.export.expect("export action must yield the blob");
    assert!(blob.contains("q-center"));
}

#[test]
fn import_action_replays_into_the_active_domain() {
    // Session one: answer, then export through the dispatcher.
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    for (id, label) in [("q-center", AnswerLabel::A), ("q-corner", AnswerLabel::C)] {
        dispatch(
            SessionAction::Answer {
                question_id: id.into(),
                selected: label,
            },
            &mut model,
            &mut renderer,
        );
    }
    let donor_estimates = model.atoms.estimates.get();
    let blob = dispatch(SessionAction::Export, &mut model, &mut renderer)
        .export
        .unwrap();

    // Session two in a fresh store: import replays to the same posterior.
    let dir2 = tempfile::tempdir().unwrap();
    let mut fresh = new_session(dir2.path());
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut fresh,
        &mut renderer,
    );
    let result = dispatch(
        SessionAction::ImportHistory { blob },
        &mut fresh,
        &mut renderer,
    );
    assert!(result.history_appended);
    assert!(result.estimates_updated);
    assert_eq!(*fresh.atoms.estimates.get(), *donor_estimates);
}

#[test]
fn rejected_import_leaves_history_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = new_session(dir.path());
    let mut renderer = NoopRenderer;
    dispatch(
        SessionAction::SwitchDomain { bundle: bundle() },
        &mut model,
        &mut renderer,
    );
    dispatch(
        SessionAction::Answer {
            question_id: "q-center".into(),
            selected: AnswerLabel::A,
        },
        &mut model,
        &mut renderer,
    );

    let result = dispatch(
        SessionAction::ImportHistory {
            blob: "{not an export blob".into(),
        },
        &mut model,
        &mut renderer,
    );
    assert_eq!(result, DispatchResult::clean());
    assert_eq!(model.atoms.responses.get().len(), 1);
}
