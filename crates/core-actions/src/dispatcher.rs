//! Applying `SessionAction`s to the session model.

use crate::model::SessionModel;
use crate::renderer::RendererPort;
use crate::SessionAction;
use core_model::UserResponse;
use tracing::{debug, warn};

/// Result of dispatching a single action: which derived surfaces moved,
/// plus the blob for `SessionAction::Export`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// The active domain's estimate array was recomputed and swapped.
    pub estimates_updated: bool,
    /// The recommender's maps (difference/running/relevance) changed.
    pub maps_updated: bool,
    /// A response was appended to (or the whole history replaced in)
    /// the persistent record.
    pub history_appended: bool,
    /// Export blob; `Some` only for `SessionAction::Export`.
    pub export: Option<String>,
}

impl DispatchResult {
    pub fn clean() -> Self {
        Self {
            estimates_updated: false,
            maps_updated: false,
            history_appended: false,
            export: None,
        }
    }

    fn answered(estimates_updated: bool) -> Self {
        Self {
            estimates_updated,
            maps_updated: true,
            history_appended: true,
            export: None,
        }
    }
}

/// Apply one action. Observation order is the call order: the estimator
/// recompute runs before this returns, so any prediction issued after a
/// dispatch reflects it.
pub fn dispatch(
    action: SessionAction,
    model: &mut SessionModel,
    renderer: &mut dyn RendererPort,
) -> DispatchResult {
    match action {
        SessionAction::Answer {
            question_id,
            selected,
        } => {
            let Some(question) = model.question(&question_id).cloned() else {
                warn!(target: "runtime.session", question = question_id.as_str(), "answer for unknown question");
                return DispatchResult::clean();
            };
            let correct = selected == question.correct;
            record_response(
                model,
                renderer,
                UserResponse {
                    question_id,
                    domain_id: response_domain(model, &question.domain_ids),
                    selected: Some(selected),
                    is_correct: correct,
                    timestamp: model.atoms.now_millis(),
                    x: question.x,
                    y: question.y,
                },
                question.difficulty,
            )
        }
        SessionAction::Skip { question_id } => {
            let Some(question) = model.question(&question_id).cloned() else {
                warn!(target: "runtime.session", question = question_id.as_str(), "skip for unknown question");
                return DispatchResult::clean();
            };
            record_response(
                model,
                renderer,
                UserResponse {
                    question_id,
                    domain_id: response_domain(model, &question.domain_ids),
                    selected: None,
                    is_correct: false,
                    timestamp: model.atoms.now_millis(),
                    x: question.x,
                    y: question.y,
                },
                question.difficulty,
            )
        }
        SessionAction::SwitchDomain { bundle } => {
            model.install_bundle(bundle, renderer);
            model.publish_recommender_maps();
            DispatchResult {
                estimates_updated: true,
                maps_updated: true,
                history_appended: false,
                export: None,
            }
        }
        SessionAction::SetMode(mode) => {
            model.atoms.question_mode.set(mode);
            debug!(target: "runtime.session", mode = ?mode, "question mode changed");
            DispatchResult::clean()
        }
        SessionAction::VideoStarted { video_id } => {
            let windows: Vec<(f64, f64)> = model
                .video(&video_id)
                .map(|v| v.windows.clone())
                .unwrap_or_default();
            if windows.is_empty() {
                warn!(target: "runtime.session", video = video_id.as_str(), "video without windows; snapshot skipped");
                return DispatchResult::clean();
            }
            model.recommender_mut().take_snapshot(&windows);
            model.publish_recommender_maps();
            DispatchResult {
                estimates_updated: false,
                maps_updated: true,
                history_appended: false,
                export: None,
            }
        }
        SessionAction::MarkWatched { video_id } => {
            model.atoms.mark_watched(&video_id);
            DispatchResult::clean()
        }
        SessionAction::ViewportChanged(_region) => {
            // The estimate array is viewport-independent; re-publish so a
            // renderer that dropped frames during the pan settles.
            let estimates_updated = model.publish_estimates(renderer);
            DispatchResult {
                estimates_updated,
                maps_updated: false,
                history_appended: false,
                export: None,
            }
        }
        SessionAction::ImportHistory { blob } => match model.atoms.import(&blob) {
            Ok(_count) => {
                let estimates_updated = model.replay_history(renderer);
                model.publish_recommender_maps();
                DispatchResult {
                    estimates_updated,
                    maps_updated: true,
                    history_appended: true,
                    export: None,
                }
            }
            Err(err) => {
                warn!(target: "runtime.session", error = %err, "import blob rejected");
                DispatchResult::clean()
            }
        },
        SessionAction::Export => {
            let blob = model.atoms.export();
            debug!(
                target: "runtime.session",
                bytes = blob.len(),
                "exported response history"
            );
            DispatchResult {
                estimates_updated: false,
                maps_updated: false,
                history_appended: false,
                export: Some(blob),
            }
        }
        SessionAction::ResetAll => {
            model.atoms.reset();
            if let Some(estimator) = model.estimator_mut() {
                estimator.reset();
            }
            model.recommender_mut().reset();
            let estimates_updated = model.publish_estimates(renderer);
            model.publish_recommender_maps();
            DispatchResult {
                estimates_updated,
                maps_updated: true,
                history_appended: false,
                export: None,
            }
        }
    }
}

/// Shared answer/skip path: append history, feed both estimators in
/// arrival order, republish estimates and recommender maps.
fn record_response(
    model: &mut SessionModel,
    renderer: &mut dyn RendererPort,
    response: UserResponse,
    difficulty: Option<u8>,
) -> DispatchResult {
    let (x, y) = (response.x, response.y);
    let skipped = response.skipped();
    let correct = response.is_correct;

    model.atoms.push_response(response);

    if let Some(estimator) = model.estimator_mut() {
        if skipped {
            estimator.observe_skip(x, y, None, difficulty);
        } else {
            estimator.observe(x, y, correct, None, difficulty);
        }
    }
    if skipped {
        model.recommender_mut().observe_skip(x, y, difficulty);
    } else {
        model.recommender_mut().observe_answer(x, y, correct, difficulty);
    }

    let estimates_updated = model.publish_estimates(renderer);
    model.publish_recommender_maps();
    DispatchResult::answered(estimates_updated)
}

/// Domain id recorded on a response: the active domain when set, else
/// the question's first declared domain.
fn response_domain(model: &SessionModel, question_domains: &[String]) -> String {
    model
        .atoms
        .active_domain
        .get()
        .or_else(|| question_domains.first().cloned())
        .unwrap_or_else(|| "all".to_string())
}
