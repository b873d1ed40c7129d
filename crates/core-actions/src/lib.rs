//! Session dispatcher: applies user actions to the session model.
//!
//! Everything stateful the engine owns hangs off [`SessionModel`]: the
//! reactive atom set, the active domain's estimator, and the global
//! recommender. `dispatch` is the single mutation entry point — answers,
//! skips, domain switches, video events, import/export, and reset all
//! flow through it, and every call returns a [`DispatchResult`] naming
//! the derived surfaces that moved.
//!
//! Ownership is acyclic: the recommender subscribes to observations
//! through dispatch, it does not own the domain estimator; the domain
//! estimator knows nothing about videos.

use core_model::{AnswerLabel, DomainBundle, QuestionMode, Region};
use std::sync::Arc;

mod dispatcher;
mod model;
mod renderer;

pub use dispatcher::{DispatchResult, dispatch};
pub use model::SessionModel;
pub use renderer::{NoopRenderer, RendererPort};

/// One user-level event the core reacts to.
#[derive(Debug, Clone)]
pub enum SessionAction {
    /// A confirmed answer to a question.
    Answer {
        question_id: String,
        selected: AnswerLabel,
    },
    /// The user skipped a question.
    Skip { question_id: String },
    /// Activate a loaded domain bundle (the loader resolved it; the
    /// dispatch stays synchronous).
    SwitchDomain { bundle: Arc<DomainBundle> },
    /// Question-selection mode change from the controls.
    SetMode(QuestionMode),
    /// A video started playing: snapshot the map.
    VideoStarted { video_id: String },
    /// A video was watched to the end.
    MarkWatched { video_id: String },
    /// Viewport-driven re-publish (pan/zoom settled).
    ViewportChanged(Region),
    /// Replace the response history from a previously exported blob.
    ImportHistory { blob: String },
    /// Produce the export blob; delivered on `DispatchResult::export`.
    Export,
    /// Wipe all progress, persisted and in-memory.
    ResetAll,
}
