//! The session's atom set: persisted, session-local, and computed cells.

use crate::atom::{Atom, Computed};
use crate::persist::{
    ImportError, KEY_RESPONSES, KEY_SCHEMA, KEY_WATCHED, ProgressRestored, SCHEMA_VERSION,
    epoch_millis, export_blob, parse_export,
};
use crate::storage::Storage;
use core_estimator::{CellEstimate, coverage, evidence_coverage};
use core_model::{DomainBundle, QuestionMode, UserResponse};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{info, warn};

/// Domain-switch animation state; a second switch while `Animating` is
/// the UI collaborator's problem, not ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    Animating,
}

/// Every atom the core owns, wired to write-through persistence.
pub struct SessionAtoms {
    storage: Rc<dyn Storage>,

    // Persisted.
    pub responses: Atom<Vec<UserResponse>>,
    pub watched_videos: Atom<HashSet<String>>,

    // Session-local.
    pub active_domain: Atom<Option<String>>,
    pub domain_cache: Atom<HashMap<String, Arc<DomainBundle>>>,
    pub estimates: Atom<Rc<Vec<CellEstimate>>>,
    pub transition_state: Atom<TransitionState>,
    pub question_mode: Atom<QuestionMode>,
    pub pre_video_snapshot: Atom<Option<Rc<Vec<f32>>>>,
    pub questions_after_video: Atom<u32>,
    pub difference_map: Atom<Option<Rc<Vec<f32>>>>,
    pub running_difference_map: Atom<Option<Rc<Vec<f32>>>>,

    // Computed.
    answered_ids: Computed<HashSet<String>>,
    insights_available: Computed<bool>,
    coverage: Computed<f64>,
}

/// Responses needed before the insights panel unlocks.
const INSIGHTS_MIN_RESPONSES: usize = 10;

impl SessionAtoms {
    /// Build the atom set over a storage backend, running the schema gate
    /// and restoring persisted state.
    pub fn new(storage: Rc<dyn Storage>) -> (Self, ProgressRestored) {
        let (gate, restored_responses) = run_schema_gate(storage.as_ref());

        let responses = Atom::new(restored_responses);
        let watched_videos = Atom::new(load_watched(storage.as_ref()));

        // Persisted atoms write through on every change.
        {
            let store = Rc::clone(&storage);
            responses.subscribe(move |r: &Vec<UserResponse>| {
                persist_json(store.as_ref(), KEY_RESPONSES, r);
            });
        }
        {
            let store = Rc::clone(&storage);
            watched_videos.subscribe(move |w: &HashSet<String>| {
                persist_json(store.as_ref(), KEY_WATCHED, w);
            });
        }

        let estimates: Atom<Rc<Vec<CellEstimate>>> = Atom::new(Rc::new(Vec::new()));
        let answered_ids = Computed::new(&responses, |r: &Vec<UserResponse>| {
            r.iter().map(|resp| resp.question_id.clone()).collect()
        });
        let insights_available = Computed::new(&responses, |r: &Vec<UserResponse>| {
            r.len() >= INSIGHTS_MIN_RESPONSES
        });
        let coverage_cell =
            Computed::new(&estimates, |e: &Rc<Vec<CellEstimate>>| coverage(e.as_slice()));

        let atoms = Self {
            storage,
            responses,
            watched_videos,
            active_domain: Atom::new(None),
            domain_cache: Atom::new(HashMap::new()),
            estimates,
            transition_state: Atom::new(TransitionState::Idle),
            question_mode: Atom::new(QuestionMode::Auto),
            pre_video_snapshot: Atom::new(None),
            questions_after_video: Atom::new(0),
            difference_map: Atom::new(None),
            running_difference_map: Atom::new(None),
            answered_ids,
            insights_available,
            coverage: coverage_cell,
        };
        (atoms, gate)
    }

    /// Append one confirmed response (the quiz logic's single entry
    /// point for mutating history).
    pub fn push_response(&self, response: UserResponse) {
        self.responses.update(|r| r.push(response));
    }

    pub fn mark_watched(&self, video_id: &str) {
        self.watched_videos
            .update(|w| drop(w.insert(video_id.to_string())));
    }

    pub fn answered_ids(&self) -> HashSet<String> {
        self.answered_ids.get()
    }

    pub fn insights_available(&self) -> bool {
        self.insights_available.get()
    }

    /// Uncertainty-weighted coverage of the active domain's estimates.
    pub fn coverage(&self) -> f64 {
        self.coverage.get()
    }

    /// Evidence-count coverage, for UI progress display only.
    pub fn evidence_coverage(&self) -> f64 {
        self.estimates.with(|e| evidence_coverage(e.as_slice()))
    }

    /// Portable JSON export of the response history.
    pub fn export(&self) -> String {
        self.responses.with(|r| export_blob(r))
    }

    /// Replace history from a previously exported blob. Returns how many
    /// responses came in.
    pub fn import(&self, json: &str) -> Result<usize, ImportError> {
        let responses = parse_export(json)?;
        let count = responses.len();
        self.responses.set(responses);
        info!(target: "state", count, "imported response history");
        Ok(count)
    }

    /// Clear every persisted and session atom back to defaults and
    /// re-initialize the schema marker.
    pub fn reset(&self) {
        self.responses.set(Vec::new());
        self.watched_videos.set(HashSet::new());
        self.active_domain.set(None);
        self.domain_cache.set(HashMap::new());
        self.estimates.set(Rc::new(Vec::new()));
        self.transition_state.set(TransitionState::Idle);
        self.question_mode.set(QuestionMode::Auto);
        self.pre_video_snapshot.set(None);
        self.questions_after_video.set(0);
        self.difference_map.set(None);
        self.running_difference_map.set(None);
        if let Err(err) = self.storage.set(KEY_SCHEMA, SCHEMA_VERSION) {
            warn!(target: "state", error = %err, "failed to rewrite schema marker on reset");
        }
        info!(target: "state", "session state reset");
    }

    /// Timestamp helper for response records.
    pub fn now_millis(&self) -> u64 {
        epoch_millis()
    }
}

fn persist_json<T: serde::Serialize>(storage: &dyn Storage, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => {
            if let Err(err) = storage.set(key, &json) {
                warn!(target: "state", key, error = %err, "persist write failed");
            }
        }
        Err(err) => warn!(target: "state", key, error = %err, "persist encode failed"),
    }
}

/// Compare the persisted schema against the current one; on mismatch (or
/// corrupt history) clear responses and rewrite the marker.
fn run_schema_gate(storage: &dyn Storage) -> (ProgressRestored, Vec<UserResponse>) {
    match storage.get(KEY_SCHEMA) {
        None => {
            write_schema(storage);
            (ProgressRestored::Fresh, Vec::new())
        }
        Some(v) if v == SCHEMA_VERSION => match storage.get(KEY_RESPONSES) {
            None => (ProgressRestored::Fresh, Vec::new()),
            Some(json) => match serde_json::from_str::<Vec<UserResponse>>(&json) {
                Ok(responses) => (ProgressRestored::Restored(responses.len()), responses),
                Err(err) => {
                    warn!(
                        target: "state",
                        error = %err,
                        "stored responses were corrupt; clearing history"
                    );
                    let _ = storage.remove(KEY_RESPONSES);
                    (ProgressRestored::Incompatible, Vec::new())
                }
            },
        },
        Some(found) => {
            info!(
                target: "state",
                found = found.as_str(),
                current = SCHEMA_VERSION,
                "schema version changed; clearing persisted responses"
            );
            let _ = storage.remove(KEY_RESPONSES);
            write_schema(storage);
            (ProgressRestored::Incompatible, Vec::new())
        }
    }
}

fn write_schema(storage: &dyn Storage) {
    if let Err(err) = storage.set(KEY_SCHEMA, SCHEMA_VERSION) {
        warn!(target: "state", error = %err, "failed to write schema marker");
    }
}

fn load_watched(storage: &dyn Storage) -> HashSet<String> {
    storage
        .get(KEY_WATCHED)
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}
