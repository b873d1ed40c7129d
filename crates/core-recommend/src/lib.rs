//! Video recommendation over a global 50×50 knowledge map.
//!
//! The recommender runs its own estimator over the full unit square, fed
//! by every observation regardless of the active domain (a sibling of the
//! per-domain estimator, not its owner). On top of that posterior it
//! maintains the learning-transfer bookkeeping:
//!
//! * `take_snapshot` freezes the knowledge values when a video starts;
//!   only one snapshot can be pending at a time.
//! * each subsequent answer updates a signed `difference` map (current
//!   minus snapshot, negatives preserved);
//! * after [`SNAPSHOT_ANSWER_THRESHOLD`] answers the difference, masked
//!   by a relevance map over recently watched videos' windows, folds into
//!   the running transfer EMA, and the snapshot and counter clear
//!   together.
//!
//! Ranking uses TLP until a running transfer map exists, ExpectedGain
//! afterwards; both are non-negative by construction. Maps are flat
//! row-major `Vec<f32>` buffers sized [`GLOBAL_CELLS`].

use core_estimator::{CellEstimate, Estimator};
use core_model::{GridSpec, Question, Region, UserResponse, Video};
use core_numerics::{DEFAULT_LENGTH_SCALE, euclidean, matern32};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

mod scoring;

pub use scoring::RankedVideo;

/// Grid size of the global recommender map.
pub const GLOBAL_GRID_SIZE: usize = 50;
/// Cell count of the global map.
pub const GLOBAL_CELLS: usize = GLOBAL_GRID_SIZE * GLOBAL_GRID_SIZE;
/// EMA blend factor for the running transfer map.
pub const EMA_ALPHA: f32 = 0.3;
/// Running-transfer magnitudes below this read as "no signal here".
pub const TRANSFER_EPSILON: f32 = 1e-4;
/// Answers required after a snapshot before the EMA folds in.
pub const SNAPSHOT_ANSWER_THRESHOLD: u32 = 5;
/// Score multiplier for already-watched videos.
pub const WATCHED_PENALTY: f64 = 0.1;
/// Ranking list length.
pub const TOP_K: usize = 10;

pub struct Recommender {
    estimator: Estimator,
    /// Latest full-grid posterior; refreshed after every observation and
    /// swapped whole, never mutated in place.
    estimates: Vec<CellEstimate>,
    pre_snapshot: Option<Vec<f32>>,
    questions_after_video: u32,
    difference: Option<Vec<f32>>,
    running_difference: Option<Vec<f32>>,
    relevance: Vec<f32>,
    /// Windows of every video whose snapshot cycle started this session.
    recent_windows: Vec<(f64, f64)>,
}

impl Default for Recommender {
    fn default() -> Self {
        Self::new()
    }
}

impl Recommender {
    pub fn new() -> Self {
        let estimator = Estimator::new(GLOBAL_GRID_SIZE, Region::UNIT);
        let estimates = estimator.predict(None);
        Self {
            estimator,
            estimates,
            pre_snapshot: None,
            questions_after_video: 0,
            difference: None,
            running_difference: None,
            relevance: vec![0.0; GLOBAL_CELLS],
            recent_windows: Vec::new(),
        }
    }

    pub fn grid(&self) -> GridSpec {
        self.estimator.grid()
    }

    pub fn global_estimates(&self) -> &[CellEstimate] {
        &self.estimates
    }

    pub fn snapshot_pending(&self) -> bool {
        self.pre_snapshot.is_some()
    }

    pub fn pre_snapshot(&self) -> Option<&[f32]> {
        self.pre_snapshot.as_deref()
    }

    pub fn questions_after_video(&self) -> u32 {
        self.questions_after_video
    }

    pub fn difference_map(&self) -> Option<&[f32]> {
        self.difference.as_deref()
    }

    pub fn running_difference_map(&self) -> Option<&[f32]> {
        self.running_difference.as_deref()
    }

    pub fn relevance_map(&self) -> &[f32] {
        &self.relevance
    }

    /// Feed one answer into the global estimator and advance the
    /// snapshot cycle.
    pub fn observe_answer(&mut self, x: f64, y: f64, correct: bool, difficulty: Option<u8>) {
        self.estimator.observe(x, y, correct, None, difficulty);
        self.after_observation();
    }

    /// Feed one skip into the global estimator and advance the cycle.
    pub fn observe_skip(&mut self, x: f64, y: f64, difficulty: Option<u8>) {
        self.estimator.observe_skip(x, y, None, difficulty);
        self.after_observation();
    }

    /// Rebuild the global estimator from the authoritative response
    /// history. Snapshot state is session-local and not restored.
    pub fn restore(&mut self, responses: &[UserResponse], questions: &HashMap<String, Question>) {
        self.estimator.restore(responses, None, questions);
        self.estimates = self.estimator.predict(None);
    }

    /// Freeze the current knowledge values as the pre-video snapshot and
    /// remember the video's windows for the relevance mask. A second call
    /// while a snapshot is pending is ignored.
    pub fn take_snapshot(&mut self, windows: &[(f64, f64)]) {
        if self.pre_snapshot.is_some() {
            debug!(target: "recommend", "snapshot already pending; ignoring");
            return;
        }
        let frozen: Vec<f32> = self.estimates.iter().map(|c| c.value as f32).collect();
        self.pre_snapshot = Some(frozen);
        self.questions_after_video = 0;
        self.recent_windows.extend_from_slice(windows);
        info!(
            target: "recommend",
            windows = windows.len(),
            "pre-video snapshot taken"
        );
    }

    /// Drop all maps, the watched-cycle state, and the global posterior.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.estimates = self.estimator.predict(None);
        self.pre_snapshot = None;
        self.questions_after_video = 0;
        self.difference = None;
        self.running_difference = None;
        self.relevance = vec![0.0; GLOBAL_CELLS];
        self.recent_windows.clear();
    }

    fn after_observation(&mut self) {
        self.estimates = self.estimator.predict(None);
        let Some(snapshot) = &self.pre_snapshot else {
            return;
        };

        self.questions_after_video += 1;
        let diff: Vec<f32> = self
            .estimates
            .iter()
            .zip(snapshot)
            .map(|(c, pre)| c.value as f32 - pre)
            .collect();
        if self.questions_after_video >= SNAPSHOT_ANSWER_THRESHOLD {
            self.fold_into_running(&diff);
        }
        self.difference = Some(diff);
    }

    /// Fold the settled difference map into the running transfer EMA and
    /// clear the snapshot and counter together.
    fn fold_into_running(&mut self, diff: &[f32]) {
        self.relevance = self.compute_relevance();

        let masked: Vec<f32> = diff
            .iter()
            .zip(&self.relevance)
            .map(|(d, r)| d * r)
            .collect();

        let updated = match &self.running_difference {
            // First video ever: the new transfer stands alone.
            None => masked,
            Some(prev) => masked
                .iter()
                .zip(prev)
                .map(|(new, old)| EMA_ALPHA * new + (1.0 - EMA_ALPHA) * old)
                .collect(),
        };
        self.running_difference = Some(updated);

        self.pre_snapshot = None;
        self.questions_after_video = 0;
        info!(target: "recommend", "running transfer map updated");
    }

    /// Per-cell maximum kernel similarity to the recently watched
    /// videos' windows.
    fn compute_relevance(&self) -> Vec<f32> {
        let grid = self.estimator.grid();
        let mut map = vec![0.0f32; GLOBAL_CELLS];
        if self.recent_windows.is_empty() {
            return map;
        }
        for idx in 0..GLOBAL_CELLS {
            let (gx, gy) = grid.unflat(idx);
            let (cx, cy) = grid.center(gx, gy);
            let mut best = 0.0f64;
            for &(wx, wy) in &self.recent_windows {
                let k = matern32(euclidean(cx, cy, wx, wy), DEFAULT_LENGTH_SCALE, 1.0);
                if k > best {
                    best = k;
                }
            }
            map[idx] = best as f32;
        }
        map
    }

    /// Rank a catalog: TLP before any transfer evidence exists,
    /// ExpectedGain afterwards, watched penalty applied, top 10 returned.
    pub fn rank(&self, videos: &[Video], watched: &HashSet<String>) -> Vec<RankedVideo> {
        scoring::rank(self, videos, watched)
    }

    /// Domain filter over the catalog. Deliberately a passthrough: video
    /// footprints span domains, so the catalog is ranked globally.
    pub fn filter_by_domain<'a>(&self, videos: &'a [Video], _domain_id: &str) -> &'a [Video] {
        videos
    }

    pub(crate) fn window_cell_index(&self, x: f64, y: f64) -> usize {
        let grid = self.estimator.grid();
        let (gx, gy) = grid.cell_of(x, y);
        grid.flat(gx, gy)
    }

    pub(crate) fn recent_windows(&self) -> &[(f64, f64)] {
        &self.recent_windows
    }

    #[cfg(test)]
    pub(crate) fn force_running_difference(&mut self, map: Vec<f32>) {
        assert_eq!(map.len(), GLOBAL_CELLS);
        self.running_difference = Some(map);
    }
}
