//! Video scoring: TLP, ExpectedGain, and ranking.

use crate::{Recommender, TOP_K, TRANSFER_EPSILON, WATCHED_PENALTY};
use core_model::Video;
use core_numerics::{DEFAULT_LENGTH_SCALE, euclidean};
use std::collections::HashSet;

/// One row of a ranking result.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedVideo {
    pub video_id: String,
    pub score: f64,
    pub watched: bool,
}

/// Theoretical learning potential: how much unknown-but-uncertain ground
/// the video's footprint covers. `(1 − K) · U` averaged over windows;
/// non-negative because both factors live in `[0, 1]`.
pub(crate) fn tlp(rec: &Recommender, video: &Video) -> f64 {
    if video.windows.is_empty() {
        return 0.0;
    }
    let estimates = rec.global_estimates();
    let sum: f64 = video
        .windows
        .iter()
        .map(|&(x, y)| {
            let c = &estimates[rec.window_cell_index(x, y)];
            (1.0 - c.value) * c.uncertainty
        })
        .sum();
    sum / video.windows.len() as f64
}

/// Expected gain once transfer evidence exists: `(1 − K)` times the
/// effective transfer at each window's cell, under `running`.
pub(crate) fn expected_gain(rec: &Recommender, video: &Video, running: &[f32]) -> f64 {
    if video.windows.is_empty() {
        return 0.0;
    }
    let estimates = rec.global_estimates();
    let fallback = average_transfer(rec, running);

    let sum: f64 = video
        .windows
        .iter()
        .map(|&(x, y)| {
            let idx = rec.window_cell_index(x, y);
            let cell = &estimates[idx];
            (1.0 - cell.value) * effective_transfer(rec, running, idx, fallback)
        })
        .sum();
    sum / video.windows.len() as f64
}

/// Transfer attributed to a cell: its own running value where the signal
/// is trustworthy (non-negligible magnitude, or a recently watched window
/// within kernel reach of the cell), otherwise the global average.
fn effective_transfer(rec: &Recommender, running: &[f32], idx: usize, fallback: f64) -> f64 {
    let raw = running[idx];
    let grid = rec.grid();
    let (gx, gy) = grid.unflat(idx);
    let (cx, cy) = grid.center(gx, gy);
    let near_watched = rec
        .recent_windows()
        .iter()
        .any(|&(wx, wy)| euclidean(cx, cy, wx, wy) <= 2.0 * DEFAULT_LENGTH_SCALE);
    if raw.abs() >= TRANSFER_EPSILON || near_watched {
        f64::from(raw).max(0.0)
    } else {
        fallback
    }
}

/// Mean non-negative transfer over cells with evidence. With no
/// sufficiently covered cell yet, the prior transfer 0.5 stands in so an
/// early ExpectedGain ranking still orders by footprint value.
fn average_transfer(rec: &Recommender, running: &[f32]) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (cell, t) in rec.global_estimates().iter().zip(running) {
        if cell.evidence_count > 0 {
            sum += f64::from(*t).max(0.0);
            count += 1;
        }
    }
    if count == 0 { 0.5 } else { sum / count as f64 }
}

pub(crate) fn rank(
    rec: &Recommender,
    videos: &[Video],
    watched: &HashSet<String>,
) -> Vec<RankedVideo> {
    let running = rec.running_difference_map();
    let mut rows: Vec<RankedVideo> = videos
        .iter()
        .map(|v| {
            let base = match running {
                Some(r) => expected_gain(rec, v, r),
                None => tlp(rec, v),
            };
            let is_watched = watched.contains(&v.id);
            RankedVideo {
                video_id: v.id.clone(),
                score: if is_watched {
                    base * WATCHED_PENALTY
                } else {
                    base
                },
                watched: is_watched,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    rows.truncate(TOP_K);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GLOBAL_CELLS, Recommender};
    use pretty_assertions::assert_eq;

    fn video(id: &str, windows: Vec<(f64, f64)>) -> Video {
        Video {
            id: id.into(),
            title: id.into(),
            duration: 60.0,
            windows,
            channel: None,
            url: None,
        }
    }

    #[test]
    fn tlp_at_the_prior_is_half() {
        // K = 0.5, U = 1.0 everywhere: TLP = 0.5 per window.
        let rec = Recommender::new();
        let v = video("v", vec![(0.2, 0.2), (0.8, 0.8)]);
        assert!((tlp(&rec, &v) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn scores_are_never_negative() {
        let mut rec = Recommender::new();
        rec.observe_answer(0.3, 0.3, false, Some(1));
        rec.observe_skip(0.7, 0.7, Some(2));
        let v = video("v", vec![(0.3, 0.3), (0.7, 0.7), (0.1, 0.9)]);
        assert!(tlp(&rec, &v) >= 0.0);

        rec.force_running_difference(vec![-0.5; GLOBAL_CELLS]);
        let running: Vec<f32> = rec.running_difference_map().unwrap().to_vec();
        assert!(expected_gain(&rec, &v, &running) >= 0.0);
    }

    #[test]
    fn ranking_prior_with_zero_running_map_scores_quarter_and_penalizes_watched() {
        // Two identical footprints; A already watched. With an all-zero
        // running map and no observations every cell falls through to the
        // prior transfer 0.5, so the base score is (1 − 0.5) · 0.5.
        let mut rec = Recommender::new();
        rec.force_running_difference(vec![0.0; GLOBAL_CELLS]);
        let windows = vec![(0.25, 0.25), (0.75, 0.75)];
        let videos = [video("a", windows.clone()), video("b", windows)];
        let watched: HashSet<String> = ["a".to_string()].into_iter().collect();

        let ranked = rec.rank(&videos, &watched);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].video_id, "b");
        assert!((ranked[0].score - 0.25).abs() < 1e-9);
        assert_eq!(ranked[1].video_id, "a");
        assert!((ranked[1].score - 0.025).abs() < 1e-9);
        assert!(ranked[1].watched);
    }

    #[test]
    fn ranking_truncates_to_top_ten() {
        let rec = Recommender::new();
        let videos: Vec<Video> = (0..15)
            .map(|i| video(&format!("v{i}"), vec![(0.5, 0.5)]))
            .collect();
        assert_eq!(rec.rank(&videos, &HashSet::new()).len(), 10);
    }
}
