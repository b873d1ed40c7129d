//! Landmark-to-niche curriculum weighting.
//!
//! Early in a session the sampler should favor "landmark" cells — the
//! ones dense with reference articles — and drift toward niche cells as
//! coverage grows. The weight is a sharp sigmoid ramp around 30% map
//! coverage; how it blends into the question score is the sampler
//! owner's call (a multiplicative blend in the session dispatcher).

use core_model::{DomainBundle, GridSpec, Question};
use core_numerics::sigmoid;
use std::collections::HashMap;

/// Curriculum weight in `(0, 1)`: ~0.95 at 0% coverage, 0.5 at 30%,
/// ~0.05 at 60%. `answered_count` is part of the call contract for
/// future policies but does not shape the current ramp.
pub fn weight(answered_count: usize, coverage_percent: f64) -> f64 {
    let _ = answered_count;
    1.0 - sigmoid((coverage_percent / 100.0 - 0.3) * 10.0)
}

/// Article density per cell, normalized by the densest cell, keyed by
/// row-major flat index. Domains without articles produce an empty map.
pub fn centrality(bundle: &DomainBundle) -> HashMap<usize, f64> {
    let grid = bundle.domain.domain.grid();
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for article in &bundle.articles {
        let (gx, gy) = grid.cell_of(article.x, article.y);
        *counts.entry(grid.flat(gx, gy)).or_default() += 1;
    }
    let Some(&max) = counts.values().max() else {
        return HashMap::new();
    };
    counts
        .into_iter()
        .map(|(k, v)| (k, v as f64 / max as f64))
        .collect()
}

/// Centrality of the cell a question falls in, using the same
/// floor-and-clamp discretization as the sampler. Unmapped cells score 0.
pub fn centrality_for_question(
    question: &Question,
    grid: GridSpec,
    centrality: &HashMap<usize, f64>,
) -> f64 {
    let (gx, gy) = grid.cell_of(question.x, question.y);
    centrality.get(&grid.flat(gx, gy)).copied().unwrap_or(0.0)
}
