//! The seam to the rendering collaborator.
//!
//! The renderer itself (palette choice, animation timing, widgets) is out
//! of scope; the core only pushes data through this trait and reads the
//! viewport back for pool restriction. Renderers cap transition
//! durations at 1000 ms and must pick color-blind-safe palettes, but
//! both are their contract, not ours.

use core_estimator::CellEstimate;
use core_model::{GridLabel, Question, Region};

pub trait RendererPort {
    /// Replace the question scatter layer.
    fn set_points(&mut self, questions: &[Question]);
    /// Replace the knowledge heatmap. Called after every observation and
    /// on domain change; `estimates` is always a complete, freshly built
    /// array for `region`.
    fn set_heatmap(&mut self, estimates: &[CellEstimate], region: Region);
    /// Replace the per-cell label layer.
    fn set_labels(&mut self, labels: &[GridLabel]);
    /// Current viewport in map coordinates, if the view is constrained.
    fn viewport(&self) -> Option<Region>;
    /// Animate toward a region (domain switch).
    fn transition_to(&mut self, region: Region, duration_ms: u32);
}

/// Renderer that swallows everything; used headless and in tests.
#[derive(Debug, Default)]
pub struct NoopRenderer;

impl RendererPort for NoopRenderer {
    fn set_points(&mut self, _questions: &[Question]) {}
    fn set_heatmap(&mut self, _estimates: &[CellEstimate], _region: Region) {}
    fn set_labels(&mut self, _labels: &[GridLabel]) {}
    fn viewport(&self) -> Option<Region> {
        None
    }
    fn transition_to(&mut self, _region: Region, _duration_ms: u32) {}
}
