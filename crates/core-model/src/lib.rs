//! Data model for the knowledge map.
//!
//! Everything here is a plain serde-backed record mirroring the on-disk
//! formats of the data directory: the domain registry, per-domain bundles,
//! and the video catalog. The crate carries no estimation logic; it owns
//! the coordinate/grid conventions every other crate leans on.
//!
//! Core invariants (must hold after every public call):
//! * All coordinates live in the normalized plane `[0,1] × [0,1]`.
//! * A domain's cells are enumerated row-major (`gy · G + gx`); every API
//!   that returns per-cell data preserves that order.
//! * `GridSpec::cell_of` uses floor-and-clamp discretization; a point on
//!   the far edge of a region maps to the last cell, never out of range.
//! * Questions are immutable once loaded; responses are append-only and
//!   the authoritative record from which all derived state is rebuilt.

use serde::{Deserialize, Serialize};

mod bundle;
mod grid;
mod media;
mod question;

pub use bundle::{BundleDomain, BundleHealth, DomainBundle, DomainRegistry};
pub use grid::GridSpec;
pub use media::{Article, GridLabel, Video};
pub use question::{
    AnswerLabel, DEFAULT_DIFFICULTY, Question, UserResponse, normalize_difficulty,
};

/// Axis-aligned rectangle in the normalized plane assigned to a domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Region {
    pub const UNIT: Region = Region {
        x_min: 0.0,
        x_max: 1.0,
        y_min: 0.0,
        y_max: 1.0,
    };

    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Closed-rectangle containment (both edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

/// User-selected question-selection mode. `Auto` defers to the phased
/// policy; the others constrain the pool by predicted correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionMode {
    #[default]
    Auto,
    Easy,
    HardestCanAnswer,
    DontKnow,
}

/// Position of a domain in the two-level hierarchy. Regions are disjoint
/// per level; `Sub` regions lie inside their parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainLevel {
    All,
    General,
    Sub,
}

/// One entry of the domain registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub level: DomainLevel,
    pub region: Region,
    pub grid_size: usize,
    #[serde(default)]
    pub question_count: usize,
}

impl Domain {
    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.grid_size, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn region_contains_is_edge_inclusive() {
        let r = Region::new(0.25, 0.75, 0.0, 0.5);
        assert!(r.contains(0.25, 0.0));
        assert!(r.contains(0.75, 0.5));
        assert!(!r.contains(0.76, 0.25));
        assert!(!r.contains(0.5, 0.51));
    }

    #[test]
    fn domain_registry_round_trip() {
        let json = r#"{
            "schema_version": "3",
            "domains": [{
                "id": "all",
                "name": "Everything",
                "parent_id": null,
                "level": "all",
                "region": {"x_min": 0.0, "x_max": 1.0, "y_min": 0.0, "y_max": 1.0},
                "grid_size": 39,
                "question_count": 50
            }]
        }"#;
        let reg: DomainRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(reg.domains.len(), 1);
        assert_eq!(reg.domains[0].level, DomainLevel::All);
        assert_eq!(reg.domains[0].region, Region::UNIT);
        assert_eq!(reg.domains[0].grid_size, 39);
    }
}
