//! Videos, grid labels, and articles carried by domain bundles and the
//! video catalog.

use serde::{Deserialize, Serialize};

/// A learning video with its spatial footprint on the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    /// Duration in seconds.
    pub duration: f64,
    /// Ordered dwell points in concept-space; serialized as `[x, y]` pairs.
    pub windows: Vec<(f64, f64)>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Display label for one grid cell. Bundles carry exactly `G · G` of
/// these in row-major order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridLabel {
    pub text: String,
    #[serde(default)]
    pub short: Option<String>,
}

/// A reference article pinned to the map; article density per cell feeds
/// the curriculum's landmark centrality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub x: f64,
    pub y: f64,
}
