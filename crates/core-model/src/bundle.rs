//! Domain registry and per-domain bundle files.
//!
//! Bundle invariants are validated warn-and-continue: a malformed bundle
//! from the offline pipeline should degrade the experience, not abort the
//! session. [`DomainBundle::validate`] reports what it found and logs one
//! warning per violated invariant.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Article, Domain, GridLabel, Question};

/// `data/domains/index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRegistry {
    pub schema_version: String,
    pub domains: Vec<Domain>,
}

impl DomainRegistry {
    pub fn domain(&self, id: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id == id)
    }
}

/// The `domain` object inside a bundle: registry entry plus the ids of the
/// questions the bundle ships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleDomain {
    #[serde(flatten)]
    pub domain: Domain,
    #[serde(default)]
    pub question_ids: Vec<String>,
}

/// `data/domains/{id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainBundle {
    pub domain: BundleDomain,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub labels: Vec<GridLabel>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// Outcome of bundle validation; all fields are counts of violations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleHealth {
    pub question_count_mismatch: bool,
    pub label_count_mismatch: bool,
    pub questions_outside_region: usize,
}

impl BundleHealth {
    pub fn is_clean(&self) -> bool {
        !self.question_count_mismatch
            && !self.label_count_mismatch
            && self.questions_outside_region == 0
    }
}

/// Expected number of questions per bundle, fixed by the offline pipeline.
pub const QUESTIONS_PER_BUNDLE: usize = 50;

impl DomainBundle {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Check the pipeline invariants: 50 questions, `G · G` labels, every
    /// question inside the domain's region.
    pub fn validate(&self) -> BundleHealth {
        let mut health = BundleHealth::default();
        let domain = &self.domain.domain;

        if self.questions.len() != QUESTIONS_PER_BUNDLE {
            health.question_count_mismatch = true;
            warn!(
                target: "model",
                domain = domain.id.as_str(),
                expected = QUESTIONS_PER_BUNDLE,
                actual = self.questions.len(),
                "bundle question count mismatch"
            );
        }

        let expected_labels = domain.grid_size * domain.grid_size;
        if !self.labels.is_empty() && self.labels.len() != expected_labels {
            health.label_count_mismatch = true;
            warn!(
                target: "model",
                domain = domain.id.as_str(),
                expected = expected_labels,
                actual = self.labels.len(),
                "bundle label count mismatch"
            );
        }

        for q in &self.questions {
            if !domain.region.contains(q.x, q.y) {
                health.questions_outside_region += 1;
            }
        }
        if health.questions_outside_region > 0 {
            warn!(
                target: "model",
                domain = domain.id.as_str(),
                count = health.questions_outside_region,
                "bundle has questions outside the domain region"
            );
        }

        health
    }
}
