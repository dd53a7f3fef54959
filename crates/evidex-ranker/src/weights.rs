//! Weight vector for the paper quality score.

use serde::{Deserialize, Serialize};

/// The 5-component weight vector. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    /// Applied to log10(1 + citations)
    #[serde(default = "default_citations")]
    pub citations: f64,
    /// Evidence strength of the best publication-type tag
    #[serde(default = "default_publication_type")]
    pub publication_type: f64,
    /// Published on or after the recency cutoff year
    #[serde(default = "default_recency")]
    pub recency: f64,
    /// Soft bonus for subtopics with few scored candidates so far
    #[serde(default = "default_coverage")]
    pub coverage: f64,
    #[serde(default = "default_open_access")]
    pub open_access: f64,
}

fn default_citations() -> f64 { 0.45 }
fn default_publication_type() -> f64 { 0.25 }
fn default_recency() -> f64 { 0.15 }
fn default_coverage() -> f64 { 0.10 }
fn default_open_access() -> f64 { 0.05 }

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            citations:        default_citations(),
            publication_type: default_publication_type(),
            recency:          default_recency(),
            coverage:         default_coverage(),
            open_access:      default_open_access(),
        }
    }
}

impl QualityWeights {
    fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Validate that all weights sum to ~1.0
    pub fn validate(&self) -> bool {
        (self.sum() - 1.0).abs() < 1e-6 && self.as_array().iter().all(|w| *w >= 0.0)
    }

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.citations,
            self.publication_type,
            self.recency,
            self.coverage,
            self.open_access,
        ]
    }
}
