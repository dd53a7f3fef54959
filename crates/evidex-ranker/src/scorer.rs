//! Paper quality score.
//!
//! score = w_c·log10(1 + citations) + w_p·pub_type + w_r·recency
//!       + w_cov·coverage_bonus + w_oa·open_access
//!
//! Candidates without citation data score as zero citations. The coverage
//! bonus depends on how many candidates of the same subtopic were scored
//! before, so the result depends on iteration order.

use evidex_common::{CandidateRecord, ScoredCandidate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::selector::TierQuotas;
use crate::weights::QualityWeights;

// ── Config ────────────────────────────────────────────────────────────────────

/// What to do with candidates the citation graph has no count for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCitationPolicy {
    /// Exempt from the minimum-citation filter.
    #[default]
    Keep,
    /// Treated as failing any non-zero minimum.
    Drop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Papers from this year on get the full recency weight.
    #[serde(default = "default_recency_cutoff_year")]
    pub recency_cutoff_year: i32,
    #[serde(default)]
    pub unknown_citations: UnknownCitationPolicy,
    #[serde(default)]
    pub weights: QualityWeights,
    #[serde(default)]
    pub quotas: TierQuotas,
}

fn default_recency_cutoff_year() -> i32 { 2019 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recency_cutoff_year: default_recency_cutoff_year(),
            unknown_citations: UnknownCitationPolicy::default(),
            weights: QualityWeights::default(),
            quotas: TierQuotas::default(),
        }
    }
}

// ── Components ────────────────────────────────────────────────────────────────

/// Best tag wins: 1.0 Guideline or Meta-Analysis, 0.9 Systematic Review,
/// 0.8 Randomized Controlled Trial, 0.5 anything else.
pub fn publication_type_weight(c: &CandidateRecord) -> f64 {
    if c.is_guideline() || c.is_meta_analysis() {
        1.0
    } else if c.is_systematic_review() {
        0.9
    } else if c.is_randomized_trial() {
        0.8
    } else {
        0.5
    }
}

/// 1.0 on or after `cutoff_year`, 0.6 before. An unparseable date counts as old.
pub fn recency_weight(c: &CandidateRecord, cutoff_year: i32) -> f64 {
    match c.publication_year() {
        Some(year) if year >= cutoff_year => 1.0,
        _ => 0.6,
    }
}

/// `already_scored` is the number of earlier candidates with the same subtopic.
pub fn coverage_bonus(already_scored: usize) -> f64 {
    match already_scored {
        0..=1 => 0.2,
        2..=3 => 0.1,
        _ => 0.0,
    }
}

pub fn citation_component(citations: Option<u64>) -> f64 {
    (1.0 + citations.unwrap_or(0) as f64).log10()
}

/// Unweighted inputs of one score, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub citations: f64,
    pub publication_type: f64,
    pub recency: f64,
    pub coverage: f64,
    pub open_access: f64,
}

impl ScoreComponents {
    pub fn as_array(&self) -> [f64; 5] {
        [self.citations, self.publication_type, self.recency, self.coverage, self.open_access]
    }

    pub fn weighted_sum(&self, weights: &QualityWeights) -> f64 {
        self.as_array()
            .iter()
            .zip(weights.as_array().iter())
            .map(|(x, w)| x * w)
            .sum()
    }
}

// ── Filter ────────────────────────────────────────────────────────────────────

/// Drops candidates whose known citation count is below `min_citations`.
pub fn passes_citation_filter(c: &CandidateRecord, min_citations: u64, policy: UnknownCitationPolicy) -> bool {
    match c.citations {
        Some(n) => n >= min_citations,
        None => match policy {
            UnknownCitationPolicy::Keep => true,
            UnknownCitationPolicy::Drop => min_citations == 0,
        },
    }
}

// ── Scorer ────────────────────────────────────────────────────────────────────

/// Scores candidates once each, tracking subtopic coverage across the run.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    weights: QualityWeights,
    recency_cutoff_year: i32,
    unknown_citations: UnknownCitationPolicy,
    coverage: HashMap<String, usize>,
}

/// Candidates that survived the filter, plus how many did not.
#[derive(Debug, Clone, Default)]
pub struct ScoredPool {
    pub scored: Vec<ScoredCandidate>,
    pub filtered_out: usize,
}

impl QualityScorer {
    pub fn new(cfg: &ScoringConfig) -> Self {
        Self {
            weights: cfg.weights.clone(),
            recency_cutoff_year: cfg.recency_cutoff_year,
            unknown_citations: cfg.unknown_citations,
            coverage: HashMap::new(),
        }
    }

    pub fn components(&self, c: &CandidateRecord) -> ScoreComponents {
        let already = self.coverage.get(&c.subtopic).copied().unwrap_or(0);
        ScoreComponents {
            citations: citation_component(c.citations),
            publication_type: publication_type_weight(c),
            recency: recency_weight(c, self.recency_cutoff_year),
            coverage: coverage_bonus(already),
            open_access: if c.open_access { 1.0 } else { 0.0 },
        }
    }

    /// Scores `c` and counts it towards its subtopic's coverage.
    pub fn score(&mut self, c: CandidateRecord) -> ScoredCandidate {
        let components = self.components(&c);
        let score = components.weighted_sum(&self.weights);
        *self.coverage.entry(c.subtopic.clone()).or_insert(0) += 1;
        debug!(pmid = %c.pmid, subtopic = %c.subtopic, score, ?components, "Scored candidate");
        ScoredCandidate::new(c, score)
    }

    /// Filters by `min_citations`, then scores survivors in the given order.
    pub fn score_all(&mut self, candidates: Vec<CandidateRecord>, min_citations: u64) -> ScoredPool {
        let mut pool = ScoredPool::default();
        for c in candidates {
            if passes_citation_filter(&c, min_citations, self.unknown_citations) {
                pool.scored.push(self.score(c));
            } else {
                pool.filtered_out += 1;
            }
        }
        pool
    }

    /// Candidates scored so far under `subtopic`.
    pub fn coverage_of(&self, subtopic: &str) -> usize {
        self.coverage.get(subtopic).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(subtopic: &str, citations: Option<u64>, types: &[&str], date: &str) -> CandidateRecord {
        let mut c = CandidateRecord::new("1", subtopic);
        c.citations = citations;
        c.publication_types = types.iter().map(|t| t.to_string()).collect();
        c.pub_date = Some(date.to_string());
        c
    }

    #[test]
    fn test_publication_type_best_tag_wins() {
        let c = candidate("s", None, &["Randomized Controlled Trial", "Systematic Review"], "2020");
        assert_eq!(publication_type_weight(&c), 0.9);
        let c = candidate("s", None, &["Practice Guideline"], "2020");
        assert_eq!(publication_type_weight(&c), 1.0);
        let c = candidate("s", None, &["Journal Article"], "2020");
        assert_eq!(publication_type_weight(&c), 0.5);
    }

    #[test]
    fn test_recency() {
        assert_eq!(recency_weight(&candidate("s", None, &[], "2019 Jan"), 2019), 1.0);
        assert_eq!(recency_weight(&candidate("s", None, &[], "2018 Dec"), 2019), 0.6);
        assert_eq!(recency_weight(&candidate("s", None, &[], "undated"), 2019), 0.6);
    }

    #[test]
    fn test_coverage_bonus_steps() {
        assert_eq!(coverage_bonus(0), 0.2);
        assert_eq!(coverage_bonus(1), 0.2);
        assert_eq!(coverage_bonus(2), 0.1);
        assert_eq!(coverage_bonus(3), 0.1);
        assert_eq!(coverage_bonus(4), 0.0);
    }

    #[test]
    fn test_known_score() {
        // 0.45·log10(100) + 0.25·1.0 + 0.15·1.0 + 0.10·0.2 + 0.05·1.0
        let mut c = candidate("s", Some(99), &["Meta-Analysis"], "2022");
        c.open_access = true;
        let mut scorer = QualityScorer::new(&ScoringConfig::default());
        let scored = scorer.score(c);
        assert!((scored.score() - 1.37).abs() < 1e-9, "{}", scored.score());
    }

    #[test]
    fn test_score_monotonic_in_citations() {
        let cfg = ScoringConfig::default();
        let mut previous = f64::MIN;
        for n in [0u64, 1, 5, 50, 500, 5000] {
            let mut scorer = QualityScorer::new(&cfg);
            let s = scorer.score(candidate("s", Some(n), &["Journal Article"], "2015")).score();
            assert!(s > previous, "score must grow with citations");
            previous = s;
        }
    }

    #[test]
    fn test_unknown_citations_score_as_zero() {
        let cfg = ScoringConfig::default();
        let unknown = QualityScorer::new(&cfg).score(candidate("s", None, &[], "2020"));
        let zero = QualityScorer::new(&cfg).score(candidate("s", Some(0), &[], "2020"));
        assert_eq!(unknown.score(), zero.score());
    }

    #[test]
    fn test_coverage_is_order_dependent() {
        let mut scorer = QualityScorer::new(&ScoringConfig::default());
        let scores: Vec<f64> = (0..5)
            .map(|_| scorer.score(candidate("gad", Some(10), &[], "2020")).score())
            .collect();
        assert_eq!(scores[0], scores[1]);
        assert!(scores[1] > scores[2]);
        assert_eq!(scores[2], scores[3]);
        assert!(scores[3] > scores[4]);
        assert_eq!(scorer.coverage_of("gad"), 5);
        assert_eq!(scorer.coverage_of("panic"), 0);
    }

    #[test]
    fn test_citation_filter_policies() {
        let unknown = candidate("s", None, &[], "2020");
        let low = candidate("s", Some(2), &[], "2020");
        assert!(passes_citation_filter(&unknown, 5, UnknownCitationPolicy::Keep));
        assert!(!passes_citation_filter(&unknown, 5, UnknownCitationPolicy::Drop));
        assert!(passes_citation_filter(&unknown, 0, UnknownCitationPolicy::Drop));
        assert!(!passes_citation_filter(&low, 5, UnknownCitationPolicy::Keep));
        assert!(passes_citation_filter(&low, 2, UnknownCitationPolicy::Keep));
    }

    #[test]
    fn test_score_all_filters_before_scoring() {
        let mut scorer = QualityScorer::new(&ScoringConfig::default());
        let pool = scorer.score_all(
            vec![
                candidate("s", Some(1), &[], "2020"),
                candidate("s", Some(10), &[], "2020"),
                candidate("s", None, &[], "2020"),
            ],
            5,
        );
        assert_eq!(pool.scored.len(), 2);
        assert_eq!(pool.filtered_out, 1);
        // Filtered candidates do not consume coverage.
        assert_eq!(scorer.coverage_of("s"), 2);
    }

    #[test]
    fn test_config_from_toml() {
        let cfg: ScoringConfig = toml::from_str(
            r#"
            recency_cutoff_year = 2021
            unknown_citations = "drop"
            [quotas]
            guideline = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.recency_cutoff_year, 2021);
        assert_eq!(cfg.unknown_citations, UnknownCitationPolicy::Drop);
        assert_eq!(cfg.quotas.guideline, 2);
        assert_eq!(cfg.quotas.meta_systematic, 6);
        assert!(cfg.weights.validate());
    }
}
