/// Core record types flowing through the corpus pipeline.
/// A `CandidateRecord` is born in recall, enriched from the metadata and
/// citation sources, scored once into a `ScoredCandidate`, and either
/// selected or dropped.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Primary external identifier (PubMed ID).
    pub pmid: String,
    pub doi: Option<String>,
    pub title: String,
    pub authors: String,
    pub journal: Option<String>,
    /// Publication date exactly as the metadata source reported it ("2021 Mar 4").
    pub pub_date: Option<String>,
    pub publication_types: Vec<String>,
    /// Subtopic of the sub-query that first discovered this record.
    pub subtopic: String,
    /// `None` until enrichment returns a count; `Some(0)` is a confirmed zero.
    pub citations: Option<u64>,
    pub open_access: bool,
    pub concepts: Vec<String>,
}

impl CandidateRecord {
    pub fn new(pmid: impl Into<String>, subtopic: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            doi: None,
            title: String::new(),
            authors: String::new(),
            journal: None,
            pub_date: None,
            publication_types: Vec::new(),
            subtopic: subtopic.into(),
            citations: None,
            open_access: false,
            concepts: Vec::new(),
        }
    }

    /// First four-digit run in the raw publication date.
    pub fn publication_year(&self) -> Option<i32> {
        let raw = self.pub_date.as_deref()?;
        let bytes = raw.as_bytes();
        bytes
            .windows(4)
            .enumerate()
            .find(|(i, w)| {
                w.iter().all(u8::is_ascii_digit)
                    && (*i == 0 || !bytes[i - 1].is_ascii_digit())
                    && bytes.get(i + 4).map_or(true, |b| !b.is_ascii_digit())
            })
            .and_then(|(i, _)| raw[i..i + 4].parse().ok())
    }

    /// Merge citation-graph data into this record.
    pub fn apply_metrics(&mut self, metrics: CitationMetrics) {
        self.citations = metrics.citation_count;
        self.open_access = metrics.open_access;
        self.concepts = metrics.concepts;
    }

    pub fn has_publication_type(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.publication_types
            .iter()
            .any(|t| t.to_lowercase().contains(&needle))
    }

    /// "Guideline" and "Practice Guideline" both count.
    pub fn is_guideline(&self) -> bool {
        self.has_publication_type("guideline")
    }

    pub fn is_meta_analysis(&self) -> bool {
        self.has_publication_type("meta-analysis")
    }

    pub fn is_systematic_review(&self) -> bool {
        self.has_publication_type("systematic review")
    }

    pub fn is_randomized_trial(&self) -> bool {
        self.has_publication_type("randomized controlled trial")
    }
}

// ---------------------------------------------------------------------------
// Citation metrics
// ---------------------------------------------------------------------------

/// What the citation graph knows about one identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationMetrics {
    pub citation_count: Option<u64>,
    pub open_access: bool,
    pub concepts: Vec<String>,
}

impl CitationMetrics {
    /// Result for an identifier the graph has never heard of.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.citation_count.is_none()
    }
}

// ---------------------------------------------------------------------------
// Scored candidate
// ---------------------------------------------------------------------------

/// A candidate with its quality score. The score is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateRecord,
    score: f64,
}

impl ScoredCandidate {
    pub fn new(candidate: CandidateRecord, score: f64) -> Self {
        Self { candidate, score }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn pmid(&self) -> &str {
        &self.candidate.pmid
    }
}
