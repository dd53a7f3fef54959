//! Data models for the ingestion pipeline.

use evidex_common::CandidateRecord;
use serde::{Deserialize, Serialize};

/// Authors beyond this count collapse into "et al.".
pub const MAX_LISTED_AUTHORS: usize = 3;

/// Bibliographic fields returned by the metadata source for one identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub pmid: String,
    pub doi: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub journal: Option<String>,
    /// Raw date string as reported ("2021 Mar 4", "2019 Winter").
    pub pub_date: Option<String>,
    pub publication_types: Vec<String>,
}

impl PaperMetadata {
    /// "Smith J, Doe A, Roe B et al." style author line.
    pub fn author_line(&self) -> String {
        let mut line = self
            .authors
            .iter()
            .take(MAX_LISTED_AUTHORS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if self.authors.len() > MAX_LISTED_AUTHORS {
            line.push_str(" et al.");
        }
        line
    }

    /// Candidate attributed to the subtopic that discovered it.
    pub fn into_candidate(self, subtopic: &str) -> CandidateRecord {
        let authors = self.author_line();
        let mut candidate = CandidateRecord::new(self.pmid, subtopic);
        candidate.doi = self.doi;
        candidate.title = self.title;
        candidate.authors = authors;
        candidate.journal = self.journal;
        candidate.pub_date = self.pub_date;
        candidate.publication_types = self.publication_types;
        candidate
    }
}
