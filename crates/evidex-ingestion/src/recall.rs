//! Recall: run every (sub-query, date range) search for a category and merge
//! the hits into one identifier → subtopic index.

use evidex_common::CategoryConfig;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use crate::sources::SearchSource;

/// Insertion-ordered map from identifier to the subtopic that found it first.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SubtopicIndex {
    order: Vec<String>,
    subtopics: HashMap<String, String>,
}

impl SubtopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` under `subtopic` unless it is already present.
    /// Returns whether the id was new.
    pub fn insert_if_absent(&mut self, id: &str, subtopic: &str) -> bool {
        if self.subtopics.contains_key(id) {
            return false;
        }
        self.subtopics.insert(id.to_string(), subtopic.to_string());
        self.order.push(id.to_string());
        true
    }

    pub fn subtopic(&self, id: &str) -> Option<&str> {
        self.subtopics.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.subtopics.contains_key(id)
    }

    /// Identifiers in first-discovery order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(move |id| (id.as_str(), self.subtopics[id].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecallOutcome {
    pub index: SubtopicIndex,
    pub searches: usize,
    pub failed_searches: usize,
    /// One line per failed search.
    pub errors: Vec<String>,
}

/// Sub-queries in declared order, and within each sub-query the date ranges
/// in declared order. A failed search is logged and counted; the rest still run.
#[instrument(skip(search, category), fields(category = %category.id))]
pub async fn recall_category(
    search: &dyn SearchSource,
    category: &CategoryConfig,
    max_results: usize,
) -> RecallOutcome {
    let mut outcome = RecallOutcome::default();

    for sub_query in &category.sub_queries {
        for range in &category.date_ranges {
            outcome.searches += 1;
            match search.search_ids(&sub_query.query, range, max_results).await {
                Ok(ids) => {
                    let hits = ids.len();
                    let new = ids
                        .iter()
                        .filter(|id| outcome.index.insert_if_absent(id, &sub_query.subtopic))
                        .count();
                    debug!(
                        sub_query = %sub_query.name,
                        range = %range.name,
                        hits,
                        new,
                        "Search complete"
                    );
                }
                Err(e) => {
                    warn!(sub_query = %sub_query.name, range = %range.name, "Search failed: {e}");
                    outcome.failed_searches += 1;
                    outcome.errors.push(format!("search {}/{}: {e}", sub_query.name, range.name));
                }
            }
        }
    }

    info!(
        recalled = outcome.index.len(),
        searches = outcome.searches,
        failed = outcome.failed_searches,
        "Recall complete"
    );
    outcome
}
