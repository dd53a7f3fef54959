//! Category configuration for corpus builds.
//!
//! Categories are declarative input: each one names the sub-queries and
//! publication-date windows used during recall, how many papers to keep, and
//! the minimum citation count a paper needs to be considered. The data lives
//! in a YAML (or JSON) file edited independently of the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{EvidexError, Result};

/// Every category of one corpus build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorySet {
    pub categories: Vec<CategoryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Stable identifier persisted on every card (e.g. "anxiety").
    pub id: String,

    /// Human-readable name used in card headers.
    pub name: String,

    /// Maximum number of papers selected for this category.
    pub target_count: usize,

    pub sub_queries: Vec<SubQuery>,

    /// Papers with a known citation count below this are dropped.
    #[serde(default)]
    pub min_citations: u64,

    pub date_ranges: Vec<DateRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuery {
    pub name: String,
    /// Search term passed verbatim to the literature search source.
    pub query: String,
    pub subtopic: String,
}

/// Inclusive publication-date window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self { name: name.into(), start, end }
    }

    /// `(mindate, maxdate)` in the `YYYY/MM/DD` form PubMed expects.
    pub fn pubmed_bounds(&self) -> (String, String) {
        (
            self.start.format("%Y/%m/%d").to_string(),
            self.end.format("%Y/%m/%d").to_string(),
        )
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl CategoryConfig {
    /// Number of search calls recall will make for this category.
    pub fn recall_combinations(&self) -> usize {
        self.sub_queries.len() * self.date_ranges.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EvidexError::Config("category id must not be empty".to_string()));
        }
        if self.target_count == 0 {
            return Err(EvidexError::Config(format!("category '{}': target_count must be > 0", self.id)));
        }
        if self.sub_queries.is_empty() {
            return Err(EvidexError::Config(format!("category '{}': no sub_queries", self.id)));
        }
        if self.date_ranges.is_empty() {
            return Err(EvidexError::Config(format!("category '{}': no date_ranges", self.id)));
        }
        for range in &self.date_ranges {
            if range.start > range.end {
                return Err(EvidexError::Config(format!(
                    "category '{}': date range '{}' starts after it ends",
                    self.id, range.name
                )));
            }
        }
        // Windows must be disjoint so each paper has one reproducible home.
        for (i, a) in self.date_ranges.iter().enumerate() {
            for b in &self.date_ranges[i + 1..] {
                if a.overlaps(b) {
                    return Err(EvidexError::Config(format!(
                        "category '{}': date ranges '{}' and '{}' overlap",
                        self.id, a.name, b.name
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CategorySet {
    /// Load from YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let set: Self = serde_yaml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    /// Load from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let set: Self = serde_json::from_str(&content)?;
        set.validate()?;
        Ok(set)
    }

    /// Picks the format from the file extension (`.json`, anything else is YAML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            _ => Self::from_yaml(path),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for category in &self.categories {
            category.validate()?;
            if !seen.insert(category.id.as_str()) {
                return Err(EvidexError::Config(format!("duplicate category id '{}'", category.id)));
            }
        }
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Keep only the named category, if given.
    pub fn restrict_to(self, only: Option<&str>) -> Result<Self> {
        match only {
            None => Ok(self),
            Some(id) => {
                let category = self
                    .find(id)
                    .cloned()
                    .ok_or_else(|| EvidexError::Config(format!("unknown category '{id}'")))?;
                Ok(Self { categories: vec![category] })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
