//! End-to-end corpus build.
//!
//! Orchestrates the full flow for every configured category:
//!   1. Recall: every sub-query × date range through the search source
//!   2. Fetch bibliographic metadata in batches
//!   3. Enrich with citation metrics (buffered, order-preserving)
//!   4. Filter by minimum citations, then score
//!   5. Diversity-constrained selection of the category's target count
//!   6. Fetch abstracts for the selection and render cards
//!   7. Embed each card
//!   8. Persist; already-imported PMIDs are skipped
//!
//! The pipeline is non-destructive: item-level failures are logged, counted
//! in the report, and the run continues.

use evidex_common::{CandidateRecord, CategoryConfig, CategorySet, ScoredCandidate};
use evidex_ranker::{select_diverse, EvidenceTier, QualityScorer, ScoringConfig};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::card::{evidence_card, render_card};
use crate::embedding::Embedder;
use crate::models::PaperMetadata;
use crate::recall::recall_category;
use crate::repository::{IngestionRepository, PersistOutcome};
use crate::sources::SourceSet;

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_results_per_query: usize,
    pub scoring: ScoringConfig,
    /// Citation lookups kept in flight; the fetcher still enforces its own cap.
    pub enrichment_concurrency: usize,
    /// Log enrichment progress every this many lookups.
    pub progress_every: usize,
    /// Stop after selection: no abstracts, embedding or writes.
    pub dry_run: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_results_per_query: 200,
            scoring: ScoringConfig::default(),
            enrichment_concurrency: 2,
            progress_every: 25,
            dry_run: false,
        }
    }
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SelectedPaper {
    pub pmid: String,
    pub subtopic: String,
    pub title: String,
    pub score: f64,
    pub tier: String,
}

impl SelectedPaper {
    fn from_scored(sc: &ScoredCandidate) -> Self {
        Self {
            pmid: sc.candidate.pmid.clone(),
            subtopic: sc.candidate.subtopic.clone(),
            title: sc.candidate.title.clone(),
            score: sc.score(),
            tier: format!("{:?}", EvidenceTier::of(&sc.candidate)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryReport {
    pub category_id: String,
    pub searches: usize,
    pub recalled: usize,
    pub failed_searches: usize,
    /// Recalled identifiers the metadata source returned nothing for.
    pub missing_metadata: usize,
    pub enriched: usize,
    /// Lookups the citation graph answered with "not found".
    pub unknown_metrics: usize,
    pub enrichment_failures: usize,
    pub filtered_out: usize,
    pub scored: usize,
    pub selected: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub selection: Vec<SelectedPaper>,
    pub duration_ms: u64,
}

impl CategoryReport {
    fn new(category_id: &str) -> Self {
        Self { category_id: category_id.to_string(), ..Default::default() }
    }

    fn error(&mut self, msg: String) {
        self.errors.push(msg);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub job_id: Uuid,
    pub dry_run: bool,
    pub categories: Vec<CategoryReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn imported(&self) -> usize {
        self.categories.iter().map(|c| c.imported).sum()
    }

    pub fn skipped(&self) -> usize {
        self.categories.iter().map(|c| c.skipped).sum()
    }

    pub fn error_count(&self) -> usize {
        self.categories.iter().map(|c| c.errors.len()).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

pub struct CorpusPipeline {
    sources: SourceSet,
    embedder: Arc<dyn Embedder>,
    repo: IngestionRepository,
    settings: PipelineSettings,
}

impl CorpusPipeline {
    pub fn new(
        sources: SourceSet,
        embedder: Arc<dyn Embedder>,
        repo: IngestionRepository,
        settings: PipelineSettings,
    ) -> Self {
        Self { sources, embedder, repo, settings }
    }

    /// Runs every category in order. Subtopic coverage for scoring is
    /// counted across the whole run.
    pub async fn run(&self, categories: &CategorySet) -> RunReport {
        let job_id = Uuid::new_v4();
        let t0 = std::time::Instant::now();
        info!(job_id = %job_id, categories = categories.categories.len(), dry_run = self.settings.dry_run, "Starting corpus build");

        let mut scorer = QualityScorer::new(&self.settings.scoring);
        let mut reports = Vec::with_capacity(categories.categories.len());
        for category in &categories.categories {
            reports.push(self.run_category(category, &mut scorer).await);
        }

        let report = RunReport {
            job_id,
            dry_run: self.settings.dry_run,
            categories: reports,
            duration_ms: t0.elapsed().as_millis() as u64,
        };
        info!(
            job_id = %job_id,
            imported = report.imported(),
            skipped = report.skipped(),
            errors = report.error_count(),
            duration_ms = report.duration_ms,
            "Corpus build complete"
        );
        report
    }

    #[instrument(skip(self, category, scorer), fields(category = %category.id))]
    pub async fn run_category(&self, category: &CategoryConfig, scorer: &mut QualityScorer) -> CategoryReport {
        let t0 = std::time::Instant::now();
        let mut report = CategoryReport::new(&category.id);

        // 1. Recall
        let recall = recall_category(
            self.sources.search.as_ref(),
            category,
            self.settings.max_results_per_query,
        )
        .await;
        report.searches = recall.searches;
        report.recalled = recall.index.len();
        report.failed_searches = recall.failed_searches;
        report.errors.extend(recall.errors);

        if recall.index.is_empty() {
            info!("No candidates recalled, skipping category");
            report.duration_ms = t0.elapsed().as_millis() as u64;
            return report;
        }

        // 2. Metadata
        let mut metadata = self.fetch_metadata(recall.index.ids(), &mut report).await;
        let mut candidates: Vec<CandidateRecord> = Vec::with_capacity(recall.index.len());
        for (id, subtopic) in recall.index.iter() {
            match metadata.remove(id) {
                Some(meta) => candidates.push(meta.into_candidate(subtopic)),
                None => report.missing_metadata += 1,
            }
        }

        // 3. Citation enrichment
        self.enrich(&mut candidates, &mut report).await;

        // 4. Filter + score
        let pool = scorer.score_all(candidates, category.min_citations);
        report.filtered_out = pool.filtered_out;
        report.scored = pool.scored.len();

        for sq in &category.sub_queries {
            debug!(subtopic = %sq.subtopic, scored_so_far = scorer.coverage_of(&sq.subtopic), "Subtopic coverage");
        }

        // 5. Select
        let selection = select_diverse(pool.scored, category.target_count, &self.settings.scoring.quotas);
        report.selected = selection.len();
        report.selection = selection.iter().map(SelectedPaper::from_scored).collect();
        info!(
            recalled = report.recalled,
            scored = report.scored,
            filtered_out = report.filtered_out,
            selected = report.selected,
            "Selection ready"
        );

        // 6–8. Cards, embeddings, persistence
        if self.settings.dry_run {
            info!("Dry run: selection not imported");
        } else {
            for scored in &selection {
                self.import(category, scored, &mut report).await;
            }
        }

        report.duration_ms = t0.elapsed().as_millis() as u64;
        info!(
            imported = report.imported,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Category complete"
        );
        report
    }

    async fn fetch_metadata(&self, ids: &[String], report: &mut CategoryReport) -> HashMap<String, PaperMetadata> {
        let limit = self.sources.metadata.batch_limit().max(1);
        let mut found = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(limit) {
            match self.sources.metadata.fetch_metadata(batch).await {
                Ok(records) => {
                    for record in records {
                        found.insert(record.pmid.clone(), record);
                    }
                }
                Err(e) => {
                    warn!(batch = batch.len(), "Metadata batch failed: {e}");
                    report.error(format!("metadata batch of {}: {e}", batch.len()));
                }
            }
        }
        found
    }

    /// Applies citation metrics in place. A failed lookup leaves the
    /// candidate with unknown metrics.
    async fn enrich(&self, candidates: &mut [CandidateRecord], report: &mut CategoryReport) {
        let total = candidates.len();
        let source = self.sources.citations.clone();
        let pmids: Vec<String> = candidates.iter().map(|c| c.pmid.clone()).collect();

        let mut lookups = stream::iter(pmids)
            .map(|pmid| {
                let source = source.clone();
                async move {
                    let result = source.citation_metrics(&pmid).await;
                    (pmid, result)
                }
            })
            .buffered(self.settings.enrichment_concurrency.max(1));

        let mut done = 0usize;
        while let Some((pmid, result)) = lookups.next().await {
            let candidate = &mut candidates[done];
            done += 1;
            match result {
                Ok(metrics) => {
                    if metrics.is_unknown() {
                        report.unknown_metrics += 1;
                    } else {
                        report.enriched += 1;
                    }
                    candidate.apply_metrics(metrics);
                }
                Err(e) => {
                    warn!(pmid = %pmid, "Citation lookup failed: {e}");
                    report.enrichment_failures += 1;
                    report.error(format!("citations {pmid}: {e}"));
                }
            }
            if done % self.settings.progress_every.max(1) == 0 {
                info!(done, total, "Citation enrichment progress");
            }
        }
    }

    async fn import(&self, category: &CategoryConfig, scored: &ScoredCandidate, report: &mut CategoryReport) {
        let pmid = scored.pmid();

        match self.repo.already_imported(pmid).await {
            Ok(true) => {
                debug!(pmid, "Already imported, skipping before embedding");
                report.skipped += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => warn!(pmid, "Existence check failed, continuing: {e}"),
        }

        let abstract_text = match self.sources.abstracts.fetch_abstract(pmid).await {
            Ok(text) => text,
            Err(e) => {
                warn!(pmid, "Abstract lookup failed: {e}");
                report.error(format!("abstract {pmid}: {e}"));
                None
            }
        };
        let card_text = render_card(&category.name, scored, abstract_text.as_deref());

        let embedding = match self.embedder.embed(&card_text).await {
            Ok(v) if v.len() == self.embedder.dim() => v,
            Ok(v) => {
                warn!(pmid, expected = self.embedder.dim(), got = v.len(), "Embedding dimension mismatch");
                report.error(format!("embedding {pmid}: expected {} dims, got {}", self.embedder.dim(), v.len()));
                return;
            }
            Err(e) => {
                warn!(pmid, "Embedding failed: {e:#}");
                report.error(format!("embedding {pmid}: {e:#}"));
                return;
            }
        };

        let card = evidence_card(category, scored, card_text, embedding);
        match self.repo.persist(&card).await {
            Ok(PersistOutcome::Inserted) => report.imported += 1,
            Ok(PersistOutcome::Skipped) => report.skipped += 1,
            Err(e) => {
                warn!(pmid, "Write failed: {e}");
                report.error(format!("write {pmid}: {e}"));
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;
    use crate::sources::{AbstractSource, CitationSource, MetadataSource, SearchSource};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use evidex_common::{CitationMetrics, DateRange, SubQuery};
    use evidex_db::{CardStore, MemoryCardStore};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ── Fakes ───────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeSearch(HashMap<(String, String), Vec<&'static str>>);

    #[async_trait]
    impl SearchSource for FakeSearch {
        async fn search_ids(&self, query: &str, range: &DateRange, _max: usize) -> Result<Vec<String>, FetchError> {
            Ok(self.0
                .get(&(query.to_string(), range.name.clone()))
                .map(|ids| ids.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default())
        }
    }

    struct FakeMetadata {
        batch_limit: usize,
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl MetadataSource for FakeMetadata {
        fn batch_limit(&self) -> usize {
            self.batch_limit
        }

        async fn fetch_metadata(&self, ids: &[String]) -> Result<Vec<PaperMetadata>, FetchError> {
            self.calls.lock().unwrap().push(ids.len());
            Ok(ids
                .iter()
                .map(|id| PaperMetadata {
                    pmid: id.clone(),
                    title: format!("Paper {id}"),
                    authors: vec!["Smith J".into()],
                    pub_date: Some("2021 Jan".into()),
                    publication_types: vec!["Journal Article".into()],
                    ..Default::default()
                })
                .collect())
        }
    }

    /// Citation count per PMID; PMIDs in `failing` return a 503.
    #[derive(Default)]
    struct FakeCitations {
        counts: HashMap<&'static str, u64>,
        failing: HashSet<&'static str>,
    }

    #[async_trait]
    impl CitationSource for FakeCitations {
        async fn citation_metrics(&self, id: &str) -> Result<CitationMetrics, FetchError> {
            if self.failing.contains(id) {
                return Err(FetchError::Server { endpoint: "fake".into(), status: 503, body: String::new() });
            }
            Ok(match self.counts.get(id) {
                Some(n) => CitationMetrics { citation_count: Some(*n), open_access: false, concepts: vec![] },
                None => CitationMetrics::unknown(),
            })
        }
    }

    #[derive(Default)]
    struct FakeAbstracts {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AbstractSource for FakeAbstracts {
        async fn fetch_abstract(&self, id: &str) -> Result<Option<String>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("Abstract of {id}.")))
        }
    }

    struct FakeEmbedder {
        dim: usize,
        produce: usize,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new(dim: usize, produce: usize) -> Self {
            Self { dim, produce, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dim(&self) -> usize {
            self.dim
        }

        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1; self.produce])
        }
    }

    fn key(q: &str, r: &str) -> (String, String) {
        (q.to_string(), r.to_string())
    }

    fn category(target: usize, min_citations: u64) -> CategoryConfig {
        let range = |name: &str, year: i32| {
            DateRange::new(
                name,
                NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(year + 4, 12, 31).unwrap(),
            )
        };
        CategoryConfig {
            id: "anxiety".into(),
            name: "Anxiety Disorders".into(),
            target_count: target,
            sub_queries: vec![
                SubQuery { name: "q1".into(), query: "q1".into(), subtopic: "s1".into() },
                SubQuery { name: "q2".into(), query: "q2".into(), subtopic: "s2".into() },
            ],
            min_citations,
            date_ranges: vec![range("r1", 2015), range("r2", 2020)],
        }
    }

    fn overlapping_search() -> FakeSearch {
        FakeSearch(HashMap::from([
            (key("q1", "r1"), vec!["A", "B"]),
            (key("q1", "r2"), vec!["B", "C"]),
            (key("q2", "r1"), vec!["C", "D"]),
            (key("q2", "r2"), vec!["D", "A"]),
        ]))
    }

    struct Harness {
        pipeline: CorpusPipeline,
        store: Arc<MemoryCardStore>,
        metadata: Arc<FakeMetadata>,
        abstracts: Arc<FakeAbstracts>,
        embedder: Arc<FakeEmbedder>,
    }

    fn harness(search: FakeSearch, citations: FakeCitations, settings: PipelineSettings) -> Harness {
        let store = Arc::new(MemoryCardStore::with_dimension(4));
        let metadata = Arc::new(FakeMetadata { batch_limit: 3, calls: Mutex::new(vec![]) });
        let abstracts = Arc::new(FakeAbstracts::default());
        let embedder = Arc::new(FakeEmbedder::new(4, 4));
        let sources = SourceSet {
            search: Arc::new(search),
            metadata: metadata.clone(),
            citations: Arc::new(citations),
            abstracts: abstracts.clone(),
        };
        let pipeline = CorpusPipeline::new(
            sources,
            embedder.clone(),
            IngestionRepository::new(store.clone()),
            settings,
        );
        Harness { pipeline, store, metadata, abstracts, embedder }
    }

    fn all_cited() -> FakeCitations {
        FakeCitations {
            counts: HashMap::from([("A", 40), ("B", 30), ("C", 20), ("D", 10)]),
            ..Default::default()
        }
    }

    fn set(categories: Vec<CategoryConfig>) -> CategorySet {
        CategorySet { categories }
    }

    #[tokio::test]
    async fn test_end_to_end_recall_and_import() {
        let h = harness(overlapping_search(), all_cited(), PipelineSettings::default());
        let report = h.pipeline.run(&set(vec![category(10, 0)])).await;

        let cat = &report.categories[0];
        assert_eq!(cat.searches, 4);
        assert_eq!(cat.recalled, 4);
        assert_eq!(cat.selected, 4);
        assert_eq!(cat.imported, 4);
        assert!(!report.has_errors());

        // Batches never exceed the metadata source's limit.
        assert_eq!(*h.metadata.calls.lock().unwrap(), vec![3, 1]);

        let subtopics: Vec<(String, String)> = h.store
            .cards()
            .into_iter()
            .map(|c| (c.pmid, c.subtopic))
            .collect();
        assert_eq!(
            subtopics,
            vec![
                ("A".to_string(), "s1".to_string()),
                ("B".to_string(), "s1".to_string()),
                ("C".to_string(), "s1".to_string()),
                ("D".to_string(), "s2".to_string()),
            ]
        );
        let card_a = h.store.cards().into_iter().find(|c| c.pmid == "A").unwrap();
        assert!(card_a.card_text.starts_with("[Anxiety Disorders › s1]"));
        assert!(card_a.card_text.contains("Abstract of A."));
        assert_eq!(card_a.citations, Some(40));
    }

    #[tokio::test]
    async fn test_rerun_skips_existing() {
        let h = harness(overlapping_search(), all_cited(), PipelineSettings::default());
        let categories = set(vec![category(10, 0)]);
        h.pipeline.run(&categories).await;
        let second = h.pipeline.run(&categories).await;

        assert_eq!(second.imported(), 0);
        assert_eq!(second.skipped(), 4);
        assert!(!second.has_errors());
        assert_eq!(h.store.count().await.unwrap(), 4);
        // Known PMIDs are skipped before any abstract or embedding call.
        assert_eq!(h.abstracts.calls.load(Ordering::SeqCst), 4);
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_empty_recall_skips_category() {
        let h = harness(FakeSearch::default(), all_cited(), PipelineSettings::default());
        let report = h.pipeline.run(&set(vec![category(10, 0)])).await;

        assert_eq!(report.categories[0].recalled, 0);
        assert_eq!(report.categories[0].selected, 0);
        assert!(h.metadata.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_citation_lookup_is_counted_not_fatal() {
        let citations = FakeCitations {
            failing: HashSet::from(["B"]),
            ..all_cited()
        };
        let h = harness(overlapping_search(), citations, PipelineSettings::default());
        let report = h.pipeline.run(&set(vec![category(10, 0)])).await;

        let cat = &report.categories[0];
        assert_eq!(cat.enrichment_failures, 1);
        assert_eq!(cat.enriched, 3);
        assert_eq!(cat.imported, 4);
        assert_eq!(report.error_count(), 1);
        let card_b = h.store.cards().into_iter().find(|c| c.pmid == "B").unwrap();
        assert_eq!(card_b.citations, None);
    }

    #[tokio::test]
    async fn test_min_citations_and_target_count() {
        let h = harness(overlapping_search(), all_cited(), PipelineSettings::default());
        let report = h.pipeline.run(&set(vec![category(2, 15)])).await;

        let cat = &report.categories[0];
        assert_eq!(cat.filtered_out, 1); // D has 10
        assert_eq!(cat.scored, 3);
        assert_eq!(cat.selected, 2);
        let picked: Vec<&str> = cat.selection.iter().map(|p| p.pmid.as_str()).collect();
        assert_eq!(picked, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let settings = PipelineSettings { dry_run: true, ..Default::default() };
        let h = harness(overlapping_search(), all_cited(), settings);
        let report = h.pipeline.run(&set(vec![category(10, 0)])).await;

        assert!(report.dry_run);
        assert_eq!(report.categories[0].selection.len(), 4);
        assert_eq!(report.imported(), 0);
        assert_eq!(h.store.count().await.unwrap(), 0);
        assert_eq!(h.abstracts.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_dimension_mismatch_is_item_error() {
        let store = Arc::new(MemoryCardStore::new());
        let sources = SourceSet {
            search: Arc::new(overlapping_search()),
            metadata: Arc::new(FakeMetadata { batch_limit: 200, calls: Mutex::new(vec![]) }),
            citations: Arc::new(all_cited()),
            abstracts: Arc::new(FakeAbstracts::default()),
        };
        let pipeline = CorpusPipeline::new(
            sources,
            Arc::new(FakeEmbedder::new(4, 3)),
            IngestionRepository::new(store.clone()),
            PipelineSettings::default(),
        );
        let report = pipeline.run(&set(vec![category(10, 0)])).await;

        assert_eq!(report.imported(), 0);
        assert_eq!(report.error_count(), 4);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
