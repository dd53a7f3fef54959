//! Live calls against PubMed, OpenAlex and Europe PMC.
//!
//! Run with: cargo test --package evidex-ingestion --test test_live_sources -- --ignored --nocapture

use chrono::NaiveDate;
use evidex_common::sandbox::SandboxClient;
use evidex_common::DateRange;
use evidex_ingestion::{Fetcher, FetcherConfig, SourceSet, SourcesConfig};
use std::sync::Arc;

fn live_sources() -> (Arc<Fetcher>, SourceSet) {
    let client = SandboxClient::new().expect("HTTP client");
    let fetcher = Arc::new(Fetcher::http(&FetcherConfig::default(), client));
    let sources = SourceSet::live(fetcher.clone(), &SourcesConfig::default());
    (fetcher, sources)
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_search_then_enrich_gad() {
    let (fetcher, sources) = live_sources();
    let range = DateRange::new(
        "recent",
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    );

    let ids = sources
        .search
        .search_ids("generalized anxiety disorder[tiab] AND meta-analysis[pt]", &range, 5)
        .await
        .expect("PubMed search failed");
    println!("Found {} ids: {:?}", ids.len(), ids);
    assert!(!ids.is_empty(), "Should find at least one paper");

    let papers = sources.metadata.fetch_metadata(&ids).await.expect("esummary failed");
    for paper in &papers {
        println!("\n---\nPMID {}: {} ({:?})", paper.pmid, paper.title, paper.publication_types);
    }

    let metrics = sources.citations.citation_metrics(&ids[0]).await.expect("OpenAlex failed");
    println!("Citations for {}: {:?}", ids[0], metrics.citation_count);

    let abstract_text = sources.abstracts.fetch_abstract(&ids[0]).await.expect("Europe PMC failed");
    println!("Abstract: {:?}", abstract_text.as_deref().map(|s| s.chars().take(200).collect::<String>()));

    // Same search again is served from the cache.
    let before = fetcher.stats();
    sources.search.search_ids("generalized anxiety disorder[tiab] AND meta-analysis[pt]", &range, 5).await.unwrap();
    assert_eq!(fetcher.stats().network_calls, before.network_calls);
}
