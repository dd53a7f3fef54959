//! Diversity-constrained top-N selection.
//!
//! Pure score order would fill a category with whatever tier happens to be
//! most cited. Before filling by score, a few slots are reserved for the best
//! guideline, meta-analyses / systematic reviews and randomized trials.
//! Reservations never push the selection past N.

use evidex_common::{CandidateRecord, ScoredCandidate};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuotas {
    #[serde(default = "default_guideline")]
    pub guideline: usize,
    /// Meta-analyses and systematic reviews share this quota.
    #[serde(default = "default_meta_systematic")]
    pub meta_systematic: usize,
    #[serde(default = "default_rct")]
    pub rct: usize,
}

fn default_guideline() -> usize { 1 }
fn default_meta_systematic() -> usize { 6 }
fn default_rct() -> usize { 2 }

impl Default for TierQuotas {
    fn default() -> Self {
        Self {
            guideline: default_guideline(),
            meta_systematic: default_meta_systematic(),
            rct: default_rct(),
        }
    }
}

/// Highest evidence tier a candidate's tags qualify it for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EvidenceTier {
    Guideline,
    MetaOrSystematic,
    RandomizedTrial,
    Other,
}

impl EvidenceTier {
    pub fn of(c: &CandidateRecord) -> Self {
        if c.is_guideline() {
            EvidenceTier::Guideline
        } else if c.is_meta_analysis() || c.is_systematic_review() {
            EvidenceTier::MetaOrSystematic
        } else if c.is_randomized_trial() {
            EvidenceTier::RandomizedTrial
        } else {
            EvidenceTier::Other
        }
    }
}

/// Reserves up to `quota` of the highest-ranked unreserved candidates matching
/// `qualifies`, without exceeding `n` selected in total.
fn reserve(
    ranked: &[ScoredCandidate],
    selected: &mut [bool],
    taken: &mut usize,
    n: usize,
    quota: usize,
    qualifies: impl Fn(&CandidateRecord) -> bool,
) -> usize {
    let mut reserved = 0;
    for (i, sc) in ranked.iter().enumerate() {
        if reserved == quota || *taken == n {
            break;
        }
        if !selected[i] && qualifies(&sc.candidate) {
            selected[i] = true;
            reserved += 1;
            *taken += 1;
        }
    }
    reserved
}

/// Selects at most `n` candidates, returned in descending score order.
///
/// 1. stable sort by score, descending
/// 2. reserve the top guideline(s)
/// 3. reserve the top meta-analyses / systematic reviews not yet reserved
/// 4. reserve the top randomized trials not yet reserved
/// 5. fill the remaining slots in score order
pub fn select_diverse(mut pool: Vec<ScoredCandidate>, n: usize, quotas: &TierQuotas) -> Vec<ScoredCandidate> {
    pool.sort_by(|a, b| b.score().total_cmp(&a.score()));

    let mut selected = vec![false; pool.len()];
    let mut taken = 0;

    let guidelines = reserve(&pool, &mut selected, &mut taken, n, quotas.guideline, |c| c.is_guideline());
    let reviews = reserve(&pool, &mut selected, &mut taken, n, quotas.meta_systematic, |c| {
        c.is_meta_analysis() || c.is_systematic_review()
    });
    let trials = reserve(&pool, &mut selected, &mut taken, n, quotas.rct, |c| c.is_randomized_trial());
    let filled = reserve(&pool, &mut selected, &mut taken, n, usize::MAX, |_| true);

    debug!(pool = pool.len(), n, guidelines, reviews, trials, filled, "Selection complete");

    pool.into_iter()
        .zip(selected)
        .filter_map(|(sc, keep)| keep.then_some(sc))
        .collect()
}
