//! evidex-ranker — quality scoring and diversity-constrained selection of
//! candidate papers.

pub mod scorer;
pub mod selector;
pub mod weights;

pub use scorer::{QualityScorer, ScoredPool, ScoringConfig, UnknownCitationPolicy};
pub use selector::{select_diverse, EvidenceTier, TierQuotas};
pub use weights::QualityWeights;
