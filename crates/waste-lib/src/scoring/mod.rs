//! Waste scoring engine
//!
//! This module provides:
//! - A declarative, ordered table of waste rules
//! - A pure scorer folding rule hits into a recommendation
//! - A stable ranker ordering recommendations for presentation and alerting

mod ranker;
mod rules;
mod scorer;

pub use ranker::{rank_recommendations, RankingSummary};
pub use rules::{default_rules, RuleContext, RuleHit, WasteRule, DEFAULT_RULES};
pub use scorer::{
    fold_hits, recommendation_id, ScoreCard, ScoringConfig, WasteScorer, MAX_CONFIDENCE,
    MAX_SAVINGS_FRACTION, MIN_SCORABLE_COST, MONTHLY_FACTOR,
};
