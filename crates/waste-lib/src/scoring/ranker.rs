//! Recommendation ranking

use serde::{Deserialize, Serialize};

use crate::models::{Priority, WasteRecommendation};

/// Order by priority rank, then wastage score, both descending
///
/// The sort is stable: recommendations that tie keep their input order.
pub fn rank_recommendations(mut recommendations: Vec<WasteRecommendation>) -> Vec<WasteRecommendation> {
    recommendations.sort_by(|a, b| {
        b.priority
            .rank()
            .cmp(&a.priority.rank())
            .then_with(|| b.wastage_score.cmp(&a.wastage_score))
    });
    recommendations
}

/// Totals over a recommendation set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total_estimated_savings: f64,
    pub total_monthly_savings: f64,
    pub average_confidence: f64,
}

impl RankingSummary {
    pub fn from_recommendations(recommendations: &[WasteRecommendation]) -> Self {
        let mut summary = Self {
            total: recommendations.len(),
            ..Default::default()
        };

        for rec in recommendations {
            match rec.priority {
                Priority::High => summary.high += 1,
                Priority::Medium => summary.medium += 1,
                Priority::Low => summary.low += 1,
            }
            summary.total_estimated_savings += rec.estimated_savings;
            summary.total_monthly_savings += rec.estimated_monthly_savings;
            summary.average_confidence += rec.confidence_score;
        }

        if summary.total > 0 {
            summary.average_confidence /= summary.total as f64;
        }

        summary
    }
}
