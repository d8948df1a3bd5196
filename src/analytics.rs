//! Read-only reporting over the record store. The report shape is the contract consumed by
//! external reporting and stays fixed regardless of how records are laid out in storage.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::EvalResult;
use crate::model::{AccessedQuestion, QualityTier, StoreStats};
use crate::storage::RecordStore;
use crate::util::{now_utc_string, round_to};

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: String,
    pub overview: ReportOverview,
    pub score_distribution: Vec<DistributionRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOverview {
    pub total_questions: u64,
    pub average_score: f64,
    pub total_accesses: u64,
    pub most_accessed: Vec<AccessedQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    pub quality_tier: QualityTier,
    pub count: u64,
    pub share: f64,
}

#[derive(Clone)]
pub struct Analytics {
    store: Arc<RecordStore>,
}

impl Analytics {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn report(&self, top_n: usize) -> EvalResult<AnalyticsReport> {
        let stats = self.store.get_stats(top_n)?;
        Ok(build_report(stats))
    }

    pub fn export(&self, destination: &Path) -> bool {
        self.store.export(destination)
    }

    pub fn try_export(&self, destination: &Path) -> EvalResult<usize> {
        self.store.try_export(destination)
    }
}

fn build_report(stats: StoreStats) -> AnalyticsReport {
    let total = stats.total_questions;
    let score_distribution = QualityTier::ALL
        .iter()
        .filter_map(|tier| {
            let count = stats.score_distribution.get(tier).copied().unwrap_or(0);
            (count > 0).then(|| DistributionRow {
                quality_tier: *tier,
                count,
                share: if total == 0 {
                    0.0
                } else {
                    round_to(count as f64 / total as f64, 3)
                },
            })
        })
        .collect();

    AnalyticsReport {
        generated_at: now_utc_string(),
        overview: ReportOverview {
            total_questions: stats.total_questions,
            average_score: round_to(stats.average_score, 3),
            total_accesses: stats.total_accesses,
            most_accessed: stats.top_accessed,
        },
        score_distribution,
    }
}
