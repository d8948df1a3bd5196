use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ScoringConfig;
use crate::error::{EvalError, EvalResult};
use crate::model::{
    BatchEvaluation, BatchSummary, PairReport, QaPair, ScoreReport, check_answer_text,
};
use crate::scoring::aggregate::Aggregator;
use crate::scoring::metrics::compute_all;

/// Stateless scoring front end. Safe to share across threads; identical input always yields an
/// identical report.
#[derive(Debug, Clone)]
pub struct Evaluator {
    aggregator: Aggregator,
    max_batch_size: usize,
    min_keyword_len: usize,
}

impl Evaluator {
    pub fn new(config: &ScoringConfig) -> EvalResult<Self> {
        Ok(Self {
            aggregator: Aggregator::new(config)?,
            max_batch_size: config.max_batch_size,
            min_keyword_len: config.min_keyword_len,
        })
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.aggregator.weights().keys().cloned().collect()
    }

    pub fn evaluate_one(&self, reference: &str, candidate: &str) -> EvalResult<ScoreReport> {
        check_answer_text("reference answer", reference)?;
        check_answer_text("candidate answer", candidate)?;

        let metric_scores = compute_all(reference, candidate, self.min_keyword_len);
        self.aggregator.aggregate(metric_scores)
    }

    /// All-or-nothing: the size cap is enforced before any work, every pair is validated before
    /// any pair is scored, and the first scoring failure aborts the batch.
    pub fn evaluate_batch(&self, pairs: &[QaPair]) -> EvalResult<BatchEvaluation> {
        if pairs.len() > self.max_batch_size {
            return Err(EvalError::BatchTooLarge {
                size: pairs.len(),
                limit: self.max_batch_size,
            });
        }

        for (index, pair) in pairs.iter().enumerate() {
            validate_pair(index, pair)?;
        }

        let mut per_pair = Vec::with_capacity(pairs.len());
        for (index, pair) in pairs.iter().enumerate() {
            let report = self
                .evaluate_one(&pair.reference, &pair.candidate)
                .map_err(|err| annotate_pair_error(index, err))?;
            per_pair.push(PairReport {
                index,
                question: pair.question.clone(),
                report,
            });
        }

        let summary = summarize(&per_pair);
        debug!(
            pairs = summary.total_pairs,
            average_score = summary.average_score,
            "batch evaluated"
        );

        Ok(BatchEvaluation { per_pair, summary })
    }
}

pub fn summarize(reports: &[PairReport]) -> BatchSummary {
    let mut quality_distribution = BTreeMap::new();
    let mut total = 0.0_f64;

    for pair in reports {
        total += pair.report.composite_score;
        *quality_distribution
            .entry(pair.report.quality_tier)
            .or_insert(0usize) += 1;
    }

    let average_score = if reports.is_empty() {
        0.0
    } else {
        total / reports.len() as f64
    };

    BatchSummary {
        average_score,
        quality_distribution,
        total_pairs: reports.len(),
    }
}

fn validate_pair(index: usize, pair: &QaPair) -> EvalResult<()> {
    check_answer_text("reference answer", &pair.reference)
        .and_then(|()| check_answer_text("candidate answer", &pair.candidate))
        .map_err(|err| annotate_pair_error(index, err))
}

fn annotate_pair_error(index: usize, err: EvalError) -> EvalError {
    match err {
        EvalError::InvalidInput(message) => {
            EvalError::InvalidInput(format!("qa_pairs[{index}]: {message}"))
        }
        other => other,
    }
}
