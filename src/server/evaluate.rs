use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::error::EvalError;
use crate::model::{BatchSummary, PairReport, QaPair, ScoreReport};

/// One entry of a batch request. Fields are optional here so a missing answer is reported
/// against its entry index instead of as an opaque body rejection.
#[derive(Debug, Deserialize)]
pub struct QaPairPayload {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub llm_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEvaluateRequest {
    #[serde(default)]
    pub qa_pairs: Option<Vec<QaPairPayload>>,
}

#[derive(Debug, Serialize)]
pub struct BatchEvaluateResponse {
    pub results_summary: BatchSummary,
    pub per_pair: Vec<PairReport>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(flatten)]
    pub report: ScoreReport,
}

impl QaPairPayload {
    fn into_pair(self, label: &str) -> Result<QaPair, EvalError> {
        let reference = self.expected_answer.ok_or_else(|| {
            EvalError::InvalidInput(format!("{label}: missing expected_answer"))
        })?;
        let candidate = self
            .llm_answer
            .ok_or_else(|| EvalError::InvalidInput(format!("{label}: missing llm_answer")))?;

        Ok(QaPair {
            question: self.question,
            reference,
            candidate,
        })
    }
}

pub async fn evaluate_pair(
    State(state): State<AppState>,
    payload: Result<Json<QaPairPayload>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let Json(payload) = payload?;
    let pair = payload.into_pair("request")?;

    let report = state
        .evaluator
        .evaluate_one(&pair.reference, &pair.candidate)?;

    Ok(Json(EvaluateResponse {
        question: pair.question,
        report,
    }))
}

pub async fn evaluate_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchEvaluateRequest>, JsonRejection>,
) -> Result<Json<BatchEvaluateResponse>, ApiError> {
    let Json(payload) = payload?;
    let entries = payload
        .qa_pairs
        .ok_or_else(|| EvalError::InvalidInput("missing qa_pairs".to_string()))?;

    let limit = state.evaluator.max_batch_size();
    if entries.len() > limit {
        return Err(EvalError::BatchTooLarge {
            size: entries.len(),
            limit,
        }
        .into());
    }

    let pairs = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_pair(&format!("qa_pairs[{index}]")))
        .collect::<Result<Vec<QaPair>, EvalError>>()?;

    let evaluator = state.evaluator.clone();
    let evaluation = tokio::task::spawn_blocking(move || evaluator.evaluate_batch(&pairs))
        .await
        .map_err(|err| ApiError::Internal(format!("batch scoring task failed: {err}")))??;

    info!(
        pairs = evaluation.summary.total_pairs,
        average_score = evaluation.summary.average_score,
        "batch evaluation served"
    );

    Ok(Json(BatchEvaluateResponse {
        results_summary: evaluation.summary,
        per_pair: evaluation.per_pair,
    }))
}
