//! Score-then-store orchestration over questions coming from an external question source.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info};

use crate::analytics::{Analytics, AnalyticsReport};
use crate::config::ScoringConfig;
use crate::error::EvalResult;
use crate::model::{QuestionInput, ScoreReport};
use crate::scoring::Evaluator;
use crate::storage::RecordStore;

/// One record from the question source. `llm_answer` is filled by the answer source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceQuestion {
    #[serde(deserialize_with = "deserialize_question_id")]
    pub question_id: String,
    #[serde(default)]
    pub question_title: Option<String>,
    #[serde(default)]
    pub question_content: Option<String>,
    pub original_answer: String,
    #[serde(default)]
    pub llm_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub question_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessOutcome {
    fn failed(question_id: &str, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            question_id: question_id.to_string(),
            scores: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub processed: usize,
    pub failed: usize,
    pub outcomes: Vec<ProcessOutcome>,
}

pub struct AnalysisSystem {
    evaluator: Evaluator,
    store: Arc<RecordStore>,
    analytics: Analytics,
}

impl AnalysisSystem {
    pub fn new(config: &ScoringConfig, store: Arc<RecordStore>) -> EvalResult<Self> {
        Ok(Self {
            evaluator: Evaluator::new(config)?,
            analytics: Analytics::new(Arc::clone(&store)),
            store,
        })
    }

    /// Scores the question's reference answer against `generated_answer` and stores the result.
    /// Failures are reported in the outcome, never raised.
    pub fn process_question(
        &self,
        question: &SourceQuestion,
        generated_answer: &str,
        access_count: u32,
    ) -> ProcessOutcome {
        info!(question_id = %question.question_id, "processing question");

        let scores = match self
            .evaluator
            .evaluate_one(&question.original_answer, generated_answer)
        {
            Ok(scores) => scores,
            Err(err) => {
                error!(question_id = %question.question_id, error = %err, "scoring failed");
                return ProcessOutcome::failed(&question.question_id, err.to_string());
            }
        };

        let input = QuestionInput {
            question_id: question.question_id.clone(),
            question_title: question.question_title.clone(),
            question_content: question.question_content.clone(),
            reference_answer: question.original_answer.clone(),
            generated_answer: generated_answer.to_string(),
        };

        if let Err(err) = self.store.try_store(&input, &scores, access_count) {
            error!(question_id = %question.question_id, error = %err, "storing failed");
            return ProcessOutcome::failed(&question.question_id, err.to_string());
        }

        info!(
            question_id = %question.question_id,
            composite_score = scores.composite_score,
            tier = %scores.quality_tier,
            "question processed"
        );

        ProcessOutcome {
            success: true,
            question_id: question.question_id.clone(),
            scores: Some(scores),
            error: None,
        }
    }

    /// Processes every question that carries a generated answer, continuing past failures.
    pub fn process_all(&self, questions: &[SourceQuestion], access_count: u32) -> ProcessSummary {
        let mut outcomes = Vec::with_capacity(questions.len());

        for question in questions {
            let outcome = match question.llm_answer.as_deref() {
                Some(answer) => self.process_question(question, answer, access_count),
                None => ProcessOutcome::failed(&question.question_id, "no generated answer"),
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|outcome| !outcome.success).count();
        ProcessSummary {
            processed: outcomes.len() - failed,
            failed,
            outcomes,
        }
    }

    pub fn generate_report(&self, top_n: usize) -> EvalResult<AnalyticsReport> {
        self.analytics.report(top_n)
    }

    pub fn export_data(&self, destination: &Path) -> bool {
        self.analytics.export(destination)
    }
}

/// Reads a JSON array of questions, or one JSON object per line.
pub fn load_questions(path: &Path) -> Result<Vec<SourceQuestion>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()));
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<SourceQuestion>(line).with_context(|| {
                format!("failed to parse {} line {}", path.display(), index + 1)
            })
        })
        .collect()
}

fn deserialize_question_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawQuestionId {
        Text(String),
        Integer(i64),
    }

    match RawQuestionId::deserialize(deserializer)? {
        RawQuestionId::Text(value) => Ok(value),
        RawQuestionId::Integer(value) => Ok(value.to_string()),
    }
}
