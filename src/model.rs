use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any string is acceptable answer text, empty included, except one carrying NUL characters.
/// Scoring and storage apply the same rule.
pub fn check_answer_text(field: &str, text: &str) -> EvalResult<()> {
    if text.contains('\0') {
        return Err(EvalError::InvalidInput(format!(
            "{field} must not contain NUL characters"
        )));
    }
    Ok(())
}

/// Result of scoring one reference/candidate pair. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub metric_scores: BTreeMap<String, f64>,
    pub composite_score: f64,
    pub quality_tier: QualityTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub average_score: f64,
    pub quality_distribution: BTreeMap<QualityTier, usize>,
    pub total_pairs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: Option<String>,
    pub reference: String,
    pub candidate: String,
}

#[cfg(test)]
impl QaPair {
    pub fn new(reference: impl Into<String>, candidate: impl Into<String>) -> Self {
        Self {
            question: None,
            reference: reference.into(),
            candidate: candidate.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(flatten)]
    pub report: ScoreReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEvaluation {
    pub per_pair: Vec<PairReport>,
    pub summary: BatchSummary,
}

/// Question plus answer pair as handed to the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionInput {
    pub question_id: String,
    #[serde(default)]
    pub question_title: Option<String>,
    #[serde(default)]
    pub question_content: Option<String>,
    pub reference_answer: String,
    pub generated_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRecord {
    pub question_id: String,
    pub question_title: String,
    pub question_content: Option<String>,
    pub reference_answer: String,
    pub generated_answer: String,
    pub score_report: ScoreReport,
    pub access_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessedQuestion {
    pub question_id: String,
    pub question_title: String,
    pub composite_score: f64,
    pub quality_tier: QualityTier,
    pub access_count: u64,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_questions: u64,
    pub average_score: f64,
    pub total_accesses: u64,
    pub top_accessed: Vec<AccessedQuestion>,
    pub score_distribution: BTreeMap<QualityTier, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub export_path: String,
    pub db_path: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_tier_serializes_lowercase_and_orders_low_to_high() {
        assert_eq!(
            serde_json::to_string(&QualityTier::Medium).expect("tier should serialize"),
            "\"medium\""
        );
        assert!(QualityTier::Low < QualityTier::Medium);
        assert!(QualityTier::Medium < QualityTier::High);
        assert_eq!(QualityTier::parse(" HIGH "), Some(QualityTier::High));
        assert_eq!(QualityTier::parse("excellent"), None);
    }

    #[test]
    fn tier_keyed_distribution_serializes_as_json_object() {
        let mut distribution = BTreeMap::new();
        distribution.insert(QualityTier::High, 2usize);
        distribution.insert(QualityTier::Low, 1usize);

        let value = serde_json::to_value(&distribution).expect("distribution should serialize");
        assert_eq!(value, serde_json::json!({"low": 1, "high": 2}));
    }
}
