use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::model::QualityTier;
use crate::scoring::metrics::{
    KEYWORD_COVERAGE, LENGTH_ADEQUACY, LEXICAL_OVERLAP, METRIC_NAMES, SEMANTIC_SIMILARITY,
};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_MIN_KEYWORD_LEN: usize = 4;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Lower bounds of the medium and high tiers; a score equal to a bound belongs to the higher tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            medium: 0.4,
            high: 0.7,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score: f64) -> QualityTier {
        if score >= self.high {
            QualityTier::High
        } else if score >= self.medium {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringConfig {
    pub weights: BTreeMap<String, f64>,
    pub thresholds: TierThresholds,
    pub max_batch_size: usize,
    pub min_keyword_len: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            thresholds: TierThresholds::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            min_keyword_len: DEFAULT_MIN_KEYWORD_LEN,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScoringConfigFile {
    #[serde(default)]
    weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    thresholds: Option<TierThresholds>,
    #[serde(default)]
    max_batch_size: Option<usize>,
    #[serde(default)]
    min_keyword_len: Option<usize>,
}

pub fn default_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        (LEXICAL_OVERLAP.to_string(), 0.30),
        (SEMANTIC_SIMILARITY.to_string(), 0.20),
        (LENGTH_ADEQUACY.to_string(), 0.20),
        (KEYWORD_COVERAGE.to_string(), 0.30),
    ])
}

impl ScoringConfig {
    /// Defaults overridden field by field by an optional JSON file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = path {
            let raw =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let file: ScoringConfigFile = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;

            if let Some(weights) = file.weights {
                config.weights = weights;
            }
            if let Some(thresholds) = file.thresholds {
                config.thresholds = thresholds;
            }
            if let Some(max_batch_size) = file.max_batch_size {
                config.max_batch_size = max_batch_size;
            }
            if let Some(min_keyword_len) = file.min_keyword_len {
                config.min_keyword_len = min_keyword_len;
            }
        }

        config
            .validate()
            .context("scoring configuration rejected")?;
        Ok(config)
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn validate(&self) -> EvalResult<()> {
        if self.weights.is_empty() {
            return Err(EvalError::InvalidConfig(
                "at least one metric weight is required".to_string(),
            ));
        }

        for (name, weight) in &self.weights {
            if !METRIC_NAMES.contains(&name.as_str()) {
                return Err(EvalError::InvalidConfig(format!(
                    "unknown metric `{name}` in weights"
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(EvalError::InvalidConfig(format!(
                    "weight for `{name}` must be a non-negative number, got {weight}"
                )));
            }
        }

        let total = self.weights.values().sum::<f64>();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EvalError::InvalidConfig(format!(
                "metric weights must sum to 1, got {total}"
            )));
        }

        let TierThresholds { medium, high } = self.thresholds;
        if !(medium > 0.0 && medium <= high && high <= 1.0) {
            return Err(EvalError::InvalidConfig(format!(
                "tier thresholds must satisfy 0 < medium <= high <= 1, got medium={medium} high={high}"
            )));
        }

        if self.max_batch_size == 0 {
            return Err(EvalError::InvalidConfig(
                "max_batch_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ScoringConfig::default()
            .validate()
            .expect("defaults should validate");
    }

    #[test]
    fn thresholds_assign_boundary_scores_to_higher_tier() {
        let thresholds = TierThresholds::default();
        assert_eq!(thresholds.tier_for(0.0), QualityTier::Low);
        assert_eq!(thresholds.tier_for(0.399), QualityTier::Low);
        assert_eq!(thresholds.tier_for(0.4), QualityTier::Medium);
        assert_eq!(thresholds.tier_for(0.699), QualityTier::Medium);
        assert_eq!(thresholds.tier_for(0.7), QualityTier::High);
        assert_eq!(thresholds.tier_for(1.0), QualityTier::High);
    }

    #[test]
    fn validate_rejects_weights_not_summing_to_one() {
        let mut config = ScoringConfig::default();
        config.weights.insert(LEXICAL_OVERLAP.to_string(), 0.9);

        let error = config.validate().expect_err("skewed weights should fail");
        assert!(matches!(error, EvalError::InvalidConfig(_)));
        assert!(error.to_string().contains("sum to 1"), "unexpected error: {error}");
    }

    #[test]
    fn validate_rejects_unknown_metric_and_inverted_thresholds() {
        let mut unknown = ScoringConfig::default();
        unknown.weights.insert("bleu".to_string(), 0.0);
        assert!(matches!(
            unknown.validate(),
            Err(EvalError::InvalidConfig(_))
        ));

        let mut inverted = ScoringConfig::default();
        inverted.thresholds = TierThresholds {
            medium: 0.8,
            high: 0.5,
        };
        assert!(matches!(
            inverted.validate(),
            Err(EvalError::InvalidConfig(_))
        ));

        let zero_cap = ScoringConfig::default().with_max_batch_size(0);
        assert!(matches!(
            zero_cap.validate(),
            Err(EvalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn load_overrides_only_fields_present_in_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scoring.json");
        std::fs::write(
            &path,
            r#"{"max_batch_size": 7, "thresholds": {"medium": 0.5, "high": 0.8}}"#,
        )
        .expect("config file should be written");

        let config = ScoringConfig::load(Some(&path)).expect("config should load");
        assert_eq!(config.max_batch_size, 7);
        assert_eq!(config.thresholds.medium, 0.5);
        assert_eq!(config.weights, default_weights());
        assert_eq!(config.min_keyword_len, DEFAULT_MIN_KEYWORD_LEN);
    }
}
