use std::collections::BTreeMap;

use crate::config::{ScoringConfig, TierThresholds};
use crate::error::{EvalError, EvalResult};
use crate::model::ScoreReport;

/// Weighted combination of metric scores into one composite score and tier.
#[derive(Debug, Clone)]
pub struct Aggregator {
    weights: BTreeMap<String, f64>,
    thresholds: TierThresholds,
}

impl Aggregator {
    pub fn new(config: &ScoringConfig) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.weights.clone(),
            thresholds: config.thresholds,
        })
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    /// Every weighted metric must be present. Unweighted metrics are reported but do not
    /// contribute to the composite.
    pub fn aggregate<I, K>(&self, metric_scores: I) -> EvalResult<ScoreReport>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut scores = BTreeMap::<String, f64>::new();
        for (name, value) in metric_scores {
            let name = name.into();
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EvalError::InvalidInput(format!(
                    "metric `{name}` must lie in [0, 1], got {value}"
                )));
            }
            if scores.insert(name.clone(), value).is_some() {
                return Err(EvalError::InvalidInput(format!(
                    "metric `{name}` reported more than once"
                )));
            }
        }

        let mut composite = 0.0_f64;
        for (name, weight) in &self.weights {
            let value = scores
                .get(name)
                .ok_or_else(|| EvalError::MissingMetric(name.clone()))?;
            composite += weight * value;
        }
        let composite_score = composite.clamp(0.0, 1.0);

        Ok(ScoreReport {
            metric_scores: scores,
            composite_score,
            quality_tier: self.thresholds.tier_for(composite_score),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QualityTier;
    use crate::scoring::metrics::{
        KEYWORD_COVERAGE, LENGTH_ADEQUACY, LEXICAL_OVERLAP, SEMANTIC_SIMILARITY,
    };

    fn aggregator() -> Aggregator {
        Aggregator::new(&ScoringConfig::default()).expect("default config should be accepted")
    }

    #[test]
    fn composite_is_weighted_sum_of_metric_scores() {
        let report = aggregator()
            .aggregate([
                (LEXICAL_OVERLAP, 1.0),
                (SEMANTIC_SIMILARITY, 1.0),
                (LENGTH_ADEQUACY, 0.0),
                (KEYWORD_COVERAGE, 1.0),
            ])
            .expect("complete metrics should aggregate");

        assert!((report.composite_score - 0.8).abs() < 1e-12);
        assert_eq!(report.quality_tier, QualityTier::High);
        assert_eq!(report.metric_scores.len(), 4);
    }

    #[test]
    fn composite_does_not_depend_on_metric_order() {
        let forward = vec![
            (LEXICAL_OVERLAP, 0.31),
            (SEMANTIC_SIMILARITY, 0.77),
            (LENGTH_ADEQUACY, 0.12),
            (KEYWORD_COVERAGE, 0.58),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        let mut rotated = forward.clone();
        rotated.rotate_left(2);

        let aggregator = aggregator();
        let expected = aggregator.aggregate(forward).expect("forward");
        assert_eq!(aggregator.aggregate(reversed).expect("reversed"), expected);
        assert_eq!(aggregator.aggregate(rotated).expect("rotated"), expected);
    }

    #[test]
    fn missing_weighted_metric_is_an_error() {
        let error = aggregator()
            .aggregate([
                (LEXICAL_OVERLAP, 1.0),
                (SEMANTIC_SIMILARITY, 1.0),
                (LENGTH_ADEQUACY, 1.0),
            ])
            .expect_err("keyword coverage is weighted and absent");

        assert!(
            matches!(error, EvalError::MissingMetric(ref name) if name == KEYWORD_COVERAGE),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn out_of_range_or_duplicate_metric_is_rejected() {
        let aggregator = aggregator();
        assert!(matches!(
            aggregator.aggregate([(LEXICAL_OVERLAP, 1.5)]),
            Err(EvalError::InvalidInput(_))
        ));
        assert!(matches!(
            aggregator.aggregate([(LEXICAL_OVERLAP, f64::NAN)]),
            Err(EvalError::InvalidInput(_))
        ));
        assert!(matches!(
            aggregator.aggregate([(LEXICAL_OVERLAP, 0.5), (LEXICAL_OVERLAP, 0.6)]),
            Err(EvalError::InvalidInput(_))
        ));
    }

    #[test]
    fn score_exactly_on_threshold_takes_higher_tier() {
        let mut config = ScoringConfig::default();
        config.weights = BTreeMap::from([(LEXICAL_OVERLAP.to_string(), 1.0)]);
        let aggregator = Aggregator::new(&config).expect("single-metric config is valid");

        let at_medium = aggregator
            .aggregate([(LEXICAL_OVERLAP, 0.4)])
            .expect("aggregate");
        let at_high = aggregator
            .aggregate([(LEXICAL_OVERLAP, 0.7)])
            .expect("aggregate");
        let below = aggregator
            .aggregate([(LEXICAL_OVERLAP, 0.39)])
            .expect("aggregate");

        assert_eq!(at_medium.quality_tier, QualityTier::Medium);
        assert_eq!(at_high.quality_tier, QualityTier::High);
        assert_eq!(below.quality_tier, QualityTier::Low);
    }

    #[test]
    fn invalid_configuration_is_refused_at_construction() {
        let mut config = ScoringConfig::default();
        config.weights.clear();
        assert!(matches!(
            Aggregator::new(&config),
            Err(EvalError::InvalidConfig(_))
        ));
    }
}
