//! Hyperparameter optimization strategies

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::setting::HPSetting;
use crate::metrics::Metric;

/// Relative tolerance under which two aggregated scores count as tied
pub const TIE_TOLERANCE: f64 = 1e-9;

/// How inner-fold scores of one setting are reduced to one number
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Mean,
    Median,
}

impl Aggregation {
    /// Aggregate `scores`; `None` when empty
    pub fn aggregate(&self, scores: &[f64]) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }
        match self {
            Self::Mean => Some(scores.iter().sum::<f64>() / scores.len() as f64),
            Self::Median => {
                let mut sorted = scores.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                Some(if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                })
            }
        }
    }
}

/// Whether `candidate` beats `current` by more than the tie tolerance
pub fn improves(candidate: f64, current: f64, higher_is_better: bool) -> bool {
    let tolerance = TIE_TOLERANCE * candidate.abs().max(current.abs()).max(f64::MIN_POSITIVE);
    if higher_is_better {
        candidate > current + tolerance
    } else {
        candidate < current - tolerance
    }
}

/// Decides which settings are evaluated and which one is optimal
pub trait HPOptimizationStrategy: Send + Sync + fmt::Debug {
    /// Name used in output paths (`selection_{name}`)
    fn name(&self) -> &str;

    /// Settings to evaluate, in evaluation order
    fn candidates<'a>(&self, settings: &'a [HPSetting]) -> Vec<&'a HPSetting>;

    /// Optimal setting given aggregated scores in declaration order
    fn optimal<'a>(
        &self,
        performances: &'a IndexMap<HPSetting, f64>,
        metric: Metric,
    ) -> Option<&'a HPSetting>;
}

/// Evaluates every setting; the best aggregated score wins, ties go to the first declared
#[derive(Clone, Copy, Debug, Default)]
pub struct GridSearch;

impl HPOptimizationStrategy for GridSearch {
    fn name(&self) -> &str {
        "grid_search"
    }

    fn candidates<'a>(&self, settings: &'a [HPSetting]) -> Vec<&'a HPSetting> {
        settings.iter().collect()
    }

    fn optimal<'a>(
        &self,
        performances: &'a IndexMap<HPSetting, f64>,
        metric: Metric,
    ) -> Option<&'a HPSetting> {
        let mut best: Option<(&HPSetting, f64)> = None;
        for (setting, &score) in performances {
            if score.is_nan() {
                continue;
            }
            let replace = match best {
                Some((_, current)) => improves(score, current, metric.higher_is_better()),
                None => true,
            };
            if replace {
                best = Some((setting, score));
            }
        }
        best.map(|(setting, _)| setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparameter_optimization::{ComponentSpec, MLMethodSpec};
    use approx::assert_relative_eq;

    fn setting(name: &str) -> HPSetting {
        HPSetting::new("enc", ComponentSpec::new("KmerFrequency"), name, MLMethodSpec::new(name))
    }

    #[test]
    fn test_mean_and_median() {
        assert_relative_eq!(Aggregation::Mean.aggregate(&[0.8, 0.9]).unwrap(), 0.85);
        assert_relative_eq!(Aggregation::Median.aggregate(&[0.1, 0.9, 0.5]).unwrap(), 0.5);
        assert_relative_eq!(Aggregation::Median.aggregate(&[0.1, 0.9, 0.5, 0.7]).unwrap(), 0.6);
        assert!(Aggregation::Mean.aggregate(&[]).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_declared() {
        let a = setting("A");
        let b = setting("B");
        let mut performances = IndexMap::new();
        performances.insert(a.clone(), Aggregation::Mean.aggregate(&[0.8, 0.9]).unwrap());
        performances.insert(b, Aggregation::Mean.aggregate(&[0.85, 0.85]).unwrap());
        assert_eq!(GridSearch.optimal(&performances, Metric::BalancedAccuracy), Some(&a));
    }

    #[test]
    fn test_tie_with_b_declared_first() {
        let a = setting("A");
        let b = setting("B");
        let mut performances = IndexMap::new();
        performances.insert(b.clone(), Aggregation::Mean.aggregate(&[0.85, 0.85]).unwrap());
        performances.insert(a, Aggregation::Mean.aggregate(&[0.8, 0.9]).unwrap());
        assert_eq!(GridSearch.optimal(&performances, Metric::BalancedAccuracy), Some(&b));
    }

    #[test]
    fn test_lower_is_better_for_log_loss() {
        let a = setting("A");
        let b = setting("B");
        let mut performances = IndexMap::new();
        performances.insert(a, 0.7);
        performances.insert(b.clone(), 0.3);
        assert_eq!(GridSearch.optimal(&performances, Metric::LogLoss), Some(&b));
    }

    #[test]
    fn test_nan_scores_are_ignored() {
        let a = setting("A");
        let b = setting("B");
        let mut performances = IndexMap::new();
        performances.insert(a, f64::NAN);
        performances.insert(b.clone(), 0.1);
        assert_eq!(GridSearch.optimal(&performances, Metric::Accuracy), Some(&b));
        assert!(GridSearch.optimal(&IndexMap::new(), Metric::Accuracy).is_none());
    }

    #[test]
    fn test_candidates_keep_declaration_order() {
        let settings = vec![setting("A"), setting("B"), setting("C")];
        let names: Vec<String> =
            GridSearch.candidates(&settings).iter().map(|s| s.key()).collect();
        assert_eq!(names, vec!["enc_A", "enc_B", "enc_C"]);
    }
}
