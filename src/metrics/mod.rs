//! Evaluation metrics
//!
//! Metrics are computed from string class labels. Every metric documents its
//! own behaviour on degenerate input; when a value is mathematically
//! undefined, computing it is an error rather than a fabricated number.

mod classification;

pub use classification::{ConfusionMatrix, MetricError};

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Available evaluation metrics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Fraction of correct predictions
    Accuracy,
    /// Mean recall over the classes present in the ground truth
    BalancedAccuracy,
    /// Precision of the positive class (macro average for multi-class labels)
    Precision,
    /// Recall of the positive class (macro average for multi-class labels)
    Recall,
    /// F1 from global counts
    F1Micro,
    /// Unweighted mean of per-class F1
    F1Macro,
    /// Per-class F1 weighted by support
    F1Weighted,
    /// Area under the ROC curve for the positive class
    Auc,
    /// Cross-entropy of predicted probabilities
    LogLoss,
}

/// Metric used when a configured name is not recognised
pub const DEFAULT_OPTIMIZATION_METRIC: Metric = Metric::BalancedAccuracy;

/// Predicted class probabilities with their column classes
#[derive(Clone, Copy, Debug)]
pub struct Probabilities<'a> {
    /// One row per example, one column per class
    pub values: &'a Array2<f64>,
    /// Class of each column
    pub classes: &'a [String],
}

impl Metric {
    /// All metrics in declaration order
    pub const ALL: [Metric; 9] = [
        Metric::Accuracy,
        Metric::BalancedAccuracy,
        Metric::Precision,
        Metric::Recall,
        Metric::F1Micro,
        Metric::F1Macro,
        Metric::F1Weighted,
        Metric::Auc,
        Metric::LogLoss,
    ];

    /// Whether higher values are better for this metric
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Metric::LogLoss)
    }

    /// Configuration name of the metric
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::BalancedAccuracy => "balanced_accuracy",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1Micro => "f1_micro",
            Metric::F1Macro => "f1_macro",
            Metric::F1Weighted => "f1_weighted",
            Metric::Auc => "auc",
            Metric::LogLoss => "log_loss",
        }
    }

    /// Parse a metric name, substituting the default with a warning when unknown
    pub fn parse_or_default(name: &str) -> Metric {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(
                metric = name,
                fallback = DEFAULT_OPTIMIZATION_METRIC.name(),
                "unknown metric, using the default instead"
            );
            DEFAULT_OPTIMIZATION_METRIC
        })
    }

    /// Compute the metric
    ///
    /// `positive_class` selects the class scored by precision, recall and AUC
    /// for binary labels.
    pub fn compute(
        &self,
        y_true: &[String],
        y_pred: &[String],
        probabilities: Option<Probabilities<'_>>,
        positive_class: Option<&str>,
    ) -> Result<f64, MetricError> {
        if y_true.len() != y_pred.len() {
            return Err(MetricError::LengthMismatch {
                metric: *self,
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }
        if y_true.is_empty() {
            return Err(MetricError::Empty { metric: *self });
        }

        let cm = ConfusionMatrix::from_predictions(y_pred, y_true);
        let binary_positive = positive_class.filter(|_| cm.n_classes() <= 2);
        match self {
            Metric::Accuracy => Ok(cm.accuracy()),
            Metric::BalancedAccuracy => Ok(cm.balanced_accuracy()),
            Metric::Precision => Ok(match binary_positive.and_then(|c| cm.class_index(c)) {
                Some(class) => cm.precision(class),
                None if binary_positive.is_some() => 0.0,
                None => cm.macro_average(ConfusionMatrix::precision),
            }),
            Metric::Recall => Ok(match binary_positive.and_then(|c| cm.class_index(c)) {
                Some(class) => cm.recall(class),
                None if binary_positive.is_some() => 0.0,
                None => cm.macro_average(ConfusionMatrix::recall),
            }),
            Metric::F1Micro => Ok(cm.accuracy()),
            Metric::F1Macro => Ok(cm.macro_average(ConfusionMatrix::f1)),
            Metric::F1Weighted => Ok(cm.weighted_average(ConfusionMatrix::f1)),
            Metric::Auc => classification::roc_auc(y_true, y_pred, probabilities, positive_class),
            Metric::LogLoss => classification::log_loss(y_true, probabilities),
        }
    }
}

impl FromStr for Metric {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == normalized)
            .ok_or_else(|| MetricError::Unknown(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
