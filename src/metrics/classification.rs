//! Classification metrics over string class labels

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use super::{Metric, Probabilities};

/// Metric computation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("Unknown metric: {0}")]
    Unknown(String),

    #[error("Cannot compute {metric} on empty input")]
    Empty { metric: Metric },

    #[error("Cannot compute {metric}: {expected} true labels but {actual} predictions")]
    LengthMismatch { metric: Metric, expected: usize, actual: usize },

    #[error("{metric} is undefined when only one class ('{class}') is present in the ground truth")]
    SingleClass { metric: Metric, class: String },

    #[error("{metric} requires a positive class for a binary label")]
    NoPositiveClass { metric: Metric },

    #[error("{metric} requires predicted probabilities, but the method does not provide them")]
    MissingProbabilities { metric: Metric },
}

/// Confusion matrix for multi-class classification
///
/// Element [i][j] counts samples with true class i predicted as class j.
/// Classes are the sorted union of observed true and predicted values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    classes: Vec<String>,
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Create from predictions and ground truth of equal length
    pub fn from_predictions(y_pred: &[String], y_true: &[String]) -> Self {
        let classes: Vec<String> = y_pred
            .iter()
            .chain(y_true.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        let n_classes = classes.len();
        let mut cm = Self { classes, matrix: vec![vec![0; n_classes]; n_classes] };
        for (pred, truth) in y_pred.iter().zip(y_true) {
            if let (Some(p), Some(t)) = (cm.class_index(pred), cm.class_index(truth)) {
                cm.matrix[t][p] += 1;
            }
        }
        cm
    }

    /// Observed classes in sorted order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Row/column index of a class
    pub fn class_index(&self, class: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(class)).ok()
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Element at [true_class][predicted_class]
    pub fn get(&self, true_class: usize, predicted_class: usize) -> usize {
        self.matrix[true_class][predicted_class]
    }

    /// True positives for a class
    pub fn true_positives(&self, class: usize) -> usize {
        self.matrix[class][class]
    }

    /// Predicted as class but wasn't
    pub fn false_positives(&self, class: usize) -> usize {
        (0..self.n_classes()).filter(|&i| i != class).map(|i| self.matrix[i][class]).sum()
    }

    /// Was class but predicted differently
    pub fn false_negatives(&self, class: usize) -> usize {
        (0..self.n_classes()).filter(|&j| j != class).map(|j| self.matrix[class][j]).sum()
    }

    /// Number of true instances of a class
    pub fn support(&self, class: usize) -> usize {
        self.matrix[class].iter().sum()
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Fraction of correct predictions
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.n_classes()).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Precision of a class; 0 when nothing was predicted as that class
    pub fn precision(&self, class: usize) -> f64 {
        let tp = self.true_positives(class) as f64;
        let fp = self.false_positives(class) as f64;
        if tp + fp > 0.0 {
            tp / (tp + fp)
        } else {
            0.0
        }
    }

    /// Recall of a class; 0 when the class has no support
    pub fn recall(&self, class: usize) -> f64 {
        let tp = self.true_positives(class) as f64;
        let fn_ = self.false_negatives(class) as f64;
        if tp + fn_ > 0.0 {
            tp / (tp + fn_)
        } else {
            0.0
        }
    }

    /// Harmonic mean of precision and recall
    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    /// Mean recall over classes with non-zero support
    pub fn balanced_accuracy(&self) -> f64 {
        let recalls: Vec<f64> =
            (0..self.n_classes()).filter(|&c| self.support(c) > 0).map(|c| self.recall(c)).collect();
        if recalls.is_empty() {
            0.0
        } else {
            recalls.iter().sum::<f64>() / recalls.len() as f64
        }
    }

    /// Unweighted mean of a per-class score
    pub fn macro_average(&self, score: impl Fn(&Self, usize) -> f64) -> f64 {
        if self.n_classes() == 0 {
            return 0.0;
        }
        (0..self.n_classes()).map(|c| score(self, c)).sum::<f64>() / self.n_classes() as f64
    }

    /// Mean of a per-class score weighted by support
    pub fn weighted_average(&self, score: impl Fn(&Self, usize) -> f64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (0..self.n_classes()).map(|c| score(self, c) * self.support(c) as f64).sum::<f64>()
            / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.classes.iter().map(String::len).max().unwrap_or(4).max(4);
        write!(f, "{:width$}", "")?;
        for class in &self.classes {
            write!(f, " {class:>width$}")?;
        }
        writeln!(f)?;
        for (i, class) in self.classes.iter().enumerate() {
            write!(f, "{class:width$}")?;
            for count in &self.matrix[i] {
                write!(f, " {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// ROC AUC of `positive_class`, from probabilities when available, else from hard predictions
pub(super) fn roc_auc(
    y_true: &[String],
    y_pred: &[String],
    probabilities: Option<Probabilities<'_>>,
    positive_class: Option<&str>,
) -> Result<f64, MetricError> {
    let metric = Metric::Auc;
    let observed: BTreeSet<&str> = y_true.iter().map(String::as_str).collect();
    if observed.len() < 2 {
        let class = observed.into_iter().next().unwrap_or_default().to_string();
        return Err(MetricError::SingleClass { metric, class });
    }
    let positive = positive_class.ok_or(MetricError::NoPositiveClass { metric })?;

    let scores: Vec<f64> = match probabilities {
        Some(p) => match p.classes.iter().position(|c| c == positive) {
            Some(col) => p.values.column(col).to_vec(),
            None => vec![0.0; y_true.len()],
        },
        None => y_pred.iter().map(|c| if c == positive { 1.0 } else { 0.0 }).collect(),
    };
    let is_positive: Vec<bool> = y_true.iter().map(|c| c == positive).collect();
    let n_pos = is_positive.iter().filter(|&&p| p).count();
    let n_neg = is_positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        let class = if n_pos == 0 { "negative" } else { positive };
        return Err(MetricError::SingleClass { metric, class: class.to_string() });
    }

    // Mann-Whitney U with average ranks for ties
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = average_rank;
        }
        start = end + 1;
    }
    let positive_rank_sum: f64 =
        ranks.iter().zip(&is_positive).filter(|(_, &p)| p).map(|(r, _)| r).sum();
    let n_pos = n_pos as f64;
    Ok((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Mean negative log-likelihood of the true class
pub(super) fn log_loss(
    y_true: &[String],
    probabilities: Option<Probabilities<'_>>,
) -> Result<f64, MetricError> {
    const EPS: f64 = 1e-15;
    let p = probabilities.ok_or(MetricError::MissingProbabilities { metric: Metric::LogLoss })?;
    let total: f64 = y_true
        .iter()
        .enumerate()
        .map(|(row, class)| {
            let prob = p
                .classes
                .iter()
                .position(|c| c == class)
                .map_or(0.0, |col| p.values[[row, col]]);
            -prob.clamp(EPS, 1.0 - EPS).ln()
        })
        .sum();
    Ok(total / y_true.len() as f64)
}
