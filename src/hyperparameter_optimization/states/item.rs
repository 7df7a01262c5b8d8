use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::data::Label;
use crate::hyperparameter_optimization::{HPSetting, Params};
use crate::metrics::Metric;
use crate::ml_methods::MLMethod;
use crate::reports::ReportResult;

/// Result of fitting one setting for one label and evaluating it
///
/// Produced by [`MLProcess`](crate::workflows::MLProcess) and never changed
/// afterwards. `split_index` is `None` for a refit on the full dataset.
#[derive(Clone, Debug)]
pub struct HPItem {
    pub hp_setting: HPSetting,
    pub label: Label,
    pub split_index: Option<usize>,
    pub method: Arc<dyn MLMethod>,
    /// Parameters the method was fitted with, after model selection
    pub method_params: Params,
    pub optimization_metric: Metric,
    /// Metric values on the test data (empty without test data)
    pub performance: BTreeMap<Metric, f64>,
    pub path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub test_predictions_path: Option<PathBuf>,
    pub performance_path: Option<PathBuf>,
    pub encoding_train_results: Vec<ReportResult>,
    pub encoding_test_results: Vec<ReportResult>,
    pub model_report_results: Vec<ReportResult>,
}

/// Serializable view of an [`HPItem`]
#[derive(Debug, Serialize)]
pub struct HPItemSummary<'a> {
    pub setting: String,
    pub label: &'a str,
    pub split: Option<usize>,
    pub method: &'a str,
    pub method_params: &'a Params,
    pub optimization_metric: Metric,
    pub performance: BTreeMap<&'static str, f64>,
}

impl HPItem {
    /// Value of the optimization metric on the test data
    pub fn score(&self) -> Option<f64> {
        self.performance.get(&self.optimization_metric).copied()
    }

    pub fn summary(&self) -> HPItemSummary<'_> {
        HPItemSummary {
            setting: self.hp_setting.key(),
            label: &self.label.name,
            split: self.split_index.map(|i| i + 1),
            method: self.method.name(),
            method_params: &self.method_params,
            optimization_metric: self.optimization_metric,
            performance: self.performance.iter().map(|(m, v)| (m.name(), *v)).collect(),
        }
    }
}
